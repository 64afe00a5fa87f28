//! Store paths: `/`-separated addresses into the key-value tree

use serde::{Deserialize, Serialize};

/// A normalized path into the store tree.
///
/// Paths carry no leading or trailing separators and no empty
/// segments; `StorePath::new("/a//b/")` is the same path as
/// `StorePath::new("a/b")`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorePath(String);

impl StorePath {
    pub fn new(path: impl AsRef<str>) -> Self {
        let normalized: Vec<&str> = path
            .as_ref()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        Self(normalized.join("/"))
    }

    /// The root of the tree (the empty path)
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// Append one segment
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        let segment = segment.as_ref();
        if self.0.is_empty() {
            Self::new(segment)
        } else {
            Self::new(format!("{}/{}", self.0, segment))
        }
    }

    pub fn parent(&self) -> Option<Self> {
        let mut segments: Vec<&str> = self.segments().collect();
        segments.pop()?;
        Some(Self(segments.join("/")))
    }

    /// Whether `prefix` is an ancestor of (or equal to) this path
    pub fn starts_with(&self, prefix: &StorePath) -> bool {
        if prefix.0.is_empty() {
            return true;
        }
        let mut own = self.segments();
        for expected in prefix.segments() {
            match own.next() {
                Some(segment) if segment == expected => {}
                _ => return false,
            }
        }
        true
    }

    /// Segments of this path below `prefix`, or None if not under it
    pub fn relative_to(&self, prefix: &StorePath) -> Option<Vec<&str>> {
        if !self.starts_with(prefix) {
            return None;
        }
        let skip = prefix.segments().count();
        Some(self.segments().skip(skip).collect())
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StorePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Generate a push key: time-prefixed so sibling keys sort in creation
/// order, uuid-suffixed so concurrent pushes never collide.
pub fn push_key(now: chrono::DateTime<chrono::Utc>) -> String {
    let millis = now.timestamp_millis().max(0) as u64;
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("{:013x}-{}", millis, &nonce[..8])
}
