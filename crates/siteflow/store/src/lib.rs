//! Entity Store boundary for Siteflow
//!
//! Persistence is a path-addressed key-value tree with realtime push:
//!
//! - **[`StorePath`]**: `/`-separated address of a document or subtree.
//! - **[`EntityStore`]**: the async boundary trait: read, write,
//!   atomic multi-path update, guarded (conditional) update, generated
//!   child keys, remove, subscribe.
//! - **[`StoreEvent`]**: realtime change notifications in
//!   server-assigned commit order.
//! - **[`InMemoryStore`]**: the reference implementation, suitable for
//!   tests and single-process deployments.
//!
//! The guarded update is the concurrency primitive: a multi-path merge
//! that only applies if a guard document still holds its expected
//! value. Status transitions commit through it, so racing writers get
//! an explicit conflict instead of silent last-write-wins.

#![deny(unsafe_code)]

mod error;
mod event;
mod memory;
mod path;
mod traits;

pub use error::*;
pub use event::*;
pub use memory::*;
pub use path::*;
pub use traits::*;
