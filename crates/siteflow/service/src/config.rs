//! Service configuration

use serde::{Deserialize, Serialize};
use siteflow_notify::DispatcherConfig;

/// Tunables for the service layer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Retry policy handed to the notification dispatcher
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Compare-and-swap retries for merging writes (comments,
    /// read-state flips) before giving up with a conflict
    #[serde(default = "default_merge_retry_limit")]
    pub merge_retry_limit: u32,
}

fn default_merge_retry_limit() -> u32 {
    4
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            merge_retry_limit: default_merge_retry_limit(),
        }
    }
}
