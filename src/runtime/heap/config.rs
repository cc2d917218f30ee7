//! Managed heap configuration

use serde::{Deserialize, Serialize};

/// Managed heap configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapConfig {
    /// Run finalizers at the end of every collection instead of waiting for
    /// an explicit `run_finalizers` call
    pub finalize_on_collect: bool,
    /// Maximum number of live objects (0 = unlimited)
    pub max_objects: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            finalize_on_collect: true,
            max_objects: 0,
        }
    }
}

impl HeapConfig {
    /// Configuration whose finalizers only run on demand.
    pub fn deferred_finalization() -> Self {
        Self {
            finalize_on_collect: false,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("SHELLBRIDGE_FINALIZE_ON_COLLECT")
            && let Ok(enabled) = value.parse::<bool>()
        {
            config.finalize_on_collect = enabled;
        }

        if let Ok(value) = std::env::var("SHELLBRIDGE_MAX_OBJECTS")
            && let Ok(limit) = value.parse::<usize>()
        {
            config.max_objects = limit;
        }

        config
    }

    pub fn is_bounded(&self) -> bool {
        self.max_objects > 0
    }
}
