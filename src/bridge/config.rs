//! Bridge configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Reject runtime-initiated construction when the runtime object's class
    /// is not the native type's registered class
    pub check_construct_class: bool,
    /// Panic on a finalize notification whose handle is unknown instead of
    /// logging it
    pub strict_notifications: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            check_construct_class: true,
            strict_notifications: false,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("SHELLBRIDGE_CHECK_CLASS")
            && let Ok(enabled) = value.parse::<bool>()
        {
            config.check_construct_class = enabled;
        }

        if let Ok(value) = std::env::var("SHELLBRIDGE_STRICT_NOTIFICATIONS")
            && let Ok(enabled) = value.parse::<bool>()
        {
            config.strict_notifications = enabled;
        }

        config
    }
}
