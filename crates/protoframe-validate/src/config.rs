use std::time::Duration;

use protoframe_sandbox::DEFAULT_SCRIPT_TIMEOUT;

/// Controls validation engine behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Wall-clock budget for validation and transform scripts.
    pub script_timeout: Duration,
    /// Timeout applied when a validation does not declare one.
    pub default_validation_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
            default_validation_timeout: Duration::from_secs(5),
        }
    }
}
