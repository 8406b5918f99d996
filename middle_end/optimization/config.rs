//! Options for the optimization passes.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::middle_end::analysis::DEFAULT_MAX_LOOP_NESTING;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PassConfig {
    /// Loops nested at least this deep are walked once instead of twice,
    /// giving up on the stores inside them.
    pub max_loop_nesting: usize,
}

impl Default for PassConfig {
    fn default() -> Self {
        PassConfig {
            max_loop_nesting: DEFAULT_MAX_LOOP_NESTING,
        }
    }
}

/// A malformed configuration.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub struct ConfigError(pub String);
impl std::error::Error for ConfigError {}

impl PassConfig {
    /// Read a configuration from a JSON object.  Missing fields get their
    /// default values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json)
            .map_err(|e| ConfigError(format!("invalid pass configuration: {e}")))
    }
}
