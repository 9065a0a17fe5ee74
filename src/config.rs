use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings of a [`RuleInterpreter`](crate::RuleInterpreter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Minimum time between two warnings about the same deprecated function
    #[serde(default = "default_deprecation_interval", with = "duration_ms")]
    pub deprecation_warning_interval: Duration,

    /// Message field that collects rule failures
    #[serde(default = "default_processing_error_field")]
    pub processing_error_field: String,

    #[serde(default = "default_true")]
    pub record_processing_errors: bool,
}

fn default_deprecation_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_processing_error_field() -> String {
    "gl2_processing_error".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            deprecation_warning_interval: default_deprecation_interval(),
            processing_error_field: default_processing_error_field(),
            record_processing_errors: default_true(),
        }
    }
}

impl InterpreterConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
