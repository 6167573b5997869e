//! Host loop configuration.

use std::path::Path;

use kairo_tick::TickConfig;
use kairo_timer::TimerConfig;
use serde::{Deserialize, Serialize};

use crate::KairoError;

/// Everything a [`ServerLoop`](crate::ServerLoop) needs to start.
///
/// Every field has a default, so a config file only lists what it changes:
///
/// ```json
/// { "tick": { "tick_rate_hz": 10 }, "timers": { "max_timers": 5000 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub tick: TickConfig,
    pub timers: TimerConfig,
}

impl LoopConfig {
    pub fn from_json_str(json: &str) -> Result<Self, KairoError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, KairoError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "loop config loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            LoopConfig::from_json_str(r#"{ "tick": { "tick_rate_hz": 10 } }"#).unwrap();
        assert_eq!(config.tick.tick_rate_hz, 10);
        assert_eq!(config.timers, TimerConfig::default());
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(LoopConfig::from_json_str("{}").unwrap(), LoopConfig::default());
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = LoopConfig::from_json_str("{ tick: ").unwrap_err();
        assert!(matches!(err, KairoError::Json(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = LoopConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, KairoError::Io(_)));
    }
}
