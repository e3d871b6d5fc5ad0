//! Controller configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::convert::OutputCalibration;
use crate::error::ConfigError;

/// Runtime settings for a controller session.
///
/// Stored as JSON; every field is optional in the file and falls back to the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Root URL of the fixture, e.g. `http://192.168.4.1`.
    pub base_url: String,
    /// Coalescing window for level commands.
    pub debounce_ms: u64,
    /// Reconciliation poll period.
    pub poll_interval_ms: u64,
    /// Clock and target readout refresh period.
    pub display_interval_ms: u64,
    /// Periodic clock resync period.
    pub resync_interval_ms: u64,
    /// Delay before the second start-up sync and the first display tick.
    pub settle_delay_ms: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_ms: u64,
    /// Slider positions at start-up.
    pub initial_levels: [u8; 2],
    /// Output voltage span of the fixture.
    pub calibration: OutputCalibration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.4.1".to_string(),
            debounce_ms: 35,
            poll_interval_ms: 300,
            display_interval_ms: 1000,
            resync_interval_ms: 5 * 60 * 1000,
            settle_delay_ms: 300,
            request_timeout_ms: 2000,
            initial_levels: [128, 128],
            calibration: OutputCalibration::default(),
        }
    }
}

impl ControllerConfig {
    /// Load the configuration from a JSON file.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: ControllerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        debug!("loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Check that every interval is non-zero and the calibration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("debounce_ms", self.debounce_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("display_interval_ms", self.display_interval_ms),
            ("resync_interval_ms", self.resync_interval_ms),
            ("request_timeout_ms", self.request_timeout_ms),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        let OutputCalibration { v_min, v_max } = self.calibration;
        let reason = if !v_max.is_finite() || v_max <= 0.0 {
            Some(format!("v_max must be positive, got {}", v_max))
        } else if v_min.is_nan() || v_min < 0.0 {
            Some(format!("v_min must not be negative, got {}", v_min))
        } else if v_min >= v_max {
            Some(format!("v_min {} must be below v_max {}", v_min, v_max))
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ConfigError::Invalid {
                field: "calibration",
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Replace the device root URL, trimming any trailing slash.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Coalescing window as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Reconciliation poll period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Readout refresh period.
    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms)
    }

    /// Periodic clock resync period.
    pub fn resync_interval(&self) -> Duration {
        Duration::from_millis(self.resync_interval_ms)
    }

    /// Start-up settle delay.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Per-request HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ControllerConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"base_url": "http://lamp.local", "poll_interval_ms": 500}}"#).unwrap();

        let config = ControllerConfig::load(file.path()).unwrap();
        assert_eq!(config.base_url, "http://lamp.local");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.debounce(), Duration::from_millis(35));
        assert_eq!(config.initial_levels, [128, 128]);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"debounce_ms": 0}}"#).unwrap();

        let err = ControllerConfig::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "debounce_ms",
                ..
            }
        ));
    }

    #[test]
    fn test_bad_calibration_rejected() {
        for (v_min, v_max) in [(0.5, 0.0), (3.3, 3.3), (3.0, 1.0), (-0.1, 3.3), (f64::NAN, 3.3)] {
            let config = ControllerConfig {
                calibration: OutputCalibration { v_min, v_max },
                ..Default::default()
            };
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::Invalid {
                        field: "calibration",
                        ..
                    })
                ),
                "accepted {v_min}..{v_max}"
            );
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"calibration": {{"v_min": 2.0, "v_max": 1.0}}}}"#).unwrap();
        assert!(ControllerConfig::load(file.path()).is_err());

        let config = ControllerConfig {
            calibration: OutputCalibration { v_min: 0.0, v_max: 5.0 },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_garbage_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ControllerConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = ControllerConfig::default().with_base_url("http://10.0.0.7/");
        assert_eq!(config.base_url, "http://10.0.0.7");
    }
}
