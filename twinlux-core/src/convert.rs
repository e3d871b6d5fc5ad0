//! Conversions between the device's output codes and the slider domain.
//!
//! The firmware drives each channel through an 8-bit DAC. Code 0 is off;
//! codes 1-255 are spread linearly over `v_min..=v_max` volts, so the low end
//! of the output span is a dead zone no slider position can reach.

use serde::{Deserialize, Serialize};

/// Full-scale DAC code.
pub const DAC_FULL: f64 = 255.0;

/// Full-scale logical slider value.
pub const LOGICAL_MAX: u8 = 255;

/// Output voltage span of the fixture's DAC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputCalibration {
    /// Volts produced at the lowest non-zero setting.
    pub v_min: f64,
    /// Volts produced at full scale.
    pub v_max: f64,
}

impl Default for OutputCalibration {
    fn default() -> Self {
        Self {
            v_min: 0.5,
            v_max: 3.3,
        }
    }
}

impl OutputCalibration {
    /// Convert a device output code into a logical slider value (0-255).
    ///
    /// Inverts the firmware's volt map approximately: codes inside the dead
    /// zone collapse to 0 and the result is clamped. Non-finite intermediates
    /// (a zero-width span) also give 0.
    pub fn code_to_logical(&self, code: f64) -> u8 {
        if code.is_nan() || code <= 0.0 {
            return 0;
        }
        let volts = (code / DAC_FULL) * self.v_max;
        let slider = ((volts - self.v_min) / (self.v_max - self.v_min)) * DAC_FULL;
        if !slider.is_finite() {
            return 0;
        }
        slider.round().clamp(0.0, DAC_FULL) as u8
    }

    /// The firmware's forward map from logical slider value to output code.
    ///
    /// Only used to check [`code_to_logical`](Self::code_to_logical); the
    /// device performs this mapping itself.
    pub fn logical_to_code(&self, logical: u8) -> u8 {
        if logical == 0 {
            return 0;
        }
        let volts = self.v_min + (logical as f64 / DAC_FULL) * (self.v_max - self.v_min);
        let code = (volts / self.v_max) * DAC_FULL;
        if !code.is_finite() {
            return 0;
        }
        code.round().clamp(0.0, DAC_FULL) as u8
    }
}

/// Convert a logical slider value (0-255) into a display percentage (0-100).
pub fn to_percent(logical: u8) -> u8 {
    (logical as f64 / DAC_FULL * 100.0).round() as u8
}

/// Convert a device output code into a logical slider value using the default
/// calibration.
pub fn device_code_to_logical(code: f64) -> u8 {
    OutputCalibration::default().code_to_logical(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_endpoints() {
        assert_eq!(to_percent(0), 0);
        assert_eq!(to_percent(255), 100);
        assert_eq!(to_percent(128), 50);
    }

    #[test]
    fn test_percent_monotonic() {
        for v in 0..LOGICAL_MAX {
            assert!(to_percent(v) <= to_percent(v + 1), "not monotonic at {v}");
        }
    }

    #[test]
    fn test_code_zero_and_bounds() {
        assert_eq!(device_code_to_logical(0.0), 0);
        assert_eq!(device_code_to_logical(-4.0), 0);
        assert_eq!(device_code_to_logical(255.0), 255);
        assert_eq!(device_code_to_logical(1000.0), 255);
        assert_eq!(device_code_to_logical(f64::NAN), 0);
    }

    #[test]
    fn test_dead_zone_collapses_to_zero() {
        // 0.5 V is code ~38.6, everything below decodes to 0
        assert_eq!(device_code_to_logical(1.0), 0);
        assert_eq!(device_code_to_logical(38.0), 0);
        assert!(device_code_to_logical(40.0) > 0);
    }

    #[test]
    fn test_mid_code() {
        assert_eq!(device_code_to_logical(128.0), 105);
        assert_eq!(to_percent(device_code_to_logical(128.0)), 41);
    }

    #[test]
    fn test_zero_span_degrades_to_zero() {
        let flat = OutputCalibration {
            v_min: 3.3,
            v_max: 3.3,
        };
        assert_eq!(flat.code_to_logical(200.0), 0);
        assert_eq!(flat.code_to_logical(255.0), 0);
    }

    #[test]
    fn test_inverse_within_one_step() {
        let cal = OutputCalibration::default();
        for logical in 0..=LOGICAL_MAX {
            let back = cal.code_to_logical(cal.logical_to_code(logical) as f64);
            let diff = (back as i16 - logical as i16).abs();
            assert!(diff <= 1, "logical {logical} decoded as {back}");
        }
    }
}
