//! Operating mode and channel definitions.

use std::fmt;
use std::str::FromStr;

// =============================================================================
// Channel
// =============================================================================

/// One of the two analog output channels of the fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Output channel 1.
    One,
    /// Output channel 2.
    Two,
}

impl Channel {
    /// Both channels, in device order.
    pub const ALL: [Channel; 2] = [Channel::One, Channel::Two];

    /// Zero-based index into per-channel arrays.
    pub fn index(self) -> usize {
        match self {
            Channel::One => 0,
            Channel::Two => 1,
        }
    }

    /// The channel number used on the wire (`ch=1` / `ch=2`).
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

// =============================================================================
// Automatic curves
// =============================================================================

/// A named automatic curve evaluated by the device firmware.
///
/// The set is open: the device may know curves this client has no pretty
/// name for, and they round-trip through [`AutoCurve::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AutoCurve {
    /// On/off blinking.
    #[default]
    Blink,
    /// Smooth fade in and out.
    Breathe,
    /// Stepped levels.
    Step,
    /// A curve name unknown to this client.
    Other(String),
}

impl AutoCurve {
    /// The name the device expects in `/mode?m=`.
    pub fn name(&self) -> &str {
        match self {
            AutoCurve::Blink => "blink",
            AutoCurve::Breathe => "breathe",
            AutoCurve::Step => "step",
            AutoCurve::Other(name) => name,
        }
    }

    /// Human readable name, falling back to the raw name.
    pub fn pretty_name(&self) -> &str {
        match self {
            AutoCurve::Blink => "Blink",
            AutoCurve::Breathe => "Breathe",
            AutoCurve::Step => "Step",
            AutoCurve::Other(name) => name,
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "blink" => AutoCurve::Blink,
            "breathe" => AutoCurve::Breathe,
            "step" => AutoCurve::Step,
            other => AutoCurve::Other(other.to_string()),
        }
    }
}

// =============================================================================
// Operating mode
// =============================================================================

/// The fixture's operating mode. Exactly one is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum OperatingMode {
    /// Levels come from the local sliders.
    #[default]
    Manual,
    /// The device runs its curve against a user-chosen synthetic time.
    ManualOverride,
    /// The device runs one of its automatic curves against real time.
    Automatic(AutoCurve),
}

impl OperatingMode {
    /// The name the device expects in `/mode?m=`.
    pub fn name(&self) -> &str {
        match self {
            OperatingMode::Manual => "manual",
            OperatingMode::ManualOverride => "manual_override",
            OperatingMode::Automatic(curve) => curve.name(),
        }
    }

    /// Whether this is one of the two manual modes.
    pub fn is_manual(&self) -> bool {
        matches!(self, OperatingMode::Manual | OperatingMode::ManualOverride)
    }

    /// Whether this is an automatic curve.
    pub fn is_automatic(&self) -> bool {
        matches!(self, OperatingMode::Automatic(_))
    }

    /// Label shown in the mode readout.
    pub fn label(&self) -> String {
        match self {
            OperatingMode::Manual => "Manual".to_string(),
            OperatingMode::ManualOverride => "Manual Override".to_string(),
            OperatingMode::Automatic(curve) => format!("Automatic {}", curve.pretty_name()),
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperatingMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s {
            "manual" => OperatingMode::Manual,
            "manual_override" => OperatingMode::ManualOverride,
            other => OperatingMode::Automatic(AutoCurve::from_name(other)),
        })
    }
}

impl FromStr for AutoCurve {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AutoCurve::from_name(s.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names_round_trip() {
        for name in ["manual", "manual_override", "blink", "breathe", "step", "rainbow"] {
            let mode: OperatingMode = name.parse().unwrap();
            assert_eq!(mode.name(), name);
        }
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(OperatingMode::Manual.label(), "Manual");
        assert_eq!(OperatingMode::ManualOverride.label(), "Manual Override");
        assert_eq!(
            OperatingMode::Automatic(AutoCurve::Breathe).label(),
            "Automatic Breathe"
        );
        assert_eq!(
            OperatingMode::Automatic(AutoCurve::Other("sunrise".into())).label(),
            "Automatic sunrise"
        );
    }

    #[test]
    fn test_channel_numbers() {
        assert_eq!(Channel::One.number(), 1);
        assert_eq!(Channel::Two.number(), 2);
        assert_eq!(Channel::ALL.map(Channel::index), [0, 1]);
    }
}
