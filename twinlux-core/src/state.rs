//! Shared control-state record.

use crate::clock::{self, TimeOverride};
use crate::convert::to_percent;
use crate::modes::{AutoCurve, Channel, OperatingMode};

/// Fallback level used when there is no remembered non-zero value.
pub const DEFAULT_ON_LEVEL: u8 = 128;

/// Which inputs on the control surface currently accept user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEnablement {
    /// Both channel sliders.
    pub channel_sliders: bool,
    /// The override time-of-day slider.
    pub time_slider: bool,
    /// The override on/off toggle.
    pub time_toggle: bool,
}

/// The single record every component reads and writes.
///
/// Mode, power and override fields are written only by the
/// [`LightController`](crate::LightController). Channel levels are written by
/// the controller when [`sliders_authoritative`](Self::sliders_authoritative)
/// holds and by the [`Reconciler`](crate::Reconciler) when it does not.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    /// Active operating mode.
    pub mode: OperatingMode,
    /// Curve picked in the automatic-mode selector.
    pub auto_selection: AutoCurve,
    /// Power axis, independent of the mode.
    pub lights_on: bool,
    /// Logical slider values per channel.
    pub levels: [u8; 2],
    /// Last non-zero logical values, restored on power-on.
    pub last_on: [u8; 2],
    /// Synthetic clock for the device curve.
    pub time_override: TimeOverride,
    /// Position of the override time slider, shown even while inactive.
    pub time_slider_minutes: u16,
    /// Device epoch minus local epoch in ms at the last good sync.
    pub clock_offset_ms: Option<i64>,
    /// Latest target colour temperature in kelvin.
    pub target_cct: Option<u32>,
    /// Clock readout as of the last display refresh.
    pub clock_readout: String,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Manual,
            auto_selection: AutoCurve::default(),
            lights_on: true,
            levels: [DEFAULT_ON_LEVEL; 2],
            last_on: [DEFAULT_ON_LEVEL; 2],
            time_override: TimeOverride::default(),
            time_slider_minutes: 0,
            clock_offset_ms: None,
            target_cct: None,
            clock_readout: "Time: --:--:--".to_string(),
        }
    }
}

impl ControlState {
    /// Build the start-up state from the initial slider positions.
    ///
    /// Power starts on iff either level is non-zero; a zero level remembers
    /// [`DEFAULT_ON_LEVEL`] as its last-on value.
    pub fn with_levels(levels: [u8; 2]) -> Self {
        Self {
            lights_on: levels.iter().any(|&l| l != 0),
            levels,
            last_on: levels.map(|l| if l == 0 { DEFAULT_ON_LEVEL } else { l }),
            ..Self::default()
        }
    }

    /// Whether the local sliders are the source of truth for channel levels.
    ///
    /// True iff the mode is manual (or manual override), no time override is
    /// active and power is on. Otherwise polled device values win.
    pub fn sliders_authoritative(&self) -> bool {
        self.mode.is_manual() && !self.time_override.active && self.lights_on
    }

    /// Per-channel form of [`sliders_authoritative`](Self::sliders_authoritative).
    pub fn channel_authoritative(&self, _channel: Channel) -> bool {
        self.sliders_authoritative()
    }

    /// Input enablement derived from mode, power and override.
    pub fn enablement(&self) -> ControlEnablement {
        ControlEnablement {
            channel_sliders: self.sliders_authoritative(),
            time_slider: self.mode == OperatingMode::ManualOverride && self.lights_on,
            time_toggle: self.lights_on,
        }
    }

    /// Logical value of one channel.
    pub fn level(&self, channel: Channel) -> u8 {
        self.levels[channel.index()]
    }

    /// Percent readout of one channel.
    pub fn percent(&self, channel: Channel) -> u8 {
        to_percent(self.level(channel))
    }

    /// Text for the mode readout.
    pub fn mode_label(&self) -> String {
        self.mode.label()
    }

    /// Text for the power readout.
    pub fn power_label(&self) -> &'static str {
        if self.lights_on { "Lights ON" } else { "Lights OFF" }
    }

    /// Text for the target colour temperature readout.
    pub fn cct_label(&self) -> String {
        match self.target_cct {
            Some(kelvin) => format!("{} K", kelvin),
            None => "-- K".to_string(),
        }
    }

    /// Label under the override time slider.
    pub fn time_slider_label(&self) -> String {
        clock::minutes_to_label(self.time_slider_minutes)
    }

    /// Text for the clock readout at local time `local_now_ms`.
    pub fn clock_label(&self, local_now_ms: i64) -> String {
        clock::clock_label(&self.time_override, self.clock_offset_ms, local_now_ms)
    }

    /// Force both levels to zero while power is off.
    ///
    /// Returns `true` if the device should be told to go dark as well.
    pub(crate) fn enforce_power(&mut self) -> bool {
        if self.lights_on {
            return false;
        }
        self.levels = [0, 0];
        true
    }

    /// Remember the current levels before power-off, if any is non-zero.
    pub(crate) fn remember_levels(&mut self) {
        if self.levels.iter().all(|&l| l == 0) {
            return;
        }
        for i in 0..2 {
            self.last_on[i] = [self.levels[i], self.last_on[i], DEFAULT_ON_LEVEL]
                .into_iter()
                .find(|&l| l != 0)
                .unwrap_or(DEFAULT_ON_LEVEL);
        }
    }
}
