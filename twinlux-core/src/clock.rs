//! Device clock tracking and the manual time override.
//!
//! The fixture is the time source; the local clock only ticks between syncs.
//! An offset is measured on each successful `/time_raw` fetch and added to
//! local time whenever the display needs "now".

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::device::DeviceLink;
use crate::state::ControlState;

/// Minutes in a day.
pub const DAY_MINUTES: u16 = 24 * 60;

/// A synthetic time-of-day sent to the device in place of its real clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeOverride {
    /// Whether the override is in effect.
    pub active: bool,
    /// Clock position in minutes since midnight (0-1439).
    pub start_minutes: u16,
}

impl TimeOverride {
    /// An active override at `minutes`, clamped into the day.
    pub fn at(minutes: i64) -> Self {
        Self {
            active: true,
            start_minutes: clamp_minutes(minutes),
        }
    }
}

/// Clamp a minute count into `0..=1439`.
pub fn clamp_minutes(minutes: i64) -> u16 {
    minutes.clamp(0, DAY_MINUTES as i64 - 1) as u16
}

/// Format minutes since midnight as `h:mm AM/PM`.
pub fn minutes_to_label(minutes: u16) -> String {
    let minutes = clamp_minutes(minutes as i64);
    let h24 = minutes / 60;
    let m = minutes % 60;
    let ampm = if h24 >= 12 { "PM" } else { "AM" };
    let h12 = match h24 % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", h12, m, ampm)
}

/// Clock readout: the override when active, else projected device time.
pub fn clock_label(time_override: &TimeOverride, offset_ms: Option<i64>, local_now_ms: i64) -> String {
    if time_override.active {
        return format!(
            "Manual Time: {} (manual)",
            minutes_to_label(time_override.start_minutes)
        );
    }
    let now_ms = project(local_now_ms, offset_ms);
    match DateTime::<Utc>::from_timestamp_millis(now_ms) {
        Some(utc) => format!("Time: {}", utc.with_timezone(&Local).format("%H:%M:%S")),
        None => "Time: --:--:--".to_string(),
    }
}

/// Offset between a device epoch (seconds) and a local epoch (milliseconds).
///
/// `None` when the device time has no calendar representation.
pub fn offset_from(device_epoch_s: i64, local_now_ms: i64) -> Option<i64> {
    DateTime::<Utc>::from_timestamp(device_epoch_s, 0)?;
    device_epoch_s
        .checked_mul(1000)?
        .checked_sub(local_now_ms)
}

/// Local time shifted by the offset, or raw local time before the first sync.
pub fn project(local_now_ms: i64, offset_ms: Option<i64>) -> i64 {
    local_now_ms.saturating_add(offset_ms.unwrap_or(0))
}

/// Local wall-clock time in milliseconds since the epoch.
pub fn local_now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// =============================================================================
// ClockSync
// =============================================================================

/// Keeps [`ControlState::clock_offset_ms`] in step with the device clock.
pub struct ClockSync {
    device: Arc<dyn DeviceLink>,
    state: Arc<Mutex<ControlState>>,
}

impl ClockSync {
    /// Create a synchronizer writing into the shared state.
    pub fn new(device: Arc<dyn DeviceLink>, state: Arc<Mutex<ControlState>>) -> Self {
        Self { device, state }
    }

    /// Fetch the device clock and store a fresh offset.
    ///
    /// A failed or malformed fetch leaves the previous offset in place.
    /// Returns whether the offset was updated.
    pub async fn sync_now(&self) -> bool {
        match self.device.time_raw().await {
            Ok(epoch_s) => match offset_from(epoch_s, local_now_ms()) {
                Some(offset) => {
                    self.state.lock().clock_offset_ms = Some(offset);
                    debug!("clock synced, offset {} ms", offset);
                    true
                }
                None => {
                    warn!("device clock {} s out of range, keeping offset", epoch_s);
                    false
                }
            },
            Err(e) => {
                debug!(
                    "clock sync failed, keeping offset {:?}: {}",
                    self.offset_ms(),
                    e
                );
                false
            }
        }
    }

    /// Current offset, `None` before the first successful sync.
    pub fn offset_ms(&self) -> Option<i64> {
        self.state.lock().clock_offset_ms
    }

    /// Best estimate of the device's current epoch time in milliseconds.
    pub fn projected_now(&self) -> i64 {
        project(local_now_ms(), self.offset_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDevice;

    #[test]
    fn test_minutes_to_label() {
        assert_eq!(minutes_to_label(0), "12:00 AM");
        assert_eq!(minutes_to_label(59), "12:59 AM");
        assert_eq!(minutes_to_label(60), "1:00 AM");
        assert_eq!(minutes_to_label(12 * 60), "12:00 PM");
        assert_eq!(minutes_to_label(13 * 60 + 7), "1:07 PM");
        assert_eq!(minutes_to_label(1439), "11:59 PM");
        assert_eq!(minutes_to_label(5000), "11:59 PM");
    }

    #[test]
    fn test_clamp_minutes() {
        assert_eq!(clamp_minutes(-20), 0);
        assert_eq!(clamp_minutes(700), 700);
        assert_eq!(clamp_minutes(1440), 1439);
    }

    #[test]
    fn test_offset_and_projection() {
        assert_eq!(offset_from(1_000, 400_000), Some(600_000));
        assert_eq!(project(400_000, Some(600_000)), 1_000_000);
        assert_eq!(project(400_000, None), 400_000);
    }

    #[test]
    fn test_extreme_device_clock() {
        assert_eq!(offset_from(-9_300_000_000_000_000, 1_700_000_000_000), None);
        assert_eq!(offset_from(i64::MAX / 1000 + 1, 0), None);
        assert_eq!(project(5, Some(i64::MAX)), i64::MAX);

        let label = clock_label(&TimeOverride::default(), Some(i64::MAX), local_now_ms());
        assert_eq!(label, "Time: --:--:--");
    }

    #[test]
    fn test_override_label_wins() {
        let label = clock_label(&TimeOverride::at(7 * 60 + 30), Some(123), 0);
        assert_eq!(label, "Manual Time: 7:30 AM (manual)");
    }

    #[test]
    fn test_projected_label_uses_offset() {
        let inactive = TimeOverride::default();
        let shifted = clock_label(&inactive, Some(3_600_000), 1_700_000_000_000);
        let direct = clock_label(&inactive, None, 1_700_003_600_000);
        assert_eq!(shifted, direct);
        assert!(shifted.starts_with("Time: "));
    }

    #[tokio::test]
    async fn test_sync_sets_offset() {
        let device = Arc::new(MockDevice::new());
        let device_epoch = local_now_ms() / 1000 + 3600;
        device.set_time_raw(device_epoch);
        let state = Arc::new(Mutex::new(ControlState::default()));
        let clock = ClockSync::new(device.clone(), state.clone());

        assert_eq!(clock.offset_ms(), None);
        assert!(clock.sync_now().await);

        let offset = clock.offset_ms().unwrap();
        assert!((offset - 3_600_000).abs() < 2_000, "offset {offset}");
        assert_eq!(state.lock().clock_offset_ms, Some(offset));
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_offset() {
        let device = Arc::new(MockDevice::new());
        let state = Arc::new(Mutex::new(ControlState {
            clock_offset_ms: Some(42_000),
            ..Default::default()
        }));
        let clock = ClockSync::new(device.clone(), state);

        device.set_offline(true);
        assert!(!clock.sync_now().await);
        assert_eq!(clock.offset_ms(), Some(42_000));

        device.set_offline(false);
        device.set_time_raw_malformed();
        assert!(!clock.sync_now().await);
        assert_eq!(clock.offset_ms(), Some(42_000));
    }

    #[tokio::test]
    async fn test_out_of_range_clock_keeps_offset() {
        let device = Arc::new(MockDevice::new());
        let state = Arc::new(Mutex::new(ControlState {
            clock_offset_ms: Some(42_000),
            ..Default::default()
        }));
        let clock = ClockSync::new(device.clone(), state.clone());

        for epoch_s in [-9_300_000_000_000_000, i64::MAX / 1000 + 1, i64::MIN] {
            device.set_time_raw(epoch_s);
            assert!(!clock.sync_now().await);
            assert_eq!(clock.offset_ms(), Some(42_000));
        }
        assert!(state.lock().clock_label(local_now_ms()).starts_with("Time: "));
    }

    #[tokio::test]
    async fn test_projected_now() {
        let device = Arc::new(MockDevice::new());
        let state = Arc::new(Mutex::new(ControlState::default()));
        let clock = ClockSync::new(device.clone(), state);

        let before = local_now_ms();
        let raw = clock.projected_now();
        assert!(raw >= before && raw - before < 2_000);

        device.set_time_raw(local_now_ms() / 1000 - 7_200);
        assert!(clock.sync_now().await);
        let offset = clock.offset_ms().unwrap();
        let local = local_now_ms();
        let projected = clock.projected_now();
        assert!((projected - (local + offset)).abs() < 2_000);
        assert!((projected - (local - 7_200_000)).abs() < 3_000);
    }
}
