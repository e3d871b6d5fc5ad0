//! Fixture controller: mode state machine, power and session wiring.

use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::clock::{self, ClockSync, TimeOverride};
use crate::config::ControllerConfig;
use crate::device::DeviceLink;
use crate::dispatcher::CommandDispatcher;
use crate::error::ControlError;
use crate::modes::{AutoCurve, Channel, OperatingMode};
use crate::reconcile::Reconciler;
use crate::state::{ControlState, DEFAULT_ON_LEVEL};

// =============================================================================
// LightController
// =============================================================================

/// Client-side controller for a two-channel fixture.
///
/// Owns the shared [`ControlState`] and is its only writer for mode, power
/// and override fields. Every operation updates local state synchronously and
/// hands device traffic to the [`CommandDispatcher`]; nothing here waits on
/// the network. Must be used from within a tokio runtime.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use twinlux_core::{Channel, ControllerConfig, LightController, MockDevice};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let device = Arc::new(MockDevice::new());
/// let controller = LightController::new(device, ControllerConfig::default());
///
/// controller.set_level(Channel::One, 200).unwrap();
/// controller.set_power(false);
/// assert_eq!(controller.snapshot().levels, [0, 0]);
/// # }
/// ```
pub struct LightController {
    device: Arc<dyn DeviceLink>,
    state: Arc<Mutex<ControlState>>,
    dispatcher: CommandDispatcher,
    clock: Arc<ClockSync>,
    reconciler: Arc<Reconciler>,
    config: ControllerConfig,
}

impl LightController {
    /// Create a controller with sliders at `config.initial_levels`.
    pub fn new(device: Arc<dyn DeviceLink>, config: ControllerConfig) -> Self {
        let state = Arc::new(Mutex::new(ControlState::with_levels(config.initial_levels)));
        let dispatcher = CommandDispatcher::new(Arc::clone(&device), config.debounce());
        let clock = Arc::new(ClockSync::new(Arc::clone(&device), Arc::clone(&state)));
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&device),
            Arc::clone(&state),
            config.calibration,
        ));
        Self {
            device,
            state,
            dispatcher,
            clock,
            reconciler,
            config,
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> ControlState {
        self.state.lock().clone()
    }

    /// The clock synchronizer.
    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    /// The reconciliation poller.
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// The settings this controller was built with.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Channel levels
    // -------------------------------------------------------------------------

    /// Apply a slider movement on one channel.
    ///
    /// # Errors
    ///
    /// [`ControlError::ChannelLocked`] when the sliders are not authoritative
    /// (automatic mode, active time override or power off).
    pub fn set_level(&self, channel: Channel, value: u8) -> Result<(), ControlError> {
        {
            let mut state = self.state.lock();
            if !state.channel_authoritative(channel) {
                return Err(ControlError::ChannelLocked { channel });
            }
            state.levels[channel.index()] = value;
            state.last_on[channel.index()] = value;
        }
        self.dispatcher.send_level(channel, value);
        Ok(())
    }

    /// Push the current levels to the device, as done once at start-up.
    pub fn push_levels(&self) {
        let levels = self.state.lock().levels;
        for channel in Channel::ALL {
            self.dispatcher.send_level(channel, levels[channel.index()]);
        }
    }

    fn push_zero_levels(&self) {
        for channel in Channel::ALL {
            self.dispatcher.send_level(channel, 0);
        }
    }

    // -------------------------------------------------------------------------
    // Power
    // -------------------------------------------------------------------------

    /// Switch the fixture on or off.
    ///
    /// Off forces both levels to zero locally and on the device while
    /// remembering the last non-zero values. On restores them when the mode
    /// is manual; other modes pick their levels up from the next poll.
    pub fn set_power(&self, on: bool) {
        info!("power {}", if on { "on" } else { "off" });
        self.dispatcher.send_power(on);

        if !on {
            {
                let mut state = self.state.lock();
                state.remember_levels();
                state.lights_on = false;
                state.enforce_power();
            }
            self.push_zero_levels();
            return;
        }

        let restored = {
            let mut state = self.state.lock();
            state.lights_on = true;
            if state.mode == OperatingMode::Manual {
                if state.last_on == [0, 0] {
                    state.last_on = state
                        .levels
                        .map(|l| if l == 0 { DEFAULT_ON_LEVEL } else { l });
                }
                state.levels = state.last_on;
                Some(state.levels)
            } else {
                None
            }
        };
        if let Some(levels) = restored {
            debug!("restoring levels {:?}", levels);
            for channel in Channel::ALL {
                self.dispatcher.send_level(channel, levels[channel.index()]);
            }
        }
    }

    /// Flip the power state, returning the new one.
    pub fn toggle_power(&self) -> bool {
        let on = !self.state.lock().lights_on;
        self.set_power(on);
        on
    }

    // -------------------------------------------------------------------------
    // Mode state machine
    // -------------------------------------------------------------------------

    /// Switch to `mode`.
    ///
    /// Leaving for any mode other than [`OperatingMode::ManualOverride`]
    /// clears an active time override first and resyncs the clock.
    pub fn select_mode(&self, mode: OperatingMode) {
        if mode != OperatingMode::ManualOverride && self.take_override() {
            self.after_override_cleared();
        }

        info!("mode {} -> {}", self.state.lock().mode, mode);
        self.dispatcher.send_mode(mode.clone());

        let go_dark = {
            let mut state = self.state.lock();
            // reflect the curve in the selector directly, not via choose_curve
            if let OperatingMode::Automatic(curve) = &mode {
                state.auto_selection = curve.clone();
            }
            state.mode = mode;
            state.enforce_power()
        };
        if go_dark {
            self.push_zero_levels();
        }
    }

    /// Switch to manual mode.
    pub fn select_manual(&self) {
        self.select_mode(OperatingMode::Manual);
    }

    /// Switch to the curve currently picked in the selector.
    pub fn select_automatic(&self) {
        let curve = self.state.lock().auto_selection.clone();
        self.select_mode(OperatingMode::Automatic(curve));
    }

    /// Pick a curve in the selector. Takes effect at once if an automatic
    /// mode is running, otherwise on the next [`select_automatic`](Self::select_automatic).
    pub fn choose_curve(&self, curve: AutoCurve) {
        let switch = {
            let mut state = self.state.lock();
            state.auto_selection = curve.clone();
            state.mode.is_automatic() && state.mode != OperatingMode::Automatic(curve.clone())
        };
        if switch {
            self.select_mode(OperatingMode::Automatic(curve));
        }
    }

    /// Run the device curve against a synthetic time of day.
    ///
    /// `minutes` is clamped into the day. The mode and the override time are
    /// sent as two commands, mode first.
    pub fn enable_time_override(&self, minutes: i64) {
        let minutes = clock::clamp_minutes(minutes);
        {
            let mut state = self.state.lock();
            state.time_override = TimeOverride::at(minutes as i64);
            state.time_slider_minutes = minutes;
        }
        self.refresh_clock_readout();
        self.select_mode(OperatingMode::ManualOverride);
        self.dispatcher.send_time_override(Some(minutes));
        self.spawn_cct_refresh();
    }

    /// Move the override time slider. While the override is active this
    /// re-asserts it at the new time; otherwise only the preview changes.
    pub fn move_time_slider(&self, minutes: i64) {
        let minutes = clock::clamp_minutes(minutes);
        let active = {
            let mut state = self.state.lock();
            state.time_slider_minutes = minutes;
            state.time_override.active
        };
        if active {
            self.enable_time_override(minutes as i64);
        }
    }

    /// Drop the time override and return to manual mode.
    pub fn disable_time_override(&self) {
        self.take_override();
        self.after_override_cleared();
        self.select_mode(OperatingMode::Manual);
    }

    fn take_override(&self) -> bool {
        let mut state = self.state.lock();
        let was_active = state.time_override.active;
        state.time_override = TimeOverride::default();
        was_active
    }

    fn after_override_cleared(&self) {
        debug!("time override cleared");
        self.dispatcher.send_time_override(None);
        self.spawn_clock_sync();
        self.refresh_clock_readout();
        self.spawn_cct_refresh();
    }

    // -------------------------------------------------------------------------
    // Readouts
    // -------------------------------------------------------------------------

    /// Recompute the clock readout from the override or projected device time.
    pub fn refresh_clock_readout(&self) {
        let mut state = self.state.lock();
        let label = state.clock_label(clock::local_now_ms());
        state.clock_readout = label;
    }

    /// Fetch the curve's target colour temperature into the state.
    pub async fn refresh_target_cct(&self) -> Option<u32> {
        fetch_target_cct(self.device.as_ref(), &self.state).await
    }

    fn spawn_cct_refresh(&self) {
        let device = Arc::clone(&self.device);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            fetch_target_cct(device.as_ref(), &state).await;
        });
    }

    fn spawn_clock_sync(&self) {
        let clock = Arc::clone(&self.clock);
        tokio::spawn(async move {
            clock.sync_now().await;
        });
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    /// Push the initial levels and spawn the background timers: state
    /// polling, clock sync and the once-per-second readout refresh.
    pub fn start(self: &Arc<Self>) -> SessionTasks {
        info!("starting session against {}", self.config.base_url);
        self.push_levels();
        self.refresh_clock_readout();

        let mut handles = Vec::with_capacity(3);

        let reconciler = Arc::clone(&self.reconciler);
        let poll_every = self.config.poll_interval();
        handles.push(tokio::spawn(async move {
            let mut ticker = time::interval(poll_every);
            loop {
                ticker.tick().await;
                // a slow fetch must not push the next tick back
                let reconciler = Arc::clone(&reconciler);
                tokio::spawn(async move {
                    reconciler.poll_once().await;
                });
            }
        }));

        let clock = Arc::clone(&self.clock);
        let settle = self.config.settle_delay();
        let resync_every = self.config.resync_interval();
        handles.push(tokio::spawn(async move {
            clock.sync_now().await;
            time::sleep(settle).await;
            clock.sync_now().await;
            let mut ticker = time::interval_at(Instant::now() + resync_every, resync_every);
            loop {
                ticker.tick().await;
                clock.sync_now().await;
            }
        }));

        let this = Arc::clone(self);
        let display_every = self.config.display_interval();
        handles.push(tokio::spawn(async move {
            time::sleep(settle).await;
            let mut ticker = time::interval(display_every);
            loop {
                ticker.tick().await;
                this.refresh_clock_readout();
                let refresher = Arc::clone(&this);
                tokio::spawn(async move {
                    refresher.refresh_target_cct().await;
                });
            }
        }));

        SessionTasks { handles }
    }
}

async fn fetch_target_cct(device: &dyn DeviceLink, state: &Mutex<ControlState>) -> Option<u32> {
    let kelvin = match device.target_cct().await {
        Ok(kelvin) => kelvin,
        Err(e) => {
            debug!("target cct fetch failed: {}", e);
            None
        }
    };
    state.lock().target_cct = kelvin;
    kelvin
}

// =============================================================================
// SessionTasks
// =============================================================================

/// Handles to the background timers of a running session.
///
/// Dropping it stops the timers. Requests already in flight still complete.
pub struct SessionTasks {
    handles: Vec<JoinHandle<()>>,
}

impl SessionTasks {
    /// Stop every background timer.
    pub fn shutdown(mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    /// Whether every timer is still running.
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty() && self.handles.iter().all(|h| !h.is_finished())
    }
}

impl Drop for SessionTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
