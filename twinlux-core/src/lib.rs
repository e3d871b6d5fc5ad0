//! Client-side controller for a two-channel networked lighting fixture.
//!
//! The fixture (an ESP32 driving two analog outputs through a DAC) exposes a
//! small HTTP surface for levels, power, operating mode, its clock and a
//! time override for its circadian curve. This crate keeps a local control
//! surface consistent with that device over a lossy link:
//!
//! - [`LightController`] runs the mode state machine and power handling.
//! - [`ControlState::sliders_authoritative`] decides whether local sliders or
//!   polled device values own the channel levels.
//! - [`CommandDispatcher`] debounces level commands per channel.
//! - [`Reconciler`] polls device levels into the state when allowed.
//! - [`ClockSync`] projects device time from a periodically refreshed offset.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use twinlux_core::{Channel, ControllerConfig, HttpDevice, LightController};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControllerConfig::default().with_base_url("http://192.168.4.1");
//! let device = Arc::new(HttpDevice::new(&config)?);
//! let controller = Arc::new(LightController::new(device, config));
//!
//! // Start polling, clock sync and readout refresh
//! let session = controller.start();
//!
//! controller.set_level(Channel::One, 180)?;
//! controller.select_automatic();
//! println!("{}", controller.snapshot().mode_label());
//!
//! session.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Use [`MockDevice`] to drive the controller without hardware:
//!
//! ```
//! use std::sync::Arc;
//! use twinlux_core::{ControllerConfig, LightController, MockDevice, OperatingMode};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mock = Arc::new(MockDevice::new());
//! let controller = LightController::new(mock, ControllerConfig::default());
//! controller.enable_time_override(7 * 60);
//! assert_eq!(controller.snapshot().mode, OperatingMode::ManualOverride);
//! # }
//! ```

#![warn(missing_docs)]

mod clock;
mod config;
mod controller;
mod convert;
mod device;
mod dispatcher;
mod error;
mod mock;
mod modes;
mod reconcile;
mod state;

// Re-export public API
pub use clock::{
    ClockSync, DAY_MINUTES, TimeOverride, clamp_minutes, clock_label, local_now_ms,
    minutes_to_label,
};
pub use config::ControllerConfig;
pub use controller::{LightController, SessionTasks};
pub use convert::{OutputCalibration, device_code_to_logical, to_percent};
pub use device::{ChannelCodes, DeviceLink, HttpDevice, parse_epoch_seconds, parse_leading_int};
pub use dispatcher::CommandDispatcher;
pub use error::{ConfigError, ControlError, TransportError};
pub use mock::{DeviceRequest, MockDevice};
pub use modes::{AutoCurve, Channel, OperatingMode};
pub use reconcile::{PollOutcome, Reconciler};
pub use state::{ControlEnablement, ControlState, DEFAULT_ON_LEVEL};
