//! Device-to-UI reconciliation.

use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::convert::OutputCalibration;
use crate::device::DeviceLink;
use crate::modes::Channel;
use crate::state::ControlState;

/// Outcome of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Power is off, nothing was fetched.
    Skipped,
    /// The fetch failed or the payload was malformed.
    Failed,
    /// The poll completed; lists which channels were overwritten.
    Applied([bool; 2]),
}

/// Pulls the device's channel codes into the shared state wherever the local
/// sliders are not authoritative.
pub struct Reconciler {
    device: Arc<dyn DeviceLink>,
    state: Arc<Mutex<ControlState>>,
    calibration: OutputCalibration,
}

impl Reconciler {
    /// Create a reconciler writing into the shared state.
    pub fn new(
        device: Arc<dyn DeviceLink>,
        state: Arc<Mutex<ControlState>>,
        calibration: OutputCalibration,
    ) -> Self {
        Self {
            device,
            state,
            calibration,
        }
    }

    /// Run one poll cycle.
    ///
    /// A failure is simply dropped; the next tick is the retry. The
    /// authorization check happens after the fetch completes, so a result
    /// that arrives after power-off or after the user took control is
    /// discarded.
    pub async fn poll_once(&self) -> PollOutcome {
        if !self.state.lock().lights_on {
            return PollOutcome::Skipped;
        }

        let codes = match self.device.channel_state().await {
            Ok(codes) => codes,
            Err(e) => {
                debug!("state poll failed: {}", e);
                return PollOutcome::Failed;
            }
        };
        let polled = Channel::ALL.map(|ch| self.calibration.code_to_logical(codes.get(ch)));
        trace!("polled codes {:?} -> logical {:?}", codes, polled);

        let mut state = self.state.lock();
        if !state.lights_on {
            return PollOutcome::Skipped;
        }
        let mut written = [false; 2];
        for channel in Channel::ALL {
            if state.channel_authoritative(channel) {
                continue;
            }
            state.levels[channel.index()] = polled[channel.index()];
            written[channel.index()] = true;
        }
        PollOutcome::Applied(written)
    }
}
