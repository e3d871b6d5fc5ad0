//! Outgoing command dispatch.
//!
//! Level commands are trailing-edge debounced per channel: each call replaces
//! the channel's pending timer, so a slider drag sends only its final value.
//! Power, mode and override commands go out at once. Every send is
//! fire-and-forget and failures are only logged.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::device::DeviceLink;
use crate::error::TransportError;
use crate::modes::{Channel, OperatingMode};

/// Sends control commands to the fixture without waiting for replies.
///
/// Must be used from within a tokio runtime.
pub struct CommandDispatcher {
    device: Arc<dyn DeviceLink>,
    debounce: Duration,
    pending: Mutex<[Option<JoinHandle<()>>; 2]>,
}

impl CommandDispatcher {
    /// Create a dispatcher with the given level coalescing window.
    pub fn new(device: Arc<dyn DeviceLink>, debounce: Duration) -> Self {
        Self {
            device,
            debounce,
            pending: Mutex::new([None, None]),
        }
    }

    /// Schedule a level command, cancelling any not-yet-fired one for the
    /// same channel.
    pub fn send_level(&self, channel: Channel, value: u8) {
        let device = Arc::clone(&self.device);
        let delay = self.debounce;
        let mut pending = self.pending.lock();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // detached so a later reschedule only cancels the timer, never the request
            tokio::spawn(async move {
                trace!("sending level ch{}={}", channel, value);
                report("level", device.set_level(channel, value).await);
            });
        });
        if let Some(previous) = pending[channel.index()].replace(timer) {
            previous.abort();
        }
    }

    /// Send a power command immediately, independent of pending levels.
    pub fn send_power(&self, on: bool) {
        let device = Arc::clone(&self.device);
        tokio::spawn(async move {
            report("power", device.set_power(on).await);
        });
    }

    /// Send a mode change immediately.
    pub fn send_mode(&self, mode: OperatingMode) {
        let device = Arc::clone(&self.device);
        tokio::spawn(async move {
            report("mode", device.set_mode(&mode).await);
        });
    }

    /// Send a time override (or its removal) immediately.
    pub fn send_time_override(&self, minutes: Option<u16>) {
        let device = Arc::clone(&self.device);
        tokio::spawn(async move {
            report("time override", device.set_time_override(minutes).await);
        });
    }

    /// Whether a level command for `channel` is still waiting on its timer.
    pub fn has_pending(&self, channel: Channel) -> bool {
        self.pending.lock()[channel.index()]
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for CommandDispatcher {
    fn drop(&mut self) {
        for timer in self.pending.get_mut().iter_mut().flatten() {
            timer.abort();
        }
    }
}

fn report(what: &str, result: Result<(), TransportError>) {
    if let Err(e) = result {
        debug!("{} command dropped: {}", what, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{DeviceRequest, MockDevice};

    fn dispatcher(device: &Arc<MockDevice>) -> CommandDispatcher {
        CommandDispatcher::new(device.clone(), Duration::from_millis(35))
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_sends_last_value_once() {
        let device = Arc::new(MockDevice::new());
        let dispatcher = dispatcher(&device);

        for value in [10, 40, 90, 170, 201] {
            dispatcher.send_level(Channel::One, value);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(device.level_commands().is_empty());
        assert!(dispatcher.has_pending(Channel::One));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(device.level_commands(), vec![(Channel::One, 201)]);
        assert!(!dispatcher.has_pending(Channel::One));
    }

    #[tokio::test(start_paused = true)]
    async fn test_channels_debounce_independently() {
        let device = Arc::new(MockDevice::new());
        let dispatcher = dispatcher(&device);

        dispatcher.send_level(Channel::One, 0);
        dispatcher.send_level(Channel::Two, 0);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut sent = device.level_commands();
        sent.sort_by_key(|(ch, _)| ch.index());
        assert_eq!(sent, vec![(Channel::One, 0), (Channel::Two, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_inputs_each_send() {
        let device = Arc::new(MockDevice::new());
        let dispatcher = dispatcher(&device);

        dispatcher.send_level(Channel::Two, 50);
        tokio::time::sleep(Duration::from_millis(60)).await;
        dispatcher.send_level(Channel::Two, 60);
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(
            device.level_commands(),
            vec![(Channel::Two, 50), (Channel::Two, 60)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_not_debounced() {
        let device = Arc::new(MockDevice::new());
        let dispatcher = dispatcher(&device);

        dispatcher.send_level(Channel::One, 99);
        dispatcher.send_power(false);
        tokio::task::yield_now().await;

        assert_eq!(device.requests(), vec![DeviceRequest::SetPower(false)]);
        assert!(dispatcher.has_pending(Channel::One));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(device.level_commands(), vec![(Channel::One, 99)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_swallowed() {
        let device = Arc::new(MockDevice::new());
        device.set_offline(true);
        let dispatcher = dispatcher(&device);

        dispatcher.send_level(Channel::One, 1);
        dispatcher.send_power(true);
        dispatcher.send_mode(OperatingMode::Manual);
        dispatcher.send_time_override(None);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(device.requests().len(), 4);
    }
}
