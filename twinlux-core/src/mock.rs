//! Mock fixture for testing.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::device::{ChannelCodes, DeviceLink};
use crate::error::TransportError;
use crate::modes::{Channel, OperatingMode};

/// A request as seen by [`MockDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRequest {
    /// `GET /time_raw`
    TimeRaw,
    /// `GET /state`
    State,
    /// `GET /target_cct`
    TargetCct,
    /// `GET /dac?ch=&val=`
    SetLevel {
        /// Target channel.
        channel: Channel,
        /// Logical value sent.
        value: u8,
    },
    /// `GET /power?on=`
    SetPower(bool),
    /// `GET /mode?m=`
    SetMode(String),
    /// `GET /time_override[?mins=]`
    SetTimeOverride(Option<u16>),
}

#[derive(Debug)]
struct MockInner {
    offline: bool,
    time_raw: Option<i64>,
    state: Option<ChannelCodes>,
    target_cct: Option<u32>,
    requests: Vec<DeviceRequest>,
}

/// An in-memory fixture.
///
/// Every request is logged in call order, including requests made while the
/// mock is offline, so tests can assert on exactly what was sent.
///
/// # Example
///
/// ```
/// use twinlux_core::{DeviceLink, DeviceRequest, MockDevice};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mock = MockDevice::new();
/// mock.set_power(false).await.unwrap();
/// assert_eq!(mock.requests(), vec![DeviceRequest::SetPower(false)]);
/// # }
/// ```
#[derive(Debug)]
pub struct MockDevice {
    inner: Mutex<MockInner>,
}

impl MockDevice {
    /// Create an online mock reporting both channels at code 0, no target and
    /// a fixed epoch.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockInner {
                offline: false,
                time_raw: Some(1_700_000_000),
                state: Some(ChannelCodes { ch1: 0.0, ch2: 0.0 }),
                target_cct: None,
                requests: Vec::new(),
            }),
        }
    }

    /// Make every request fail with [`TransportError::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Set the epoch seconds returned by `/time_raw`.
    pub fn set_time_raw(&self, epoch_s: i64) {
        self.inner.lock().time_raw = Some(epoch_s);
    }

    /// Make `/time_raw` answer with a non-numeric body.
    pub fn set_time_raw_malformed(&self) {
        self.inner.lock().time_raw = None;
    }

    /// Set the output codes returned by `/state`.
    pub fn set_channel_codes(&self, ch1: f64, ch2: f64) {
        self.inner.lock().state = Some(ChannelCodes { ch1, ch2 });
    }

    /// Make `/state` answer with non-numeric fields.
    pub fn set_state_malformed(&self) {
        self.inner.lock().state = None;
    }

    /// Set the kelvin value returned by `/target_cct`.
    pub fn set_target_cct(&self, kelvin: Option<u32>) {
        self.inner.lock().target_cct = kelvin;
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<DeviceRequest> {
        self.inner.lock().requests.clone()
    }

    /// Forget the request log.
    pub fn clear_requests(&self) {
        self.inner.lock().requests.clear();
    }

    /// Level commands received so far, in order.
    pub fn level_commands(&self) -> Vec<(Channel, u8)> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                DeviceRequest::SetLevel { channel, value } => Some((channel, value)),
                _ => None,
            })
            .collect()
    }

    /// Number of logged requests equal to `request`.
    pub fn count(&self, request: &DeviceRequest) -> usize {
        self.inner
            .lock()
            .requests
            .iter()
            .filter(|r| *r == request)
            .count()
    }

    fn record(&self, request: DeviceRequest) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.requests.push(request);
        if inner.offline {
            Err(TransportError::Offline)
        } else {
            Ok(())
        }
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceLink for MockDevice {
    async fn time_raw(&self) -> Result<i64, TransportError> {
        self.record(DeviceRequest::TimeRaw)?;
        self.inner
            .lock()
            .time_raw
            .ok_or_else(|| TransportError::Malformed("time_raw body \"nan\"".to_string()))
    }

    async fn channel_state(&self) -> Result<ChannelCodes, TransportError> {
        self.record(DeviceRequest::State)?;
        self.inner
            .lock()
            .state
            .ok_or_else(|| TransportError::Malformed("field ch1 is not numeric".to_string()))
    }

    async fn target_cct(&self) -> Result<Option<u32>, TransportError> {
        self.record(DeviceRequest::TargetCct)?;
        Ok(self.inner.lock().target_cct)
    }

    async fn set_level(&self, channel: Channel, value: u8) -> Result<(), TransportError> {
        self.record(DeviceRequest::SetLevel { channel, value })
    }

    async fn set_power(&self, on: bool) -> Result<(), TransportError> {
        self.record(DeviceRequest::SetPower(on))
    }

    async fn set_mode(&self, mode: &OperatingMode) -> Result<(), TransportError> {
        self.record(DeviceRequest::SetMode(mode.name().to_string()))
    }

    async fn set_time_override(&self, minutes: Option<u16>) -> Result<(), TransportError> {
        self.record(DeviceRequest::SetTimeOverride(minutes))
    }
}
