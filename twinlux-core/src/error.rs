//! Error types for the fixture controller.

use crate::modes::Channel;

/// Errors raised while talking to the fixture over HTTP.
///
/// These never reach the user: the dispatcher, the reconciler and the clock
/// synchronizer log and drop them, and the next scheduled cycle supersedes the
/// failed attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not complete (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The device answered with a non-success status.
    #[error("Device returned status {0}")]
    Status(u16),

    /// The response arrived but could not be parsed as expected.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The device is unreachable (used by [`MockDevice`](crate::MockDevice)).
    #[error("Device offline")]
    Offline,
}

impl TransportError {
    /// Whether the response was received but unparseable, as opposed to a
    /// request that never completed.
    pub fn is_malformed(&self) -> bool {
        matches!(self, TransportError::Malformed(_))
    }
}

/// Errors returned by user-facing controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// A level was written while local controls were not authoritative.
    #[error("Channel {channel} is locked (device state is authoritative)")]
    ChannelLocked {
        /// The channel that rejected the write.
        channel: Channel,
    },
}

/// Errors that can occur while loading the controller configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for [`ControllerConfig`](crate::ControllerConfig).
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside its valid range.
    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        /// The offending field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
