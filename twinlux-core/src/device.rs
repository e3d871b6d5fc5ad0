//! Fixture HTTP link.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::trace;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::config::ControllerConfig;
use crate::error::TransportError;
use crate::modes::{Channel, OperatingMode};

/// Raw output codes reported by `/state`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelCodes {
    /// Channel 1 output code.
    pub ch1: f64,
    /// Channel 2 output code.
    pub ch2: f64,
}

impl ChannelCodes {
    /// The code reported for `channel`.
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::One => self.ch1,
            Channel::Two => self.ch2,
        }
    }

    /// Parse a `/state` JSON payload. Numeric strings are accepted, anything
    /// non-finite or missing is malformed.
    pub fn from_json(body: &str) -> Result<Self, TransportError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| TransportError::Malformed(format!("state is not JSON: {}", e)))?;
        Ok(Self {
            ch1: numeric_field(&value, "ch1")?,
            ch2: numeric_field(&value, "ch2")?,
        })
    }
}

fn numeric_field(value: &Value, key: &str) -> Result<f64, TransportError> {
    let number = match value.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|n| n.is_finite())
        .ok_or_else(|| TransportError::Malformed(format!("field {} is not numeric", key)))
}

/// Parse the leading decimal integer of a text body.
///
/// Leading whitespace and a sign are accepted; anything after the digits is
/// ignored, so `"1718000000.25\n"` reads as `1718000000`.
pub fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse a `/time_raw` body into epoch seconds.
///
/// Rejects bodies without a leading integer and times outside the calendar
/// range, so they never reach the clock arithmetic.
pub fn parse_epoch_seconds(body: &str) -> Result<i64, TransportError> {
    parse_leading_int(body)
        .filter(|&s| DateTime::<Utc>::from_timestamp(s, 0).is_some())
        .ok_or_else(|| TransportError::Malformed(format!("time_raw body {:?}", body)))
}

// =============================================================================
// Device Link Trait
// =============================================================================

/// The fixture's HTTP surface.
///
/// Implemented by [`HttpDevice`] for real hardware and by
/// [`MockDevice`](crate::MockDevice) in tests.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Device clock as whole seconds since the epoch (`/time_raw`).
    async fn time_raw(&self) -> Result<i64, TransportError>;

    /// Current output codes for both channels (`/state`).
    async fn channel_state(&self) -> Result<ChannelCodes, TransportError>;

    /// Colour temperature the curve is aiming for, `None` when there is no
    /// target (`/target_cct`).
    async fn target_cct(&self) -> Result<Option<u32>, TransportError>;

    /// Set one channel's level from a logical slider value (`/dac`).
    async fn set_level(&self, channel: Channel, value: u8) -> Result<(), TransportError>;

    /// Switch the output on or off (`/power`).
    async fn set_power(&self, on: bool) -> Result<(), TransportError>;

    /// Select the operating mode by name (`/mode`).
    async fn set_mode(&self, mode: &OperatingMode) -> Result<(), TransportError>;

    /// Set the synthetic clock in minutes since midnight, or clear it with
    /// `None` (`/time_override`).
    async fn set_time_override(&self, minutes: Option<u16>) -> Result<(), TransportError>;
}

// =============================================================================
// HttpDevice
// =============================================================================

/// A fixture reached over plain HTTP.
pub struct HttpDevice {
    client: Client,
    base_url: Url,
}

impl HttpDevice {
    /// Create a link to the device at `config.base_url`.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Malformed`] if the base URL does not parse
    /// - [`TransportError::Http`] if the HTTP client cannot be built
    pub fn new(config: &ControllerConfig) -> Result<Self, TransportError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| TransportError::Malformed(format!("base url {}: {}", config.base_url, e)))?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, base_url })
    }

    /// The device root this link talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        if query.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        url
    }

    async fn get_text(&self, url: Url) -> Result<String, TransportError> {
        trace!("GET {}", url);
        let res = self.client.get(url).send().await?;
        if !res.status().is_success() {
            return Err(TransportError::Status(res.status().as_u16()));
        }
        Ok(res.text().await?)
    }

    async fn fire(&self, url: Url) -> Result<(), TransportError> {
        self.get_text(url).await.map(|_| ())
    }
}

#[async_trait]
impl DeviceLink for HttpDevice {
    async fn time_raw(&self) -> Result<i64, TransportError> {
        let body = self.get_text(self.endpoint("/time_raw", &[])).await?;
        parse_epoch_seconds(&body)
    }

    async fn channel_state(&self) -> Result<ChannelCodes, TransportError> {
        let body = self.get_text(self.endpoint("/state", &[])).await?;
        ChannelCodes::from_json(&body)
    }

    async fn target_cct(&self) -> Result<Option<u32>, TransportError> {
        let body = self.get_text(self.endpoint("/target_cct", &[])).await?;
        Ok(parse_leading_int(&body).and_then(|k| u32::try_from(k).ok()))
    }

    async fn set_level(&self, channel: Channel, value: u8) -> Result<(), TransportError> {
        let url = self.endpoint(
            "/dac",
            &[("ch", channel.number().to_string()), ("val", value.to_string())],
        );
        self.fire(url).await
    }

    async fn set_power(&self, on: bool) -> Result<(), TransportError> {
        let flag = if on { "1" } else { "0" };
        self.fire(self.endpoint("/power", &[("on", flag.to_string())]))
            .await
    }

    async fn set_mode(&self, mode: &OperatingMode) -> Result<(), TransportError> {
        self.fire(self.endpoint("/mode", &[("m", mode.name().to_string())]))
            .await
    }

    async fn set_time_override(&self, minutes: Option<u16>) -> Result<(), TransportError> {
        let url = match minutes {
            Some(mins) => self.endpoint("/time_override", &[("mins", mins.to_string())]),
            None => self.endpoint("/time_override", &[]),
        };
        self.fire(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("1718000000"), Some(1718000000));
        assert_eq!(parse_leading_int("  42\n"), Some(42));
        assert_eq!(parse_leading_int("2700.5"), Some(2700));
        assert_eq!(parse_leading_int("-15abc"), Some(-15));
        assert_eq!(parse_leading_int("none"), None);
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("-"), None);
    }

    #[test]
    fn test_parse_epoch_seconds() {
        assert_eq!(parse_epoch_seconds("1718000000\n").unwrap(), 1718000000);
        assert_eq!(parse_epoch_seconds("0").unwrap(), 0);
        for body in ["-9300000000000000", "9223372036854776", "later"] {
            let err = parse_epoch_seconds(body).unwrap_err();
            assert!(err.is_malformed(), "{body}: {err}");
        }
    }

    #[test]
    fn test_state_payload() {
        let codes = ChannelCodes::from_json(r#"{"ch1": 128, "ch2": 0}"#).unwrap();
        assert_eq!(codes.get(Channel::One), 128.0);
        assert_eq!(codes.get(Channel::Two), 0.0);

        let codes = ChannelCodes::from_json(r#"{"ch1": "12", "ch2": 3.5, "mode": "blink"}"#).unwrap();
        assert_eq!(codes.ch1, 12.0);
        assert_eq!(codes.ch2, 3.5);
    }

    #[test]
    fn test_state_payload_malformed() {
        for body in [
            r#"{"ch1": "high", "ch2": 0}"#,
            r#"{"ch1": 10}"#,
            r#"{"ch1": null, "ch2": 1}"#,
            "[]",
            "<html>",
        ] {
            let err = ChannelCodes::from_json(body).unwrap_err();
            assert!(err.is_malformed(), "{body} gave {err:?}");
        }
    }

    #[test]
    fn test_endpoint_urls() {
        let config = ControllerConfig::default().with_base_url("http://10.0.0.7");
        let device = HttpDevice::new(&config).unwrap();

        assert_eq!(
            device
                .endpoint("/dac", &[("ch", "2".into()), ("val", "200".into())])
                .as_str(),
            "http://10.0.0.7/dac?ch=2&val=200"
        );
        assert_eq!(
            device.endpoint("/mode", &[("m", "manual override".into())]).as_str(),
            "http://10.0.0.7/mode?m=manual+override"
        );
        assert_eq!(
            device.endpoint("/time_override", &[]).as_str(),
            "http://10.0.0.7/time_override"
        );
    }
}
