//! Value types passed into session operations.

use core::fmt;

use heapless::String;
use serde::Deserialize;

use crate::error::Error;

/// Maximum length of a product identifier.
pub const MAX_PRODUCT_ID_LEN: usize = 16;
/// Maximum length of a device name.
pub const MAX_DEVICE_NAME_LEN: usize = 48;
/// Maximum length of a device secret.
pub const MAX_DEVICE_SECRET_LEN: usize = 64;

/// MQTT Quality of Service levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum QoS {
    /// At most once delivery
    #[default]
    AtMostOnce = 0,
    /// At least once delivery
    AtLeastOnce = 1,
    /// Exactly once delivery
    ExactlyOnce = 2,
}

impl QoS {
    /// Level as sent on the command line.
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(Error::InvalidArgument),
        }
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// How the module authenticates to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u8")]
pub enum TlsMode {
    /// Plain TCP.
    #[default]
    None = 0,
    /// TLS with a pre-shared key.
    Psk = 1,
    /// TLS with certificates already provisioned on the module.
    Cert = 2,
}

impl TryFrom<u8> for TlsMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TlsMode::None),
            1 => Ok(TlsMode::Psk),
            2 => Ok(TlsMode::Cert),
            _ => Err(Error::InvalidArgument),
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Connection parameters for [`Session::mqtt_connect`](super::Session::mqtt_connect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MqttParams {
    pub tls_mode: TlsMode,
    /// Timeout the module applies to its own broker requests.
    pub command_timeout_ms: u32,
    pub keep_alive_ms: u32,
    pub clean_session: bool,
    pub auto_reconnect: bool,
}

impl Default for MqttParams {
    fn default() -> Self {
        Self {
            tls_mode: TlsMode::None,
            command_timeout_ms: 5_000,
            keep_alive_ms: 240_000,
            clean_session: true,
            auto_reconnect: true,
        }
    }
}

impl MqttParams {
    /// Arguments of `AT+TCMQTTCONN`, booleans rendered as `0`/`1`.
    pub fn command_args(&self) -> impl fmt::Display + '_ {
        ConnArgs(self)
    }
}

struct ConnArgs<'a>(&'a MqttParams);

impl fmt::Display for ConnArgs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.0;
        write!(
            f,
            "{},{},{},{},{}",
            p.tls_mode,
            p.command_timeout_ms,
            p.keep_alive_ms,
            u8::from(p.clean_session),
            u8::from(p.auto_reconnect)
        )
    }
}

/// Identity provisioned with [`Session::set_device_info`](super::Session::set_device_info).
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DeviceInfo {
    pub product_id: String<MAX_PRODUCT_ID_LEN>,
    pub device_name: String<MAX_DEVICE_NAME_LEN>,
    pub device_secret: String<MAX_DEVICE_SECRET_LEN>,
}

impl DeviceInfo {
    /// Builds an identity, rejecting fields that do not fit.
    pub fn new(product_id: &str, device_name: &str, device_secret: &str) -> Result<Self, Error> {
        Ok(Self {
            product_id: bounded(product_id)?,
            device_name: bounded(device_name)?,
            device_secret: bounded(device_secret)?,
        })
    }
}

impl fmt::Debug for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceInfo")
            .field("product_id", &self.product_id)
            .field("device_name", &self.device_name)
            .field("device_secret", &"***")
            .finish()
    }
}

pub(crate) fn bounded<const N: usize>(text: &str) -> Result<String<N>, Error> {
    let mut out = String::new();
    out.push_str(text).map_err(|_| Error::InvalidArgument)?;
    Ok(out)
}

/// Checks that `text` can sit inside a quoted command argument.
///
/// A quote or line break would end the argument or the command line early.
pub(crate) fn quotable(text: &str) -> Result<&str, Error> {
    if text.contains(['"', '\r', '\n']) {
        return Err(Error::InvalidArgument);
    }
    Ok(text)
}

/// Lifecycle of a [`Session`](super::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Handshaked,
    Connected,
    /// Reached by an explicit disconnect or the disconnect notification.
    Disconnected,
}

/// Hardware power sequencing.
pub trait PowerControl {
    /// Powers the module on. Called after the transport is up.
    fn power_on(&mut self) -> Result<(), Error>;
}

/// A module that is powered whenever the host is.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOn;

impl PowerControl for AlwaysOn {
    fn power_on(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
