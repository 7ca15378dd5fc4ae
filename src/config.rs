//! Session configuration.
//!
//! Every knob has a default, so a configuration document only names what it
//! changes:
//!
//! ```rust
//! use libiot_at::config::Config;
//! use libiot_at::session::ModuleProfile;
//!
//! let config = Config::from_json(r#"{"profile":"wifi","wifi":{"ssid":"lab","password":"secret"}}"#).unwrap();
//! assert_eq!(config.profile, ModuleProfile::Wifi);
//! assert_eq!(config.register_retries, 3);
//! ```

use core::time::Duration;

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::session::ModuleProfile;

/// Maximum SSID length accepted by `AT+CWJAP`.
pub const MAX_SSID_LEN: usize = 32;
/// Maximum Wi-Fi passphrase length.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Access point to join on a Wi-Fi module.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WifiCredentials {
    /// Network name.
    pub ssid: String<MAX_SSID_LEN>,
    /// Passphrase; never serialized.
    #[serde(skip_serializing)]
    pub password: String<MAX_PASSWORD_LEN>,
}

impl core::fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .finish_non_exhaustive()
    }
}

/// Tunables of a [`Session`](crate::session::Session).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Which rule set and attach procedure to use.
    pub profile: ModuleProfile,
    /// Response timeout of every command, and the wait for asynchronous acks.
    pub command_timeout_ms: u32,
    /// Largest payload published inline; anything longer is streamed.
    pub max_inline_payload: usize,
    /// Short registration polls before the final long one.
    pub register_retries: u32,
    /// Wait after each short registration poll.
    pub register_poll_timeout_ms: u32,
    /// Wait after the final registration query.
    pub register_final_timeout_ms: u32,
    /// Credentials for the Wi-Fi profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi: Option<WifiCredentials>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: ModuleProfile::Cellular,
            command_timeout_ms: 5_000,
            max_inline_payload: 200,
            register_retries: 3,
            register_poll_timeout_ms: 1_000,
            register_final_timeout_ms: 5_000,
            wifi: None,
        }
    }
}

impl Config {
    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json_core::from_str::<Config>(json)
            .map(|(config, _)| config)
            .map_err(|_| Error::JsonParse)
    }

    /// Writes the configuration as JSON, without the Wi-Fi passphrase.
    pub fn to_json(&self, buf: &mut [u8]) -> Result<usize, Error> {
        serde_json_core::to_slice(self, buf).map_err(|_| Error::JsonBufferTooSmall)
    }

    pub(crate) fn command_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.command_timeout_ms))
    }

    pub(crate) fn register_poll_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.register_poll_timeout_ms))
    }

    pub(crate) fn register_final_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.register_final_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_document() {
        let config =
            Config::from_json(r#"{"command_timeout_ms":300,"max_inline_payload":16}"#).unwrap();
        assert_eq!(config.command_timeout(), Duration::from_millis(300));
        assert_eq!(config.max_inline_payload, 16);
        assert_eq!(config.profile, ModuleProfile::Cellular);
    }

    #[test]
    fn test_wifi_credentials() {
        let config = Config::from_json(
            r#"{"profile":"wifi","wifi":{"ssid":"lab","password":"pw"}}"#,
        )
        .unwrap();
        let wifi = config.wifi.unwrap();
        assert_eq!(wifi.ssid.as_str(), "lab");
        assert_eq!(wifi.password.as_str(), "pw");
    }

    #[test]
    fn test_malformed_document() {
        assert_eq!(Config::from_json("{\"profile\":"), Err(Error::JsonParse));
        assert_eq!(
            Config::from_json(r#"{"profile":"satellite"}"#),
            Err(Error::JsonParse)
        );
    }

    #[test]
    fn test_to_json_hides_password() {
        let mut config = Config::from_json(
            r#"{"profile":"wifi","wifi":{"ssid":"lab","password":"hunter2"}}"#,
        )
        .unwrap();
        let mut buf = [0u8; 512];
        let n = config.to_json(&mut buf).unwrap();
        let text = core::str::from_utf8(&buf[..n]).unwrap();
        assert!(text.contains("\"ssid\":\"lab\""));
        assert!(!text.contains("hunter2"));

        config.wifi = None;
        let mut small = [0u8; 8];
        assert_eq!(config.to_json(&mut small), Err(Error::JsonBufferTooSmall));
    }
}
