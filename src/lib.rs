//! # libiot-at - MQTT over AT-command modems
//!
//! Drives a cellular or Wi-Fi modem through its textual AT command set to run an
//! MQTT session: connect, publish, subscribe, unsubscribe and query state, while
//! the modem's unsolicited notifications (incoming publishes, acknowledgements,
//! registration reports, disconnects) arrive on the same serial channel.
//!
//! ## Features
//!
//! ### AT Layer
//! - **Transport**: the engine contract of one blocking command at a time
//! - **AtClient**: a reference engine over any split serial port
//! - **URC tables**: static prefix-keyed rules dispatched on the receive path
//! - **Command executor**: bounded command formatting, serialization and a scoped
//!   raw-data mode for streaming payloads
//!
//! ### Session Layer
//! - Event flags with blocking, bounded waits
//! - Subscription registry with `+`/`#` topic filters
//! - Connect, publish (inline or streamed), subscribe, unsubscribe, state query
//! - Cellular registration with a retry policy, or Wi-Fi join
//! - Cancellation when the broker drops the connection
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libiot-at = "0.1.0"
//! ```
//!
//! ### Basic Session Example
//!
//! ```rust,no_run
//! use libiot_at::at::AtClient;
//! use libiot_at::config::Config;
//! use libiot_at::serial::IoPort;
//! use libiot_at::session::{Message, MqttParams, QoS, Session};
//! use std::sync::Arc;
//! use std::time::Duration;
//! # fn main() -> Result<(), libiot_at::Error> {
//! # let tty = std::fs::File::open("/dev/ttyUSB0").unwrap();
//! # let rx = IoPort(tty.try_clone().unwrap());
//! # let tx = IoPort(tty);
//!
//! let session = Session::new(AtClient::new(rx, tx), Config::default());
//! session.init()?;
//! session.handshake(Duration::from_secs(5))?;
//! session.register_network()?;
//! session.mqtt_connect(&MqttParams::default())?;
//!
//! session.subscribe(
//!     "device/commands",
//!     QoS::AtMostOnce,
//!     Arc::new(|msg: &Message<'_>| println!("{}: {:?}", msg.topic, msg.payload)),
//! )?;
//! session.publish("device/status", QoS::AtMostOnce, b"online")?;
//! // Quotes cannot travel inline; stream them.
//! session.publish_streaming("device/telemetry", QoS::AtMostOnce, b"{\"t\":23.5}")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`] facade; install any logger in the
//! application. Commands are logged at `debug`, raw traffic at `trace`.
//!
//! ## Optional Features
//!
//! - `defmt`: Enable defmt formatting of [`Error`] for embedded debugging

#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://shishir-dey.github.io/libiot/")]

/// AT command layer: transport contract, responses, URC dispatch and the
/// command executor.
pub mod at;

/// Session configuration loaded from JSON.
pub mod config;

/// Result codes shared by every operation.
pub mod error;

/// Split serial port traits and a `std::io` adapter.
pub mod serial;

/// MQTT session state controller and its collaborators.
pub mod session;

pub use error::Error;
