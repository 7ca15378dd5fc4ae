//! AT command layer.
//!
//! This module holds everything that is about talking to a modem line by line and
//! nothing about MQTT:
//!
//! - **[`Transport`]**: the engine contract: execute one command and fill one
//!   [`Response`], write raw bytes, switch the data-prompt end sign, install the
//!   unsolicited-notification table
//! - **[`response`]**: the per-command response object
//! - **[`urc`]**: prefix-keyed dispatch tables for unsolicited notifications
//! - **[`executor`]**: command formatting and serialization on top of a transport
//! - **[`client`]**: [`AtClient`], a transport engine over a serial port
//!
//! ```text
//!   caller thread                         receive thread
//!  ┌──────────────┐   cmd\r\n   ┌───────┐   lines    ┌──────────────┐
//!  │   Executor   │────────────▶│ modem │───────────▶│  URC table?  │──▶ handler
//!  │  (blocking)  │◀────────────┤       │            └──────┬───────┘
//!  └──────────────┘  Response   └───────┘                   │ no
//!         ▲                                                 ▼
//!         └──────────────────────────────────────── pending Response
//! ```

#![deny(unsafe_code)]

use std::time::Duration;

use crate::error::Error;

pub mod client;
pub mod executor;
pub mod response;
pub mod urc;

pub use client::AtClient;
pub use executor::{CommandExecutor, DataMode, Exclusive};
pub use response::Response;
pub use urc::{UrcDispatch, UrcRule, UrcTable};

/// Prompt byte a modem sends when it is ready for raw payload bytes.
pub const DATA_PROMPT: u8 = b'>';

/// The engine that owns the serial channel.
///
/// Implementations are shared between the thread issuing commands and the receive
/// path, hence `&self` everywhere and the `Send + Sync` bound.
pub trait Transport: Send + Sync {
    /// Brings the engine up (receive path included).
    fn init(&self) -> Result<(), Error>;

    /// Whether [`init`](Transport::init) already succeeded.
    fn is_initialized(&self) -> bool;

    /// Creates the response object for one command.
    ///
    /// Engines with a bounded response pool override this and report exhaustion
    /// as [`Error::ResponseUnavailable`].
    fn create_response(
        &self,
        buf_size: usize,
        line_limit: usize,
        timeout: Duration,
    ) -> Result<Response, Error> {
        Ok(Response::new(buf_size, line_limit, timeout))
    }

    /// Sends `cmd` and blocks until a terminal line or `resp.timeout()`.
    ///
    /// `cmd` carries no line ending; the engine appends it.
    fn exec(&self, resp: &mut Response, cmd: &str) -> Result<(), Error>;

    /// Writes raw bytes, returning how many were actually written.
    fn send(&self, data: &[u8]) -> Result<usize, Error>;

    /// Sets the byte that completes a command when it starts a line, or `None`
    /// for normal line-terminated replies.
    fn set_end_sign(&self, sign: Option<u8>);

    /// Installs the unsolicited-notification table, replacing any previous one.
    fn set_urc_table(&self, table: Box<dyn UrcDispatch>);
}
