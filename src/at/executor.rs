//! Command formatting and serialization.

use core::fmt::{self, Write as _};
use core::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use heapless::String;
use log::{debug, trace};

use super::{Response, Transport};
use crate::error::Error;

/// Maximum length of a formatted command line, without the line ending.
pub const MAX_COMMAND_LEN: usize = 512;

/// Formats commands and runs them one at a time on a [`Transport`].
///
/// ```rust,ignore
/// let mut resp = executor.create_response(64, 0, Duration::from_secs(5))?;
/// executor.execute(&mut resp, format_args!("AT+TCMQTTSUB=\"{}\",{}", topic, qos))?;
/// ```
#[derive(Debug)]
pub struct CommandExecutor<T> {
    transport: T,
    slot: Mutex<()>,
}

impl<T: Transport> CommandExecutor<T> {
    /// Wraps a transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            slot: Mutex::new(()),
        }
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Creates a response through the transport.
    pub fn create_response(
        &self,
        buf_size: usize,
        line_limit: usize,
        timeout: Duration,
    ) -> Result<Response, Error> {
        self.transport
            .create_response(buf_size, line_limit, timeout)
            .map_err(|_| Error::ResponseUnavailable)
    }

    /// Formats and executes a single command.
    pub fn execute(&self, resp: &mut Response, cmd: fmt::Arguments<'_>) -> Result<(), Error> {
        self.exclusive().execute(resp, cmd)
    }

    /// Reserves the channel for a multi-step exchange.
    ///
    /// Other callers block in [`execute`](Self::execute) until the slot is dropped.
    pub fn exclusive(&self) -> Exclusive<'_, T> {
        Exclusive {
            transport: &self.transport,
            _slot: self.slot.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Exclusive use of the command channel.
pub struct Exclusive<'a, T: Transport> {
    transport: &'a T,
    _slot: MutexGuard<'a, ()>,
}

impl<'a, T: Transport> Exclusive<'a, T> {
    /// Formats and executes a command while holding the slot.
    pub fn execute(&mut self, resp: &mut Response, cmd: fmt::Arguments<'_>) -> Result<(), Error> {
        let line = format_command(cmd)?;
        debug!("AT> {}", line);
        resp.clear();
        let result = self.transport.exec(resp, &line);
        trace!("AT< {} line(s), {:?}", resp.line_count(), result);
        result
    }

    /// Writes raw bytes, returning the count the transport accepted.
    pub fn send_raw(&mut self, data: &[u8]) -> Result<usize, Error> {
        trace!("AT> {} raw byte(s)", data.len());
        self.transport.send(data)
    }

    /// Switches the transport to complete on `sign` until the guard is dropped.
    pub fn data_mode(&mut self, sign: u8) -> DataMode<'_, 'a, T> {
        self.transport.set_end_sign(Some(sign));
        DataMode { slot: self }
    }
}

impl<T: Transport> fmt::Debug for Exclusive<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exclusive").finish_non_exhaustive()
    }
}

/// Raw-data mode; normal line mode is restored on drop, whatever the exit path.
pub struct DataMode<'g, 'a, T: Transport> {
    slot: &'g mut Exclusive<'a, T>,
}

impl<'a, T: Transport> Deref for DataMode<'_, 'a, T> {
    type Target = Exclusive<'a, T>;

    fn deref(&self) -> &Self::Target {
        &*self.slot
    }
}

impl<T: Transport> DerefMut for DataMode<'_, '_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.slot
    }
}

impl<T: Transport> Drop for DataMode<'_, '_, T> {
    fn drop(&mut self) {
        self.slot.transport.set_end_sign(None);
    }
}

impl<T: Transport> fmt::Debug for DataMode<'_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataMode").finish_non_exhaustive()
    }
}

/// Renders a command into a bounded buffer.
pub fn format_command(cmd: fmt::Arguments<'_>) -> Result<String<MAX_COMMAND_LEN>, Error> {
    let mut line = String::new();
    line.write_fmt(cmd).map_err(|_| Error::InvalidArgument)?;
    Ok(line)
}
