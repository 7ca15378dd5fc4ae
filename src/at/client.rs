//! Reference transport engine over a split serial port.
//!
//! [`AtClient`] owns the receive half of the port on a dedicated thread named
//! `at-rx`. That thread assembles CRLF-terminated lines, hands each one to the
//! installed [`UrcDispatch`] first and otherwise appends it to the command in
//! flight. Callers block in [`Transport::exec`] until the receive thread reports
//! a terminal line or the response timeout expires.
//!
//! ```rust,no_run
//! use libiot_at::at::{AtClient, Transport};
//! use libiot_at::serial::IoPort;
//! use std::fs::OpenOptions;
//!
//! let tty = OpenOptions::new().read(true).write(true).open("/dev/ttyUSB0").unwrap();
//! let rx = IoPort(tty.try_clone().unwrap());
//! let client = AtClient::new(rx, IoPort(tty));
//! client.init().unwrap();
//! ```

use core::fmt;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use heapless::Vec as LineBuf;
use log::{debug, error, trace, warn};

use super::{Response, Transport, UrcDispatch};
use crate::error::Error;
use crate::serial::{Read, Write};

/// Longest line the receive thread assembles before flushing it as is.
pub const MAX_LINE_LEN: usize = 1024;

const NO_END_SIGN: u16 = 0x100;
const IDLE_POLL: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Pending {
    lines: Vec<String>,
    line_limit: usize,
    outcome: Option<Result<(), Error>>,
}

impl Pending {
    fn new(line_limit: usize) -> Self {
        Self {
            lines: Vec::new(),
            line_limit,
            outcome: None,
        }
    }

    fn is_open(&self) -> bool {
        self.outcome.is_none()
    }
}

struct Shared {
    pending: Mutex<Option<Pending>>,
    completed: Condvar,
    urc: RwLock<Option<Box<dyn UrcDispatch>>>,
    end_sign: AtomicU16,
    running: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            completed: Condvar::new(),
            urc: RwLock::new(None),
            end_sign: AtomicU16::new(NO_END_SIGN),
            running: AtomicBool::new(false),
        }
    }

    fn end_sign(&self) -> Option<u8> {
        match self.end_sign.load(Ordering::Acquire) {
            NO_END_SIGN => None,
            sign => Some(sign as u8),
        }
    }

    fn handle_line(&self, line: &str) {
        let urc = self.urc.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = urc.as_ref() {
            if table.dispatch(line) {
                trace!("URC {}", line);
                return;
            }
        }
        drop(urc);

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(cmd) = pending.as_mut().filter(|cmd| cmd.is_open()) else {
            debug!("unexpected line dropped: {}", line);
            return;
        };

        cmd.lines.push(String::from(line));
        if line == "OK" {
            cmd.outcome = Some(Ok(()));
        } else if line == "ERROR" || line.starts_with("+CME ERROR") {
            cmd.outcome = Some(Err(Error::Failure));
        } else if cmd.line_limit != 0 && cmd.lines.len() >= cmd.line_limit {
            cmd.outcome = Some(Ok(()));
        }

        if !cmd.is_open() {
            self.completed.notify_all();
        }
    }

    fn handle_end_sign(&self, sign: u8) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.as_mut().filter(|cmd| cmd.is_open()) {
            Some(cmd) => {
                cmd.lines.push(String::from(char::from(sign)));
                cmd.outcome = Some(Ok(()));
                self.completed.notify_all();
                true
            }
            None => false,
        }
    }

    fn flush_line(&self, buf: &mut LineBuf<u8, MAX_LINE_LEN>) {
        match core::str::from_utf8(buf) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    self.handle_line(text);
                }
            }
            Err(_) => warn!("dropping non-utf8 line of {} bytes", buf.len()),
        }
        buf.clear();
    }
}

fn receive_loop<R: Read>(mut port: R, shared: Arc<Shared>) {
    let mut line: LineBuf<u8, MAX_LINE_LEN> = LineBuf::new();
    let mut chunk = [0u8; 128];

    while shared.running.load(Ordering::Acquire) {
        let n = match port.read(&mut chunk) {
            Ok(0) => {
                thread::sleep(IDLE_POLL);
                continue;
            }
            Ok(n) => n,
            Err(e) => {
                error!("serial read failed: {:?}", e);
                thread::sleep(IDLE_POLL);
                continue;
            }
        };

        for &byte in &chunk[..n] {
            match byte {
                b'\n' => shared.flush_line(&mut line),
                b'\r' => {}
                _ => {
                    if line.is_empty()
                        && shared.end_sign() == Some(byte)
                        && shared.handle_end_sign(byte)
                    {
                        continue;
                    }
                    if line.push(byte).is_err() {
                        warn!("line exceeds {} bytes, flushing", MAX_LINE_LEN);
                        shared.flush_line(&mut line);
                        let _ = line.push(byte);
                    }
                }
            }
        }
    }
    debug!("receive thread stopped");
}

/// AT engine over a serial port split into its receive and transmit halves.
pub struct AtClient<R, W> {
    shared: Arc<Shared>,
    writer: Mutex<W>,
    exec_lock: Mutex<()>,
    reader: Mutex<Option<R>>,
    initialized: AtomicBool,
}

impl<R, W> AtClient<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send,
{
    /// Creates an idle client. Nothing is read until [`Transport::init`].
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            writer: Mutex::new(writer),
            exec_lock: Mutex::new(()),
            reader: Mutex::new(Some(reader)),
            initialized: AtomicBool::new(false),
        }
    }

    fn write_all(&self, data: &[u8]) -> Result<usize, Error> {
        let mut port = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut written = 0;
        while written < data.len() {
            match port.write(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) => {
                    error!("serial write failed: {:?}", e);
                    return Err(Error::Failure);
                }
            }
        }
        port.flush().map_err(|e| {
            error!("serial flush failed: {:?}", e);
            Error::Failure
        })?;
        Ok(written)
    }
}

impl<R, W> Transport for AtClient<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send,
{
    fn init(&self) -> Result<(), Error> {
        if self.initialized.load(Ordering::Acquire) {
            return Err(Error::Failure);
        }
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(Error::Null)?;

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("at-rx".into())
            .spawn(move || receive_loop(reader, shared))
            .map_err(|e| {
                error!("cannot spawn receive thread: {}", e);
                self.shared.running.store(false, Ordering::Release);
                Error::OutOfMemory
            })?;

        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn exec(&self, resp: &mut Response, cmd: &str) -> Result<(), Error> {
        if !self.is_initialized() {
            return Err(Error::Failure);
        }
        let _serial = self.exec_lock.lock().unwrap_or_else(PoisonError::into_inner);

        *self.shared.pending.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Pending::new(resp.line_limit()));

        let mut line = String::with_capacity(cmd.len() + 2);
        line.push_str(cmd);
        line.push_str("\r\n");
        let sent = self.write_all(line.as_bytes());
        if sent != Ok(line.len()) {
            self.shared
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            return Err(Error::Failure);
        }

        let pending = self.shared.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut pending, _) = self
            .shared
            .completed
            .wait_timeout_while(pending, resp.timeout(), |p| {
                p.as_ref().is_some_and(Pending::is_open)
            })
            .unwrap_or_else(PoisonError::into_inner);

        let Some(done) = pending.take() else {
            return Err(Error::Failure);
        };
        drop(pending);

        for text in &done.lines {
            resp.push_line(text);
        }
        match done.outcome {
            Some(outcome) => outcome,
            None => {
                warn!("no terminal line for {} within {:?}", cmd, resp.timeout());
                Err(Error::Timeout)
            }
        }
    }

    fn send(&self, data: &[u8]) -> Result<usize, Error> {
        self.write_all(data)
    }

    fn set_end_sign(&self, sign: Option<u8>) {
        let value = sign.map_or(NO_END_SIGN, u16::from);
        self.shared.end_sign.store(value, Ordering::Release);
    }

    fn set_urc_table(&self, table: Box<dyn UrcDispatch>) {
        *self.shared.urc.write().unwrap_or_else(PoisonError::into_inner) = Some(table);
    }
}

impl<R, W> Drop for AtClient<R, W> {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
    }
}

impl<R, W> fmt::Debug for AtClient<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtClient")
            .field("initialized", &self.initialized.load(Ordering::Relaxed))
            .field("end_sign", &self.shared.end_sign())
            .finish_non_exhaustive()
    }
}
