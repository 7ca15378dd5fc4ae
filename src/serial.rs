//! Byte-level serial port abstraction.
//!
//! The AT engine reads from one half of the port on its receive thread and writes
//! commands through the other half, so a port is handed over as two independent
//! values. UART drivers usually split this way already; for `std::io` types use
//! [`IoPort`] on a pair of cloned handles.

#![deny(unsafe_code)]

use std::io;

/// The receiving half of a serial port.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read available bytes into `buf`.
    ///
    /// Implementations should return `Ok(0)` when nothing arrived within a short
    /// poll interval instead of blocking forever, so the receive thread can stop.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// The transmitting half of a serial port.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Adapts a `std::io` reader or writer (a tty file, a TCP bridge) to the port traits.
///
/// Read timeouts and `WouldBlock` are reported as `Ok(0)`.
#[derive(Debug)]
pub struct IoPort<T>(pub T);

impl<T: io::Read> Read for IoPort<T> {
    type Error = io::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.0.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}

impl<T: io::Write> Write for IoPort<T> {
    type Error = io::Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.0.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WouldBlock;

    impl io::Read for WouldBlock {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        }
    }

    #[test]
    fn test_io_port_maps_would_block_to_empty_read() {
        let mut port = IoPort(WouldBlock);
        let mut buf = [0u8; 4];
        assert_eq!(Read::read(&mut port, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_io_port_reads_and_writes() {
        let mut rx = IoPort(&b"OK\r\n"[..]);
        let mut buf = [0u8; 8];
        assert_eq!(Read::read(&mut rx, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"OK\r\n");

        let mut tx = IoPort(Vec::new());
        assert_eq!(Write::write(&mut tx, b"ATE0\r\n").unwrap(), 6);
        Write::flush(&mut tx).unwrap();
        assert_eq!(tx.0, b"ATE0\r\n");
    }
}
