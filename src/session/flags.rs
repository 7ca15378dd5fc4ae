//! Event flag set shared between the session and the receive path.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// The broker acknowledged the connection.
pub const MQTT_CONNECTED: u32 = 1 << 0;
/// The broker acknowledged a subscription.
pub const SUBSCRIBED: u32 = 1 << 1;
/// The broker acknowledged a publish.
pub const PUBLISHED: u32 = 1 << 2;
/// The module reports the MQTT keepalive as up.
pub const KEEPALIVE: u32 = 1 << 3;
/// The Wi-Fi module joined an access point.
pub const WIFI_JOINED: u32 = 1 << 4;
/// The cellular module registered on the network.
pub const NETWORK_REGISTERED: u32 = 1 << 5;
/// The session was cancelled by a disconnect notification. Never cleared.
pub const TERMINATED: u32 = 1 << 31;

/// A 32-bit set of independent conditions with blocking waits.
///
/// Bits change only through [`set`](Self::set) and [`clear`](Self::clear); a
/// successful [`wait`](Self::wait) leaves the bit as it is, so callers clear before
/// re-arming a wait on the same condition.
#[derive(Debug, Default)]
pub struct EventFlags {
    bits: AtomicU32,
    lock: Mutex<()>,
    changed: Condvar,
}

impl EventFlags {
    /// Creates an empty set.
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
            lock: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    /// Sets `bits` and wakes every waiter.
    pub fn set(&self, bits: u32) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.bits.fetch_or(bits, Ordering::AcqRel);
        self.changed.notify_all();
    }

    /// Clears `bits`.
    pub fn clear(&self, bits: u32) {
        self.bits.fetch_and(!bits, Ordering::AcqRel);
    }

    /// The current mask.
    pub fn get(&self) -> u32 {
        self.bits.load(Ordering::Acquire)
    }

    /// Whether every bit of `bits` is set.
    pub fn contains(&self, bits: u32) -> bool {
        self.get() & bits == bits
    }

    /// Whether [`TERMINATED`] is set.
    pub fn is_terminated(&self) -> bool {
        self.contains(TERMINATED)
    }

    /// Blocks until every bit of `bits` is set or `timeout` elapses.
    ///
    /// Returns `false` on timeout, and at once when the set is terminated
    /// unless `bits` includes [`TERMINATED`]. A timeout too large to form a
    /// deadline waits without one.
    pub fn wait(&self, bits: u32, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.contains(bits) {
                return true;
            }
            if bits & TERMINATED == 0 && self.is_terminated() {
                return false;
            }
            guard = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.changed
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .changed
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_and_clear_are_idempotent() {
        let flags = EventFlags::new();
        flags.set(SUBSCRIBED);
        flags.set(SUBSCRIBED);
        assert_eq!(flags.get(), SUBSCRIBED);

        flags.set(KEEPALIVE);
        flags.clear(SUBSCRIBED);
        flags.clear(SUBSCRIBED);
        assert_eq!(flags.get(), KEEPALIVE);
    }

    #[test]
    fn test_wait_does_not_clear() {
        let flags = EventFlags::new();
        flags.set(MQTT_CONNECTED);
        assert!(flags.wait(MQTT_CONNECTED, Duration::from_millis(10)));
        assert!(flags.contains(MQTT_CONNECTED));
    }

    #[test]
    fn test_wait_needs_every_bit() {
        let flags = EventFlags::new();
        flags.set(MQTT_CONNECTED);
        assert!(!flags.wait(MQTT_CONNECTED | SUBSCRIBED, Duration::from_millis(20)));
    }

    #[test]
    fn test_wait_times_out_within_bound() {
        let flags = EventFlags::new();
        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        assert!(!flags.wait(SUBSCRIBED, timeout));
        let elapsed = start.elapsed();
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(200));
    }

    #[test]
    fn test_wait_wakes_on_set_from_other_thread() {
        let flags = Arc::new(EventFlags::new());
        let setter = Arc::clone(&flags);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set(NETWORK_REGISTERED);
        });

        let start = Instant::now();
        assert!(flags.wait(NETWORK_REGISTERED, Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_without_deadline() {
        let flags = Arc::new(EventFlags::new());
        flags.set(SUBSCRIBED);
        assert!(flags.wait(SUBSCRIBED, Duration::MAX));

        let setter = Arc::clone(&flags);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set(PUBLISHED);
        });
        assert!(flags.wait(PUBLISHED, Duration::MAX));
        handle.join().unwrap();

        let setter = Arc::clone(&flags);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set(TERMINATED);
        });
        assert!(!flags.wait(KEEPALIVE, Duration::MAX));
        handle.join().unwrap();
    }

    #[test]
    fn test_terminated_releases_waiters() {
        let flags = Arc::new(EventFlags::new());
        let setter = Arc::clone(&flags);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set(TERMINATED);
        });

        let start = Instant::now();
        assert!(!flags.wait(SUBSCRIBED, Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(flags.wait(TERMINATED, Duration::ZERO));
        handle.join().unwrap();
    }
}
