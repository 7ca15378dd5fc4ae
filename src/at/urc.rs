//! Unsolicited result code (URC) dispatch.
//!
//! A modem interleaves notifications such as `+TCMQTTRCVPUB:` with the replies to
//! whatever command is in flight. The receive path hands every complete line to the
//! installed [`UrcDispatch`] first; only lines no rule claims are treated as part
//! of the pending response.
//!
//! Rule sets are plain static tables, in the same spirit as static shell command
//! tables:
//!
//! ```rust
//! use libiot_at::at::urc::{UrcDispatch, UrcRule, UrcTable};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! fn on_ring(count: &AtomicUsize, _line: &str) {
//!     count.fetch_add(1, Ordering::SeqCst);
//! }
//!
//! static RULES: [UrcRule<AtomicUsize>; 1] = [UrcRule::new("RING", "\r\n", on_ring)];
//!
//! let rings = Arc::new(AtomicUsize::new(0));
//! let table = UrcTable::new(&RULES, Arc::clone(&rings));
//! assert!(table.dispatch("RING\r\n"));
//! assert!(!table.dispatch("OK"));
//! assert_eq!(rings.load(Ordering::SeqCst), 1);
//! ```

use std::sync::Arc;

/// Function invoked for a matching line.
///
/// Handlers run on the receive path and must not block: set or clear flags,
/// forward a payload, cancel a session.
pub type UrcFn<C> = fn(&C, &str);

/// One entry of a dispatch table.
pub struct UrcRule<C: 'static> {
    /// Leading text that identifies the notification.
    pub prefix: &'static str,
    /// Text that ends the notification; the handler sees everything before it.
    pub terminator: &'static str,
    /// Handler invoked with the line text, prefix included.
    pub handler: UrcFn<C>,
}

impl<C: 'static> UrcRule<C> {
    /// Creates a rule.
    pub const fn new(prefix: &'static str, terminator: &'static str, handler: UrcFn<C>) -> Self {
        Self {
            prefix,
            terminator,
            handler,
        }
    }

    /// Whether `line` starts with this rule's prefix.
    pub fn matches(&self, line: &str) -> bool {
        line.starts_with(self.prefix)
    }

    /// Cuts `line` at the terminator, if present.
    pub fn payload<'l>(&self, line: &'l str) -> &'l str {
        if self.terminator.is_empty() {
            return line;
        }
        match line.find(self.terminator) {
            Some(end) => &line[..end],
            None => line,
        }
    }
}

impl<C: 'static> core::fmt::Debug for UrcRule<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UrcRule")
            .field("prefix", &self.prefix)
            .field("terminator", &self.terminator)
            .finish()
    }
}

/// Type-erased dispatch table as installed into a transport.
pub trait UrcDispatch: Send + Sync {
    /// Whether any rule claims `line`.
    fn matches(&self, line: &str) -> bool;

    /// Invokes the first rule matching `line`. Returns `false` if none matched.
    fn dispatch(&self, line: &str) -> bool;

    /// Prefixes of the installed rules, in match order.
    fn prefixes(&self) -> Vec<&'static str>;
}

/// A static rule list bound to the context its handlers operate on.
pub struct UrcTable<C: 'static> {
    rules: &'static [UrcRule<C>],
    context: Arc<C>,
}

impl<C: 'static> UrcTable<C> {
    /// Binds `rules` to `context`.
    pub fn new(rules: &'static [UrcRule<C>], context: Arc<C>) -> Self {
        Self { rules, context }
    }

    /// The rule list.
    pub fn rules(&self) -> &'static [UrcRule<C>] {
        self.rules
    }

    fn find(&self, line: &str) -> Option<&'static UrcRule<C>> {
        self.rules.iter().find(|rule| rule.matches(line))
    }
}

impl<C: Send + Sync + 'static> UrcDispatch for UrcTable<C> {
    fn matches(&self, line: &str) -> bool {
        self.find(line).is_some()
    }

    fn dispatch(&self, line: &str) -> bool {
        match self.find(line) {
            Some(rule) => {
                (rule.handler)(&self.context, rule.payload(line));
                true
            }
            None => false,
        }
    }

    fn prefixes(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.prefix).collect()
    }
}

impl<C: 'static> core::fmt::Debug for UrcTable<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UrcTable").field("rules", &self.rules).finish()
    }
}
