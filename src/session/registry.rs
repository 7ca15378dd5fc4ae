//! Topic filter to handler registry and incoming-publish routing.

use core::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};

use super::types::{QoS, bounded};
use crate::error::Error;

/// Maximum number of concurrently registered topic filters.
pub const MAX_SUB_TOPICS: usize = 10;
/// Maximum length of a topic filter.
pub const MAX_TOPIC_LEN: usize = 128;

/// Prefix of the incoming-publish notification.
pub const DELIVERY_PREFIX: &str = "+TCMQTTRCVPUB:";

/// An incoming publish as handed to a subscription handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
}

/// Callback invoked for every message whose topic matches the filter.
///
/// Application context is whatever the closure captures. Handlers run on the
/// transport's receive thread, which is also the only thread that completes
/// commands. A handler must therefore not call session operations; hand the
/// message to another thread instead.
pub type Handler = Arc<dyn Fn(&Message<'_>) + Send + Sync>;

struct SubscriptionEntry {
    filter: heapless::String<MAX_TOPIC_LEN>,
    qos: QoS,
    handler: Handler,
}

/// Subscription table consulted by the receive path.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<heapless::Vec<SubscriptionEntry, MAX_SUB_TOPICS>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `filter`, replacing the handler of an existing entry.
    pub fn register(&self, filter: &str, qos: QoS, handler: Handler) -> Result<(), Error> {
        if filter.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let filter = bounded::<MAX_TOPIC_LEN>(filter).map_err(|_| Error::MaxTopicLength)?;

        let mut entries = self.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.filter == filter) {
            debug!("replacing handler for {}", filter);
            entry.qos = qos;
            entry.handler = handler;
            return Ok(());
        }
        entries
            .push(SubscriptionEntry {
                filter,
                qos,
                handler,
            })
            .map_err(|_| Error::ExceedMaxTopics)
    }

    /// Removes the entry for `filter`. Returns whether one existed.
    pub fn remove(&self, filter: &str) -> bool {
        let mut entries = self.lock();
        match entries.iter().position(|e| e.filter == filter) {
            Some(index) => {
                entries.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether `filter` is registered.
    pub fn contains(&self, filter: &str) -> bool {
        self.lock().iter().any(|e| e.filter == filter)
    }

    /// QoS the filter was registered with.
    pub fn qos_of(&self, filter: &str) -> Option<QoS> {
        self.lock()
            .iter()
            .find(|e| e.filter == filter)
            .map(|e| e.qos)
    }

    /// Number of registered filters.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no filter is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Invokes every handler whose filter matches the message topic.
    ///
    /// Handlers run after the table lock is released, so they may register or
    /// remove entries themselves. Returns the number of handlers invoked.
    pub fn deliver(&self, message: &Message<'_>) -> usize {
        let matched: heapless::Vec<Handler, MAX_SUB_TOPICS> = self
            .lock()
            .iter()
            .filter(|e| topic_matches(&e.filter, message.topic))
            .map(|e| Arc::clone(&e.handler))
            .collect();

        if matched.is_empty() {
            debug!("no subscription for {}", message.topic);
        }
        for handler in &matched {
            handler(message);
        }
        matched.len()
    }

    /// Parses an incoming-publish notification and delivers it.
    pub fn deliver_notification(&self, line: &str) -> usize {
        match parse_delivery(line) {
            Some(message) => self.deliver(&message),
            None => {
                warn!("malformed publish notification: {}", line);
                0
            }
        }
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, heapless::Vec<SubscriptionEntry, MAX_SUB_TOPICS>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        f.debug_list()
            .entries(entries.iter().map(|e| (e.filter.as_str(), e.qos)))
            .finish()
    }
}

/// MQTT topic filter matching with `+` (one level) and `#` (remaining levels).
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut levels = topic.split('/');
    for part in filter.split('/') {
        match part {
            "#" => return true,
            "+" => {
                if levels.next().is_none() {
                    return false;
                }
            }
            _ => {
                if levels.next() != Some(part) {
                    return false;
                }
            }
        }
    }
    levels.next().is_none()
}

/// Splits `+TCMQTTRCVPUB:"<topic>",<len>,"<payload>"` into a message.
///
/// The payload is taken as the declared number of bytes after the opening quote,
/// so quotes and commas inside it survive. A shorter payload than declared is
/// taken up to the closing quote.
pub fn parse_delivery(line: &str) -> Option<Message<'_>> {
    let rest = line.strip_prefix(DELIVERY_PREFIX)?.trim_start();
    let rest = rest.strip_prefix('"')?;
    let (topic, rest) = rest.split_once('"')?;
    let rest = rest.strip_prefix(',')?;
    let (len, rest) = rest.split_once(',')?;
    let len: usize = len.trim().parse().ok()?;
    let body = rest.strip_prefix('"')?.as_bytes();

    let payload = if body.len() > len {
        &body[..len]
    } else {
        body.strip_suffix(b"\"").unwrap_or(body)
    };
    Some(Message { topic, payload })
}
