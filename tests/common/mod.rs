#![allow(dead_code)]

use libiot_at::Error;
use libiot_at::at::{Response, Transport, UrcDispatch};
use libiot_at::session::PowerControl;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

/// Something the session did to the modem, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Init,
    PowerOn,
    UrcTable(Vec<&'static str>),
    Command(String),
    Raw(Vec<u8>),
    EndSign(Option<u8>),
}

/// Scripted outcome of one command.
#[derive(Debug, Clone)]
pub struct Reply {
    lines: Vec<String>,
    result: Result<(), Error>,
    delayed: Vec<(Duration, String)>,
}

impl Reply {
    pub fn ok() -> Self {
        Self::lines(&["OK"])
    }

    pub fn lines(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            result: Ok(()),
            delayed: Vec::new(),
        }
    }

    pub fn error() -> Self {
        Self {
            lines: vec!["ERROR".to_string()],
            result: Err(Error::Failure),
            delayed: Vec::new(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            lines: Vec::new(),
            result: Err(Error::Timeout),
            delayed: Vec::new(),
        }
    }

    /// Line emitted before the terminal line, seen by the URC table first.
    pub fn with_line(mut self, line: &str) -> Self {
        let at = self.lines.len().saturating_sub(1);
        self.lines.insert(at, line.to_string());
        self
    }

    /// Notification emitted from another thread after the command returned.
    pub fn urc_after(mut self, delay: Duration, line: &str) -> Self {
        self.delayed.push((delay, line.to_string()));
        self
    }
}

struct Rule {
    prefix: String,
    reply: Reply,
    remaining: Option<usize>,
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    rules: Vec<Rule>,
    fail_alloc: bool,
    fail_init: bool,
    short_write: Option<usize>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    urc: RwLock<Option<Box<dyn UrcDispatch>>>,
    initialized: AtomicBool,
}

impl Inner {
    fn dispatch(&self, line: &str) -> bool {
        self.urc
            .read()
            .unwrap()
            .as_ref()
            .is_some_and(|table| table.dispatch(line))
    }
}

/// A modem that answers from a script and records everything it is asked.
#[derive(Clone, Default)]
pub struct MockModem {
    inner: Arc<Inner>,
}

impl MockModem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every command starting with `prefix`.
    pub fn on(&self, prefix: &str, reply: Reply) -> &Self {
        self.push_rule(prefix, reply, None)
    }

    /// Answers the next command starting with `prefix` once; rules are tried in
    /// the order they were added.
    pub fn once(&self, prefix: &str, reply: Reply) -> &Self {
        self.push_rule(prefix, reply, Some(1))
    }

    fn push_rule(&self, prefix: &str, reply: Reply, remaining: Option<usize>) -> &Self {
        self.inner.state.lock().unwrap().rules.push(Rule {
            prefix: prefix.to_string(),
            reply,
            remaining,
        });
        self
    }

    pub fn fail_alloc(&self, fail: bool) {
        self.inner.state.lock().unwrap().fail_alloc = fail;
    }

    pub fn fail_init(&self, fail: bool) {
        self.inner.state.lock().unwrap().fail_init = fail;
    }

    /// Accept at most `limit` bytes per raw write.
    pub fn short_write(&self, limit: usize) {
        self.inner.state.lock().unwrap().short_write = Some(limit);
    }

    /// Emits an unsolicited line right now, from the calling thread.
    pub fn inject(&self, line: &str) -> bool {
        self.inner.dispatch(line)
    }

    /// Emits an unsolicited line from another thread after `delay`.
    pub fn inject_after(&self, delay: Duration, line: &str) -> thread::JoinHandle<bool> {
        let inner = Arc::clone(&self.inner);
        let line = line.to_string();
        thread::spawn(move || {
            thread::sleep(delay);
            inner.dispatch(&line)
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.state.lock().unwrap().events.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Command(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .count()
    }

    pub fn clear_events(&self) {
        self.inner.state.lock().unwrap().events.clear();
    }

    fn record(&self, event: Event) {
        self.inner.state.lock().unwrap().events.push(event);
    }

    fn reply_for(&self, cmd: &str) -> Reply {
        let mut state = self.inner.state.lock().unwrap();
        let rule = state
            .rules
            .iter_mut()
            .find(|r| cmd.starts_with(&r.prefix) && r.remaining != Some(0));
        match rule {
            Some(rule) => {
                if let Some(n) = rule.remaining.as_mut() {
                    *n -= 1;
                }
                rule.reply.clone()
            }
            None => Reply::ok(),
        }
    }
}

impl Transport for MockModem {
    fn init(&self) -> Result<(), Error> {
        self.record(Event::Init);
        if self.inner.state.lock().unwrap().fail_init {
            return Err(Error::Failure);
        }
        self.inner.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    fn create_response(
        &self,
        buf_size: usize,
        line_limit: usize,
        timeout: Duration,
    ) -> Result<Response, Error> {
        if self.inner.state.lock().unwrap().fail_alloc {
            return Err(Error::ResponseUnavailable);
        }
        Ok(Response::new(buf_size, line_limit, timeout))
    }

    fn exec(&self, resp: &mut Response, cmd: &str) -> Result<(), Error> {
        self.record(Event::Command(cmd.to_string()));
        let reply = self.reply_for(cmd);

        for line in &reply.lines {
            if !self.inner.dispatch(line) {
                resp.push_line(line);
            }
        }
        for (delay, line) in reply.delayed {
            self.inject_after(delay, &line);
        }
        reply.result
    }

    fn send(&self, data: &[u8]) -> Result<usize, Error> {
        self.record(Event::Raw(data.to_vec()));
        let limit = self.inner.state.lock().unwrap().short_write;
        Ok(limit.map_or(data.len(), |limit| data.len().min(limit)))
    }

    fn set_end_sign(&self, sign: Option<u8>) {
        self.record(Event::EndSign(sign));
    }

    fn set_urc_table(&self, table: Box<dyn UrcDispatch>) {
        self.record(Event::UrcTable(table.prefixes()));
        *self.inner.urc.write().unwrap() = Some(table);
    }
}

/// Power control that logs into the modem's event list.
pub struct MockPower {
    modem: MockModem,
    fail: bool,
}

impl MockPower {
    pub fn new(modem: &MockModem) -> Self {
        Self {
            modem: modem.clone(),
            fail: false,
        }
    }

    pub fn failing(modem: &MockModem) -> Self {
        Self {
            modem: modem.clone(),
            fail: true,
        }
    }
}

impl PowerControl for MockPower {
    fn power_on(&mut self) -> Result<(), Error> {
        self.modem.record(Event::PowerOn);
        if self.fail {
            return Err(Error::Failure);
        }
        Ok(())
    }
}
