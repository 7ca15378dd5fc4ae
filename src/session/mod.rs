//! MQTT session state controller.
//!
//! A [`Session`] issues commands through a [`CommandExecutor`] and then blocks on
//! the shared [`EventFlags`] until the matching notification, handled on the
//! transport's receive path by the profile's rule table, sets the awaited bit.
//!
//! ```text
//!  Uninitialized ──init──▶ Initialized ──handshake──▶ Handshaked ──mqtt_connect──▶ Connected
//!                                                                                      │
//!                          Disconnected ◀──── mqtt_disconnect / +TCMQTTDISCON ─────────┘
//! ```
//!
//! A `+TCMQTTDISCON` notification cancels the session for good: blocked waits
//! return at once and every later operation fails with [`Error::Cancelled`].

#![allow(missing_docs)]
#![deny(unsafe_code)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::at::{CommandExecutor, DATA_PROMPT, Response, Transport, UrcDispatch, UrcTable};
use crate::config::Config;
use crate::error::Error;

pub mod flags;
pub mod profile;
pub mod registry;
pub mod types;

pub use flags::EventFlags;
pub use profile::ModuleProfile;
pub use registry::{Handler, Message, SubscriptionRegistry};
pub use types::{AlwaysOn, DeviceInfo, MqttParams, PowerControl, QoS, SessionState, TlsMode};

use types::quotable;

const RESPONSE_BUF_SIZE: usize = 64;
const VERSION_BUF_SIZE: usize = 256;
const WIFI_BUF_SIZE: usize = 128;

/// State shared between a session and the handlers on the receive path.
#[derive(Debug)]
pub struct SessionContext {
    pub flags: EventFlags,
    pub registry: SubscriptionRegistry,
    state: Mutex<SessionState>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            flags: EventFlags::new(),
            registry: SubscriptionRegistry::new(),
            state: Mutex::new(SessionState::Uninitialized),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Marks the session disconnected and terminated.
    pub fn cancel(&self) {
        self.set_state(SessionState::Disconnected);
        self.flags.set(flags::TERMINATED);
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Lets the task owning a session observe its cancellation.
#[derive(Debug, Clone)]
pub struct CancelToken {
    context: Arc<SessionContext>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.context.flags.is_terminated()
    }

    /// Blocks until the session is cancelled or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.context.flags.wait(flags::TERMINATED, timeout)
    }

    /// Cancels the session from the owning side.
    pub fn cancel(&self) {
        self.context.cancel();
    }
}

/// An MQTT session driven over an AT transport.
///
/// Operations take `&self` so the session can be shared with the threads that
/// publish; commands are serialized by the executor.
pub struct Session<T: Transport, P: PowerControl = AlwaysOn> {
    executor: CommandExecutor<T>,
    power: Mutex<P>,
    context: Arc<SessionContext>,
    config: Config,
    firmware: Mutex<Vec<String>>,
}

impl<T: Transport> Session<T, AlwaysOn> {
    /// Creates a session for a module that needs no power sequencing.
    pub fn new(transport: T, config: Config) -> Self {
        Self::with_power(transport, AlwaysOn, config)
    }
}

impl<T: Transport, P: PowerControl> Session<T, P> {
    pub fn with_power(transport: T, power: P, config: Config) -> Self {
        Self {
            executor: CommandExecutor::new(transport),
            power: Mutex::new(power),
            context: Arc::new(SessionContext::new()),
            config,
            firmware: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        self.executor.transport()
    }

    pub fn state(&self) -> SessionState {
        self.context.state()
    }

    pub fn flags(&self) -> &EventFlags {
        &self.context.flags
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.context.registry
    }

    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            context: Arc::clone(&self.context),
        }
    }

    /// Version lines reported by the last successful `AT+GMR`.
    pub fn firmware_version(&self) -> Vec<String> {
        self.firmware
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Brings up the transport, powers the module and installs the rule table.
    ///
    /// Fails if the transport is already initialized.
    pub fn init(&self) -> Result<(), Error> {
        self.ensure_live()?;
        let transport = self.executor.transport();
        if transport.is_initialized() {
            error!("at transport has been initialized");
            return Err(Error::Failure);
        }

        transport.init().inspect_err(|e| error!("at transport init failed: {}", e))?;
        debug!("at transport up");

        // Power-on may rely on the receive path already buffering.
        self.power
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .power_on()
            .inspect_err(|e| error!("module power on failed: {}", e))?;

        let table = UrcTable::new(self.config.profile.rules(), Arc::clone(&self.context));
        debug!("urc table: {:?}", table.prefixes());
        transport.set_urc_table(Box::new(table));

        self.context.set_state(SessionState::Initialized);
        Ok(())
    }

    /// Disables echo and reads the firmware version.
    ///
    /// Both commands run even if the first fails; any failure is reported as
    /// [`Error::Failure`] afterwards.
    pub fn handshake(&self, timeout: Duration) -> Result<(), Error> {
        self.ensure_live()?;
        let mut resp = self
            .executor
            .create_response(VERSION_BUF_SIZE, 0, timeout)
            .inspect_err(|_| error!("no response object for handshake"))?;
        let mut failed = false;

        if let Err(e) = self.executor.execute(&mut resp, format_args!("ATE0")) {
            error!("cmd ATE0 failed: {}", e);
            failed = true;
        }

        match self.executor.execute(&mut resp, format_args!("AT+GMR")) {
            Ok(()) => {
                let version: Vec<String> = resp
                    .lines()
                    .filter(|line| *line != "OK")
                    .map(String::from)
                    .collect();
                info!("module info ({} lines):", version.len());
                for line in &version {
                    info!("  {}", line);
                }
                *self.firmware.lock().unwrap_or_else(PoisonError::into_inner) = version;
            }
            Err(e) => {
                error!("cmd AT+GMR failed: {}", e);
                failed = true;
            }
        }

        self.ensure_live()?;
        if failed {
            return Err(Error::Failure);
        }
        if self.state() == SessionState::Initialized {
            self.context.set_state(SessionState::Handshaked);
        }
        Ok(())
    }

    /// Provisions the device identity; usually done once at the factory.
    pub fn set_device_info(&self, info: &DeviceInfo, tls: TlsMode) -> Result<(), Error> {
        self.ensure_live()?;
        quotable(&info.product_id)?;
        quotable(&info.device_name)?;
        quotable(&info.device_secret)?;
        let mut resp = self.response()?;
        self.executor
            .execute(
                &mut resp,
                format_args!(
                    "AT+TCDEVINFOSET={},\"{}\",\"{}\",\"{}\"",
                    tls, info.product_id, info.device_name, info.device_secret
                ),
            )
            .inspect_err(|e| error!("cmd AT+TCDEVINFOSET failed: {}", e))
    }

    /// Connects to the broker and waits for the connect notification.
    pub fn mqtt_connect(&self, params: &MqttParams) -> Result<(), Error> {
        self.ensure_live()?;
        let mut resp = self.response()?;

        self.context.flags.clear(flags::MQTT_CONNECTED);
        let sent = self.executor.execute(
            &mut resp,
            format_args!("AT+TCMQTTCONN={}", params.command_args()),
        );
        if let Err(e) = &sent {
            error!("cmd AT+TCMQTTCONN failed: {}", e);
        }

        let acked = self.wait_flag(flags::MQTT_CONNECTED, self.config.command_timeout())?;
        sent?;
        if !acked {
            error!("no connect notification");
            return Err(Error::Timeout);
        }

        self.context.set_state(SessionState::Connected);
        info!("mqtt connected");
        Ok(())
    }

    pub fn mqtt_disconnect(&self) -> Result<(), Error> {
        self.ensure_live()?;
        let mut resp = self.response()?;
        self.executor
            .execute(&mut resp, format_args!("AT+TCMQTTDISCONN"))
            .inspect_err(|e| error!("cmd AT+TCMQTTDISCONN failed: {}", e))?;
        self.context.flags.clear(flags::MQTT_CONNECTED);
        self.context.set_state(SessionState::Disconnected);
        Ok(())
    }

    /// Publishes `payload`, inline when it fits the configured threshold and
    /// streamed otherwise.
    ///
    /// Inline payloads are embedded in a quoted command argument and must be
    /// text without quotes or line breaks, otherwise [`Error::InvalidArgument`]
    /// is returned. Use [`publish_streaming`](Self::publish_streaming) for
    /// arbitrary bytes.
    pub fn publish(&self, topic: &str, qos: QoS, payload: &[u8]) -> Result<(), Error> {
        self.ensure_live()?;
        self.ensure_connected()?;
        let topic = check_topic(topic)?;
        if payload.len() > self.config.max_inline_payload {
            debug!("payload of {} bytes, streaming", payload.len());
            return self.publish_streaming(topic, qos, payload);
        }

        let text = core::str::from_utf8(payload)
            .map_err(|_| Error::InvalidArgument)
            .and_then(quotable)
            .inspect_err(|_| error!("payload cannot be sent inline"))?;
        let mut resp = self.response()?;
        self.executor
            .execute(
                &mut resp,
                format_args!("AT+TCMQTTPUB=\"{}\",{},\"{}\"", topic, qos, text),
            )
            .inspect_err(|e| error!("cmd AT+TCMQTTPUB failed: {}", e))
    }

    /// Declares the payload length, then writes the payload as raw bytes after
    /// the data prompt.
    pub fn publish_streaming(&self, topic: &str, qos: QoS, payload: &[u8]) -> Result<(), Error> {
        self.ensure_live()?;
        self.ensure_connected()?;
        let topic = check_topic(topic)?;
        let mut resp = self.response()?;

        let mut slot = self.executor.exclusive();
        let mut data = slot.data_mode(DATA_PROMPT);
        data.execute(
            &mut resp,
            format_args!("AT+TCMQTTPUBL=\"{}\",{},{}", topic, qos, payload.len()),
        )
        .inspect_err(|e| error!("cmd AT+TCMQTTPUBL failed: {}", e))?;

        let written = data.send_raw(payload)?;
        if written != payload.len() {
            error!("sent {} of {} payload bytes", written, payload.len());
            return Err(Error::SendData);
        }
        Ok(())
    }

    /// Registers `handler` for `topic`, then subscribes and waits for the ack.
    ///
    /// The handler is registered first so messages arriving before the ack are
    /// delivered. It stays registered when the subscription fails. See
    /// [`Handler`] for what a handler may do.
    pub fn subscribe(&self, topic: &str, qos: QoS, handler: Handler) -> Result<(), Error> {
        self.ensure_live()?;
        self.ensure_connected()?;
        let topic = check_topic(topic)?;
        self.context
            .registry
            .register(topic, qos, handler)
            .inspect_err(|e| error!("register sub topic failed: {}", e))?;

        self.context.flags.clear(flags::SUBSCRIBED);
        let mut resp = self.response()?;
        let sent = self
            .executor
            .execute(&mut resp, format_args!("AT+TCMQTTSUB=\"{}\",{}", topic, qos));
        if let Err(e) = &sent {
            error!("cmd AT+TCMQTTSUB failed: {}", e);
        }

        let acked = self.wait_flag(flags::SUBSCRIBED, self.config.command_timeout());
        self.context.flags.clear(flags::SUBSCRIBED);
        let acked = acked?;

        sent?;
        if !acked {
            error!("{} sub fail", topic);
            return Err(Error::Timeout);
        }
        debug!("{} sub success", topic);
        Ok(())
    }

    /// Unsubscribes on the broker. The handler stays in [`subscriptions`](Self::subscriptions).
    pub fn unsubscribe(&self, topic: &str) -> Result<(), Error> {
        self.ensure_live()?;
        self.ensure_connected()?;
        let topic = check_topic(topic)?;
        let mut resp = self.response()?;
        self.executor
            .execute(&mut resp, format_args!("AT+TCMQTTUNSUB=\"{}\"", topic))
            .inspect_err(|e| error!("cmd AT+TCMQTTUNSUB failed: {}", e))
    }

    /// Sends `AT+TCMQTTSTATE?`.
    ///
    /// The reply is not parsed here; a `+TCMQTTSTATE:` line reaches the rule table
    /// like any other notification and updates the keepalive flag there.
    pub fn query_state(&self) -> Result<(), Error> {
        self.ensure_live()?;
        let mut resp = self.executor.create_response(
            VERSION_BUF_SIZE,
            0,
            self.config.command_timeout(),
        )?;
        self.executor
            .execute(&mut resp, format_args!("AT+TCMQTTSTATE?"))
            .inspect_err(|e| error!("cmd AT+TCMQTTSTATE failed: {}", e))
    }

    /// Queries the state, then reports the keepalive flag.
    pub fn is_connected(&self) -> bool {
        if let Err(e) = self.query_state() {
            error!("get mqtt state failed: {}", e);
            return false;
        }
        self.context.flags.contains(flags::KEEPALIVE)
    }

    /// Attaches the module to its network.
    ///
    /// Cellular: polls `AT+CREG?` up to `register_retries` times with a short
    /// wait each, then once more with the long wait, and brings up the IP context
    /// with `AT+XIIC=1`. Wi-Fi: joins with the configured credentials.
    pub fn register_network(&self) -> Result<(), Error> {
        match self.config.profile {
            ModuleProfile::Cellular => self.register_cellular(),
            ModuleProfile::Wifi => {
                let creds = self.config.wifi.as_ref().ok_or_else(|| {
                    error!("wifi profile without credentials");
                    Error::InvalidArgument
                })?;
                self.wifi_connect(&creds.ssid, &creds.password)
            }
        }
    }

    fn register_cellular(&self) -> Result<(), Error> {
        self.ensure_live()?;
        let mut resp = self.response()?;
        let poll = self.config.register_poll_timeout();
        let attached = ModuleProfile::Cellular.attach_flag();

        self.context.flags.clear(attached);
        let mut registered = false;
        for attempt in 1..=self.config.register_retries {
            if let Err(e) = self.executor.execute(&mut resp, format_args!("AT+CREG?")) {
                warn!("cmd AT+CREG? failed: {}", e);
            }
            if self.wait_flag(attached, poll)? {
                registered = true;
                break;
            }
            debug!("not registered yet, attempt {}", attempt);
        }

        // One last query with the long wait, whether or not polling succeeded.
        if let Err(e) = self.executor.execute(&mut resp, format_args!("AT+CREG?")) {
            warn!("cmd AT+CREG? failed: {}", e);
        }
        let last = self.wait_flag(
            attached,
            self.config.register_final_timeout(),
        )?;
        if !(registered || last) {
            error!("network registration failed");
            return Err(Error::Timeout);
        }

        self.executor
            .execute(&mut resp, format_args!("AT+XIIC=1"))
            .inspect_err(|e| error!("cmd AT+XIIC=1 failed: {}", e))?;
        info!("network registered");
        Ok(())
    }

    /// Joins an access point and waits for `WIFI CONNECTED`.
    ///
    /// A rejected join command is only logged; the notification decides.
    pub fn wifi_connect(&self, ssid: &str, password: &str) -> Result<(), Error> {
        self.ensure_live()?;
        let (ssid, password) = (quotable(ssid)?, quotable(password)?);
        let attached = ModuleProfile::Wifi.attach_flag();
        let mut resp =
            self.executor
                .create_response(WIFI_BUF_SIZE, 0, self.config.command_timeout())?;

        self.context.flags.clear(attached);
        if let Err(e) = self.executor.execute(
            &mut resp,
            format_args!("AT+CWJAP=\"{}\",\"{}\"", ssid, password),
        ) {
            error!("cmd AT+CWJAP failed: {}", e);
        }

        if !self.wait_flag(attached, self.config.command_timeout())? {
            error!("wifi connect fail");
            return Err(Error::Timeout);
        }
        info!("wifi joined {}", ssid);
        Ok(())
    }

    /// Points a Wi-Fi module at a test broker.
    pub fn set_test_server(&self, host: &str) -> Result<(), Error> {
        self.ensure_live()?;
        let host = quotable(host)?;
        let mut resp =
            self.executor
                .create_response(WIFI_BUF_SIZE, 0, self.config.command_timeout())?;
        self.executor
            .execute(&mut resp, format_args!("AT+TCMQTTSRV=\"{}\"", host))
            .inspect_err(|e| error!("cmd AT+TCMQTTSRV failed: {}", e))
    }

    fn response(&self) -> Result<Response, Error> {
        self.executor
            .create_response(RESPONSE_BUF_SIZE, 0, self.config.command_timeout())
            .inspect_err(|_| error!("no response object"))
    }

    fn ensure_live(&self) -> Result<(), Error> {
        if self.context.flags.is_terminated() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.state() != SessionState::Connected {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    fn wait_flag(&self, bits: u32, timeout: Duration) -> Result<bool, Error> {
        let set = self.context.flags.wait(bits, timeout);
        self.ensure_live()?;
        Ok(set)
    }
}

fn check_topic(topic: &str) -> Result<&str, Error> {
    if topic.is_empty() {
        error!("empty topic");
        return Err(Error::InvalidArgument);
    }
    quotable(topic).inspect_err(|_| error!("topic {:?} cannot be quoted", topic))
}

impl<T: Transport, P: PowerControl> core::fmt::Debug for Session<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("flags", &self.context.flags.get())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
