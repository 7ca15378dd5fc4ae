//! Module profiles and their notification rule sets.
//!
//! Both profiles share the MQTT notifications and differ only in how network
//! attachment is reported: a cellular module answers registration queries with
//! `+CREG:`, a Wi-Fi module announces `WIFI CONNECTED` once it joined.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::SessionContext;
use super::flags;
use crate::at::UrcRule;

/// Kind of modem behind the AT channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleProfile {
    /// Registers on a cellular network (`AT+CREG?`, `AT+XIIC=1`).
    #[default]
    Cellular,
    /// Joins an access point (`AT+CWJAP`).
    Wifi,
}

impl ModuleProfile {
    /// The rule set installed into the transport for this profile.
    pub fn rules(self) -> &'static [UrcRule<SessionContext>] {
        match self {
            ModuleProfile::Cellular => &CELLULAR_RULES,
            ModuleProfile::Wifi => &WIFI_RULES,
        }
    }

    /// Flag set once the module is attached to its network.
    pub fn attach_flag(self) -> u32 {
        match self {
            ModuleProfile::Cellular => flags::NETWORK_REGISTERED,
            ModuleProfile::Wifi => flags::WIFI_JOINED,
        }
    }
}

const TERMINATOR: &str = "\r\n";

static CELLULAR_RULES: [UrcRule<SessionContext>; 7] = [
    UrcRule::new("+TCMQTTRCVPUB:", TERMINATOR, on_publish),
    UrcRule::new("+TCMQTTDISCON", TERMINATOR, on_disconnect),
    UrcRule::new("+TCMQTTSUB:", TERMINATOR, on_subscribed),
    UrcRule::new("+TCMQTTSTATE:", TERMINATOR, on_keepalive_state),
    UrcRule::new("+TCOTASTATUS:", TERMINATOR, on_ota_status),
    UrcRule::new("+TCMQTTCONN:", TERMINATOR, on_connected),
    UrcRule::new("+CREG:", TERMINATOR, on_registration),
];

static WIFI_RULES: [UrcRule<SessionContext>; 7] = [
    UrcRule::new("+TCMQTTRCVPUB:", TERMINATOR, on_publish),
    UrcRule::new("+TCMQTTDISCON", TERMINATOR, on_disconnect),
    UrcRule::new("+TCMQTTSUB:", TERMINATOR, on_subscribed),
    UrcRule::new("+TCMQTTSTATE:", TERMINATOR, on_keepalive_state),
    UrcRule::new("+TCOTASTATUS:", TERMINATOR, on_ota_status),
    UrcRule::new("+TCMQTTCONN:", TERMINATOR, on_connected),
    UrcRule::new("WIFI CONNECTED", TERMINATOR, on_wifi_joined),
];

fn on_publish(ctx: &SessionContext, line: &str) {
    ctx.registry.deliver_notification(line);
}

fn on_disconnect(ctx: &SessionContext, line: &str) {
    warn!("broker disconnected: {}", line);
    ctx.cancel();
}

fn on_subscribed(ctx: &SessionContext, line: &str) {
    debug!("subscribe ack: {}", line);
    ctx.flags.set(flags::SUBSCRIBED);
}

// Any other report, including a malformed one, means the link is not up.
fn on_keepalive_state(ctx: &SessionContext, line: &str) {
    if line.contains("+TCMQTTSTATE:1") {
        ctx.flags.set(flags::KEEPALIVE);
    } else {
        ctx.flags.clear(flags::KEEPALIVE);
    }
}

fn on_ota_status(_ctx: &SessionContext, line: &str) {
    info!("ota status: {}", line);
}

fn on_connected(ctx: &SessionContext, line: &str) {
    debug!("connect ack: {}", line);
    ctx.flags.set(flags::MQTT_CONNECTED);
}

fn on_registration(ctx: &SessionContext, line: &str) {
    debug!("registration report: {}", line);
    if line.contains("+CREG: 0,1") {
        ctx.flags.set(flags::NETWORK_REGISTERED);
    } else {
        ctx.flags.clear(flags::NETWORK_REGISTERED);
    }
}

fn on_wifi_joined(ctx: &SessionContext, line: &str) {
    debug!("wifi report: {}", line);
    ctx.flags.set(flags::WIFI_JOINED);
}
