//! Smoke test against a real modem.
//!
//! Set `AT_MODEM_PORT` (for example in `.env`) to a serial device already
//! configured for the modem's baud rate with a short read timeout, then run
//! `cargo test --test hardware -- --ignored`.

use dotenvy::dotenv;
use libiot_at::at::AtClient;
use libiot_at::config::Config;
use libiot_at::serial::IoPort;
use libiot_at::session::Session;
use std::env;
use std::fs::OpenOptions;
use std::time::Duration;

#[test]
#[ignore]
fn test_handshake_with_real_modem() {
    dotenv().ok();
    let path = env::var("AT_MODEM_PORT").expect("AT_MODEM_PORT not set");
    let tty = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .expect("Failed to open modem port");
    let rx = IoPort(tty.try_clone().unwrap());
    let tx = IoPort(tty);

    let config = match env::var("AT_MODEM_CONFIG") {
        Ok(json) => Config::from_json(&json).expect("invalid AT_MODEM_CONFIG"),
        Err(_) => Config::default(),
    };
    let session = Session::new(AtClient::new(rx, tx), config);

    session.init().unwrap();
    session.handshake(Duration::from_secs(5)).unwrap();
    assert!(!session.firmware_version().is_empty());
}
