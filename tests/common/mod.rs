//! Shared helpers for integration tests: loopback TLS echo servers

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;
use tls_resumption::resumption::Dialer;
use tls_resumption::tls::{
    ClientConfig, PeerVerification, ResumptionPolicy, ServerConfig, TlsConnection, TlsVersion,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Server config for `version` that issues tickets
pub fn ticket_server(version: TlsVersion) -> ServerConfig {
    ServerConfig::builder().version(version).build().unwrap()
}

/// Server config for `version` that never grants resumable state
pub fn ticketless_server(version: TlsVersion) -> ServerConfig {
    ServerConfig::builder()
        .version(version)
        .session_tickets(false)
        .session_cache(false)
        .build()
        .unwrap()
}

/// Accept connections forever, handing the n-th one to
/// `configs[n % configs.len()]` and echoing whatever it sends.
/// Returns the listening address.
pub fn spawn_echo_server(configs: Vec<ServerConfig>) -> String {
    assert!(!configs.is_empty());
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    thread::spawn(move || {
        for (n, stream) in listener.incoming().enumerate() {
            let Ok(stream) = stream else { continue };
            let config = configs[n % configs.len()].clone();
            thread::spawn(move || {
                if let Ok(mut connection) = config.accept(stream) {
                    echo(&mut connection);
                }
            });
        }
    });

    address
}

fn echo(connection: &mut TlsConnection) {
    let mut buf = [0u8; 4096];
    loop {
        match connection.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if connection.write_all(&buf[..n]).is_err() {
                    break;
                }
            }
        }
    }
}

pub fn dialer() -> Dialer {
    dialer_with(ResumptionPolicy::Require)
}

pub fn dialer_with(policy: ResumptionPolicy) -> Dialer {
    let config = ClientConfig::builder(PeerVerification::Skip)
        .resumption(policy)
        .ticket_wait(Some(Duration::from_millis(500)))
        .build()
        .unwrap();
    Dialer::new(config).unwrap()
}

/// Write `text` and expect it echoed back
pub fn assert_echo(connection: &mut TlsConnection, text: &[u8]) {
    connection.write_all(text).unwrap();
    let mut buf = vec![0u8; text.len()];
    connection.read_exact(&mut buf).unwrap();
    assert_eq!(buf, text);
}
