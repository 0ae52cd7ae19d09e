//! End-to-end resumption tests
//!
//! These tests capture session state from a live loopback server, move it
//! through the token codec and present it on new connections:
//! - TLS 1.2 resumption with an unchanged master secret
//! - concurrent clients resuming from one token
//! - TLS 1.3 tickets
//! - the legacy record layout
//! - servers that do not recognise the presented session
//! - tokens carried through a file

mod common;

use common::*;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use std::thread;
use tls_resumption::resumption::{
    parse_session_state, Error, HandshakeFailure, RecordLayout, SessionCodec,
};
use tls_resumption::tls::{ResumptionPolicy, TlsVersion};

#[test]
fn test_tls12_capture_parse_resume() {
    init_tracing();
    let address = spawn_echo_server(vec![ticket_server(TlsVersion::Tls12)]);
    let dialer = dialer();

    let captured = dialer.capture_session_states(&address, 1);
    assert!(captured.is_complete(), "capture failed: {:?}", captured.last_error);
    let state = parse_session_state(&captured.tokens[0]).unwrap();

    let (mut connection, granted) = dialer.connect(&address, Some(&state)).unwrap();
    assert!(connection.did_resume(), "new connection should resume");
    assert_eq!(connection.info().version, "TLSv1.2");

    let granted = granted.expect("resumed connection should report its session");
    assert_eq!(
        granted.master_secret(),
        state.master_secret(),
        "new connection should reuse client session state"
    );

    assert_echo(&mut connection, b"Hello World");
    connection.close().unwrap();
}

#[test]
fn test_concurrent_clients_resume_one_token() {
    let address = spawn_echo_server(vec![ticket_server(TlsVersion::Tls12)]);
    let dialer = Arc::new(dialer());

    let tokens = dialer.capture_session_states(&address, 1).into_result().unwrap();
    let state = parse_session_state(&tokens[0]).unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let dialer = Arc::clone(&dialer);
            let address = address.clone();
            let state = state.clone();
            thread::spawn(move || {
                let (mut connection, granted) = dialer.connect(&address, Some(&state)).unwrap();
                assert!(connection.did_resume());
                assert_eq!(granted.unwrap().master_secret(), state.master_secret());
                assert_echo(&mut connection, b"Hello World");
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_state_reusable_after_dropped_connections() {
    let address = spawn_echo_server(vec![ticket_server(TlsVersion::Tls12)]);
    let dialer = dialer();

    let tokens = dialer.capture_session_states(&address, 1).into_result().unwrap();
    let state = parse_session_state(&tokens[0]).unwrap();
    let copy = state.clone();

    for (round, presented) in [&state, &copy, &state, &copy].into_iter().enumerate() {
        let (mut connection, _) = dialer
            .connect(&address, Some(presented))
            .unwrap_or_else(|e| panic!("round {}: {}", round, e));
        assert!(connection.did_resume(), "round {} should resume", round);
        assert_echo(&mut connection, b"again");
        // Dropped, never closed
        drop(connection);
    }
}

#[test]
fn test_granted_state_outlives_its_connection() {
    let address = spawn_echo_server(vec![ticket_server(TlsVersion::Tls12)]);
    let dialer = dialer();

    let (connection, granted) = dialer.connect(&address, None).unwrap();
    let granted = granted.expect("ticket server should grant state");
    let attached = connection.session().expect("connection should carry a session");
    drop(connection);

    for state in [&granted, &attached] {
        let (connection, _) = dialer.connect(&address, Some(state)).unwrap();
        assert!(connection.did_resume());
    }
}

#[test]
fn test_tls13_capture_and_resume() {
    let address = spawn_echo_server(vec![ticket_server(TlsVersion::Tls13)]);
    let dialer = dialer();

    let captured = dialer.capture_session_states(&address, 2);
    assert_eq!(captured.len(), 2, "capture failed: {:?}", captured.last_error);

    for token in &captured.tokens {
        let state = parse_session_state(token).unwrap();
        assert_eq!(state.materials().unwrap().protocol_version, 0x0304);

        let (mut connection, _) = dialer.connect(&address, Some(&state)).unwrap();
        assert!(connection.did_resume());
        assert_eq!(connection.info().version, "TLSv1.3");
        assert_echo(&mut connection, b"ping");
    }
}

#[test]
fn test_legacy_layout_resumes() {
    let address = spawn_echo_server(vec![ticket_server(TlsVersion::Tls12)]);
    let codec = SessionCodec::new(RecordLayout::Legacy);
    let dialer = dialer().with_codec(codec);

    let tokens = dialer.capture_session_states(&address, 1).into_result().unwrap();
    let state = codec.parse(&tokens[0]).unwrap();

    let (connection, granted) = dialer.connect(&address, Some(&state)).unwrap();
    assert!(connection.did_resume());
    assert_eq!(granted.unwrap().master_secret(), state.master_secret());
}

#[test]
fn test_legacy_layout_refuses_tls13_sessions() {
    let address = spawn_echo_server(vec![ticket_server(TlsVersion::Tls13)]);
    let dialer = dialer().with_codec(SessionCodec::new(RecordLayout::Legacy));

    let captured = dialer.capture_session_states(&address, 1);
    assert!(captured.is_empty());
    assert!(matches!(captured.last_error, Some(Error::Serialization(_))));
}

#[test]
fn test_foreign_server_rejects_resumption() {
    // Each server config has its own ticket key
    let issuer = spawn_echo_server(vec![ticket_server(TlsVersion::Tls12)]);
    let stranger = spawn_echo_server(vec![ticket_server(TlsVersion::Tls12)]);

    let tokens = dialer().capture_session_states(&issuer, 1).into_result().unwrap();
    let state = parse_session_state(&tokens[0]).unwrap();

    let err = dialer().connect(&stranger, Some(&state)).unwrap_err();
    assert!(matches!(
        err,
        Error::Handshake { cause: HandshakeFailure::ResumptionRejected, .. }
    ));

    let (mut connection, granted) = dialer_with(ResumptionPolicy::Prefer)
        .connect(&stranger, Some(&state))
        .unwrap();
    assert!(!connection.did_resume());
    let granted = granted.expect("full handshake should grant a fresh session");
    assert_ne!(granted.master_secret(), state.master_secret());
    assert_echo(&mut connection, b"still usable");
}

#[test]
fn test_tokens_survive_file_transport() {
    let address = spawn_echo_server(vec![ticket_server(TlsVersion::Tls12)]);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    {
        let captured = dialer().capture_session_states(&address, 3);
        assert_eq!(captured.len(), 3);
        for token in &captured.tokens {
            writeln!(file, "{}", token).unwrap();
        }
        file.flush().unwrap();
    }

    // A different dialer stands in for another process
    let reader = BufReader::new(file.reopen().unwrap());
    let dialer = dialer();
    let mut resumed = 0;
    for line in reader.lines() {
        let state = parse_session_state(&line.unwrap()).unwrap();
        let (connection, _) = dialer.connect(&address, Some(&state)).unwrap();
        assert!(connection.did_resume());
        resumed += 1;
    }
    assert_eq!(resumed, 3);
}
