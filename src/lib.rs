//! tls-resumption - out-of-band TLS session capture and resumption
//!
//! This crate harvests resumable TLS client sessions from a server, encodes
//! them as transport-safe tokens, and later presents a decoded token on a new
//! connection to get an abbreviated handshake.
//!
//! - [`tls`] configures OpenSSL for the client (client hello profiles,
//!   explicit peer verification) and for staging servers
//! - [`resumption`] holds the dialer, the token codec and batch capture

pub mod resumption;
pub mod tls;

pub use resumption::{
    capture_session_states, parse_session_state, serialize_session_state, CaptureResult, Dialer,
    Error, RecordLayout, SerializationError, SessionCodec, SessionState,
};
pub use tls::{ClientConfig, ClientHelloProfile, PeerVerification, TlsConnection};
