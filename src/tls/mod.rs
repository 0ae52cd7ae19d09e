//! TLS plumbing for session capture and resumption
//!
//! Everything protocol-level is delegated to OpenSSL; this module holds the
//! configuration around it.
//!
//! # Architecture
//!
//! 1. `ClientConfig` describes how the dialer presents itself: a named
//!    `ClientHelloProfile`, an explicit `PeerVerification` choice, SNI and
//!    timing knobs
//! 2. `ServerConfig` stands up a ticket-granting (or ticket-refusing) server
//! 3. `TlsConnection` is the established stream either side ends up with
//!
//! # Examples
//!
//! ## Client configuration
//!
//! ```no_run
//! use tls_resumption::tls::{ClientConfig, ClientHelloProfile, PeerVerification};
//!
//! let config = ClientConfig::builder(PeerVerification::Skip)
//!     .profile(ClientHelloProfile::firefox())
//!     .servername("example.com")
//!     .build()
//!     .unwrap();
//! ```
//!
//! ## Server issuing session tickets
//!
//! ```no_run
//! use tls_resumption::tls::{ServerConfig, TlsVersion};
//! use std::net::TcpListener;
//!
//! let config = ServerConfig::builder()
//!     .version(TlsVersion::Tls12)
//!     .session_tickets(true)
//!     .build()
//!     .unwrap();
//!
//! let listener = TcpListener::bind("127.0.0.1:8443").unwrap();
//! let (tcp_stream, _) = listener.accept().unwrap();
//! let connection = config.accept(tcp_stream).unwrap();
//! ```

pub mod builtin_cert;
pub mod cert;
pub mod config;
pub mod connection;
pub mod handshake;
pub mod info;
pub mod profile;

pub use cert::PeerCertificate;
pub use config::{
    ClientConfig, ClientConfigBuilder, PeerVerification, ResumptionPolicy, ServerConfig,
    ServerConfigBuilder, TlsError, TlsVersion,
};
pub use connection::TlsConnection;
pub use info::ConnectionInfo;
pub use profile::ClientHelloProfile;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
