//! Capture, serialization and replay of TLS client session state
//!
//! The pipeline runs in three steps:
//!
//! 1. [`Dialer::capture_session_states`] handshakes with a server a number of
//!    times and serializes each granted session into a token
//! 2. tokens travel out-of-band (files, config, another process)
//! 3. [`parse_session_state`] turns a token back into a [`SessionState`] and
//!    [`Dialer::connect`] presents it for an abbreviated handshake
//!
//! # Examples
//!
//! ```no_run
//! use tls_resumption::resumption::{parse_session_state, Dialer};
//! use tls_resumption::tls::{ClientConfig, PeerVerification};
//!
//! let dialer = Dialer::new(
//!     ClientConfig::builder(PeerVerification::Skip).build().unwrap(),
//! )
//! .unwrap();
//!
//! let captured = dialer.capture_session_states("example.com:443", 4);
//! if let Some(err) = &captured.last_error {
//!     eprintln!("some captures failed: {}", err);
//! }
//!
//! // Later, possibly in another process
//! let state = parse_session_state(&captured.tokens[0]).unwrap();
//! let (connection, _) = dialer.connect("example.com:443", Some(&state)).unwrap();
//! assert!(connection.did_resume());
//! ```

pub mod asn1;
pub mod cache;
pub mod capture;
pub mod codec;
pub mod dialer;
pub mod state;

pub use cache::SessionCache;
pub use capture::{capture_session_states, CaptureResult};
pub use codec::{
    parse_session_state, serialize_session_state, RecordLayout, SerializationError, SessionCodec,
    SessionStateRecord,
};
pub use dialer::Dialer;
pub use state::{SessionMaterials, SessionState};

use crate::tls::TlsError;

/// Result type for dialing and capture
pub type Result<T> = std::result::Result<T, Error>;

/// Why a handshake did not produce a usable connection
#[derive(Debug, thiserror::Error)]
pub enum HandshakeFailure {
    #[error(transparent)]
    Tls(#[from] openssl::ssl::Error),

    #[error("server declined to resume the presented session")]
    ResumptionRejected,
}

/// Dialing and capture errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error handshaking with {address}: {cause}")]
    Handshake {
        address: String,
        #[source]
        cause: HandshakeFailure,
    },

    #[error("no client session state granted by {address}")]
    SessionMissing { address: String },

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("unable to set up TLS for {address}: {source}")]
    Setup {
        address: String,
        #[source]
        source: TlsError,
    },
}

impl Error {
    /// Address the error relates to, if any
    pub fn address(&self) -> Option<&str> {
        match self {
            Error::Dial { address, .. }
            | Error::Handshake { address, .. }
            | Error::SessionMissing { address }
            | Error::Setup { address, .. } => Some(address),
            Error::Serialization(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::SessionMissing {
            address: "10.0.0.1:443".to_string(),
        };
        assert_eq!(err.to_string(), "no client session state granted by 10.0.0.1:443");
        assert_eq!(err.address(), Some("10.0.0.1:443"));

        let err = Error::Handshake {
            address: "h:1".to_string(),
            cause: HandshakeFailure::ResumptionRejected,
        };
        assert_eq!(
            err.to_string(),
            "error handshaking with h:1: server declined to resume the presented session"
        );

        let err = Error::from(SerializationError::InvalidState("bad cipher".to_string()));
        assert_eq!(err.to_string(), "invalid state: bad cipher");
        assert_eq!(err.address(), None);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<Error>();
    }
}
