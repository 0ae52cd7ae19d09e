//! Negotiated connection parameters
//!
//! Populated once the handshake completes and kept alongside the connection.

use super::cert::{peer_chain, PeerCertificate};
use openssl::ssl::{NameType, SslRef};

/// What the handshake negotiated
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Negotiated TLS version (e.g., "TLSv1.3")
    pub version: String,

    /// Negotiated cipher suite
    pub cipher: String,

    /// SNI servername
    pub servername: Option<String>,

    /// Negotiated ALPN protocol
    pub alpn: Option<String>,

    /// Whether the handshake was abbreviated by resuming a session
    pub session_reused: bool,

    /// Certificates the peer presented (index 0 is the leaf)
    pub peer_chain: Vec<PeerCertificate>,
}

impl ConnectionInfo {
    pub fn from_ssl(ssl: &SslRef) -> Self {
        ConnectionInfo {
            version: ssl.version_str().to_string(),
            cipher: ssl
                .current_cipher()
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "<undef>".to_string()),
            servername: ssl.servername(NameType::HOST_NAME).map(|s| s.to_string()),
            alpn: ssl
                .selected_alpn_protocol()
                .map(|p| String::from_utf8_lossy(p).to_string()),
            session_reused: ssl.session_reused(),
            peer_chain: peer_chain(ssl),
        }
    }

    /// Leaf certificate of the peer, if one was presented
    pub fn peer_certificate(&self) -> Option<&PeerCertificate> {
        self.peer_chain.first()
    }
}
