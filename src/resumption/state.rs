//! Client session state
//!
//! A `SessionState` is the client-side bundle needed to ask a server for an
//! abbreviated handshake. It is backed by an OpenSSL session; its resumption
//! materials (ticket, master secret, negotiated parameters) are read from the
//! session's DER encoding on demand.

use super::asn1::{SessionFields, FLAG_EXTENDED_MASTER_SECRET};
use super::codec::SerializationError;
use openssl::error::ErrorStack;
use openssl::ssl::{SslSession, SslSessionRef};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of a TLS 1.2 master secret
pub const MASTER_SECRET_LEN: usize = 48;

/// Lifetime given to sessions rebuilt from legacy fields, in seconds
pub const LEGACY_SESSION_TIMEOUT: u64 = 7200;

/// Copy of `session` that shares no `SSL_SESSION` object with any
/// connection.
///
/// OpenSSL marks a connection's session not resumable when the connection is
/// freed without a close_notify, and that mark lands on every holder of the
/// same object. Sessions handed to or taken from a handshake go through here.
pub(crate) fn detach(session: &SslSessionRef) -> Result<SslSession, ErrorStack> {
    SslSession::from_der(&session.to_der()?)
}

/// Resumable client session state
#[derive(Clone)]
pub struct SessionState {
    session: SslSession,
}

/// Resumption materials carried by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMaterials {
    pub protocol_version: u16,
    pub cipher_suite: u16,
    pub session_id: Vec<u8>,
    pub master_secret: Vec<u8>,
    pub ticket: Vec<u8>,
    pub extended_master_secret: bool,
    pub time: Option<u64>,
    pub timeout: Option<u64>,
    pub ticket_lifetime_hint: Option<u64>,
}

impl SessionMaterials {
    fn from_fields(fields: SessionFields) -> Result<Self, SerializationError> {
        let protocol_version = u16::try_from(fields.protocol_version).map_err(|_| {
            SerializationError::MaterialsUnavailable(format!(
                "protocol version {:#x} out of range",
                fields.protocol_version
            ))
        })?;
        let cipher_suite = fields.cipher_suite().ok_or_else(|| {
            SerializationError::MaterialsUnavailable("cipher field is not two bytes".to_string())
        })?;
        let extended_master_secret = fields.extended_master_secret();

        Ok(SessionMaterials {
            protocol_version,
            cipher_suite,
            session_id: fields.session_id,
            master_secret: fields.master_key,
            ticket: fields.ticket.unwrap_or_default(),
            extended_master_secret,
            time: fields.time,
            timeout: fields.timeout,
            ticket_lifetime_hint: fields.ticket_lifetime_hint,
        })
    }
}

impl SessionState {
    /// Wrap a session produced by a handshake
    pub fn from_session(session: SslSession) -> Self {
        SessionState { session }
    }

    /// Rebuild a session from its DER encoding, checking it carries `ticket`
    pub fn from_opaque(ticket: &[u8], state_bytes: &[u8]) -> Result<Self, SerializationError> {
        if ticket.is_empty() {
            return Err(SerializationError::InvalidState("empty session ticket".to_string()));
        }
        let session = SslSession::from_der(state_bytes)
            .map_err(|e| SerializationError::InvalidState(e.to_string()))?;
        let fields = SessionFields::from_der(state_bytes)
            .map_err(|e| SerializationError::InvalidState(e.to_string()))?;

        if fields.ticket.as_deref() != Some(ticket) {
            return Err(SerializationError::InvalidState(
                "session ticket does not match session state".to_string(),
            ));
        }

        Ok(SessionState { session })
    }

    /// Rebuild a TLS <= 1.2 session from explicit parameters
    ///
    /// The session id is the SHA-256 of the ticket, which is what OpenSSL
    /// assigns to ticket-based sessions itself. The session is marked as
    /// using the extended master secret.
    pub fn from_legacy_fields(
        ticket: &[u8],
        version: u16,
        cipher_suite: u16,
        master_secret: &[u8],
    ) -> Result<Self, SerializationError> {
        if ticket.is_empty() {
            return Err(SerializationError::InvalidState("empty session ticket".to_string()));
        }
        if !(0x0300..=0x0303).contains(&version) {
            return Err(SerializationError::InvalidState(format!(
                "protocol version {:#06x} has no legacy session layout",
                version
            )));
        }
        if master_secret.len() != MASTER_SECRET_LEN {
            return Err(SerializationError::InvalidState(format!(
                "master secret is {} bytes, expected {}",
                master_secret.len(),
                MASTER_SECRET_LEN
            )));
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(1);

        let fields = SessionFields {
            protocol_version: u32::from(version),
            cipher: cipher_suite.to_be_bytes().to_vec(),
            session_id: openssl::sha::sha256(ticket).to_vec(),
            master_key: master_secret.to_vec(),
            time: Some(now),
            timeout: Some(LEGACY_SESSION_TIMEOUT),
            ticket_lifetime_hint: None,
            ticket: Some(ticket.to_vec()),
            flags: FLAG_EXTENDED_MASTER_SECRET,
        };
        let der = fields
            .to_der()
            .map_err(|e| SerializationError::InvalidState(e.to_string()))?;
        let session = SslSession::from_der(&der)
            .map_err(|e| SerializationError::InvalidState(e.to_string()))?;

        Ok(SessionState { session })
    }

    /// The underlying OpenSSL session
    pub fn session(&self) -> &SslSessionRef {
        &self.session
    }

    /// DER encoding of the session (the opaque state blob)
    pub fn to_state_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        self.session
            .to_der()
            .map_err(|e| SerializationError::MaterialsUnavailable(e.to_string()))
    }

    /// Read the resumption materials out of the session
    pub fn materials(&self) -> Result<SessionMaterials, SerializationError> {
        let der = self.to_state_bytes()?;
        let fields = SessionFields::from_der(&der)
            .map_err(|e| SerializationError::MaterialsUnavailable(e.to_string()))?;
        SessionMaterials::from_fields(fields)
    }

    /// Master secret (TLS 1.3: the resumption secret)
    pub fn master_secret(&self) -> Vec<u8> {
        let mut secret = vec![0u8; self.session.master_key_len()];
        let len = self.session.master_key(&mut secret);
        secret.truncate(len);
        secret
    }

    /// Whether the session carries a ticket to present
    pub fn has_ticket(&self) -> bool {
        self.materials().map(|m| !m.ticket.is_empty()).unwrap_or(false)
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets stay out of debug output
        let mut debug = f.debug_struct("SessionState");
        match self.materials() {
            Ok(m) => debug
                .field("protocol_version", &format_args!("{:#06x}", m.protocol_version))
                .field("cipher_suite", &format_args!("{:#06x}", m.cipher_suite))
                .field("ticket_len", &m.ticket.len()),
            Err(_) => debug.field("materials", &"<unavailable>"),
        };
        debug.finish_non_exhaustive()
    }
}
