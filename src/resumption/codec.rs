//! Session state codec
//!
//! A token is the standard (padded) base64 encoding of a JSON record. Byte
//! fields inside the record are themselves base64 strings, and `null` byte
//! fields read back as empty, so tokens interoperate with Go's
//! `encoding/json` treatment of `[]byte`.
//!
//! Two record layouts exist and nothing in a token says which one it uses:
//!
//! ```text
//! Opaque: {"SessionState": "<der session>", "SessionTicket": "<ticket>"}
//! Legacy: {"SessionTicket": "<ticket>", "Vers": 771, "CipherSuite": 49199,
//!          "MasterSecret": "<48 bytes>"}
//! ```
//!
//! The decoding side has to be told the layout via [`RecordLayout`].

use super::state::SessionState;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use serde::{Deserialize, Serialize};

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("bad encoding: {0}")]
    BadEncoding(#[from] base64::DecodeError),

    #[error("bad record: {0}")]
    BadRecord(#[source] serde_json::Error),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unable to get resumption state: {0}")]
    MaterialsUnavailable(String),

    #[error("unable to encode session record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Which record layout a token uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordLayout {
    /// Ticket plus the full encoded session
    #[default]
    Opaque,
    /// Ticket plus explicit version, cipher suite and master secret
    /// (TLS 1.2 and earlier only)
    Legacy,
}

/// Structured record carried inside a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStateRecord {
    OpaqueBlob {
        ticket: Vec<u8>,
        state_bytes: Vec<u8>,
    },
    LegacyFields {
        ticket: Vec<u8>,
        version: u16,
        cipher_suite: u16,
        master_secret: Vec<u8>,
    },
}

impl SessionStateRecord {
    /// Extract a record of the given layout from a session
    pub fn from_state(
        state: &SessionState,
        layout: RecordLayout,
    ) -> Result<Self, SerializationError> {
        let materials = state.materials()?;
        if materials.ticket.is_empty() {
            return Err(SerializationError::MaterialsUnavailable(
                "session carries no ticket".to_string(),
            ));
        }

        match layout {
            RecordLayout::Opaque => Ok(SessionStateRecord::OpaqueBlob {
                ticket: materials.ticket,
                state_bytes: state.to_state_bytes()?,
            }),
            RecordLayout::Legacy => {
                if materials.protocol_version > 0x0303 {
                    return Err(SerializationError::MaterialsUnavailable(format!(
                        "legacy layout cannot carry protocol version {:#06x}",
                        materials.protocol_version
                    )));
                }
                Ok(SessionStateRecord::LegacyFields {
                    ticket: materials.ticket,
                    version: materials.protocol_version,
                    cipher_suite: materials.cipher_suite,
                    master_secret: materials.master_secret,
                })
            }
        }
    }

    /// Rebuild the session the record describes
    pub fn into_state(self) -> Result<SessionState, SerializationError> {
        match self {
            SessionStateRecord::OpaqueBlob { ticket, state_bytes } => {
                SessionState::from_opaque(&ticket, &state_bytes)
            }
            SessionStateRecord::LegacyFields {
                ticket,
                version,
                cipher_suite,
                master_secret,
            } => SessionState::from_legacy_fields(&ticket, version, cipher_suite, &master_secret),
        }
    }

    pub fn layout(&self) -> RecordLayout {
        match self {
            SessionStateRecord::OpaqueBlob { .. } => RecordLayout::Opaque,
            SessionStateRecord::LegacyFields { .. } => RecordLayout::Legacy,
        }
    }

    pub fn ticket(&self) -> &[u8] {
        match self {
            SessionStateRecord::OpaqueBlob { ticket, .. } => ticket,
            SessionStateRecord::LegacyFields { ticket, .. } => ticket,
        }
    }

    /// JSON + base64 encoding of the record
    pub fn encode(&self) -> Result<String, SerializationError> {
        let json = match self {
            SessionStateRecord::OpaqueBlob { ticket, state_bytes } => {
                serde_json::to_vec(&OpaqueJson {
                    session_state: state_bytes.clone(),
                    session_ticket: ticket.clone(),
                })
            }
            SessionStateRecord::LegacyFields {
                ticket,
                version,
                cipher_suite,
                master_secret,
            } => serde_json::to_vec(&LegacyJson {
                session_ticket: ticket.clone(),
                vers: *version,
                cipher_suite: *cipher_suite,
                master_secret: master_secret.clone(),
            }),
        }
        .map_err(SerializationError::Encode)?;

        Ok(B64.encode(json))
    }

    /// Decode a token expected to use `layout`
    pub fn decode(token: &str, layout: RecordLayout) -> Result<Self, SerializationError> {
        let json = B64.decode(token.trim())?;

        match layout {
            RecordLayout::Opaque => {
                let record: OpaqueJson =
                    serde_json::from_slice(&json).map_err(SerializationError::BadRecord)?;
                Ok(SessionStateRecord::OpaqueBlob {
                    ticket: record.session_ticket,
                    state_bytes: record.session_state,
                })
            }
            RecordLayout::Legacy => {
                let record: LegacyJson =
                    serde_json::from_slice(&json).map_err(SerializationError::BadRecord)?;
                Ok(SessionStateRecord::LegacyFields {
                    ticket: record.session_ticket,
                    version: record.vers,
                    cipher_suite: record.cipher_suite,
                    master_secret: record.master_secret,
                })
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct OpaqueJson {
    #[serde(rename = "SessionState", with = "go_bytes", default)]
    session_state: Vec<u8>,
    #[serde(rename = "SessionTicket", with = "go_bytes", default)]
    session_ticket: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct LegacyJson {
    #[serde(rename = "SessionTicket", with = "go_bytes", default)]
    session_ticket: Vec<u8>,
    #[serde(rename = "Vers")]
    vers: u16,
    #[serde(rename = "CipherSuite")]
    cipher_suite: u16,
    #[serde(rename = "MasterSecret", with = "go_bytes", default)]
    master_secret: Vec<u8>,
}

/// Byte slices as base64 strings, `null` as empty
mod go_bytes {
    use super::B64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&B64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => B64.decode(encoded).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

/// Serializes and parses session state tokens in one record layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionCodec {
    layout: RecordLayout,
}

impl SessionCodec {
    pub fn new(layout: RecordLayout) -> Self {
        SessionCodec { layout }
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Encode a session state into a transport-safe token
    pub fn serialize(&self, state: &SessionState) -> Result<String, SerializationError> {
        SessionStateRecord::from_state(state, self.layout)?.encode()
    }

    /// Decode a token produced by [`SessionCodec::serialize`]
    pub fn parse(&self, token: &str) -> Result<SessionState, SerializationError> {
        SessionStateRecord::decode(token, self.layout)?.into_state()
    }
}

/// Serialize with the canonical (opaque) layout
pub fn serialize_session_state(state: &SessionState) -> Result<String, SerializationError> {
    SessionCodec::default().serialize(state)
}

/// Parse a token in the canonical (opaque) layout
pub fn parse_session_state(token: &str) -> Result<SessionState, SerializationError> {
    SessionCodec::default().parse(token)
}
