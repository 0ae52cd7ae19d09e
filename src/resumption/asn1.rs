//! ASN.1 view of an OpenSSL session
//!
//! OpenSSL serializes `SSL_SESSION` as a DER `SEQUENCE`:
//!
//! ```text
//! SSLSession ::= SEQUENCE {
//!     version            INTEGER,          -- always 1
//!     sslVersion         INTEGER,          -- e.g. 0x0303
//!     cipher             OCTET STRING,     -- two byte suite id
//!     sessionID          OCTET STRING,
//!     masterKey          OCTET STRING,
//!     keyArg         [0] IMPLICIT OCTET STRING OPTIONAL,
//!     time           [1] INTEGER OPTIONAL,
//!     timeout        [2] INTEGER OPTIONAL,
//!     ...
//!     ticketLifetime [9] INTEGER OPTIONAL,
//!     ticket        [10] OCTET STRING OPTIONAL,
//!     ...
//!     flags         [13] INTEGER OPTIONAL,
//!     ... }
//! ```
//!
//! Only the fields resumption depends on are read; everything else is
//! skipped by tag.

use der::asn1::{AnyRef, OctetStringRef};
use der::{Decode, Encode, Reader, Sequence, SliceReader, Tag, Tagged};

/// Format version OpenSSL writes and accepts
const SESSION_ASN1_VERSION: u32 = 1;

/// `SSL_SESS_FLAG_EXTMS`
pub const FLAG_EXTENDED_MASTER_SECRET: u64 = 0x1;

/// Fields of an encoded session that resumption depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFields {
    pub protocol_version: u32,
    pub cipher: Vec<u8>,
    pub session_id: Vec<u8>,
    pub master_key: Vec<u8>,
    pub time: Option<u64>,
    pub timeout: Option<u64>,
    pub ticket_lifetime_hint: Option<u64>,
    pub ticket: Option<Vec<u8>>,
    pub flags: u64,
}

impl SessionFields {
    /// Read the fields out of OpenSSL's DER session encoding
    pub fn from_der(bytes: &[u8]) -> der::Result<Self> {
        let mut reader = SliceReader::new(bytes)?;

        let fields = reader.sequence(|seq| {
            let format: u32 = seq.decode()?;
            if format != SESSION_ASN1_VERSION {
                return Err(Tag::Integer.value_error());
            }
            let protocol_version: u32 = seq.decode()?;
            let cipher: OctetStringRef<'_> = seq.decode()?;
            let session_id: OctetStringRef<'_> = seq.decode()?;
            let master_key: OctetStringRef<'_> = seq.decode()?;

            let mut fields = SessionFields {
                protocol_version,
                cipher: cipher.as_bytes().to_vec(),
                session_id: session_id.as_bytes().to_vec(),
                master_key: master_key.as_bytes().to_vec(),
                time: None,
                timeout: None,
                ticket_lifetime_hint: None,
                ticket: None,
                flags: 0,
            };

            while !seq.is_finished() {
                let field: AnyRef<'_> = seq.decode()?;
                let Tag::ContextSpecific { number, .. } = field.tag() else {
                    continue;
                };
                match number.value() {
                    1 => fields.time = Some(u64::from_der(field.value())?),
                    2 => fields.timeout = Some(u64::from_der(field.value())?),
                    9 => fields.ticket_lifetime_hint = Some(u64::from_der(field.value())?),
                    10 => {
                        let ticket = OctetStringRef::from_der(field.value())?;
                        fields.ticket = Some(ticket.as_bytes().to_vec());
                    }
                    13 => fields.flags = u64::from_der(field.value())?,
                    _ => {}
                }
            }

            Ok(fields)
        })?;

        reader.finish(fields)
    }

    /// Encode the fields the way OpenSSL does, for `SslSession::from_der`
    pub fn to_der(&self) -> der::Result<Vec<u8>> {
        let ticket = self
            .ticket
            .as_deref()
            .map(OctetStringRef::new)
            .transpose()?;

        SessionRecordAsn1 {
            format: SESSION_ASN1_VERSION,
            protocol_version: self.protocol_version,
            cipher: OctetStringRef::new(&self.cipher)?,
            session_id: OctetStringRef::new(&self.session_id)?,
            master_key: OctetStringRef::new(&self.master_key)?,
            time: self.time,
            timeout: self.timeout,
            ticket_lifetime_hint: self.ticket_lifetime_hint,
            ticket,
            flags: Some(self.flags).filter(|flags| *flags != 0),
        }
        .to_der()
    }

    /// Cipher suite id from the two byte cipher field
    pub fn cipher_suite(&self) -> Option<u16> {
        match self.cipher.as_slice() {
            [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    pub fn extended_master_secret(&self) -> bool {
        self.flags & FLAG_EXTENDED_MASTER_SECRET != 0
    }
}

#[derive(Sequence)]
struct SessionRecordAsn1<'a> {
    format: u32,
    protocol_version: u32,
    cipher: OctetStringRef<'a>,
    session_id: OctetStringRef<'a>,
    master_key: OctetStringRef<'a>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    time: Option<u64>,
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", optional = "true")]
    timeout: Option<u64>,
    #[asn1(context_specific = "9", tag_mode = "EXPLICIT", optional = "true")]
    ticket_lifetime_hint: Option<u64>,
    #[asn1(context_specific = "10", tag_mode = "EXPLICIT", optional = "true")]
    ticket: Option<OctetStringRef<'a>>,
    #[asn1(context_specific = "13", tag_mode = "EXPLICIT", optional = "true")]
    flags: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionFields {
        SessionFields {
            protocol_version: 0x0303,
            cipher: vec![0xc0, 0x2f],
            session_id: vec![0x11; 32],
            master_key: vec![0x22; 48],
            time: Some(1_700_000_000),
            timeout: Some(7200),
            ticket_lifetime_hint: Some(300),
            ticket: Some(vec![0x33; 96]),
            flags: FLAG_EXTENDED_MASTER_SECRET,
        }
    }

    #[test]
    fn test_encode_then_read_back() {
        let fields = sample();
        let der = fields.to_der().unwrap();
        assert_eq!(SessionFields::from_der(&der).unwrap(), fields);
    }

    #[test]
    fn test_openssl_accepts_encoding() {
        let der = sample().to_der().unwrap();
        let session = openssl::ssl::SslSession::from_der(&der).unwrap();

        assert_eq!(session.id(), &[0x11; 32][..]);
        let mut master = [0u8; 48];
        assert_eq!(session.master_key(&mut master), 48);
        assert_eq!(master, [0x22; 48]);

        // OpenSSL's own re-encoding keeps the ticket
        let reencoded = SessionFields::from_der(&session.to_der().unwrap()).unwrap();
        assert_eq!(reencoded.ticket, Some(vec![0x33; 96]));
        assert_eq!(reencoded.cipher_suite(), Some(0xc02f));
        assert!(reencoded.extended_master_secret());
    }

    #[test]
    fn test_missing_optional_fields() {
        let mut fields = sample();
        fields.ticket = None;
        fields.flags = 0;
        fields.time = None;
        let der = fields.to_der().unwrap();

        let parsed = SessionFields::from_der(&der).unwrap();
        assert_eq!(parsed.ticket, None);
        assert!(!parsed.extended_master_secret());
    }

    #[test]
    fn test_truncated_input_rejected() {
        let der = sample().to_der().unwrap();
        assert!(SessionFields::from_der(&der[..der.len() - 5]).is_err());
        assert!(SessionFields::from_der(b"not der").is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut der = sample().to_der().unwrap();
        der.push(0);
        assert!(SessionFields::from_der(&der).is_err());
    }

    #[test]
    fn test_cipher_suite_requires_two_bytes() {
        let mut fields = sample();
        fields.cipher = vec![0xc0];
        assert_eq!(fields.cipher_suite(), None);
    }
}
