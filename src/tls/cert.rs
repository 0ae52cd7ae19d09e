//! Peer certificate summaries
//!
//! The dialer does not verify the peer by default, so it records what the
//! server presented. Callers that trust a server out-of-band can compare the
//! SHA-256 fingerprint against a pinned value.

use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::ssl::SslRef;
use openssl::x509::{X509NameRef, X509Ref};

/// Summary of one certificate presented by the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate {
    /// Subject common name
    pub subject: String,
    /// Issuer common name
    pub issuer: String,
    /// Subject alternative names ("DNS:..." / "IP:...")
    pub subject_alt_names: Vec<String>,
    /// SHA-256 over the DER certificate, lowercase hex
    pub sha256_fingerprint: String,
}

impl PeerCertificate {
    pub fn from_x509(cert: &X509Ref) -> Self {
        PeerCertificate {
            subject: common_name(cert.subject_name()),
            issuer: common_name(cert.issuer_name()),
            subject_alt_names: subject_alt_names(cert),
            sha256_fingerprint: fingerprint(cert),
        }
    }
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "<undef>".to_string())
}

fn subject_alt_names(cert: &X509Ref) -> Vec<String> {
    let mut names = Vec::new();

    if let Some(san_ext) = cert.subject_alt_names() {
        for name in san_ext {
            if let Some(dns) = name.dnsname() {
                names.push(format!("DNS:{}", dns));
            } else if let Some(ip) = name.ipaddress() {
                let addr = match ip.len() {
                    4 => <[u8; 4]>::try_from(ip).ok().map(std::net::IpAddr::from),
                    16 => <[u8; 16]>::try_from(ip).ok().map(std::net::IpAddr::from),
                    _ => None,
                };
                if let Some(addr) = addr {
                    names.push(format!("IP:{}", addr));
                }
            }
        }
    }

    names
}

fn fingerprint(cert: &X509Ref) -> String {
    match cert.digest(MessageDigest::sha256()) {
        Ok(digest) => digest.iter().map(|b| format!("{:02x}", b)).collect(),
        Err(_) => String::new(),
    }
}

/// Summaries of the peer's certificate chain, leaf first
pub fn peer_chain(ssl: &SslRef) -> Vec<PeerCertificate> {
    let mut chain = Vec::new();

    if let Some(peer_cert) = ssl.peer_certificate() {
        chain.push(PeerCertificate::from_x509(&peer_cert));
    }

    // Client side the chain includes the leaf again
    if let Some(certs) = ssl.peer_cert_chain() {
        for cert in certs {
            let summary = PeerCertificate::from_x509(cert);
            if !chain.contains(&summary) {
                chain.push(summary);
            }
        }
    }

    chain
}
