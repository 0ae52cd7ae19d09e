//! Client hello profiles
//!
//! A profile is the set of client hello parameters the dialer offers: cipher
//! preferences for TLS 1.2 and TLS 1.3, key exchange groups, ALPN protocols
//! and the protocol version range. The named profiles approximate the hello
//! sent by common browsers as closely as OpenSSL allows.

use super::config::{TlsError, TlsVersion};
use openssl::ssl::{SslContextBuilder, SslOptions};

const BROWSER_TLS13_SUITES: &str =
    "TLS_AES_128_GCM_SHA256:TLS_AES_256_GCM_SHA384:TLS_CHACHA20_POLY1305_SHA256";

const FIREFOX_TLS13_SUITES: &str =
    "TLS_AES_128_GCM_SHA256:TLS_CHACHA20_POLY1305_SHA256:TLS_AES_256_GCM_SHA384";

const CHROME_TLS12_CIPHERS: &str = "ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:\
ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305:\
ECDHE-RSA-AES128-SHA:ECDHE-RSA-AES256-SHA:\
AES128-GCM-SHA256:AES256-GCM-SHA384:AES128-SHA:AES256-SHA";

const FIREFOX_TLS12_CIPHERS: &str = "ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305:\
ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:\
ECDHE-ECDSA-AES256-SHA:ECDHE-ECDSA-AES128-SHA:\
ECDHE-RSA-AES128-SHA:ECDHE-RSA-AES256-SHA:\
AES128-GCM-SHA256:AES256-GCM-SHA384:AES128-SHA:AES256-SHA";

/// Named set of client hello parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHelloProfile {
    name: String,
    cipher_list: Option<String>,
    ciphersuites: Option<String>,
    groups: Option<String>,
    alpn: Vec<String>,
    min_version: TlsVersion,
    max_version: TlsVersion,
}

impl ClientHelloProfile {
    /// Start a custom profile offering TLS 1.2 through TLS 1.3 with OpenSSL's
    /// default preferences
    pub fn custom(name: impl Into<String>) -> Self {
        ClientHelloProfile {
            name: name.into(),
            cipher_list: None,
            ciphersuites: None,
            groups: None,
            alpn: Vec::new(),
            min_version: TlsVersion::Tls12,
            max_version: TlsVersion::Tls13,
        }
    }

    /// Recent Chrome
    pub fn chrome() -> Self {
        Self::custom("chrome")
            .cipher_list(CHROME_TLS12_CIPHERS)
            .ciphersuites(BROWSER_TLS13_SUITES)
            .groups("X25519:P-256:P-384")
            .alpn(&["h2", "http/1.1"])
    }

    /// Recent Firefox
    pub fn firefox() -> Self {
        Self::custom("firefox")
            .cipher_list(FIREFOX_TLS12_CIPHERS)
            .ciphersuites(FIREFOX_TLS13_SUITES)
            .groups("X25519:P-256:P-384:P-521")
            .alpn(&["h2", "http/1.1"])
    }

    /// Whatever the linked OpenSSL offers by default
    pub fn openssl_default() -> Self {
        Self::custom("openssl")
    }

    /// Look up a built-in profile by name (case-insensitive)
    pub fn from_name(name: &str) -> Result<Self, TlsError> {
        match name.to_ascii_lowercase().as_str() {
            "chrome" => Ok(Self::chrome()),
            "firefox" => Ok(Self::firefox()),
            "openssl" | "default" => Ok(Self::openssl_default()),
            _ => Err(TlsError::UnknownProfile(name.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alpn_protocols(&self) -> &[String] {
        &self.alpn
    }

    /// Set cipher list (for TLS <= 1.2)
    pub fn cipher_list(mut self, ciphers: &str) -> Self {
        self.cipher_list = Some(ciphers.to_string());
        self
    }

    /// Set cipher suites (for TLS 1.3)
    pub fn ciphersuites(mut self, ciphers: &str) -> Self {
        self.ciphersuites = Some(ciphers.to_string());
        self
    }

    /// Set supported groups, colon separated (e.g. "X25519:P-256")
    pub fn groups(mut self, groups: &str) -> Self {
        self.groups = Some(groups.to_string());
        self
    }

    /// Set ALPN protocols
    pub fn alpn(mut self, protocols: &[&str]) -> Self {
        self.alpn = protocols.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Set the offered protocol version range
    pub fn version_range(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.min_version = min;
        self.max_version = max;
        self
    }

    /// Encode ALPN protocols in wire format (length-prefixed)
    fn alpn_wire(&self) -> Result<Vec<u8>, TlsError> {
        let mut alpn_bytes = Vec::new();
        for proto in &self.alpn {
            let len = u8::try_from(proto.len())
                .ok()
                .filter(|len| *len > 0)
                .ok_or_else(|| TlsError::InvalidConfig(format!("bad ALPN protocol {:?}", proto)))?;
            alpn_bytes.push(len);
            alpn_bytes.extend_from_slice(proto.as_bytes());
        }
        Ok(alpn_bytes)
    }

    /// Apply the profile to a client context
    pub(crate) fn apply(&self, ctx_builder: &mut SslContextBuilder) -> Result<(), TlsError> {
        if self.min_version > self.max_version {
            return Err(TlsError::InvalidConfig(format!(
                "profile {} has minimum version above maximum",
                self.name
            )));
        }
        ctx_builder.set_min_proto_version(Some(self.min_version.to_openssl_version()))?;
        ctx_builder.set_max_proto_version(Some(self.max_version.to_openssl_version()))?;
        ctx_builder.set_options(SslOptions::NO_COMPRESSION);

        if let Some(ref ciphers) = self.cipher_list {
            ctx_builder.set_cipher_list(ciphers)?;
        }
        if let Some(ref suites) = self.ciphersuites {
            ctx_builder.set_ciphersuites(suites)?;
        }
        if let Some(ref groups) = self.groups {
            ctx_builder.set_groups_list(groups)?;
        }
        if !self.alpn.is_empty() {
            ctx_builder.set_alpn_protos(&self.alpn_wire()?)?;
        }

        Ok(())
    }
}
