//! TLS configuration
//!
//! This module provides configuration builders for the dialing client and for
//! the ticket-granting server used to stage sessions.

use super::profile::ClientHelloProfile;
use openssl::ssl::{
    SslContext, SslContextBuilder, SslMethod, SslOptions, SslSessionCacheMode, SslVerifyMode,
    SslVersion,
};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default time to wait for a TLS 1.3 session ticket after the handshake
pub const DEFAULT_TICKET_WAIT: Duration = Duration::from_millis(250);

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Parse TLS version from string (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self, TlsError> {
        match s.to_uppercase().as_str() {
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::InvalidVersion(s.to_string())),
        }
    }

    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> SslVersion {
        match self {
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Wire value of the protocol version (e.g. 0x0303 for TLS 1.2)
    pub fn wire_value(&self) -> u16 {
        match self {
            TlsVersion::Tls10 => 0x0301,
            TlsVersion::Tls11 => 0x0302,
            TlsVersion::Tls12 => 0x0303,
            TlsVersion::Tls13 => 0x0304,
        }
    }

    /// Get version as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

/// How the client treats the server's certificate.
///
/// Has no default; [`ClientConfig::builder`] takes it as an argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerVerification {
    /// Accept any certificate the server presents
    Skip,
    /// Verify the chain against the system roots and the SNI hostname
    Verify,
}

/// What to do when the server declines a presented session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumptionPolicy {
    /// Report a declined resumption as a handshake failure
    #[default]
    Require,
    /// Accept the full handshake the server fell back to
    Prefer,
}

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown client hello profile: {0}")]
    UnknownProfile(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
}

/// Client configuration used by the resumable dialer
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) profile: ClientHelloProfile,
    pub(crate) verification: PeerVerification,
    pub(crate) servername: Option<String>,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) ticket_wait: Option<Duration>,
    pub(crate) resumption: ResumptionPolicy,
}

impl ClientConfig {
    /// Create a new client configuration builder
    pub fn builder(verification: PeerVerification) -> ClientConfigBuilder {
        ClientConfigBuilder::new(verification)
    }

    /// The client hello profile in use
    pub fn profile(&self) -> &ClientHelloProfile {
        &self.profile
    }

    /// The peer verification mode
    pub fn verification(&self) -> &PeerVerification {
        &self.verification
    }

    /// The resumption policy
    pub fn resumption(&self) -> ResumptionPolicy {
        self.resumption
    }

    /// SNI to send for `address`: the explicit override, else the host part
    /// of the address unless it is an IP literal.
    pub fn servername_for(&self, address: &str) -> Option<String> {
        if let Some(ref name) = self.servername {
            return Some(name.clone());
        }
        let host = host_part(address);
        if host.is_empty() || host.parse::<std::net::IpAddr>().is_ok() {
            None
        } else {
            Some(host.to_string())
        }
    }

    /// Build the OpenSSL context for this configuration
    pub(crate) fn context_builder(&self) -> Result<SslContextBuilder, TlsError> {
        let mut ctx_builder = SslContextBuilder::new(SslMethod::tls_client())?;

        match self.verification {
            PeerVerification::Skip => ctx_builder.set_verify(SslVerifyMode::NONE),
            PeerVerification::Verify => {
                ctx_builder.set_default_verify_paths()?;
                ctx_builder.set_verify(SslVerifyMode::PEER);
            }
        }

        self.profile.apply(&mut ctx_builder)?;
        Ok(ctx_builder)
    }
}

/// Strip the port (and IPv6 brackets) from a `host:port` address
fn host_part(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => address,
    }
}

/// Client configuration builder
pub struct ClientConfigBuilder {
    profile: ClientHelloProfile,
    verification: PeerVerification,
    servername: Option<String>,
    connect_timeout: Option<Duration>,
    ticket_wait: Option<Duration>,
    resumption: ResumptionPolicy,
}

impl ClientConfigBuilder {
    fn new(verification: PeerVerification) -> Self {
        ClientConfigBuilder {
            profile: ClientHelloProfile::chrome(),
            verification,
            servername: None,
            connect_timeout: None,
            ticket_wait: Some(DEFAULT_TICKET_WAIT),
            resumption: ResumptionPolicy::default(),
        }
    }

    /// Set the client hello profile
    pub fn profile(mut self, profile: ClientHelloProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Select a client hello profile by name
    pub fn profile_name(mut self, name: &str) -> Result<Self, TlsError> {
        self.profile = ClientHelloProfile::from_name(name)?;
        Ok(self)
    }

    /// Override the SNI servername derived from the dialed address
    pub fn servername(mut self, name: impl Into<String>) -> Self {
        self.servername = Some(name.into());
        self
    }

    /// Bound TCP connection establishment (unbounded by default)
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// How long to wait for a TLS 1.3 ticket after the handshake; `None`
    /// disables waiting
    pub fn ticket_wait(mut self, wait: Option<Duration>) -> Self {
        self.ticket_wait = wait.filter(|d| !d.is_zero());
        self
    }

    /// Set the resumption policy
    pub fn resumption(mut self, policy: ResumptionPolicy) -> Self {
        self.resumption = policy;
        self
    }

    /// Build the client configuration
    pub fn build(self) -> Result<ClientConfig, TlsError> {
        if matches!(self.connect_timeout, Some(t) if t.is_zero()) {
            return Err(TlsError::InvalidConfig(
                "connect timeout must be non-zero".to_string(),
            ));
        }

        Ok(ClientConfig {
            profile: self.profile,
            verification: self.verification,
            servername: self.servername,
            connect_timeout: self.connect_timeout,
            ticket_wait: self.ticket_wait,
            resumption: self.resumption,
        })
    }
}

/// Server configuration (immutable after building)
///
/// A single `ServerConfig` owns one ticket key, so every connection accepted
/// through it can resume sessions issued by any other.
#[derive(Clone)]
pub struct ServerConfig {
    pub(crate) ctx: SslContext,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Accept a client connection with TLS
    pub fn accept(
        &self,
        stream: std::net::TcpStream,
    ) -> Result<super::TlsConnection, TlsError> {
        super::handshake::accept(&self.ctx, stream)
    }
}

/// Server configuration builder
pub struct ServerConfigBuilder {
    min_version: Option<TlsVersion>,
    max_version: Option<TlsVersion>,
    cipher_list: Option<String>,
    ciphersuites: Option<String>,
    cert_file: Option<PathBuf>,
    session_tickets: bool,
    session_cache: bool,
}

impl ServerConfigBuilder {
    fn new() -> Self {
        ServerConfigBuilder {
            min_version: None,
            max_version: None,
            cipher_list: None,
            ciphersuites: None,
            cert_file: None,
            session_tickets: true,
            session_cache: true,
        }
    }

    /// Set TLS version (both min and max)
    pub fn version(self, version: TlsVersion) -> Self {
        self.version_range(version, version)
    }

    /// Set TLS version range
    pub fn version_range(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.min_version = Some(min);
        self.max_version = Some(max);
        self
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

    /// Load the server certificate and key from a PEM bundle
    pub fn cert_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cert_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Issue session tickets (TLS 1.2 tickets and TLS 1.3 NewSessionTicket)
    pub fn session_tickets(mut self, enabled: bool) -> Self {
        self.session_tickets = enabled;
        self
    }

    /// Keep a server-side session cache (session-id resumption)
    pub fn session_cache(mut self, enabled: bool) -> Self {
        self.session_cache = enabled;
        self
    }

    /// Build the server configuration
    pub fn build(self) -> Result<ServerConfig, TlsError> {
        if let (Some(min), Some(max)) = (self.min_version, self.max_version) {
            if min > max {
                return Err(TlsError::InvalidConfig(format!(
                    "minimum version {} is above maximum {}",
                    min.as_str(),
                    max.as_str()
                )));
            }
        }

        let mut ctx_builder = SslContextBuilder::new(SslMethod::tls_server())?;
        ctx_builder.set_min_proto_version(self.min_version.map(|v| v.to_openssl_version()))?;
        ctx_builder.set_max_proto_version(self.max_version.map(|v| v.to_openssl_version()))?;

        if let Some(ref ciphers) = self.cipher_list {
            ctx_builder.set_cipher_list(ciphers)?;
        }
        if let Some(ref ciphers) = self.ciphersuites {
            ctx_builder.set_ciphersuites(ciphers)?;
        }

        let cert_pem = match self.cert_file {
            Some(ref path) => {
                let mut pem = Vec::new();
                File::open(path)?.read_to_end(&mut pem)?;
                pem
            }
            None => super::builtin_cert::BUILTIN_CERT.as_bytes().to_vec(),
        };
        load_cert_and_key(&mut ctx_builder, &cert_pem)?;

        if !self.session_tickets {
            ctx_builder.set_options(SslOptions::NO_TICKET);
            ctx_builder.set_num_tickets(0)?;
        }
        if !self.session_cache {
            ctx_builder.set_session_cache_mode(SslSessionCacheMode::OFF);
        }

        Ok(ServerConfig {
            ctx: ctx_builder.build(),
        })
    }
}

fn load_cert_and_key(ctx_builder: &mut SslContextBuilder, pem: &[u8]) -> Result<(), TlsError> {
    use openssl::pkey::PKey;
    use openssl::x509::X509;

    let cert = X509::from_pem(pem)
        .map_err(|e| TlsError::Certificate(format!("Failed to load certificate: {}", e)))?;
    ctx_builder.set_certificate(&cert)?;

    let key = PKey::private_key_from_pem(pem)
        .map_err(|e| TlsError::Certificate(format!("Failed to load private key: {}", e)))?;
    ctx_builder.set_private_key(&key)?;
    ctx_builder.check_private_key()?;

    Ok(())
}
