//! Resumable dialer
//!
//! Opens a TCP connection, runs a TLS handshake with the configured client
//! hello profile (optionally presenting a prior session) and hands back the
//! connection together with whatever session state the handshake produced.

use super::cache::{slot_index, store_new_session, CacheSlot, SessionCache};
use super::codec::SessionCodec;
use super::state::{detach, SessionState};
use super::{Error, HandshakeFailure, Result};
use crate::tls::handshake;
use crate::tls::{ClientConfig, PeerVerification, ResumptionPolicy, TlsConnection, TlsError};
use openssl::ex_data::Index;
use openssl::ssl::{Ssl, SslContext, SslSessionCacheMode, SslStream};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

/// TLS client that captures and presents session state
pub struct Dialer {
    config: ClientConfig,
    ctx: SslContext,
    slot_index: Index<Ssl, CacheSlot>,
    codec: SessionCodec,
}

impl Dialer {
    /// Build a dialer; tokens use the canonical record layout unless
    /// [`Dialer::with_codec`] says otherwise
    pub fn new(config: ClientConfig) -> std::result::Result<Self, TlsError> {
        let slot_index = slot_index()?;

        let mut ctx_builder = config.context_builder()?;
        // Sessions only ever land in the per-call cache handed to connect
        ctx_builder.set_session_cache_mode(
            SslSessionCacheMode::CLIENT | SslSessionCacheMode::NO_INTERNAL,
        );
        ctx_builder.set_new_session_callback(move |ssl, session| {
            store_new_session(slot_index, ssl, session)
        });

        Ok(Dialer {
            config,
            ctx: ctx_builder.build(),
            slot_index,
            codec: SessionCodec::default(),
        })
    }

    /// Use `codec` for tokens produced by batch capture
    pub fn with_codec(mut self, codec: SessionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    /// Connect to `address`, presenting `prior` for resumption if given
    pub fn connect(
        &self,
        address: &str,
        prior: Option<&SessionState>,
    ) -> Result<(TlsConnection, Option<SessionState>)> {
        self.connect_with_cache(address, prior, &SessionCache::new())
    }

    /// Like [`Dialer::connect`], reading the granted session back through
    /// `cache`. Any entry already stored for `address` is discarded first.
    pub fn connect_with_cache(
        &self,
        address: &str,
        prior: Option<&SessionState>,
        cache: &SessionCache,
    ) -> Result<(TlsConnection, Option<SessionState>)> {
        let span = tracing::debug_span!("tls_dial", %address, resume = prior.is_some());
        let _enter = span.enter();

        cache.take(address);

        let tcp_stream = self.open_transport(address)?;
        let ssl = self
            .prepare_ssl(address, prior, cache)
            .map_err(|source| Error::Setup {
                address: address.to_string(),
                source,
            })?;

        let mut stream = handshake::connect(ssl, tcp_stream).map_err(|e| Error::Handshake {
            address: address.to_string(),
            cause: HandshakeFailure::Tls(e),
        })?;

        if prior.is_some() && !stream.ssl().session_reused() {
            match self.config.resumption() {
                ResumptionPolicy::Require => {
                    let _ = stream.shutdown();
                    return Err(Error::Handshake {
                        address: address.to_string(),
                        cause: HandshakeFailure::ResumptionRejected,
                    });
                }
                ResumptionPolicy::Prefer => {
                    tracing::debug!("server declined resumption, continuing with full handshake")
                }
            }
        }

        self.collect_ticket(&mut stream, address, cache);

        let granted = cache.take(address).or_else(|| {
            // A resumed TLS 1.2 session is not reported as new; hand back a
            // copy of the one that was echoed
            let ssl = stream.ssl();
            if !ssl.session_reused() {
                return None;
            }
            match ssl.session().map(detach).transpose() {
                Ok(session) => session.map(SessionState::from_session),
                Err(e) => {
                    tracing::debug!(error = %e, "unable to copy resumed session");
                    None
                }
            }
        });

        let connection = TlsConnection::new(stream);
        tracing::debug!(
            version = %connection.info().version,
            resumed = connection.did_resume(),
            granted = granted.is_some(),
            "handshake complete"
        );

        Ok((connection, granted))
    }

    /// TLS 1.3 tickets follow the handshake; give them a moment to arrive
    fn collect_ticket(
        &self,
        stream: &mut SslStream<TcpStream>,
        address: &str,
        cache: &SessionCache,
    ) {
        let Some(wait) = self.config.ticket_wait else {
            return;
        };
        if !handshake::tickets_follow_handshake(stream) || cache.contains(address) {
            return;
        }
        if let Err(e) = handshake::await_ticket(stream, wait, || cache.contains(address)) {
            tracing::debug!(error = %e, "unable to wait for session ticket");
        }
    }

    fn prepare_ssl(
        &self,
        address: &str,
        prior: Option<&SessionState>,
        cache: &SessionCache,
    ) -> std::result::Result<Ssl, TlsError> {
        let mut ssl = Ssl::new(&self.ctx)?;

        if let Some(servername) = self.config.servername_for(address) {
            ssl.set_hostname(&servername)?;
            if *self.config.verification() == PeerVerification::Verify {
                ssl.param_mut().set_host(&servername)?;
            }
        }

        ssl.set_ex_data(
            self.slot_index,
            CacheSlot {
                cache: cache.clone(),
                address: address.to_string(),
            },
        );

        if let Some(prior) = prior {
            // Each handshake gets its own copy so a connection dropped without
            // close_notify cannot mark the caller's state not resumable
            let session = detach(prior.session())?;
            // SAFETY: `session` was just decoded, is referenced by nothing but
            // this connection and sits in no context's session cache.
            unsafe { ssl.set_session(&session)? };
        }

        Ok(ssl)
    }

    /// Resolve `address` and connect to the first address that accepts
    fn open_transport(&self, address: &str) -> Result<TcpStream> {
        let dial_error = |source: io::Error| Error::Dial {
            address: address.to_string(),
            source,
        };

        let candidates = address.to_socket_addrs().map_err(dial_error)?;
        let mut last_error = None;
        for candidate in candidates {
            match self.connect_socket(&candidate) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!(%candidate, error = %e, "connect failed");
                    last_error = Some(e);
                }
            }
        }

        Err(dial_error(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
        })))
    }

    fn connect_socket(&self, addr: &SocketAddr) -> io::Result<TcpStream> {
        let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nodelay(true)?;

        let target = SockAddr::from(*addr);
        match self.config.connect_timeout {
            Some(timeout) => socket.connect_timeout(&target, timeout)?,
            None => socket.connect(&target)?,
        }

        Ok(socket.into())
    }
}

impl std::fmt::Debug for Dialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialer")
            .field("config", &self.config)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
