//! Established TLS connections
//!
//! A `TlsConnection` wraps an OpenSSL stream over TCP once the handshake is
//! done. It is returned by the dialer on the client side and by
//! `ServerConfig::accept` on the server side.

use super::info::ConnectionInfo;
use crate::resumption::state::detach;
use crate::resumption::SessionState;
use openssl::ssl::{ShutdownState, SslStream};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

/// An established TLS connection
pub struct TlsConnection {
    stream: SslStream<TcpStream>,
    info: ConnectionInfo,
}

impl TlsConnection {
    pub(crate) fn new(stream: SslStream<TcpStream>) -> Self {
        let info = ConnectionInfo::from_ssl(stream.ssl());
        TlsConnection { stream, info }
    }

    /// Negotiated parameters
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Whether this connection resumed a previous session
    pub fn did_resume(&self) -> bool {
        self.info.session_reused
    }

    /// Copy of the session currently attached to the connection, if any
    pub fn session(&self) -> Option<SessionState> {
        let session = self.stream.ssl().session()?;
        detach(session).ok().map(SessionState::from_session)
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.get_ref().peer_addr()
    }

    /// Get reference to underlying TCP stream
    pub fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }

    /// Send close_notify and shut the TCP connection down
    pub fn close(mut self) -> io::Result<()> {
        // The peer may already be gone; the TCP shutdown below still releases
        // the descriptor state.
        let _ = self.stream.shutdown();

        match self.stream.get_mut().shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl Drop for TlsConnection {
    fn drop(&mut self) {
        // Without a close_notify OpenSSL treats the session as bad
        if !self.stream.get_shutdown().contains(ShutdownState::SENT) {
            let _ = self.stream.shutdown();
        }
    }
}

impl Read for TlsConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TlsConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl std::fmt::Debug for TlsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnection")
            .field("peer", &self.stream.get_ref().peer_addr().ok())
            .field("info", &self.info)
            .finish()
    }
}
