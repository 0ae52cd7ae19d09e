//! TLS handshake helpers
//!
//! The handshake itself is driven by `Ssl::connect()` / `Ssl::accept()`. This
//! module turns their errors into forms that don't hold on to the socket and
//! picks up TLS 1.3 session tickets that arrive after the handshake.

use super::config::TlsError;
use super::connection::TlsConnection;
use openssl::ssl::{ErrorCode, HandshakeError, Ssl, SslContextRef, SslStream, SslVersion};
use std::net::TcpStream;
use std::time::{Duration, Instant};

/// Slice of the ticket wait spent in each read attempt
const TICKET_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Drop the half-finished stream (closing the socket) and keep the error
pub fn into_ssl_error(err: HandshakeError<TcpStream>) -> openssl::ssl::Error {
    match err {
        HandshakeError::SetupFailure(stack) => stack.into(),
        HandshakeError::Failure(mid) | HandshakeError::WouldBlock(mid) => mid.into_error(),
    }
}

/// Run the client side of the handshake
pub fn connect(
    ssl: Ssl,
    tcp_stream: TcpStream,
) -> Result<SslStream<TcpStream>, openssl::ssl::Error> {
    ssl.connect(tcp_stream).map_err(into_ssl_error)
}

/// Run the server side of the handshake
pub fn accept(ctx: &SslContextRef, tcp_stream: TcpStream) -> Result<TlsConnection, TlsError> {
    let ssl = Ssl::new(ctx)?;
    let stream = ssl
        .accept(tcp_stream)
        .map_err(|e| TlsError::HandshakeFailed(format!("Accept failed: {}", into_ssl_error(e))))?;
    Ok(TlsConnection::new(stream))
}

/// Whether the session ticket, if any, can only arrive after the handshake
pub fn tickets_follow_handshake(stream: &SslStream<TcpStream>) -> bool {
    stream.ssl().version2() == Some(SslVersion::TLS1_3)
}

/// Read post-handshake records until `arrived` reports a ticket or `wait`
/// elapses. Application data is only peeked, never consumed.
pub fn await_ticket<F>(
    stream: &mut SslStream<TcpStream>,
    wait: Duration,
    arrived: F,
) -> std::io::Result<()>
where
    F: Fn() -> bool,
{
    let previous_timeout = stream.get_ref().read_timeout()?;
    let deadline = Instant::now() + wait;
    let mut probe = [0u8; 1];

    let outcome = loop {
        if arrived() {
            break Ok(());
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break Ok(());
        }
        let slice = remaining.min(TICKET_POLL_INTERVAL);
        if let Err(e) = stream.get_ref().set_read_timeout(Some(slice)) {
            break Err(e);
        }
        match stream.ssl_peek(&mut probe) {
            // Application data or EOF; a ticket would have come before either
            Ok(_) => break Ok(()),
            Err(e) if e.code() == ErrorCode::WANT_READ => continue,
            Err(e) if e.code() == ErrorCode::ZERO_RETURN => break Ok(()),
            Err(e) => {
                tracing::debug!(error = %e, "stopped waiting for session ticket");
                break Ok(());
            }
        }
    };

    stream.get_ref().set_read_timeout(previous_timeout)?;
    outcome
}
