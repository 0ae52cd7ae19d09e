//! Batch session capture
//!
//! Harvests independent session-state tokens from one server. Attempts run
//! one after another on the calling thread and share a single cache that
//! lives only as long as the call.

use super::cache::SessionCache;
use super::dialer::Dialer;
use super::Error;

/// Tokens from a capture batch, in attempt order, plus the last failure
#[derive(Debug, Default)]
pub struct CaptureResult {
    pub tokens: Vec<String>,
    pub last_error: Option<Error>,
}

impl CaptureResult {
    /// Number of attempts that produced a token
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether every attempt produced a token
    pub fn is_complete(&self) -> bool {
        self.last_error.is_none()
    }

    /// Tokens if at least one was captured, the last error otherwise
    pub fn into_result(self) -> super::Result<Vec<String>> {
        match self.last_error {
            Some(err) if self.tokens.is_empty() => Err(err),
            _ => Ok(self.tokens),
        }
    }
}

impl Dialer {
    /// Handshake with `address` `count` times and serialize every granted
    /// session. Failed attempts are skipped; the last failure is reported
    /// alongside whatever was captured.
    ///
    /// The server's certificate is checked only if the dialer was built with
    /// [`PeerVerification::Verify`](crate::tls::PeerVerification::Verify).
    pub fn capture_session_states(&self, address: &str, count: usize) -> CaptureResult {
        let cache = SessionCache::new();
        let mut result = CaptureResult {
            tokens: Vec::with_capacity(count),
            last_error: None,
        };

        for attempt in 0..count {
            match self.capture_once(address, &cache) {
                Ok(token) => {
                    tracing::debug!(%address, attempt, "captured session state");
                    result.tokens.push(token);
                }
                Err(err) => {
                    tracing::warn!(
                        %address,
                        attempt,
                        error = %err,
                        "session capture attempt failed"
                    );
                    result.last_error = Some(err);
                }
            }
        }

        result
    }

    fn capture_once(&self, address: &str, cache: &SessionCache) -> super::Result<String> {
        let (connection, granted) = self.connect_with_cache(address, None, cache)?;
        if let Err(e) = connection.close() {
            tracing::debug!(%address, error = %e, "error closing capture connection");
        }

        let state = granted.ok_or_else(|| Error::SessionMissing {
            address: address.to_string(),
        })?;
        Ok(self.codec().serialize(&state)?)
    }
}

/// Capture up to `count` tokens for `address` with `dialer`
pub fn capture_session_states(dialer: &Dialer, address: &str, count: usize) -> CaptureResult {
    dialer.capture_session_states(address, count)
}
