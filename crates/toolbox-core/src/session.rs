//! Shared HTTP session with an explicit close

use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, ToolboxError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP session shared by a client and every tool it loads.
///
/// Clones share state: closing any clone closes them all.
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    http: Client,
    closed: AtomicBool,
}

impl Session {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::from_client(http))
    }

    pub fn from_client(http: Client) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                http,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Marks the session closed. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let closed = !self.inner.closed.swap(true, Ordering::SeqCst);
        if closed {
            tracing::debug!("toolbox session closed");
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn http(&self) -> Result<&Client> {
        if self.is_closed() {
            return Err(ToolboxError::SessionClosed);
        }
        Ok(&self.inner.http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_is_idempotent() {
        let session = Session::new().unwrap();
        let shared = session.clone();

        assert!(session.close());
        assert!(!session.close());
        assert!(!shared.close());
        assert!(shared.is_closed());
    }

    #[test]
    fn test_closed_session_refuses_requests() {
        let session = Session::new().unwrap();
        session.close();

        assert!(matches!(session.http(), Err(ToolboxError::SessionClosed)));
    }
}
