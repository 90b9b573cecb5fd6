//! Port traits consumed by the job core.
//!
//! The domain needs exactly two things from the outside world:
//!
//! - [`MetadataTransport`]: deliver one [`CallDescriptor`] and return the
//!   structured response. Endpoint resolution, wire serialisation, and the
//!   HTTP stack live behind it.
//! - [`SessionProvider`]: supply the endpoint and credential for the next
//!   call. Login and refresh live behind it.
//!
//! Both are shared across arbitrarily many jobs as `Arc<dyn ...>`. The core
//! performs no locking around them; implementations must be `Send + Sync`.

use async_trait::async_trait;

use crate::{CallDescriptor, RemoteResponse, TransportError};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Endpoint and credential passed through to every transport invocation.
///
/// Opaque to the core: it is never constructed, inspected, or refreshed here.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    endpoint: String,
    token: String,
}

impl SessionContext {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    /// URL the transport posts calls to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Session credential. Never log this value.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Source of the session used for each invocation.
pub trait SessionProvider: Send + Sync {
    /// Returns the context for the next call.
    fn session_context(&self) -> SessionContext;
}

/// A fixed, pre-established session.
impl SessionProvider for SessionContext {
    fn session_context(&self) -> SessionContext {
        self.clone()
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Delivers call descriptors to the remote service.
///
/// Both network failures and remote rejections are reported as
/// [`TransportError`] and captured by the job unmodified.
#[async_trait]
pub trait MetadataTransport: Send + Sync {
    /// Performs one remote call.
    ///
    /// Implementations must render the descriptor's [`crate::TypeTag`], if
    /// any, as the schema-type attribute of the tagged elements.
    async fn invoke(
        &self,
        session: &SessionContext,
        request: &CallDescriptor,
    ) -> Result<RemoteResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_debug_redacts_token() {
        let session = SessionContext::new("https://example.invalid/m/62.0", "00D!secret");
        let rendered = format!("{session:?}");
        assert!(rendered.contains("https://example.invalid/m/62.0"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn static_session_returns_itself() {
        let session = SessionContext::new("https://a", "t");
        assert_eq!(session.session_context(), session);
    }
}
