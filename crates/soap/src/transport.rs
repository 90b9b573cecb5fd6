//! [`MetadataTransport`] over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use metadata::{CallDescriptor, MetadataTransport, RemoteResponse, SessionContext, TransportError};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{envelope, response};

/// Posts rendered envelopes to the session endpoint with `reqwest`.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct SoapTransport {
    http: reqwest::Client,
}

impl SoapTransport {
    /// Creates a transport with its own HTTP client and a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network {
                message: e.to_string(),
            })?;
        Ok(Self { http })
    }

    /// Creates a transport sharing an existing HTTP client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MetadataTransport for SoapTransport {
    #[instrument(skip_all, fields(operation = %request.operation()))]
    async fn invoke(
        &self,
        session: &SessionContext,
        request: &CallDescriptor,
    ) -> Result<RemoteResponse, TransportError> {
        let envelope = envelope::render_call(session.token(), request)?;
        let body = post_envelope(&self.http, session.endpoint(), envelope).await?;
        Ok(RemoteResponse::new(body))
    }
}

/// Posts one envelope and parses the reply.
///
/// A SOAP fault is reported as a remote application error whatever the HTTP
/// status; any other non-success status is a network failure.
pub(crate) async fn post_envelope(
    http: &reqwest::Client,
    endpoint: &str,
    envelope: String,
) -> Result<Value, TransportError> {
    let network = |e: reqwest::Error| TransportError::Network {
        message: e.to_string(),
    };

    let reply = http
        .post(endpoint)
        .header(CONTENT_TYPE, "text/xml; charset=utf-8")
        .header("SOAPAction", "\"\"")
        .body(envelope)
        .send()
        .await
        .map_err(network)?;
    let status = reply.status();
    let text = reply.text().await.map_err(network)?;
    debug!(%status, bytes = text.len(), "SOAP reply received");

    match response::parse_response(&text) {
        Ok(_) | Err(TransportError::Protocol { .. }) if !status.is_success() => {
            Err(TransportError::Network {
                message: format!("HTTP {status} from {endpoint}: {}", body_excerpt(&text)),
            })
        }
        other => other,
    }
}

/// Longest body prefix carried in a network error message.
const BODY_EXCERPT_CHARS: usize = 200;

fn body_excerpt(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
