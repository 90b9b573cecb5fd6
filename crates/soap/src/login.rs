//! Session establishment through the partner API `login` call.
//!
//! The password sent is the account password with the security token, if
//! any, appended. The resulting session id and metadata server URL form the
//! [`SessionContext`] every metadata call is made with.

use metadata::{SessionContext, TransportError};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, instrument};

use crate::envelope::{self, PARTNER};
use crate::transport::post_envelope;

/// Errors from [`SoapLogin::login`].
#[derive(Debug, Error)]
pub enum LoginError {
    /// The login call failed in transit or was rejected (bad credentials,
    /// locked account, ...).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The login succeeded but the result lacked a required field.
    #[error("Unexpected login response: {message}")]
    UnexpectedResponse { message: String },
}

/// Username, password, and optional security token.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub security_token: Option<String>,
}

impl Credentials {
    fn combined_password(&self) -> String {
        format!(
            "{}{}",
            self.password,
            self.security_token.as_deref().unwrap_or_default()
        )
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("security_token", &self.security_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Result of a successful login.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub metadata_server_url: String,
    pub server_url: String,
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl LoginResult {
    /// Session for metadata calls: the metadata server URL plus session id.
    pub fn session_context(&self) -> SessionContext {
        SessionContext::new(&self.metadata_server_url, &self.session_id)
    }
}

impl std::fmt::Debug for LoginResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResult")
            .field("metadata_server_url", &self.metadata_server_url)
            .field("server_url", &self.server_url)
            .field("session_id", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Partner API login client.
#[derive(Debug, Clone)]
pub struct SoapLogin {
    http: reqwest::Client,
    login_url: String,
    api_version: String,
}

impl SoapLogin {
    /// `login_url` is the instance or login host (e.g.
    /// `https://login.salesforce.com`); `api_version` is e.g. `"62.0"`.
    pub fn new(
        http: reqwest::Client,
        login_url: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            http,
            login_url: login_url.into(),
            api_version: api_version.into(),
        }
    }

    /// The partner SOAP endpoint the login call is posted to.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/services/Soap/u/{}",
            self.login_url.trim_end_matches('/'),
            self.api_version
        )
    }

    /// Performs the login call.
    #[instrument(skip_all, fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResult, LoginError> {
        let envelope = render_login(credentials)?;
        let body = post_envelope(&self.http, &self.endpoint(), envelope).await?;
        let result: LoginResult =
            serde_json::from_value(body).map_err(|e| LoginError::UnexpectedResponse {
                message: e.to_string(),
            })?;
        info!(metadata_server_url = %result.metadata_server_url, "Logged in");
        Ok(result)
    }
}

fn render_login(credentials: &Credentials) -> Result<String, TransportError> {
    let body = json!({
        "username": credentials.username,
        "password": credentials.combined_password(),
    });
    envelope::render(PARTNER, None, "login", &body, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(token: Option<&str>) -> Credentials {
        Credentials {
            username: "user@example.com".to_string(),
            password: "pass".to_string(),
            security_token: token.map(str::to_string),
        }
    }

    #[test]
    fn security_token_is_appended_to_password() {
        assert_eq!(credentials(Some("TOKEN")).combined_password(), "passTOKEN");
        assert_eq!(credentials(None).combined_password(), "pass");
    }

    #[test]
    fn login_envelope_uses_partner_namespace() {
        let xml = render_login(&credentials(Some("T"))).unwrap();
        assert!(xml.contains("xmlns:urn=\"urn:partner.soap.sforce.com\""));
        assert!(xml.contains(
            "<urn:login><urn:username>user@example.com</urn:username>\
             <urn:password>passT</urn:password></urn:login>"
        ));
        assert!(!xml.contains("SessionHeader"));
    }

    #[test]
    fn endpoint_joins_host_and_version() {
        let login = SoapLogin::new(reqwest::Client::new(), "https://login.salesforce.com/", "62.0");
        assert_eq!(
            login.endpoint(),
            "https://login.salesforce.com/services/Soap/u/62.0"
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", credentials(Some("TOKEN")));
        assert!(!rendered.contains("pass\""));
        assert!(!rendered.contains("TOKEN"));

        let result = LoginResult {
            metadata_server_url: "https://na1/m".to_string(),
            server_url: "https://na1/u".to_string(),
            session_id: "00D!abc".to_string(),
            user_id: None,
        };
        assert!(!format!("{result:?}").contains("00D!abc"));
        assert_eq!(result.session_context().token(), "00D!abc");
        assert_eq!(result.session_context().endpoint(), "https://na1/m");
    }
}
