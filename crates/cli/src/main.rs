//! Metaforce CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load `metaforce.toml` (or `--config`), apply
//!    `METAFORCE_*` environment overrides, and validate it.
//! 2. **Wire observability**: install the `tracing-subscriber` stack from
//!    [`telemetry`]. All spans and events emitted by the workspace flow
//!    through it.
//! 3. **Construct infrastructure**: build the shared `reqwest` client, the
//!    [`soap::SoapTransport`], and a session (either the configured
//!    pre-established session or a fresh [`soap::SoapLogin`]).
//! 4. **Run one job**: translate the subcommand into a
//!    [`metadata::MetadataRequest`], execute it through
//!    [`metadata::MetadataClient`], poll it to completion when async, and print
//!    the result as JSON on stdout.

mod commands;
mod config;
mod telemetry;
mod wait;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use metadata::{ExecutionMode, MetadataClient, SessionContext};
use soap::{Credentials, SoapLogin, SoapTransport};
use tracing::info;

use crate::commands::Cli;
use crate::config::{CliConfig, SalesforceConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;
    let _telemetry = telemetry::init(&config.logging)?;

    let http = reqwest::Client::builder()
        .timeout(config.salesforce.request_timeout())
        .build()
        .context("building HTTP client")?;
    let session = establish_session(&http, &config.salesforce).await?;

    let client = MetadataClient::new(
        Arc::new(SoapTransport::with_client(http)),
        Arc::new(session),
    )
    .with_policy(config.execution);

    let request = cli.command.into_request()?;
    let verb = request.verb();
    let mode = cli
        .mode
        .map(ExecutionMode::from)
        .unwrap_or_else(|| client.policy().mode_for(verb));
    let mut job = client.job_with_mode(request, mode);
    info!(job_id = %job.id(), %verb, %mode, "Submitting metadata job");

    job.execute().await?;
    if mode == ExecutionMode::Async {
        wait::wait_for_completion(&mut job, &config.polling).await?;
    }

    let response = job.into_result()?;
    println!("{}", serde_json::to_string_pretty(response.body())?);
    Ok(())
}

/// Uses the configured session when present, otherwise logs in with the
/// configured credentials.
async fn establish_session(
    http: &reqwest::Client,
    config: &SalesforceConfig,
) -> Result<SessionContext> {
    if let (Some(token), Some(endpoint)) = (&config.session_id, &config.metadata_url) {
        return Ok(SessionContext::new(endpoint, token));
    }

    let (Some(username), Some(password)) = (&config.username, &config.password) else {
        bail!(
            "no session configured: set salesforce.session_id and salesforce.metadata_url, \
             or provide a username and password"
        );
    };
    let credentials = Credentials {
        username: username.clone(),
        password: password.clone(),
        security_token: config.security_token.clone(),
    };
    let login = SoapLogin::new(http.clone(), &config.login_url, &config.api_version);
    let result = login
        .login(&credentials)
        .await
        .with_context(|| format!("logging in to {}", login.endpoint()))?;
    Ok(result.session_context())
}
