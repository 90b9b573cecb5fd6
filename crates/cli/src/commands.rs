//! Command-line surface: subcommands and their translation to
//! [`metadata::MetadataRequest`].

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use metadata::{ExecutionMode, FullName, MetadataPayload, MetadataRequest, MetadataType};
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "metaforce", version, about = "CRUD calls against the Metadata API")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, env = "METAFORCE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured execution mode for this call.
    #[arg(long, global = true, value_enum)]
    pub mode: Option<ModeArg>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Sync,
    Async,
}

impl From<ModeArg> for ExecutionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sync => ExecutionMode::Sync,
            ModeArg::Async => ExecutionMode::Async,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create metadata components.
    Create(SaveArgs),
    /// Update existing metadata components.
    Update(SaveArgs),
    /// Create or update metadata components.
    Upsert(SaveArgs),
    /// Delete metadata components by full name.
    Delete(NamesArgs),
    /// Read metadata components by full name.
    Read(NamesArgs),
    /// Describe a metadata type.
    Describe {
        /// Metadata type, e.g. `apex_page` or `ApexPage`.
        metadata_type: String,
    },
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Metadata type, e.g. `apex_page` or `ApexPage`.
    pub metadata_type: String,

    /// Payload as an inline JSON object. Repeatable.
    #[arg(long = "payload", value_name = "JSON")]
    pub payloads: Vec<String>,

    /// File holding a JSON object or an array of objects.
    #[arg(long, value_name = "PATH")]
    pub payload_file: Option<PathBuf>,

    /// Raw bytes for the `content` field of the single payload.
    #[arg(long, value_name = "PATH")]
    pub content_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct NamesArgs {
    /// Metadata type, e.g. `apex_page` or `ApexPage`.
    pub metadata_type: String,

    /// Full names of the components. May be omitted.
    pub full_names: Vec<String>,
}

impl Command {
    /// Translates the parsed arguments into a request, reading any payload or
    /// content files.
    pub fn into_request(self) -> Result<MetadataRequest> {
        Ok(match self {
            Command::Create(args) => {
                let (metadata_type, payloads) = args.resolve()?;
                MetadataRequest::Create { metadata_type, payloads }
            }
            Command::Update(args) => {
                let (metadata_type, payloads) = args.resolve()?;
                MetadataRequest::Update { metadata_type, payloads }
            }
            Command::Upsert(args) => {
                let (metadata_type, payloads) = args.resolve()?;
                MetadataRequest::Upsert { metadata_type, payloads }
            }
            Command::Delete(args) => {
                let (metadata_type, full_names) = args.resolve()?;
                MetadataRequest::Delete { metadata_type, full_names }
            }
            Command::Read(args) => {
                let (metadata_type, full_names) = args.resolve()?;
                MetadataRequest::Read { metadata_type, full_names }
            }
            Command::Describe { metadata_type } => MetadataRequest::Describe {
                metadata_type: parse_type(&metadata_type)?,
            },
        })
    }
}

impl SaveArgs {
    fn resolve(self) -> Result<(MetadataType, Vec<MetadataPayload>)> {
        let metadata_type = parse_type(&self.metadata_type)?;

        let mut payloads = Vec::new();
        for (index, raw) in self.payloads.iter().enumerate() {
            let value: Value = serde_json::from_str(raw)
                .with_context(|| format!("--payload #{} is not valid JSON", index + 1))?;
            payloads.extend(payloads_from_value(value)?);
        }
        if let Some(path) = &self.payload_file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading payload file {}", path.display()))?;
            let value: Value = serde_json::from_str(&text)
                .with_context(|| format!("parsing payload file {}", path.display()))?;
            payloads.extend(payloads_from_value(value)?);
        }

        if let Some(path) = &self.content_file {
            let bytes = std::fs::read(path)
                .with_context(|| format!("reading content file {}", path.display()))?;
            match payloads.as_mut_slice() {
                [single] => single.set_content(bytes),
                [] => payloads.push(MetadataPayload::new().with_content(bytes)),
                _ => bail!("--content-file requires exactly one payload"),
            }
        }

        if payloads.is_empty() {
            bail!("at least one payload is required (--payload or --payload-file)");
        }
        Ok((metadata_type, payloads))
    }
}

impl NamesArgs {
    fn resolve(self) -> Result<(MetadataType, Vec<FullName>)> {
        let metadata_type = parse_type(&self.metadata_type)?;
        let full_names = self
            .full_names
            .into_iter()
            .map(|name| FullName::new(name).context("full names must not be empty"))
            .collect::<Result<Vec<_>>>()?;
        Ok((metadata_type, full_names))
    }
}

fn parse_type(raw: &str) -> Result<MetadataType> {
    MetadataType::new(raw).with_context(|| format!("invalid metadata type {raw:?}"))
}

fn payloads_from_value(value: Value) -> Result<Vec<MetadataPayload>> {
    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    items
        .into_iter()
        .map(|item| MetadataPayload::from_json(item).context("payloads must be JSON objects"))
        .collect()
}
