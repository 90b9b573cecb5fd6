//! Shared value types for the metadata domain.
//!
//! Unlike the identifiers in [`crate::identifiers`], these types carry
//! structure: payload fields, call descriptors, remote responses, and the
//! status of asynchronous remote operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{MetadataType, TrackingHandle};

// ---------------------------------------------------------------------------
// Verbs, operations, and execution modes
// ---------------------------------------------------------------------------

/// The closed set of metadata verbs exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Create,
    Read,
    Update,
    Upsert,
    Delete,
    Describe,
}

impl Verb {
    /// Every verb, in declaration order.
    pub const ALL: [Verb; 6] = [
        Verb::Create,
        Verb::Read,
        Verb::Update,
        Verb::Upsert,
        Verb::Delete,
        Verb::Describe,
    ];

    /// Returns the remote operation this verb dispatches to.
    pub fn operation(self) -> Operation {
        match self {
            Verb::Create => Operation::CreateMetadata,
            Verb::Read => Operation::ReadMetadata,
            Verb::Update => Operation::UpdateMetadata,
            Verb::Upsert => Operation::UpsertMetadata,
            Verb::Delete => Operation::DeleteMetadata,
            Verb::Describe => Operation::Describe,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Read => "read",
            Verb::Update => "update",
            Verb::Upsert => "upsert",
            Verb::Delete => "delete",
            Verb::Describe => "describe",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote operation, named the way the remote service names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    CreateMetadata,
    ReadMetadata,
    UpdateMetadata,
    UpsertMetadata,
    DeleteMetadata,
    Describe,
    /// Status query for asynchronous operations, keyed by tracking handle.
    CheckStatus,
}

impl Operation {
    /// Returns the operation name sent on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Operation::CreateMetadata => "createMetadata",
            Operation::ReadMetadata => "readMetadata",
            Operation::UpdateMetadata => "updateMetadata",
            Operation::UpsertMetadata => "upsertMetadata",
            Operation::DeleteMetadata => "deleteMetadata",
            Operation::Describe => "describe",
            Operation::CheckStatus => "checkStatus",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// How a [`crate::Job`] interprets the response to its call.
///
/// Chosen per call at construction time; see [`crate::ExecutionPolicy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// The response is the result.
    #[default]
    Sync,
    /// The response carries a tracking handle; the result is obtained by polling.
    Async,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Sync => f.write_str("sync"),
            ExecutionMode::Async => f.write_str("async"),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// One field value of a [`MetadataPayload`].
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadField {
    /// A structured value passed to the transport as-is.
    Value(Value),
    /// Raw bytes of the distinguished `content` field. Never sent untransformed.
    Content(Vec<u8>),
}

/// An ordered mapping from field name to value describing one metadata
/// component.
///
/// Field order is preserved because the remote schema validates element
/// sequence. The `content` field is distinguished: it holds raw bytes which
/// the request builder base64-encodes before the payload reaches the
/// transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPayload {
    fields: Vec<(String, PayloadField)>,
}

impl MetadataPayload {
    /// Name of the distinguished raw-bytes field.
    pub const CONTENT_FIELD: &'static str = "content";

    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`MetadataPayload::insert`].
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Builder-style [`MetadataPayload::set_content`].
    #[must_use]
    pub fn with_content(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.set_content(bytes);
        self
    }

    /// Sets a field, replacing an existing value in place.
    ///
    /// A string assigned to `content` is stored as raw bytes.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let field = match value.into() {
            Value::String(text) if name == Self::CONTENT_FIELD => {
                PayloadField::Content(text.into_bytes())
            }
            other => PayloadField::Value(other),
        };
        self.put(name, field);
    }

    /// Sets the raw bytes of the `content` field.
    pub fn set_content(&mut self, bytes: impl Into<Vec<u8>>) {
        self.put(
            Self::CONTENT_FIELD.to_string(),
            PayloadField::Content(bytes.into()),
        );
    }

    fn put(&mut self, name: String, field: PayloadField) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = field,
            None => self.fields.push((name, field)),
        }
    }

    /// Returns the field stored under `name`.
    pub fn get(&self, name: &str) -> Option<&PayloadField> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Returns the raw bytes of the `content` field, if present.
    pub fn content(&self) -> Option<&[u8]> {
        match self.get(Self::CONTENT_FIELD) {
            Some(PayloadField::Content(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Iterates over fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &PayloadField)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds a payload from a JSON object, keeping key order.
    ///
    /// Returns `None` for any value that is not an object. A string `content`
    /// key becomes the raw-bytes field.
    pub fn from_json(value: Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };
        let mut payload = Self::new();
        for (name, value) in map {
            payload.insert(name, value);
        }
        Some(payload)
    }

    pub(crate) fn into_fields(self) -> Vec<(String, PayloadField)> {
        self.fields
    }
}

// ---------------------------------------------------------------------------
// Call descriptors
// ---------------------------------------------------------------------------

/// Namespace-qualified schema-type attribute for polymorphic payloads.
///
/// The transport serializer renders it as `xsi:type="tns:<Type>"` on each
/// tagged element so the remote schema validator knows the concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeTag {
    metadata_type: MetadataType,
}

impl TypeTag {
    /// Qualified name of the attribute carrying the tag.
    pub const ATTRIBUTE: &'static str = "xsi:type";

    /// Namespace prefix bound to the remote metadata schema.
    pub const NAMESPACE_PREFIX: &'static str = "tns";

    pub fn new(metadata_type: MetadataType) -> Self {
        Self { metadata_type }
    }

    pub fn metadata_type(&self) -> &MetadataType {
        &self.metadata_type
    }

    /// Returns the attribute value, e.g. `tns:ApexPage`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", Self::NAMESPACE_PREFIX, self.metadata_type)
    }
}

/// A normalized, type-tagged call ready for the transport.
///
/// Immutable once built; produced only by [`crate::RequestBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallDescriptor {
    operation: Operation,
    body: Value,
    type_tag: Option<TypeTag>,
}

impl CallDescriptor {
    pub(crate) fn new(operation: Operation, body: Value, type_tag: Option<TypeTag>) -> Self {
        Self {
            operation,
            body,
            type_tag,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The structured call body. Field names are in wire (camelCase) form.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// The schema-type tag, absent for calls parameterized by an explicit
    /// `type` field (read, status checks).
    pub fn type_tag(&self) -> Option<&TypeTag> {
        self.type_tag.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Structured body of a successful transport invocation.
///
/// A single result element is an object, several are an array, none is
/// `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    body: Value,
}

impl RemoteResponse {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    /// The primary result object: the body itself, or the first element of an
    /// array body.
    fn primary(&self) -> Option<&serde_json::Map<String, Value>> {
        match &self.body {
            Value::Object(map) => Some(map),
            Value::Array(items) => items.first().and_then(Value::as_object),
            _ => None,
        }
    }

    /// The identifier of an async acceptance, if the response carries one.
    pub fn id(&self) -> Option<TrackingHandle> {
        self.primary()?
            .get("id")
            .and_then(Value::as_str)
            .and_then(TrackingHandle::new)
    }

    /// Parses the response as the status of an async operation.
    ///
    /// Returns `None` when neither a `state` nor a `done` field is present.
    pub fn async_status(&self) -> Option<AsyncStatus> {
        let map = self.primary()?;
        let state = map.get("state").and_then(Value::as_str).map(AsyncState::parse);
        let done = map.get("done").and_then(as_bool);
        if state.is_none() && done.is_none() {
            return None;
        }
        // Blank fields (`<statusCode/>`) count as absent.
        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        Some(AsyncStatus {
            id: text("id").and_then(TrackingHandle::new),
            done: done.unwrap_or(false),
            state: state.unwrap_or(AsyncState::Unknown),
            status_code: text("statusCode"),
            message: text("message"),
        })
    }
}

/// Accepts JSON booleans and the `"true"`/`"false"` strings XML transports
/// produce.
fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Remote lifecycle state of an async operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsyncState {
    Queued,
    InProgress,
    Completed,
    Error,
    /// A state string this crate does not recognise. Treated as non-terminal.
    Unknown,
}

impl AsyncState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Queued" => AsyncState::Queued,
            "InProgress" => AsyncState::InProgress,
            "Completed" => AsyncState::Completed,
            "Error" => AsyncState::Error,
            _ => AsyncState::Unknown,
        }
    }
}

/// Status of an async operation as reported by a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncStatus {
    pub id: Option<TrackingHandle>,
    pub done: bool,
    pub state: AsyncState,
    pub status_code: Option<String>,
    pub message: Option<String>,
}

impl AsyncStatus {
    /// Returns `true` once the remote operation can no longer change state.
    pub fn is_terminal(&self) -> bool {
        self.done || matches!(self.state, AsyncState::Completed | AsyncState::Error)
    }

    /// Returns `true` if the operation finished without error.
    pub fn is_success(&self) -> bool {
        self.is_terminal() && self.state != AsyncState::Error && self.status_code.is_none()
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
