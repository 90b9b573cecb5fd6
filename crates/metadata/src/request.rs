//! Translation of metadata verbs into call descriptors.
//!
//! [`RequestBuilder`] holds all protocol-specific normalization so the rest of
//! the system stays protocol-agnostic:
//!
//! - payload sets are flattened into one list with absent and empty entries
//!   dropped;
//! - every `content` field is base64-encoded (standard alphabet, padded, no
//!   line breaks);
//! - create/update/upsert/delete/describe descriptors carry a [`TypeTag`];
//!   read and status-check descriptors are parameterized by explicit fields
//!   instead.
//!
//! The type name is canonical by construction of [`MetadataType`], so the
//! builder never re-validates it. All functions are pure.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Map, Value};

use crate::{
    CallDescriptor, FullName, MetadataPayload, MetadataType, Operation, PayloadField,
    TrackingHandle, TypeTag, Verb,
};

// ---------------------------------------------------------------------------
// Verb requests
// ---------------------------------------------------------------------------

/// One metadata verb together with its arguments.
///
/// The verb set is closed; each variant builds its own descriptor through
/// [`RequestBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataRequest {
    Create {
        metadata_type: MetadataType,
        payloads: Vec<MetadataPayload>,
    },
    Read {
        metadata_type: MetadataType,
        full_names: Vec<FullName>,
    },
    Update {
        metadata_type: MetadataType,
        payloads: Vec<MetadataPayload>,
    },
    Upsert {
        metadata_type: MetadataType,
        payloads: Vec<MetadataPayload>,
    },
    Delete {
        metadata_type: MetadataType,
        full_names: Vec<FullName>,
    },
    Describe {
        metadata_type: MetadataType,
    },
}

impl MetadataRequest {
    pub fn verb(&self) -> Verb {
        match self {
            MetadataRequest::Create { .. } => Verb::Create,
            MetadataRequest::Read { .. } => Verb::Read,
            MetadataRequest::Update { .. } => Verb::Update,
            MetadataRequest::Upsert { .. } => Verb::Upsert,
            MetadataRequest::Delete { .. } => Verb::Delete,
            MetadataRequest::Describe { .. } => Verb::Describe,
        }
    }

    pub fn metadata_type(&self) -> &MetadataType {
        match self {
            MetadataRequest::Create { metadata_type, .. }
            | MetadataRequest::Read { metadata_type, .. }
            | MetadataRequest::Update { metadata_type, .. }
            | MetadataRequest::Upsert { metadata_type, .. }
            | MetadataRequest::Delete { metadata_type, .. }
            | MetadataRequest::Describe { metadata_type } => metadata_type,
        }
    }

    /// Builds the call descriptor for this request.
    pub fn into_descriptor(self) -> CallDescriptor {
        match self {
            MetadataRequest::Create {
                metadata_type,
                payloads,
            } => RequestBuilder::build_create(&metadata_type, payloads),
            MetadataRequest::Read {
                metadata_type,
                full_names,
            } => RequestBuilder::build_read(&metadata_type, full_names),
            MetadataRequest::Update {
                metadata_type,
                payloads,
            } => RequestBuilder::build_update(&metadata_type, payloads),
            MetadataRequest::Upsert {
                metadata_type,
                payloads,
            } => RequestBuilder::build_upsert(&metadata_type, payloads),
            MetadataRequest::Delete {
                metadata_type,
                full_names,
            } => RequestBuilder::build_delete(&metadata_type, full_names),
            MetadataRequest::Describe { metadata_type } => {
                RequestBuilder::build_describe(&metadata_type)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Stateless constructor of [`CallDescriptor`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestBuilder;

impl RequestBuilder {
    /// Builds a `createMetadata` call.
    pub fn build_create<I, P>(metadata_type: &MetadataType, payloads: I) -> CallDescriptor
    where
        I: IntoIterator<Item = P>,
        P: Into<Option<MetadataPayload>>,
    {
        Self::build_save(Operation::CreateMetadata, metadata_type, payloads)
    }

    /// Builds an `upsertMetadata` call.
    pub fn build_upsert<I, P>(metadata_type: &MetadataType, payloads: I) -> CallDescriptor
    where
        I: IntoIterator<Item = P>,
        P: Into<Option<MetadataPayload>>,
    {
        Self::build_save(Operation::UpsertMetadata, metadata_type, payloads)
    }

    /// Builds an `updateMetadata` call.
    pub fn build_update<I, P>(metadata_type: &MetadataType, payloads: I) -> CallDescriptor
    where
        I: IntoIterator<Item = P>,
        P: Into<Option<MetadataPayload>>,
    {
        Self::build_save(Operation::UpdateMetadata, metadata_type, payloads)
    }

    /// Builds a `deleteMetadata` call with one `{fullName}` entry per
    /// identifier. Zero identifiers yield an empty list, not an error.
    pub fn build_delete<I>(metadata_type: &MetadataType, full_names: I) -> CallDescriptor
    where
        I: IntoIterator<Item = FullName>,
    {
        let metadata: Vec<Value> = full_names
            .into_iter()
            .map(|name| json!({ "fullName": name.as_str() }))
            .collect();
        CallDescriptor::new(
            Operation::DeleteMetadata,
            json!({ "metadata": metadata }),
            Some(TypeTag::new(metadata_type.clone())),
        )
    }

    /// Builds a `readMetadata` call. Untagged: the type travels in the body.
    pub fn build_read<I>(metadata_type: &MetadataType, full_names: I) -> CallDescriptor
    where
        I: IntoIterator<Item = FullName>,
    {
        let full_names: Vec<Value> = full_names
            .into_iter()
            .map(|name| Value::String(name.as_str().to_string()))
            .collect();
        CallDescriptor::new(
            Operation::ReadMetadata,
            json!({
                "type": metadata_type.as_str(),
                "fullNames": full_names,
            }),
            None,
        )
    }

    /// Builds a `describe` call: an empty body carrying only the type tag.
    pub fn build_describe(metadata_type: &MetadataType) -> CallDescriptor {
        CallDescriptor::new(
            Operation::Describe,
            Value::Object(Map::new()),
            Some(TypeTag::new(metadata_type.clone())),
        )
    }

    /// Builds a `checkStatus` call for the given async handles.
    pub fn build_check_status<I>(handles: I) -> CallDescriptor
    where
        I: IntoIterator<Item = TrackingHandle>,
    {
        let ids: Vec<Value> = handles
            .into_iter()
            .map(|h| Value::String(h.as_str().to_string()))
            .collect();
        CallDescriptor::new(Operation::CheckStatus, json!({ "ids": ids }), None)
    }

    /// Flattens a payload set into a list, dropping absent and empty entries.
    pub fn normalize_payloads<I, P>(payloads: I) -> Vec<MetadataPayload>
    where
        I: IntoIterator<Item = P>,
        P: Into<Option<MetadataPayload>>,
    {
        payloads
            .into_iter()
            .filter_map(|p| -> Option<MetadataPayload> { p.into() })
            .filter(|p| !p.is_empty())
            .collect()
    }

    fn build_save<I, P>(
        operation: Operation,
        metadata_type: &MetadataType,
        payloads: I,
    ) -> CallDescriptor
    where
        I: IntoIterator<Item = P>,
        P: Into<Option<MetadataPayload>>,
    {
        let metadata: Vec<Value> = Self::normalize_payloads(payloads)
            .into_iter()
            .map(encode_payload)
            .collect();
        CallDescriptor::new(
            operation,
            json!({ "metadata": metadata }),
            Some(TypeTag::new(metadata_type.clone())),
        )
    }
}

/// Renders a payload as a JSON object, base64-encoding raw content.
fn encode_payload(payload: MetadataPayload) -> Value {
    let mut map = Map::new();
    for (name, field) in payload.into_fields() {
        let value = match field {
            PayloadField::Value(value) => value,
            PayloadField::Content(bytes) => Value::String(STANDARD.encode(bytes)),
        };
        map.insert(name, value);
    }
    Value::Object(map)
}
