//! Newtype domain identifiers.
//!
//! Every concept with an identity is a distinct newtype wrapping a primitive.
//! This prevents accidentally passing a component [`FullName`] where a
//! [`MetadataType`] is expected even though both are strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::BuildError;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Metadata type
// ---------------------------------------------------------------------------

/// Names a remote schema type (e.g. `ApexPage`, `CustomObject`).
///
/// The wrapped value is always in the remote schema's upper-camel form. Input
/// in lower/underscore form (`apex_page`) is canonicalized on construction, so
/// every descriptor built from a [`MetadataType`] carries the spelling the
/// remote schema expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetadataType(String);

impl MetadataType {
    /// Canonicalizes `value` into a [`MetadataType`].
    ///
    /// Any spelling is accepted; a name the remote schema does not know fails
    /// remotely when the call is made. Only input that canonicalizes to
    /// nothing (empty, or underscores only) returns
    /// [`BuildError::InvalidMetadataType`], since it cannot name a type at all.
    pub fn new(value: impl AsRef<str>) -> Result<Self, BuildError> {
        let raw = value.as_ref();
        let canonical = camelize(raw);
        if canonical.is_empty() {
            return Err(BuildError::InvalidMetadataType {
                value: raw.to_string(),
            });
        }
        Ok(Self(canonical))
    }

    /// Returns the canonical type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MetadataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MetadataType {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for MetadataType {
    type Error = BuildError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MetadataType> for String {
    fn from(value: MetadataType) -> Self {
        value.0
    }
}

/// Converts a lower/underscore identifier into upper-camel form.
///
/// Each `_`-separated segment has its first character upper-cased; the rest of
/// the segment is kept verbatim and empty segments are dropped. Already-camel
/// input passes through unchanged, so the conversion is idempotent.
pub fn camelize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for segment in raw.split('_').filter(|s| !s.is_empty()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (remote names and handles)
// ---------------------------------------------------------------------------

string_id! {
    /// The `fullName` of one metadata component (e.g. `"MyPage"`,
    /// `"Account.MyField__c"`).
    FullName
}

string_id! {
    /// Opaque identifier returned by the remote service when it accepts an
    /// asynchronous operation.
    ///
    /// Used only as the key for status polling; it has no meaning outside the
    /// lifetime of the remote operation it denotes.
    TrackingHandle
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single [`crate::Job`] for log correlation.
///
/// Generated fresh for every job; never sent to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a new random job identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
