//! Metaforce SOAP infrastructure adapter.
//!
//! Implements the [`metadata::MetadataTransport`] port over the Metadata SOAP
//! API and provides the partner-API login that yields a
//! [`metadata::SessionContext`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Envelope rendering, type-tag serialisation, HTTP
//! transport, fault decoding, and login all live here. The [`metadata`] crate
//! sees only [`metadata::MetadataTransport`] and
//! [`metadata::SessionProvider`].
//!
//! ## Wire mapping
//!
//! | Descriptor | Envelope |
//! |------------|----------|
//! | operation | `<tns:{operation}>` element inside `soapenv:Body` |
//! | body key `k` | `<tns:{lowerCamel(k)}>` child, repeated for arrays |
//! | type tag | `xsi:type="tns:{Type}"` on each `metadata` element (or the operation element) |
//! | session token | `SessionHeader/sessionId` |

pub mod envelope;
pub mod login;
pub mod response;
pub mod transport;

pub use login::{Credentials, LoginError, LoginResult, SoapLogin};
pub use transport::SoapTransport;
