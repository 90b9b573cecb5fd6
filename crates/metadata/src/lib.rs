//! Metadata domain for Metaforce.
//!
//! This crate turns the six metadata verbs (create, read, update, upsert,
//! delete, describe) into type-tagged remote calls and owns the lifecycle of
//! each call as a [`Job`]. Infrastructure crates implement the port traits
//! defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* a call looks like and *when* it is finished;
//! infrastructure crates define *how* a call reaches the remote service.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`MetadataType`, `FullName`, `TrackingHandle`, `JobId`) |
//! | [`types`] | Value types (`MetadataPayload`, `CallDescriptor`, `RemoteResponse`, `AsyncStatus`, etc.) |
//! | [`errors`] | Build, transport, and job error types |
//! | [`request`] | `RequestBuilder` and the closed `MetadataRequest` verb set |
//! | [`ports`] | `MetadataTransport` and `SessionProvider` traits |
//! | [`job`] | The `Job` state machine |
//! | [`client`] | `MetadataClient` verb surface and per-verb `ExecutionPolicy` |

pub mod client;
pub mod errors;
pub mod identifiers;
pub mod job;
pub mod ports;
pub mod request;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use client::{ExecutionPolicy, MetadataClient};
pub use errors::{BuildError, JobError, JobFailure, TransportError};
pub use identifiers::{FullName, JobId, MetadataType, TrackingHandle};
pub use job::{Job, JobState, PollOutcome};
pub use ports::{MetadataTransport, SessionContext, SessionProvider};
pub use request::{MetadataRequest, RequestBuilder};
pub use types::{
    AsyncState, AsyncStatus, CallDescriptor, ExecutionMode, MetadataPayload, Operation,
    PayloadField, RemoteResponse, Timestamp, TypeTag, Verb,
};
