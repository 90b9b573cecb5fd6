//! The verb surface: one constructor per metadata verb, each returning a
//! [`Job`] in the mode the [`ExecutionPolicy`] assigns to that verb.
//!
//! Constructing a job performs no I/O. The transport and session
//! collaborators are injected explicitly and shared by every job the client
//! creates.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    ExecutionMode, FullName, Job, MetadataPayload, MetadataRequest, MetadataTransport,
    MetadataType, SessionProvider, Verb,
};

// ---------------------------------------------------------------------------
// Execution policy
// ---------------------------------------------------------------------------

/// Static per-verb choice between synchronous and asynchronous execution.
///
/// | Verb | Default |
/// |------|---------|
/// | create, update, upsert, delete | `sync`: the CRUD metadata calls return save/delete results directly |
/// | read | `sync`: records are returned in the response |
/// | describe | `sync`: the description is returned in the response |
///
/// Any verb may be switched to `async` for deployments where the remote side
/// answers that operation with an async process identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionPolicy {
    pub create: ExecutionMode,
    pub read: ExecutionMode,
    pub update: ExecutionMode,
    pub upsert: ExecutionMode,
    pub delete: ExecutionMode,
    pub describe: ExecutionMode,
}

impl ExecutionPolicy {
    /// Returns the mode used for `verb`.
    pub fn mode_for(&self, verb: Verb) -> ExecutionMode {
        match verb {
            Verb::Create => self.create,
            Verb::Read => self.read,
            Verb::Update => self.update,
            Verb::Upsert => self.upsert,
            Verb::Delete => self.delete,
            Verb::Describe => self.describe,
        }
    }

    /// Returns a copy with `verb` switched to `mode`.
    #[must_use]
    pub fn with_mode(mut self, verb: Verb, mode: ExecutionMode) -> Self {
        let slot = match verb {
            Verb::Create => &mut self.create,
            Verb::Read => &mut self.read,
            Verb::Update => &mut self.update,
            Verb::Upsert => &mut self.upsert,
            Verb::Delete => &mut self.delete,
            Verb::Describe => &mut self.describe,
        };
        *slot = mode;
        self
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Entry point for metadata operations.
#[derive(Clone)]
pub struct MetadataClient {
    transport: Arc<dyn MetadataTransport>,
    session: Arc<dyn SessionProvider>,
    policy: ExecutionPolicy,
}

impl MetadataClient {
    /// Creates a client using the default [`ExecutionPolicy`].
    pub fn new(transport: Arc<dyn MetadataTransport>, session: Arc<dyn SessionProvider>) -> Self {
        Self {
            transport,
            session,
            policy: ExecutionPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    /// Builds a job for any verb request, in the policy's mode for that verb.
    pub fn job(&self, request: MetadataRequest) -> Job {
        let mode = self.policy.mode_for(request.verb());
        self.job_with_mode(request, mode)
    }

    /// Builds a job for `request` in an explicitly chosen mode.
    pub fn job_with_mode(&self, request: MetadataRequest, mode: ExecutionMode) -> Job {
        let verb = request.verb();
        let descriptor = request.into_descriptor();
        let job = Job::new(
            descriptor,
            mode,
            Arc::clone(&self.transport),
            Arc::clone(&self.session),
        );
        debug!(job_id = %job.id(), %verb, %mode, "Created metadata job");
        job
    }

    /// Creates one component.
    pub fn create(&self, metadata_type: MetadataType, payload: MetadataPayload) -> Job {
        self.create_many(metadata_type, [payload])
    }

    /// Creates every non-empty payload in `payloads`.
    pub fn create_many<I, P>(&self, metadata_type: MetadataType, payloads: I) -> Job
    where
        I: IntoIterator<Item = P>,
        P: Into<Option<MetadataPayload>>,
    {
        self.job(MetadataRequest::Create {
            metadata_type,
            payloads: crate::RequestBuilder::normalize_payloads(payloads),
        })
    }

    /// Updates one component.
    pub fn update(&self, metadata_type: MetadataType, payload: MetadataPayload) -> Job {
        self.update_many(metadata_type, [payload])
    }

    pub fn update_many<I, P>(&self, metadata_type: MetadataType, payloads: I) -> Job
    where
        I: IntoIterator<Item = P>,
        P: Into<Option<MetadataPayload>>,
    {
        self.job(MetadataRequest::Update {
            metadata_type,
            payloads: crate::RequestBuilder::normalize_payloads(payloads),
        })
    }

    /// Creates or updates one component.
    pub fn upsert(&self, metadata_type: MetadataType, payload: MetadataPayload) -> Job {
        self.upsert_many(metadata_type, [payload])
    }

    pub fn upsert_many<I, P>(&self, metadata_type: MetadataType, payloads: I) -> Job
    where
        I: IntoIterator<Item = P>,
        P: Into<Option<MetadataPayload>>,
    {
        self.job(MetadataRequest::Upsert {
            metadata_type,
            payloads: crate::RequestBuilder::normalize_payloads(payloads),
        })
    }

    /// Deletes the named components. An empty list is sent as-is.
    pub fn delete<I>(&self, metadata_type: MetadataType, full_names: I) -> Job
    where
        I: IntoIterator<Item = FullName>,
    {
        self.job(MetadataRequest::Delete {
            metadata_type,
            full_names: full_names.into_iter().collect(),
        })
    }

    /// Reads the named components.
    pub fn read<I>(&self, metadata_type: MetadataType, full_names: I) -> Job
    where
        I: IntoIterator<Item = FullName>,
    {
        self.job(MetadataRequest::Read {
            metadata_type,
            full_names: full_names.into_iter().collect(),
        })
    }

    /// Describes a metadata type.
    pub fn describe(&self, metadata_type: MetadataType) -> Job {
        self.job(MetadataRequest::Describe { metadata_type })
    }
}

impl std::fmt::Debug for MetadataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_sync_for_every_verb() {
        let policy = ExecutionPolicy::default();
        for verb in Verb::ALL {
            assert_eq!(policy.mode_for(verb), ExecutionMode::Sync, "{verb}");
        }
    }

    #[test]
    fn with_mode_switches_one_verb() {
        let policy = ExecutionPolicy::default().with_mode(Verb::Delete, ExecutionMode::Async);
        assert_eq!(policy.mode_for(Verb::Delete), ExecutionMode::Async);
        assert_eq!(policy.mode_for(Verb::Create), ExecutionMode::Sync);
    }

    #[test]
    fn policy_deserializes_partial_tables() {
        let policy: ExecutionPolicy =
            serde_json::from_value(serde_json::json!({ "upsert": "async" })).unwrap();
        assert_eq!(policy.upsert, ExecutionMode::Async);
        assert_eq!(policy.read, ExecutionMode::Sync);

        let unknown = serde_json::from_value::<ExecutionPolicy>(serde_json::json!({ "deploy": "async" }));
        assert!(unknown.is_err());
    }
}
