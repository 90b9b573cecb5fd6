//! Execution lifecycle of a single metadata call.
//!
//! A [`Job`] owns exactly one [`CallDescriptor`] and runs it in one
//! [`ExecutionMode`]. Both modes end in the same place: `Completed` with a
//! result, or `Failed` with the original cause.
//!
//! ```text
//!            execute()                 sync
//! Pending ──────────────▶ Executing ─────────▶ Completed
//!                             │  async              ▲
//!                             ▼                     │ poll(): terminal success
//!                        Tracking(handle) ──────────┤
//!                           ▲   │                   │ poll(): terminal error
//!        poll(): in flight  └───┘                   ▼
//!                                                Failed
//! ```
//!
//! The job never sleeps or loops. Waiting for an async operation is a
//! sequence of explicit [`Job::poll`] calls driven by the caller, which also
//! owns interval and timeout policy. All operations take `&mut self`, so a job
//! shared between tasks must be externally synchronized.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    AsyncStatus, CallDescriptor, ExecutionMode, JobError, JobFailure, JobId, MetadataTransport,
    RemoteResponse, RequestBuilder, SessionProvider, Timestamp, TrackingHandle,
};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`Job`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Built, not yet executed.
    Pending,
    /// Transport invocation in flight.
    Executing,
    /// Async only: the remote side accepted the operation under this handle.
    Tracking(TrackingHandle),
    /// Terminal: the captured result.
    Completed(RemoteResponse),
    /// Terminal: the captured cause.
    Failed(JobFailure),
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Pending => "Pending",
            JobState::Executing => "Executing",
            JobState::Tracking(_) => "Tracking",
            JobState::Completed(_) => "Completed",
            JobState::Failed(_) => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed(_) | JobState::Failed(_))
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Tracking(handle) => write!(f, "Tracking({handle})"),
            other => f.write_str(other.name()),
        }
    }
}

/// What a single [`Job::poll`] observed.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The remote operation is still running; poll again later.
    InProgress(AsyncStatus),
    /// The job is now `Completed`.
    Completed,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One metadata call and its execution state.
pub struct Job {
    id: JobId,
    descriptor: CallDescriptor,
    mode: ExecutionMode,
    state: JobState,
    transport: Arc<dyn MetadataTransport>,
    session: Arc<dyn SessionProvider>,
    created_at: Timestamp,
    finished_at: Option<Timestamp>,
}

impl Job {
    /// Creates a `Pending` job. Nothing is sent until [`Job::execute`].
    pub fn new(
        descriptor: CallDescriptor,
        mode: ExecutionMode,
        transport: Arc<dyn MetadataTransport>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            id: JobId::new_random(),
            descriptor,
            mode,
            state: JobState::Pending,
            transport,
            session,
            created_at: Timestamp::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn descriptor(&self) -> &CallDescriptor {
        &self.descriptor
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The tracking handle while the job is `Tracking`.
    pub fn handle(&self) -> Option<&TrackingHandle> {
        match &self.state {
            JobState::Tracking(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// When the job reached a terminal state.
    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }

    /// Performs the call.
    ///
    /// Valid only from `Pending`; any other state returns
    /// [`JobError::InvalidState`] and leaves the job untouched. A sync job
    /// moves to `Completed`; an async job moves to `Tracking` with the
    /// identifier from the response. On failure the job moves to `Failed` and
    /// the captured cause is also returned as [`JobError::OperationFailed`].
    pub async fn execute(&mut self) -> Result<(), JobError> {
        if !matches!(self.state, JobState::Pending) {
            return Err(self.invalid_state("execute"));
        }
        self.state = JobState::Executing;
        let operation = self.descriptor.operation();
        debug!(job_id = %self.id, %operation, mode = %self.mode, "Executing metadata call");

        let session = self.session.session_context();
        let response = match self.transport.invoke(&session, &self.descriptor).await {
            Ok(response) => response,
            Err(error) => return self.fail(JobFailure::Transport(error)),
        };

        match self.mode {
            ExecutionMode::Sync => {
                self.complete(response);
                Ok(())
            }
            ExecutionMode::Async => match response.id() {
                Some(handle) => {
                    info!(job_id = %self.id, %operation, %handle, "Remote accepted async operation");
                    self.state = JobState::Tracking(handle);
                    Ok(())
                }
                None => self.fail(JobFailure::ProtocolMismatch {
                    operation,
                    detail: "async response carries no identifier".to_string(),
                }),
            },
        }
    }

    /// Queries the remote status of a `Tracking` job once.
    ///
    /// Terminal success moves the job to `Completed` with the status response
    /// as its result; terminal error moves it to `Failed`. A non-terminal
    /// status leaves the job in `Tracking`.
    pub async fn poll(&mut self) -> Result<PollOutcome, JobError> {
        let handle = match &self.state {
            JobState::Tracking(handle) => handle.clone(),
            _ => return Err(self.invalid_state("poll")),
        };
        let request = RequestBuilder::build_check_status([handle.clone()]);
        let session = self.session.session_context();
        let response = match self.transport.invoke(&session, &request).await {
            Ok(response) => response,
            Err(error) => return self.fail(JobFailure::Transport(error)),
        };

        let Some(status) = response.async_status() else {
            return self.fail(JobFailure::ProtocolMismatch {
                operation: request.operation(),
                detail: "status response carries neither state nor done flag".to_string(),
            });
        };

        if !status.is_terminal() {
            debug!(job_id = %self.id, %handle, state = ?status.state, "Async operation still running");
            return Ok(PollOutcome::InProgress(status));
        }
        if status.is_success() {
            self.complete(response);
            Ok(PollOutcome::Completed)
        } else {
            self.fail(JobFailure::RemoteApplication {
                status_code: status.status_code.unwrap_or_default(),
                message: status.message.unwrap_or_default(),
            })
        }
    }

    /// Returns the captured result of a `Completed` job.
    pub fn result(&self) -> Result<&RemoteResponse, JobError> {
        match &self.state {
            JobState::Completed(response) => Ok(response),
            JobState::Failed(failure) => Err(JobError::OperationFailed(failure.clone())),
            other => Err(JobError::NotReady {
                state: other.name(),
            }),
        }
    }

    /// Consuming form of [`Job::result`].
    pub fn into_result(self) -> Result<RemoteResponse, JobError> {
        match self.state {
            JobState::Completed(response) => Ok(response),
            JobState::Failed(failure) => Err(JobError::OperationFailed(failure)),
            other => Err(JobError::NotReady {
                state: other.name(),
            }),
        }
    }

    fn complete(&mut self, response: RemoteResponse) {
        info!(job_id = %self.id, operation = %self.descriptor.operation(), "Metadata job completed");
        self.state = JobState::Completed(response);
        self.finished_at = Some(Timestamp::now());
    }

    fn fail<T>(&mut self, failure: JobFailure) -> Result<T, JobError> {
        warn!(
            job_id = %self.id,
            operation = %self.descriptor.operation(),
            error = %failure,
            "Metadata job failed"
        );
        self.state = JobState::Failed(failure.clone());
        self.finished_at = Some(Timestamp::now());
        Err(JobError::OperationFailed(failure))
    }

    fn invalid_state(&self, operation: &'static str) -> JobError {
        JobError::InvalidState {
            operation,
            state: self.state.name(),
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("operation", &self.descriptor.operation())
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{MetadataType, Operation, SessionContext, TransportError};

    /// Replays canned responses in order and records each call.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<RemoteResponse, TransportError>>>,
        calls: Mutex<Vec<CallDescriptor>>,
    }

    impl ScriptedTransport {
        fn with(replies: Vec<Result<RemoteResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::default(),
            })
        }

        fn calls(&self) -> Vec<CallDescriptor> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetadataTransport for ScriptedTransport {
        async fn invoke(
            &self,
            _session: &SessionContext,
            request: &CallDescriptor,
        ) -> Result<RemoteResponse, TransportError> {
            self.calls.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected transport call")
        }
    }

    fn ok(body: serde_json::Value) -> Result<RemoteResponse, TransportError> {
        Ok(RemoteResponse::new(body))
    }

    fn job(transport: Arc<ScriptedTransport>, mode: ExecutionMode) -> Job {
        let descriptor = RequestBuilder::build_describe(&MetadataType::new("apex_page").unwrap());
        Job::new(
            descriptor,
            mode,
            transport,
            Arc::new(SessionContext::new("https://example.invalid", "token")),
        )
    }

    #[tokio::test]
    async fn sync_execute_captures_the_transport_result() {
        let body = json!({"fullName": "Page", "success": "true"});
        let transport = ScriptedTransport::with(vec![ok(body.clone())]);
        let mut job = job(transport.clone(), ExecutionMode::Sync);

        assert_eq!(
            job.result().unwrap_err(),
            JobError::NotReady { state: "Pending" }
        );

        job.execute().await.unwrap();
        assert_eq!(job.result().unwrap().body(), &body);
        assert!(job.is_terminal());
        assert!(job.finished_at().is_some());
        assert_eq!(transport.calls()[0].operation(), Operation::Describe);
    }

    #[tokio::test]
    async fn sync_execute_ignores_identifiers() {
        let transport = ScriptedTransport::with(vec![ok(json!({"id": "09S"}))]);
        let mut job = job(transport, ExecutionMode::Sync);
        job.execute().await.unwrap();
        assert!(matches!(job.state(), JobState::Completed(_)));
        assert!(job.handle().is_none());
    }

    #[tokio::test]
    async fn second_execute_is_rejected() {
        let transport = ScriptedTransport::with(vec![ok(json!({}))]);
        let mut job = job(transport.clone(), ExecutionMode::Sync);
        job.execute().await.unwrap();

        let err = job.execute().await.unwrap_err();
        assert_eq!(
            err,
            JobError::InvalidState {
                operation: "execute",
                state: "Completed"
            }
        );
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_captured_verbatim() {
        let cause = TransportError::RemoteApplication {
            fault_code: "sf:INVALID_TYPE".to_string(),
            message: "Unknown type".to_string(),
        };
        let transport = ScriptedTransport::with(vec![Err(cause.clone())]);
        let mut job = job(transport, ExecutionMode::Async);

        let err = job.execute().await.unwrap_err();
        assert_eq!(err.failure(), Some(&JobFailure::Transport(cause.clone())));
        assert_eq!(job.state(), &JobState::Failed(JobFailure::Transport(cause.clone())));
        assert_eq!(
            job.result().unwrap_err(),
            JobError::OperationFailed(JobFailure::Transport(cause))
        );

        let err = job.execute().await.unwrap_err();
        assert!(matches!(err, JobError::InvalidState { state: "Failed", .. }));
    }

    #[tokio::test]
    async fn async_execute_tracks_the_returned_identifier() {
        let transport = ScriptedTransport::with(vec![ok(json!({"id": "X", "done": "false"}))]);
        let mut job = job(transport, ExecutionMode::Async);

        job.execute().await.unwrap();
        assert_eq!(
            job.state(),
            &JobState::Tracking(TrackingHandle::new("X").unwrap())
        );
        assert_eq!(job.result().unwrap_err(), JobError::NotReady { state: "Tracking" });
    }

    #[tokio::test]
    async fn async_execute_without_identifier_is_a_protocol_mismatch() {
        let transport = ScriptedTransport::with(vec![ok(json!({"success": "true"}))]);
        let mut job = job(transport, ExecutionMode::Async);

        let err = job.execute().await.unwrap_err();
        assert!(matches!(
            err.failure(),
            Some(JobFailure::ProtocolMismatch {
                operation: Operation::Describe,
                ..
            })
        ));
        assert!(matches!(
            job.state(),
            JobState::Failed(JobFailure::ProtocolMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn poll_stays_tracking_until_terminal_success() {
        let final_status = json!({"id": "X", "done": "true", "state": "Completed"});
        let transport = ScriptedTransport::with(vec![
            ok(json!({"id": "X"})),
            ok(json!({"id": "X", "done": "false", "state": "InProgress"})),
            ok(final_status.clone()),
        ]);
        let mut job = job(transport.clone(), ExecutionMode::Async);
        job.execute().await.unwrap();

        let outcome = job.poll().await.unwrap();
        assert!(matches!(outcome, PollOutcome::InProgress(ref s) if s.state == crate::AsyncState::InProgress));
        assert_eq!(job.handle().unwrap().as_str(), "X");

        assert_eq!(job.poll().await.unwrap(), PollOutcome::Completed);
        assert_eq!(job.result().unwrap().body(), &final_status);

        let calls = transport.calls();
        assert_eq!(calls[1].operation(), Operation::CheckStatus);
        assert_eq!(calls[1].body(), &json!({"ids": ["X"]}));
    }

    #[tokio::test]
    async fn poll_terminal_error_fails_the_job() {
        let transport = ScriptedTransport::with(vec![
            ok(json!({"id": "X"})),
            ok(json!({
                "id": "X",
                "done": "true",
                "state": "Error",
                "statusCode": "INSUFFICIENT_ACCESS",
                "message": "no access"
            })),
        ]);
        let mut job = job(transport, ExecutionMode::Async);
        job.execute().await.unwrap();

        let err = job.poll().await.unwrap_err();
        let expected = JobFailure::RemoteApplication {
            status_code: "INSUFFICIENT_ACCESS".to_string(),
            message: "no access".to_string(),
        };
        assert_eq!(err, JobError::OperationFailed(expected.clone()));
        assert_eq!(job.state(), &JobState::Failed(expected));
    }

    #[tokio::test]
    async fn poll_requires_a_tracking_job() {
        let transport = ScriptedTransport::with(vec![ok(json!({}))]);
        let mut job = job(transport, ExecutionMode::Sync);

        assert_eq!(
            job.poll().await.unwrap_err(),
            JobError::InvalidState {
                operation: "poll",
                state: "Pending"
            }
        );
        job.execute().await.unwrap();
        assert!(matches!(
            job.poll().await.unwrap_err(),
            JobError::InvalidState { state: "Completed", .. }
        ));
    }

    #[tokio::test]
    async fn poll_transport_failure_fails_the_job() {
        let cause = TransportError::Network {
            message: "connection reset".to_string(),
        };
        let transport = ScriptedTransport::with(vec![ok(json!({"id": "X"})), Err(cause.clone())]);
        let mut job = job(transport, ExecutionMode::Async);
        job.execute().await.unwrap();

        job.poll().await.unwrap_err();
        assert_eq!(job.state(), &JobState::Failed(JobFailure::Transport(cause)));
    }

    #[tokio::test]
    async fn into_result_moves_the_response_out() {
        let transport = ScriptedTransport::with(vec![ok(json!({"fullName": "P"}))]);
        let mut job = job(transport, ExecutionMode::Sync);
        job.execute().await.unwrap();
        assert_eq!(job.into_result().unwrap().into_body(), json!({"fullName": "P"}));
    }
}
