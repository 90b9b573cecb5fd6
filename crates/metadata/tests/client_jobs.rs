use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use metadata::{
    CallDescriptor, ExecutionMode, ExecutionPolicy, FullName, JobError, JobFailure, JobState,
    MetadataClient, MetadataPayload, MetadataTransport, MetadataType, Operation, PollOutcome,
    RemoteResponse, SessionContext, SessionProvider, TransportError, Verb,
};
use serde_json::{json, Value};

/// Records every invocation together with the session token it was sent with.
#[derive(Default)]
struct RecordingTransport {
    replies: Mutex<VecDeque<Result<RemoteResponse, TransportError>>>,
    seen: Mutex<Vec<(String, CallDescriptor)>>,
}

impl RecordingTransport {
    fn replying(replies: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|b| Ok(RemoteResponse::new(b))).collect()),
            seen: Mutex::default(),
        })
    }

    fn seen(&self) -> Vec<(String, CallDescriptor)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataTransport for RecordingTransport {
    async fn invoke(
        &self,
        session: &SessionContext,
        request: &CallDescriptor,
    ) -> Result<RemoteResponse, TransportError> {
        self.seen
            .lock()
            .unwrap()
            .push((session.token().to_string(), request.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RemoteResponse::new(Value::Null)))
    }
}

/// Hands out a new token on every request, like a refreshing session.
#[derive(Default)]
struct RotatingSession {
    issued: AtomicUsize,
}

impl SessionProvider for RotatingSession {
    fn session_context(&self) -> SessionContext {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        SessionContext::new("https://example.invalid/services/Soap/m/62.0", format!("token-{n}"))
    }
}

fn apex_page() -> MetadataType {
    MetadataType::new("apex_page").unwrap()
}

fn client(transport: Arc<RecordingTransport>) -> MetadataClient {
    MetadataClient::new(transport, Arc::new(RotatingSession::default()))
}

#[tokio::test]
async fn create_page_end_to_end() {
    let transport = RecordingTransport::replying(vec![json!({
        "fullName": "TestPage",
        "success": "true"
    })]);
    let client = client(transport.clone());

    let payload = MetadataPayload::new()
        .with_field("fullName", "TestPage")
        .with_field("label", "Test page")
        .with_content("<apex:page>foobar</apex:page>");
    let mut job = client.create(apex_page(), payload);
    assert_eq!(job.mode(), ExecutionMode::Sync);
    assert!(matches!(job.state(), JobState::Pending));
    assert!(transport.seen().is_empty(), "constructing a job must not call out");

    job.execute().await.unwrap();
    assert_eq!(job.result().unwrap().body()["success"], "true");

    let seen = transport.seen();
    assert_eq!(seen.len(), 1);
    let call = &seen[0].1;
    assert_eq!(call.operation(), Operation::CreateMetadata);
    assert_eq!(call.type_tag().unwrap().qualified_name(), "tns:ApexPage");
    let content = call.body()["metadata"][0]["content"].as_str().unwrap();
    assert_eq!(
        STANDARD.decode(content).unwrap(),
        b"<apex:page>foobar</apex:page>"
    );
}

#[tokio::test]
async fn session_is_fetched_for_every_invocation() {
    let transport = RecordingTransport::replying(vec![
        json!({"id": "09S000"}),
        json!({"id": "09S000", "done": "false", "state": "Queued"}),
        json!({"id": "09S000", "done": "true", "state": "Completed"}),
    ]);
    let policy = ExecutionPolicy::default().with_mode(Verb::Upsert, ExecutionMode::Async);
    let client = client(transport.clone()).with_policy(policy);

    let mut job = client.upsert(apex_page(), MetadataPayload::new().with_field("fullName", "P"));
    assert_eq!(job.mode(), ExecutionMode::Async);

    job.execute().await.unwrap();
    assert!(matches!(job.poll().await.unwrap(), PollOutcome::InProgress(_)));
    assert_eq!(job.poll().await.unwrap(), PollOutcome::Completed);

    let tokens: Vec<String> = transport.seen().into_iter().map(|(t, _)| t).collect();
    assert_eq!(tokens, ["token-0", "token-1", "token-2"]);
}

#[tokio::test]
async fn many_payload_verbs_flatten_their_inputs() {
    let transport = RecordingTransport::replying(vec![json!([])]);
    let client = client(transport.clone());

    let payloads = vec![
        Some(MetadataPayload::new().with_field("fullName", "A")),
        None,
        Some(MetadataPayload::new()),
        Some(MetadataPayload::new().with_field("fullName", "B")),
    ];
    let mut job = client.update_many(apex_page(), payloads);
    job.execute().await.unwrap();

    let call = &transport.seen()[0].1;
    assert_eq!(call.operation(), Operation::UpdateMetadata);
    assert_eq!(
        call.body(),
        &json!({"metadata": [{"fullName": "A"}, {"fullName": "B"}]})
    );
}

#[tokio::test]
async fn delete_read_and_describe_build_their_bodies() {
    let transport = RecordingTransport::replying(vec![json!([]), json!([]), json!({}), json!({})]);
    let client = client(transport.clone());
    let names = || {
        ["One", "Two"]
            .into_iter()
            .map(|n| FullName::new(n).unwrap())
    };

    client.delete(apex_page(), names()).execute().await.unwrap();
    client.delete(apex_page(), Vec::new()).execute().await.unwrap();
    client.read(apex_page(), names()).execute().await.unwrap();
    client.describe(apex_page()).execute().await.unwrap();

    let bodies: Vec<(Operation, Value, bool)> = transport
        .seen()
        .into_iter()
        .map(|(_, c)| (c.operation(), c.body().clone(), c.type_tag().is_some()))
        .collect();
    assert_eq!(
        bodies,
        vec![
            (
                Operation::DeleteMetadata,
                json!({"metadata": [{"fullName": "One"}, {"fullName": "Two"}]}),
                true
            ),
            (Operation::DeleteMetadata, json!({"metadata": []}), true),
            (
                Operation::ReadMetadata,
                json!({"type": "ApexPage", "fullNames": ["One", "Two"]}),
                false
            ),
            (Operation::Describe, json!({}), true),
        ]
    );
}

#[tokio::test]
async fn remote_rejection_surfaces_as_failed_job() {
    let transport = Arc::new(RecordingTransport::default());
    transport
        .replies
        .lock()
        .unwrap()
        .push_back(Err(TransportError::RemoteApplication {
            fault_code: "sf:INVALID_SESSION_ID".to_string(),
            message: "Invalid Session ID found in SessionHeader".to_string(),
        }));
    let client = client(transport);

    let mut job = client.describe(apex_page());
    let err = job.execute().await.unwrap_err();
    assert!(matches!(
        err,
        JobError::OperationFailed(JobFailure::Transport(TransportError::RemoteApplication { .. }))
    ));
    assert!(job.is_terminal());
    assert_eq!(job.result().unwrap_err(), err);
}
