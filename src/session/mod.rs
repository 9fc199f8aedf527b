//! The session controller: one submission in flight at a time.
//!
//! The controller owns the round-trip state machine. Submitting a message
//! moves the session from [`SessionState::Idle`] to
//! [`SessionState::Responding`]; however the round trip ends, success,
//! stream error, or cancellation, the session makes exactly one transition
//! back to idle. Chunks are classified and handed to the render sink in
//! arrival order, never reordered or buffered across chunks.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use crate::classify::Classify;
use crate::client::{ApiError, ChatApi, HttpChunkStream, SessionInfo};
use crate::notify::TitleNotifier;
use crate::spinner::Spinner;
use crate::view::RenderSink;

/// Whether a submission is currently being answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Responding,
}

/// How a submission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The reply streamed to completion.
    Completed,
    /// Nothing was sent: empty input, or a reply was already in flight.
    Ignored,
    /// The user cancelled mid-stream.
    Cancelled,
    /// The request or the stream failed.
    Failed,
}

/// Backend seam. Production uses [`crate::client::ChatApi`]; tests script
/// the replies.
#[async_trait]
pub trait Transport {
    async fn init(&self) -> Result<SessionInfo, ApiError>;
    async fn ask(&self, user_input: &str) -> Result<HttpChunkStream, ApiError>;
}

#[async_trait]
impl Transport for crate::client::ChatApi {
    async fn init(&self) -> Result<SessionInfo, ApiError> {
        ChatApi::init(self).await
    }

    async fn ask(&self, user_input: &str) -> Result<HttpChunkStream, ApiError> {
        ChatApi::ask(self, user_input).await
    }
}

/// Cancels the in-flight submission from another task.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Drives submissions through the transport, classifier, and sink.
pub struct SessionController<T, C, R> {
    transport: T,
    classifier: C,
    sink: R,
    state: SessionState,
    cancel: Arc<watch::Sender<bool>>,
    notifier: Option<TitleNotifier>,
    show_spinner: bool,
}

impl<T, C, R> SessionController<T, C, R>
where
    T: Transport,
    C: Classify,
    R: RenderSink,
{
    pub fn new(transport: T, classifier: C, sink: R) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            transport,
            classifier,
            sink,
            state: SessionState::Idle,
            cancel: Arc::new(tx),
            notifier: None,
            show_spinner: false,
        }
    }

    /// Flash the terminal title when a reply completes.
    pub fn with_notifier(mut self, notifier: TitleNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Show a spinner while waiting for the session to resume.
    pub fn with_spinner(mut self) -> Self {
        self.show_spinner = true;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut R {
        &mut self.sink
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Handle for cancelling the in-flight submission.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel.clone(),
        }
    }

    /// Resume the server-side session and show its greeting.
    pub async fn initialize(&mut self) -> Result<SessionInfo, ApiError> {
        let spinner = self
            .show_spinner
            .then(|| Spinner::new().start("Resuming session..."));

        let result = self.transport.init().await;

        if let Some(spinner) = spinner {
            spinner.stop().await;
        }

        let info = result?;
        tracing::info!(username = %info.username, model = %info.model_id, "session resumed");

        self.sink.system_message(&format!(
            "Connected as {} (model {})",
            info.username, info.model_id
        ));

        // The greeting comes back sentinel-tagged like any reply chunk.
        if !info.message.is_empty() {
            let classified = self.classifier.classify(&info.message);
            self.sink.render(&classified);
        }

        Ok(info)
    }

    /// Submit one message and stream the reply to the sink.
    pub async fn submit(&mut self, input: &str) -> SubmitOutcome {
        let input = input.trim();
        if input.is_empty() {
            return SubmitOutcome::Ignored;
        }
        if self.state == SessionState::Responding {
            return SubmitOutcome::Ignored;
        }

        self.state = SessionState::Responding;
        // A cancel from a previous round must not abort this one.
        self.cancel.send_replace(false);

        let outcome = self.run_round_trip(input).await;

        self.state = SessionState::Idle;
        if outcome == SubmitOutcome::Completed {
            if let Some(notifier) = &mut self.notifier {
                notifier.flash();
            }
        }
        outcome
    }

    async fn run_round_trip(&mut self, input: &str) -> SubmitOutcome {
        // Subscribe before the request goes out: a cancel fired while the
        // request is still awaiting headers must abort the round trip too.
        let mut cancelled = self.cancel.subscribe();

        self.sink.user_message(input);

        let mut stream = tokio::select! {
            _ = cancelled.wait_for(|c| *c) => {
                self.sink.system_message("Response cancelled.");
                return SubmitOutcome::Cancelled;
            }
            result = self.transport.ask(input) => match result {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!("request failed: {}", e);
                    self.sink.system_message(&submit_error_message(&e));
                    return SubmitOutcome::Failed;
                }
            }
        };

        loop {
            if *cancelled.borrow() {
                self.sink.system_message("Response cancelled.");
                return SubmitOutcome::Cancelled;
            }

            tokio::select! {
                // Re-check at the top of the loop.
                _ = cancelled.changed() => {}
                chunk = stream.next_chunk() => {
                    match chunk {
                        Some(Ok(chunk)) => {
                            let classified = self.classifier.classify(&chunk.text);
                            self.sink.render(&classified);
                        }
                        Some(Err(e)) => {
                            tracing::error!("stream failed: {}", e);
                            self.sink
                                .system_message(&format!("Connection lost mid-reply: {}", e));
                            return SubmitOutcome::Failed;
                        }
                        None => return SubmitOutcome::Completed,
                    }
                }
            }
        }
    }
}

fn submit_error_message(e: &ApiError) -> String {
    match e {
        ApiError::Status { status, .. } if status.as_u16() == 401 => {
            "Session expired. Please log in again.".to_string()
        }
        ApiError::Status { status, .. } => {
            format!("The server rejected the request ({}).", status)
        }
        ApiError::Request(e) => format!("Could not reach the server: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classified, SentinelClassifier};
    use crate::client::{ChunkStream, StreamError};
    use crate::view::{ConversationView, Role};
    use std::sync::Mutex;
    use std::time::Duration;

    // =========================================================================
    // Test Doubles
    // =========================================================================

    /// Scripted backend: each ask pops the next reply, a list of raw body
    /// reads.
    struct FakeTransport {
        replies: Mutex<Vec<Vec<Result<Vec<u8>, StreamError>>>>,
        asked: Mutex<Vec<String>>,
        greeting: String,
    }

    impl FakeTransport {
        fn new(replies: Vec<Vec<Result<Vec<u8>, StreamError>>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                asked: Mutex::new(Vec::new()),
                greeting: String::new(),
            }
        }

        fn with_greeting(mut self, greeting: &str) -> Self {
            self.greeting = greeting.to_string();
            self
        }

        fn reply(chunks: &[&str]) -> Vec<Result<Vec<u8>, StreamError>> {
            chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn init(&self) -> Result<SessionInfo, ApiError> {
            Ok(serde_json::from_value(serde_json::json!({
                "username": "alice",
                "model_id": "gpt-4o",
                "message": self.greeting,
            }))
            .unwrap())
        }

        async fn ask(&self, user_input: &str) -> Result<HttpChunkStream, ApiError> {
            self.asked.lock().unwrap().push(user_input.to_string());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                // No scripted reply left: hang forever, for cancel tests.
                return Ok(ChunkStream::new(Box::pin(futures::stream::pending())));
            }
            let body = replies.remove(0);
            Ok(ChunkStream::new(Box::pin(futures::stream::iter(body))))
        }
    }

    /// A transport that always fails the request itself.
    struct FailingTransport {
        status: u16,
    }

    #[async_trait]
    impl Transport for FailingTransport {
        async fn init(&self) -> Result<SessionInfo, ApiError> {
            Err(self.error())
        }

        async fn ask(&self, _user_input: &str) -> Result<HttpChunkStream, ApiError> {
            Err(self.error())
        }
    }

    impl FailingTransport {
        fn error(&self) -> ApiError {
            ApiError::Status {
                status: reqwest::StatusCode::from_u16(self.status).unwrap(),
                body: String::new(),
            }
        }
    }

    /// Sink that records everything and mirrors the view invariants.
    #[derive(Default)]
    struct RecordingSink {
        view: ConversationView,
        system: Vec<String>,
        traces: Vec<String>,
    }

    impl RenderSink for RecordingSink {
        fn user_message(&mut self, text: &str) {
            self.view.push_user(text);
        }

        fn system_message(&mut self, text: &str) {
            self.system.push(text.to_string());
            self.view.push_system(text);
        }

        fn render(&mut self, classified: &Classified) {
            use crate::classify::ChunkKind;
            match &classified.kind {
                ChunkKind::FinalAnswer { text } => {
                    if !text.is_empty() {
                        self.view.push_assistant(text);
                    } else {
                        self.view.resolve_thinking();
                    }
                }
                ChunkKind::Thinking { text } => {
                    self.view.push_thinking(text);
                }
                ChunkKind::Trace { text } => {
                    self.view.resolve_thinking();
                    self.traces.push(text.clone());
                }
            }
            for element in &classified.embedded {
                self.view.push_embedded(&element.payload);
            }
        }

        fn view(&self) -> &ConversationView {
            &self.view
        }
    }

    fn controller(
        replies: Vec<Vec<Result<Vec<u8>, StreamError>>>,
    ) -> SessionController<FakeTransport, SentinelClassifier, RecordingSink> {
        SessionController::new(
            FakeTransport::new(replies),
            SentinelClassifier::new(),
            RecordingSink::default(),
        )
    }

    fn texts_of(view: &ConversationView, role: Role) -> Vec<&str> {
        view.nodes()
            .iter()
            .filter(|n| n.role == role)
            .map(|n| n.text.as_str())
            .collect()
    }

    // =========================================================================
    // Round Trip Tests
    // =========================================================================

    #[tokio::test]
    async fn test_successful_round_trip_returns_to_idle() {
        let mut ctl = controller(vec![FakeTransport::reply(&["💬Hello there"])]);

        let outcome = ctl.submit("hi").await;

        assert_eq!(outcome, SubmitOutcome::Completed);
        assert_eq!(ctl.state(), SessionState::Idle);
        assert_eq!(texts_of(ctl.sink().view(), Role::User), vec!["hi"]);
        assert_eq!(
            texts_of(ctl.sink().view(), Role::Assistant),
            vec!["Hello there"]
        );
    }

    #[tokio::test]
    async fn test_empty_submit_is_ignored() {
        let mut ctl = controller(vec![FakeTransport::reply(&["💬unused"])]);

        assert_eq!(ctl.submit("").await, SubmitOutcome::Ignored);
        assert_eq!(ctl.submit("   ").await, SubmitOutcome::Ignored);
        assert!(ctl.transport().asked.lock().unwrap().is_empty());
        assert!(ctl.sink().view().nodes().is_empty());
    }

    #[tokio::test]
    async fn test_chunks_render_in_arrival_order() {
        let mut ctl = controller(vec![FakeTransport::reply(&[
            "💬first",
            "💬second",
            "💬third",
        ])]);

        ctl.submit("go").await;

        assert_eq!(
            texts_of(ctl.sink().view(), Role::Assistant),
            vec!["first", "second", "third"]
        );
    }

    #[tokio::test]
    async fn test_thinking_resolved_by_final_answer() {
        let mut ctl = controller(vec![FakeTransport::reply(&[
            "<thinking>step one</thinking>",
            "<thinking>step two</thinking>",
            "💬done",
        ])]);

        ctl.submit("think hard").await;

        let view = ctl.sink().view();
        assert!(texts_of(view, Role::Thinking).is_empty());
        assert!(view.live_thinking().is_none());
        assert_eq!(texts_of(view, Role::Assistant), vec!["done"]);
    }

    #[tokio::test]
    async fn test_trace_chunks_buffered_not_rendered_inline() {
        let mut ctl = controller(vec![FakeTransport::reply(&[
            "trace: step 1 done",
            "💬answer",
        ])]);

        ctl.submit("do it").await;

        assert_eq!(ctl.sink().traces, vec!["step 1 done"]);
        assert_eq!(texts_of(ctl.sink().view(), Role::Assistant), vec!["answer"]);
    }

    #[tokio::test]
    async fn test_request_failure_returns_to_idle_with_message() {
        let mut ctl = SessionController::new(
            FailingTransport { status: 401 },
            SentinelClassifier::new(),
            RecordingSink::default(),
        );

        let outcome = ctl.submit("hi").await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        assert_eq!(ctl.state(), SessionState::Idle);
        assert_eq!(
            ctl.sink().system,
            vec!["Session expired. Please log in again."]
        );
    }

    #[tokio::test]
    async fn test_server_error_message_includes_status() {
        let mut ctl = SessionController::new(
            FailingTransport { status: 503 },
            SentinelClassifier::new(),
            RecordingSink::default(),
        );

        ctl.submit("hi").await;

        assert!(ctl.sink().system[0].contains("503"));
    }

    #[tokio::test]
    async fn test_stream_failure_mid_reply() {
        let mut ctl = controller(vec![vec![
            Ok("💬partial".as_bytes().to_vec()),
            Err(StreamError::Transport("connection reset".to_string())),
        ]]);

        let outcome = ctl.submit("hi").await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        assert_eq!(ctl.state(), SessionState::Idle);
        // Content that arrived before the failure stays rendered.
        assert_eq!(texts_of(ctl.sink().view(), Role::Assistant), vec!["partial"]);
        assert!(ctl.sink().system[0].contains("Connection lost"));
    }

    #[tokio::test]
    async fn test_cancel_mid_stream() {
        // No scripted reply: the fake stream hangs until cancelled.
        let mut ctl = controller(Vec::new());
        let handle = ctl.cancel_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let outcome = ctl.submit("never answered").await;

        assert_eq!(outcome, SubmitOutcome::Cancelled);
        assert_eq!(ctl.state(), SessionState::Idle);
        assert_eq!(ctl.sink().system, vec!["Response cancelled."]);
    }

    /// Fires the cancel handle while the request itself is in flight, then
    /// hands back a normal reply stream.
    struct CancelDuringAsk {
        handle: Mutex<Option<CancelHandle>>,
    }

    #[async_trait]
    impl Transport for CancelDuringAsk {
        async fn init(&self) -> Result<SessionInfo, ApiError> {
            unreachable!("init not used")
        }

        async fn ask(&self, _user_input: &str) -> Result<HttpChunkStream, ApiError> {
            if let Some(handle) = self.handle.lock().unwrap().take() {
                handle.cancel();
            }
            Ok(ChunkStream::new(Box::pin(futures::stream::iter(
                FakeTransport::reply(&["💬too late"]),
            ))))
        }
    }

    /// A request that never returns headers at all.
    struct HangingAsk;

    #[async_trait]
    impl Transport for HangingAsk {
        async fn init(&self) -> Result<SessionInfo, ApiError> {
            unreachable!("init not used")
        }

        async fn ask(&self, _user_input: &str) -> Result<HttpChunkStream, ApiError> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancel_while_request_in_flight() {
        let mut ctl = SessionController::new(
            CancelDuringAsk {
                handle: Mutex::new(None),
            },
            SentinelClassifier::new(),
            RecordingSink::default(),
        );
        *ctl.transport().handle.lock().unwrap() = Some(ctl.cancel_handle());

        let outcome = ctl.submit("hi").await;

        assert_eq!(outcome, SubmitOutcome::Cancelled);
        assert_eq!(ctl.state(), SessionState::Idle);
        assert!(texts_of(ctl.sink().view(), Role::Assistant).is_empty());
        assert_eq!(ctl.sink().system, vec!["Response cancelled."]);
    }

    #[tokio::test]
    async fn test_cancel_while_request_never_returns() {
        let mut ctl = SessionController::new(
            HangingAsk,
            SentinelClassifier::new(),
            RecordingSink::default(),
        );
        let handle = ctl.cancel_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(5), ctl.submit("hi"))
            .await
            .expect("cancel did not end the round trip");

        assert_eq!(outcome, SubmitOutcome::Cancelled);
        assert_eq!(ctl.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_stale_cancel_does_not_abort_next_submit() {
        let mut ctl = controller(vec![FakeTransport::reply(&["💬fine"])]);

        // Cancel fired between rounds must not poison the next one.
        ctl.cancel_handle().cancel();

        let outcome = ctl.submit("hi").await;
        assert_eq!(outcome, SubmitOutcome::Completed);
    }

    #[tokio::test]
    async fn test_embedded_block_rendered_with_answer() {
        let mut ctl = controller(vec![FakeTransport::reply(&[
            "💬See chart <img-block><img src=\"c.png\"></img-block>",
        ])]);

        ctl.submit("plot it").await;

        let view = ctl.sink().view();
        assert_eq!(texts_of(view, Role::Assistant), vec!["See chart"]);
        assert_eq!(
            texts_of(view, Role::Embedded),
            vec!["<img-block><img src=\"c.png\"></img-block>"]
        );
    }

    #[tokio::test]
    async fn test_codepoint_split_across_network_reads() {
        let marker = "💬ok".as_bytes();
        let mut ctl = controller(vec![vec![
            Ok(marker[..2].to_vec()),
            Ok(marker[2..].to_vec()),
        ]]);

        ctl.submit("hi").await;

        assert_eq!(texts_of(ctl.sink().view(), Role::Assistant), vec!["ok"]);
    }

    // =========================================================================
    // Initialize Tests
    // =========================================================================

    #[tokio::test]
    async fn test_initialize_renders_greeting() {
        let transport =
            FakeTransport::new(Vec::new()).with_greeting("💬Welcome back, alice!");
        let mut ctl = SessionController::new(
            transport,
            SentinelClassifier::new(),
            RecordingSink::default(),
        );

        let info = ctl.initialize().await.unwrap();

        assert_eq!(info.username, "alice");
        assert_eq!(
            texts_of(ctl.sink().view(), Role::Assistant),
            vec!["Welcome back, alice!"]
        );
        assert!(ctl.sink().system[0].contains("alice"));
        assert!(ctl.sink().system[0].contains("gpt-4o"));
    }

    #[tokio::test]
    async fn test_initialize_failure_propagates() {
        let mut ctl = SessionController::new(
            FailingTransport { status: 500 },
            SentinelClassifier::new(),
            RecordingSink::default(),
        );

        assert!(ctl.initialize().await.is_err());
    }
}
