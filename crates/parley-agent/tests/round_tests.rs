use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley_agent::{AgentConfig, AgentError, AgentEvent, AgentLoop, ChatSession, RetryPolicy};
use parley_core::chat::{ChatChunk, ChatUsage};
use parley_core::types::{Message, Role, ToolCall, ToolDefinition};
use parley_core::Context;
use parley_llm::{Completion, LLMError, ModelGateway, StreamHandle};
use parley_tool::{ArgDef, ArgType, Tool, ToolCoordinator, ToolRegistry};
use serde_json::json;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

type ChunkScript = Vec<Result<ChatChunk, LLMError>>;

/// Gateway double answering from queued scripts and counting calls
#[derive(Default)]
struct ScriptedGateway {
    completions: Mutex<VecDeque<Result<Completion, LLMError>>>,
    streams: Mutex<VecDeque<Result<ChunkScript, LLMError>>>,
    completion_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    completion_contexts: Mutex<Vec<Context>>,
    stream_contexts: Mutex<Vec<Context>>,
}

impl ScriptedGateway {
    fn new() -> Self {
        Self::default()
    }

    fn completion(self, completion: Completion) -> Self {
        self.completions.lock().unwrap().push_back(Ok(completion));
        self
    }

    fn completion_error(self, err: LLMError) -> Self {
        self.completions.lock().unwrap().push_back(Err(err));
        self
    }

    fn stream(self, parts: &[&str]) -> Self {
        let script = parts.iter().map(|p| Ok(ChatChunk::content(*p))).collect();
        self.streams.lock().unwrap().push_back(Ok(script));
        self
    }

    fn stream_script(self, script: ChunkScript) -> Self {
        self.streams.lock().unwrap().push_back(Ok(script));
        self
    }

    fn stream_error(self, err: LLMError) -> Self {
        self.streams.lock().unwrap().push_back(Err(err));
        self
    }

    fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn request_completion(
        &self,
        _model: Option<&str>,
        context: &Context,
        _tools: &[ToolDefinition],
    ) -> parley_llm::Result<Completion> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        self.completion_contexts.lock().unwrap().push(context.clone());
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Completion::default()))
    }

    async fn request_stream(
        &self,
        _model: Option<&str>,
        context: &Context,
        _tools: &[ToolDefinition],
    ) -> parley_llm::Result<StreamHandle> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.stream_contexts.lock().unwrap().push(context.clone());
        let script = self.streams.lock().unwrap().pop_front().unwrap_or_else(|| Ok(vec![]))?;
        Ok(StreamHandle::from_chunks(script))
    }
}

fn calculator() -> Tool {
    Tool::from_fn("calculator", "Add integers", |args| {
        let expression = args["expression"].as_str().unwrap_or_default();
        let total: i64 = expression
            .split('+')
            .filter_map(|t| t.trim().parse::<i64>().ok())
            .sum();
        Ok(json!(total))
    })
    .with_arg(ArgDef::required("expression", ArgType::String, "Expression"))
}

fn tool_calls(calls: Vec<ToolCall>) -> Completion {
    Completion {
        text: String::new(),
        tool_calls: calls,
        usage: ChatUsage::new(5, 1),
    }
}

fn agent(gateway: Arc<ScriptedGateway>, tools: Vec<Tool>, config: AgentConfig) -> AgentLoop {
    let registry = Arc::new(ToolRegistry::with_tools(tools).unwrap());
    AgentLoop::new(config, gateway, ToolCoordinator::new(registry))
}

fn no_retry() -> AgentConfig {
    AgentConfig {
        retry: RetryPolicy::none(),
        ..AgentConfig::default()
    }
}

/// Run one round and collect every event it produced
async fn run(agent: &AgentLoop, context: &Context, text: &str) -> (Result<Context, AgentError>, Vec<AgentEvent>) {
    let (tx, mut rx) = mpsc::channel(64);
    let result = agent
        .run_with_retry(context, text, &tx, &CancellationToken::new())
        .await;
    drop(tx);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

fn chunk_texts(events: &[AgentEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Chunk { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_answer_is_concatenation_of_non_empty_chunks() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["Hello", " there", "!"],
        vec!["", "a", "", "b", ""],
        vec!["single"],
        vec!["line one\n", "", "line two"],
    ];

    for parts in cases {
        let gateway = Arc::new(ScriptedGateway::new().stream(&parts));
        let agent = agent(gateway, vec![], no_retry());
        let (result, events) = run(&agent, &Context::new("sys"), "hi").await;

        let expected: String = parts.concat();
        let delivered = chunk_texts(&events);
        assert!(delivered.iter().all(|t| !t.is_empty()));
        assert_eq!(delivered.concat(), expected);

        let context = result.unwrap();
        let last = context.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, expected);
    }
}

#[tokio::test]
async fn test_empty_registry_skips_completion_call() {
    let gateway = Arc::new(ScriptedGateway::new().stream(&["Hello", " there", "!"]));
    let agent = agent(gateway.clone(), vec![], no_retry());
    let base = Context::new("sys");

    let (result, _) = run(&agent, &base, "hi").await;
    let context = result.unwrap();

    assert_eq!(gateway.completion_calls(), 0);
    assert_eq!(gateway.stream_calls(), 1);

    let roles: Vec<_> = context.history().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    assert_eq!(context.last().unwrap().content, "Hello there!");
}

#[tokio::test]
async fn test_direct_answer_probes_then_streams_fresh() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .completion(Completion {
                text: "discarded probe".to_string(),
                ..Completion::default()
            })
            .stream(&["streamed"]),
    );
    let agent = agent(gateway.clone(), vec![calculator()], no_retry());

    let (result, _) = run(&agent, &Context::new("sys"), "hi").await;
    let context = result.unwrap();

    assert_eq!(gateway.completion_calls(), 1);
    assert_eq!(gateway.stream_calls(), 1);
    assert_eq!(context.last().unwrap().content, "streamed");
    // probe text never reaches the context
    assert!(context.history().iter().all(|m| m.content != "discarded probe"));
}

#[tokio::test]
async fn test_calculator_round_trip() {
    let call = ToolCall::new("call_1", "calculator", json!({"expression": "2+2"}));
    let gateway = Arc::new(
        ScriptedGateway::new()
            .completion(tool_calls(vec![call]))
            .completion(Completion::default())
            .stream(&["2+2 is ", "4"]),
    );
    let agent = agent(gateway.clone(), vec![calculator()], no_retry());

    let (result, events) = run(&agent, &Context::new("sys"), "what is 2+2?").await;
    let context = result.unwrap();

    let tool_message = context
        .history()
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert_eq!(tool_message.content, "4");
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));

    assert_eq!(gateway.completion_calls(), 2);
    assert_eq!(gateway.stream_calls(), 1);

    // the second probe already sees the folded tool result
    let second = gateway.completion_contexts.lock().unwrap()[1].clone();
    assert_eq!(second.last().unwrap().content, "4");
    let streamed = gateway.stream_contexts.lock().unwrap()[0].clone();
    assert_eq!(streamed, second);

    assert!(events.contains(&AgentEvent::ToolCall {
        call_id: "call_1".to_string(),
        name: "calculator".to_string(),
    }));
    assert!(events.contains(&AgentEvent::ToolResult {
        call_id: "call_1".to_string(),
        name: "calculator".to_string(),
        success: true,
    }));
    tokio_test::assert_ok!(context.validate());
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_model() {
    let call = ToolCall::new("call_9", "foo", json!({}));
    let gateway = Arc::new(
        ScriptedGateway::new()
            .completion(tool_calls(vec![call]))
            .stream(&["sorry"]),
    );
    let agent = agent(gateway, vec![calculator()], no_retry());

    let (result, events) = run(&agent, &Context::new("sys"), "use foo").await;
    let context = result.unwrap();

    let tool_message = context
        .history()
        .iter()
        .find(|m| m.tool_call_id.as_deref() == Some("call_9"))
        .unwrap();
    assert!(tool_message.content.to_lowercase().contains("foo not found"));
    assert!(events.contains(&AgentEvent::ToolResult {
        call_id: "call_9".to_string(),
        name: "foo".to_string(),
        success: false,
    }));
}

#[tokio::test]
async fn test_zero_chunks_is_empty_response() {
    let gateway = Arc::new(ScriptedGateway::new().stream(&[]));
    let agent = agent(gateway.clone(), vec![], no_retry());
    let base = Context::new("sys").append(Message::user("earlier"));

    let (result, events) = run(&agent, &base, "hi").await;

    assert!(matches!(result, Err(AgentError::EmptyResponse)));
    assert!(chunk_texts(&events).is_empty());
    // not retried even with a retry policy in place
    assert_eq!(gateway.stream_calls(), 1);
    assert_eq!(base.len(), 2);
}

#[tokio::test]
async fn test_only_empty_chunks_is_empty_response() {
    let gateway = Arc::new(ScriptedGateway::new().stream(&["", ""]));
    let agent = agent(gateway, vec![], AgentConfig::default());

    let (result, _) = run(&agent, &Context::new("sys"), "hi").await;
    assert!(matches!(result, Err(AgentError::EmptyResponse)));
}

#[tokio::test]
async fn test_round_limit_stops_tool_loop() {
    let mut gateway = ScriptedGateway::new();
    for i in 0..10 {
        gateway = gateway.completion(tool_calls(vec![ToolCall::new(
            format!("call_{}", i),
            "calculator",
            json!({"expression": "1+1"}),
        )]));
    }
    let gateway = Arc::new(gateway);
    let config = AgentConfig {
        max_rounds: 2,
        ..no_retry()
    };
    let agent = agent(gateway.clone(), vec![calculator()], config);

    let (result, _) = run(&agent, &Context::new("sys"), "loop forever").await;

    assert!(matches!(result, Err(AgentError::RoundLimitExceeded { max_rounds: 2 })));
    assert_eq!(gateway.completion_calls(), 3);
    assert_eq!(gateway.stream_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_retries_whole_round() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .stream_error(LLMError::Network("connection reset".to_string()))
            .stream(&["ok"]),
    );
    let config = AgentConfig {
        retry: RetryPolicy::default().with_max_attempts(3),
        ..AgentConfig::default()
    };
    let agent = agent(gateway.clone(), vec![], config);

    let (result, events) = run(&agent, &Context::new("sys"), "hi").await;

    assert_eq!(result.unwrap().last().unwrap().content, "ok");
    assert_eq!(gateway.stream_calls(), 2);
    assert!(matches!(
        events.first(),
        Some(AgentEvent::Retrying { attempt: 1, max_attempts: 3, .. })
    ));

    // both attempts started from the same pre-round context
    let contexts = gateway.stream_contexts.lock().unwrap().clone();
    let contents = |c: &Context| c.history().iter().map(|m| m.content.clone()).collect::<Vec<_>>();
    assert_eq!(contents(&contexts[0]), contents(&contexts[1]));
    assert_eq!(contexts[0].len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_mid_stream_failure_is_retried() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .stream_script(vec![
                Ok(ChatChunk::content("partial")),
                Err(LLMError::Stream("connection dropped".to_string())),
            ])
            .stream(&["complete"]),
    );
    let agent = agent(gateway.clone(), vec![], AgentConfig::default());

    let (result, events) = run(&agent, &Context::new("sys"), "hi").await;

    assert_eq!(result.unwrap().last().unwrap().content, "complete");
    assert_eq!(chunk_texts(&events), vec!["partial", "complete"]);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_waits_for_retry_after() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .completion_error(LLMError::RateLimited { retry_after: Some(7) })
            .stream(&["fine"]),
    );
    let agent = agent(gateway.clone(), vec![calculator()], AgentConfig::default());

    let started = tokio::time::Instant::now();
    let (result, _) = run(&agent, &Context::new("sys"), "hi").await;

    tokio_test::assert_ok!(result);
    assert!(started.elapsed() >= Duration::from_secs(7));
    assert_eq!(gateway.completion_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() {
    let mut gateway = ScriptedGateway::new();
    for _ in 0..5 {
        gateway = gateway.stream_error(LLMError::Api {
            status: 503,
            message: "unavailable".to_string(),
        });
    }
    let gateway = Arc::new(gateway);
    let config = AgentConfig {
        retry: RetryPolicy::default().with_max_attempts(3),
        ..AgentConfig::default()
    };
    let agent = agent(gateway.clone(), vec![], config);

    let (result, events) = run(&agent, &Context::new("sys"), "hi").await;

    assert!(matches!(result, Err(AgentError::Gateway(LLMError::Api { status: 503, .. }))));
    assert_eq!(gateway.stream_calls(), 3);
    let retries = events
        .iter()
        .filter(|e| matches!(e, AgentEvent::Retrying { .. }))
        .count();
    assert_eq!(retries, 2);
}

#[tokio::test]
async fn test_auth_failure_not_retried() {
    let gateway = Arc::new(ScriptedGateway::new().stream_error(LLMError::Auth("401".to_string())));
    let agent = agent(gateway.clone(), vec![], AgentConfig::default());

    let (result, events) = run(&agent, &Context::new("sys"), "hi").await;

    let err = result.unwrap_err();
    assert!(matches!(err, AgentError::Gateway(LLMError::Auth(_))));
    assert!(err.user_message().contains("API key"));
    assert_eq!(gateway.stream_calls(), 1);
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_session_send_updates_context_and_reset_forgets() {
    let gateway = Arc::new(ScriptedGateway::new().stream(&["Hello", " there", "!"]));
    let agent = Arc::new(agent(gateway, vec![], no_retry()));
    let mut session = ChatSession::new(agent, "sys");

    let mut displayed = String::new();
    let context = session
        .send("hi", |event| {
            if let AgentEvent::Chunk { text } = event {
                displayed.push_str(text);
            }
        })
        .await
        .unwrap();

    assert_eq!(displayed, "Hello there!");
    assert_eq!(context.len(), 3);
    assert_eq!(session.context(), &context);

    session.reset();
    assert_eq!(session.context().len(), 1);
    assert_eq!(session.context().history()[0].content, "sys");
}

#[tokio::test]
async fn test_session_error_keeps_context() {
    let gateway = Arc::new(ScriptedGateway::new().stream(&[]));
    let agent = Arc::new(agent(gateway, vec![], no_retry()));
    let mut session = ChatSession::new(agent, "sys");
    let before = session.context().clone();

    let mut terminal = None;
    let result = session
        .send("hi", |event| {
            if event.is_terminal() {
                terminal = Some(event.clone());
            }
        })
        .await;

    assert!(matches!(result, Err(AgentError::EmptyResponse)));
    assert_eq!(
        terminal,
        Some(AgentEvent::error("The model returned an empty response."))
    );
    assert_eq!(session.context(), &before);
}

#[tokio::test]
async fn test_complete_event_carries_context() {
    let gateway = Arc::new(ScriptedGateway::new().stream(&["done"]));
    let agent = Arc::new(agent(gateway, vec![], no_retry()));
    let mut session = ChatSession::new(agent, "sys");

    let mut handle = session.submit("hi").unwrap();
    let mut completed = None;
    while let Some(event) = handle.next_event().await {
        if let AgentEvent::Complete { context } = event {
            completed = Some(context);
        }
    }

    let context = completed.unwrap();
    session.apply_completion(context.clone());
    assert_eq!(session.context(), &context);
    assert!(!session.is_busy());
}

/// Gateway whose stream never yields and records when it is dropped
struct HangingGateway {
    opened: Arc<Notify>,
    dropped: Arc<AtomicBool>,
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ModelGateway for HangingGateway {
    async fn request_completion(
        &self,
        _model: Option<&str>,
        _context: &Context,
        _tools: &[ToolDefinition],
    ) -> parley_llm::Result<Completion> {
        Ok(Completion::default())
    }

    async fn request_stream(
        &self,
        _model: Option<&str>,
        _context: &Context,
        _tools: &[ToolDefinition],
    ) -> parley_llm::Result<StreamHandle> {
        self.opened.notify_one();
        let flag = DropFlag(self.dropped.clone());
        let stream = futures::stream::pending::<Result<ChatChunk, LLMError>>();
        let stream = futures::StreamExt::map(stream, move |item| {
            let _keep = &flag;
            item
        });
        Ok(StreamHandle::new(Box::pin(stream)))
    }
}

#[tokio::test]
async fn test_overlapping_submit_rejected_and_cancel_closes_stream() {
    let opened = Arc::new(Notify::new());
    let dropped = Arc::new(AtomicBool::new(false));
    let gateway = Arc::new(HangingGateway {
        opened: opened.clone(),
        dropped: dropped.clone(),
    });
    let registry = Arc::new(ToolRegistry::new());
    let agent = Arc::new(AgentLoop::new(no_retry(), gateway, ToolCoordinator::new(registry)));
    let mut session = ChatSession::new(agent, "sys");
    let before = session.context().clone();

    let mut handle = session.submit("first").unwrap();
    assert!(matches!(session.submit("second"), Err(AgentError::RoundInProgress)));
    assert!(session.is_busy());

    opened.notified().await;
    session.cancel();
    session.cancel();

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    assert_eq!(events, vec![AgentEvent::error("The request was cancelled.")]);
    assert!(dropped.load(Ordering::SeqCst));
    assert_eq!(session.context(), &before);

    // a new round is accepted once the old one is gone
    tokio_test::assert_ok!(session.submit("third"));
    handle.cancel();
}

struct PanickingGateway;

#[async_trait]
impl ModelGateway for PanickingGateway {
    async fn request_completion(
        &self,
        _model: Option<&str>,
        _context: &Context,
        _tools: &[ToolDefinition],
    ) -> parley_llm::Result<Completion> {
        Ok(Completion::default())
    }

    async fn request_stream(
        &self,
        _model: Option<&str>,
        _context: &Context,
        _tools: &[ToolDefinition],
    ) -> parley_llm::Result<StreamHandle> {
        panic!("provider adapter bug")
    }
}

#[tokio::test]
async fn test_gateway_panic_still_ends_with_error_event() {
    let registry = Arc::new(ToolRegistry::new());
    let agent = Arc::new(AgentLoop::new(
        no_retry(),
        Arc::new(PanickingGateway),
        ToolCoordinator::new(registry),
    ));
    let mut session = ChatSession::new(agent, "sys");
    let before = session.context().clone();

    let mut handle = session.submit("hi").unwrap();
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }

    assert_eq!(
        events,
        vec![AgentEvent::error("Something went wrong while generating the reply.")]
    );
    match session.wait().await {
        Err(AgentError::TaskFailed(reason)) => assert!(reason.contains("provider adapter bug")),
        other => panic!("unexpected result: {:?}", other.map(|c| c.len())),
    }
    assert_eq!(session.context(), &before);

    // the session stays usable
    assert!(!session.is_busy());
}
