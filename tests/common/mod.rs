//! Shared test helpers and a scripted model provider.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use luminary::config::RuntimeSettings;
use luminary::error::LuminaryError;
use luminary::models::LanguageModel;
use luminary::orchestrator::{ChatRequest, Orchestrator, TurnEvent};
use luminary::provider::{DeltaStream, ModelProvider, ProviderFactory, ProviderRequest};
use luminary::tools::{AgentTool, AgentToolParameters, ToolExecutor, ToolRegistry};
use luminary::types::*;
use luminary::util::RetryPolicy;

/// One scripted model step.
pub enum Step {
    /// Stream these deltas, then end.
    Deltas(Vec<TextStreamDelta>),
    /// Stream these deltas, then stall until the consumer goes away.
    Stall(Vec<TextStreamDelta>),
    /// Fail before streaming.
    Refuse(LuminaryError),
}

/// A provider that replays queued steps and records every request.
#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn stream_text(&self, request: &ProviderRequest) -> Result<DeltaStream, LuminaryError> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Deltas(text_step("(script exhausted)")));
        match step {
            Step::Deltas(deltas) => Ok(futures::stream::iter(deltas.into_iter().map(Ok)).boxed()),
            Step::Stall(deltas) => Ok(futures::stream::iter(deltas.into_iter().map(Ok))
                .chain(futures::stream::pending())
                .boxed()),
            Step::Refuse(err) => Err(err),
        }
    }
}

/// Hands out the same scripted provider for every model.
pub struct ScriptedFactory(pub Arc<ScriptedProvider>);

impl ProviderFactory for ScriptedFactory {
    fn create(&self, _model: &LanguageModel) -> Result<Arc<dyn ModelProvider>, LuminaryError> {
        Ok(self.0.clone())
    }
}

pub fn usage(input: u32, output: u32) -> Usage {
    Usage {
        input_tokens: input,
        output_tokens: output,
        total_tokens: input + output,
    }
}

/// A step that answers with text and stops.
pub fn text_step(text: &str) -> Vec<TextStreamDelta> {
    vec![
        TextStreamDelta::text(text),
        TextStreamDelta::done(FinishReason::Stop, Some(usage(10, 2))),
    ]
}

/// A step that requests one tool call.
pub fn call_step(id: &str, name: &str, args: serde_json::Value) -> Vec<TextStreamDelta> {
    vec![
        TextStreamDelta::tool_call(AgentToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: args,
        }),
        TextStreamDelta::done(FinishReason::ToolCalls, Some(usage(10, 5))),
    ]
}

/// An `echo` tool that returns its `text` argument.
pub fn echo_tool() -> AgentTool {
    AgentTool::new(
        "echo",
        "Echo the text back",
        AgentToolParameters::object()
            .string("text", "Text to echo", true)
            .build(),
        |args, _ctx| async move { Ok(serde_json::json!({ "echo": args.get_str("text")? })) },
    )
}

/// Orchestrator over a scripted provider, without smoothing or retry delays.
pub fn orchestrator(provider: Arc<ScriptedProvider>, registry: ToolRegistry) -> Orchestrator {
    Orchestrator::new(
        Arc::new(ScriptedFactory(provider)),
        ToolExecutor::new(Arc::new(registry)).with_default_timeout(Duration::from_secs(5)),
        RuntimeSettings::default(),
    )
    .with_smoothing(None)
    .with_retry_policy(RetryPolicy {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        ..RetryPolicy::default()
    })
}

pub fn request(text: &str) -> ChatRequest {
    ChatRequest::new(vec![ChatMessage::user(text)])
}

pub fn kinds(events: &[TurnEvent]) -> Vec<&'static str> {
    events.iter().map(TurnEvent::kind).collect()
}
