//! Drives one conversational turn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::emitter::TurnEmitter;
use super::events::{TurnEvent, TurnEventPayload, TurnId};
use super::prompt::build_system_prompt;
use super::request::{to_model_messages, ChatRequest};
use super::state::{TurnPhase, TurnState};
use crate::config::{ConversationConfig, LuminaryConfig, RuntimeSettings};
use crate::error::{ErrorKind, LuminaryError, Result};
use crate::models::LanguageModel;
use crate::provider::{ConfigProviderFactory, ModelProvider, ProviderFactory, ProviderRequest};
use crate::stream_transform::{SmoothTransform, StreamTransform};
use crate::tools::builtin::default_executor;
use crate::tools::{PreparedCall, ToolExecutionContext, ToolExecutor, ToolOutcome};
use crate::types::{
    new_message_id, AgentToolCall, FinishReason, GenerationSettings, ModelMessage,
    StreamEventType, Usage,
};
use crate::util::RetryPolicy;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// `Done`, `Errored` or `Stopped`.
    pub phase: TurnPhase,
    /// Completed tool dispatch rounds.
    pub tool_steps: u32,
    /// Model calls made (one per generation step).
    pub model_steps: u32,
    pub usage: Usage,
    pub error: Option<ErrorKind>,
}

/// Streams turns: model generation, tool dispatch and event multiplexing.
#[derive(Clone)]
pub struct Orchestrator {
    providers: Arc<dyn ProviderFactory>,
    executor: Arc<ToolExecutor>,
    runtime: RuntimeSettings,
    retry: RetryPolicy,
    smoothing: Option<SmoothTransform>,
}

impl Orchestrator {
    pub fn new(
        providers: Arc<dyn ProviderFactory>,
        executor: ToolExecutor,
        runtime: RuntimeSettings,
    ) -> Self {
        let retry = RetryPolicy::default().with_max_attempts(runtime.model_retries);
        let smoothing = (runtime.smooth_stream_delay_ms > 0).then(|| {
            SmoothTransform::new(Duration::from_millis(runtime.smooth_stream_delay_ms))
        });
        Self {
            providers,
            executor: Arc::new(executor),
            runtime,
            retry,
            smoothing,
        }
    }

    /// Orchestrator with configured providers and the built-in tools.
    pub fn from_config(config: LuminaryConfig) -> Self {
        let runtime = config.runtime.clone();
        let executor = default_executor(&runtime.tools);
        Self::new(
            Arc::new(ConfigProviderFactory::new(config)),
            executor,
            runtime,
        )
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Word-by-word smoothing of text deltas; `None` forwards deltas as-is.
    pub fn with_smoothing(mut self, smoothing: Option<SmoothTransform>) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub(crate) fn provider_for(&self, model: &LanguageModel) -> Result<Arc<dyn ModelProvider>> {
        self.providers.create(model)
    }

    pub(crate) fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Validate the request and start streaming the turn.
    ///
    /// Validation and configuration failures are returned here, before any
    /// event exists. Everything after surfaces as events.
    pub fn start_turn(&self, request: ChatRequest, cancel: CancellationToken) -> Result<TurnHandle> {
        request.validate()?;
        let config = request.conversation_config(&self.runtime)?;
        let model = config.language_model()?;
        let provider = self.provider_for(&model)?;

        let mut messages = vec![ModelMessage::system(build_system_prompt(
            &config,
            chrono::Utc::now(),
        ))];
        messages.extend(to_model_messages(
            &request.messages,
            self.runtime.history_window,
        ));

        let turn_id = Uuid::new_v4();
        let message_id = new_message_id();
        let (emitter, events) = TurnEmitter::new(turn_id, message_id.clone());
        tracing::debug!(
            %turn_id,
            model = %model,
            history = request.messages.len(),
            forwarded = messages.len() - 1,
            "starting turn"
        );

        let turn = TurnRun {
            orchestrator: self.clone(),
            provider,
            model,
            config,
            messages,
            emitter,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(turn.run());
        Ok(TurnHandle {
            turn_id,
            message_id,
            events,
            task,
            cancel,
        })
    }
}

/// A running turn: its event receiver plus the task producing them.
pub struct TurnHandle {
    pub turn_id: TurnId,
    /// Id of the assistant message the turn produces.
    pub message_id: String,
    events: mpsc::UnboundedReceiver<TurnEvent>,
    task: JoinHandle<TurnOutcome>,
    cancel: CancellationToken,
}

impl TurnHandle {
    /// Next event, or `None` once the turn has ended.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        self.events.recv().await
    }

    /// Request a clean stop. Events still buffered are discarded, so
    /// [`TurnHandle::next_event`] yields `None` from here on.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.events.close();
        while self.events.try_recv().is_ok() {}
    }

    /// Event stream that cancels the turn when dropped.
    pub fn into_stream(self) -> BoxStream<'static, TurnEvent> {
        let guard = self.cancel.drop_guard();
        let mut events = self.events;
        Box::pin(async_stream::stream! {
            let _guard = guard;
            while let Some(event) = events.recv().await {
                yield event;
            }
        })
    }

    /// Drain every event and wait for the outcome.
    pub async fn collect(mut self) -> (Vec<TurnEvent>, TurnOutcome) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let outcome = self.task.await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "turn task failed");
            TurnOutcome {
                phase: TurnPhase::Errored,
                tool_steps: 0,
                model_steps: 0,
                usage: Usage::default(),
                error: Some(ErrorKind::ModelProvider),
            }
        });
        (events, outcome)
    }
}

/// Output of one generation step.
#[derive(Debug, Default)]
struct StepOutput {
    text: String,
    calls: Vec<AgentToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

enum TurnExit {
    Finished(FinishReason),
    Failed(LuminaryError),
    Stopped,
}

struct TurnRun {
    orchestrator: Orchestrator,
    provider: Arc<dyn ModelProvider>,
    model: LanguageModel,
    config: ConversationConfig,
    messages: Vec<ModelMessage>,
    emitter: TurnEmitter,
    cancel: CancellationToken,
}

impl TurnRun {
    async fn run(mut self) -> TurnOutcome {
        let mut state = TurnState::new(self.config.max_tool_steps);
        let mut usage = Usage::default();
        let mut model_steps = 0;

        self.emitter.emit(TurnEventPayload::TurnStart {
            message_id: self.emitter.message_id().to_string(),
            model: self.model.to_string(),
        });

        let exit = self.drive(&mut state, &mut usage, &mut model_steps).await;
        let turn_id = self.emitter.turn_id();
        let error = match exit {
            TurnExit::Finished(finish_reason) => {
                state.transition(TurnPhase::Finalizing);
                self.emitter.emit(TurnEventPayload::MessageFinish {
                    message_id: self.emitter.message_id().to_string(),
                    finish_reason,
                    usage,
                });
                state.transition(TurnPhase::Done);
                None
            }
            TurnExit::Stopped | TurnExit::Failed(LuminaryError::Canceled) => {
                self.emitter.halt();
                state.transition(TurnPhase::Stopped);
                tracing::info!(%turn_id, "turn stopped by client");
                None
            }
            TurnExit::Failed(err) => {
                tracing::warn!(%turn_id, error = %err, kind = %err.kind(), "turn failed");
                self.emitter.emit(TurnEventPayload::Error {
                    message_id: Some(self.emitter.message_id().to_string()),
                    kind: err.kind(),
                    message: err.user_message(),
                });
                state.transition(TurnPhase::Errored);
                Some(err.kind())
            }
        };

        TurnOutcome {
            phase: state.phase(),
            tool_steps: state.tool_steps(),
            model_steps,
            usage,
            error,
        }
    }

    async fn drive(
        &mut self,
        state: &mut TurnState,
        usage: &mut Usage,
        model_steps: &mut u32,
    ) -> TurnExit {
        state.transition(TurnPhase::Generating);
        loop {
            *model_steps += 1;
            let step = *model_steps;
            let cancel = self.cancel.clone();
            let output = tokio::select! {
                biased;
                _ = cancel.cancelled() => return TurnExit::Stopped,
                output = self.generate(state.can_dispatch()) => output,
            };
            let output = match output {
                Ok(output) => output,
                Err(err) => return TurnExit::Failed(err),
            };

            let finish_reason = output.finish_reason.unwrap_or(FinishReason::Stop);
            if let Some(step_usage) = &output.usage {
                usage.merge(step_usage);
            }
            self.emitter.emit(TurnEventPayload::StepFinish {
                message_id: self.emitter.message_id().to_string(),
                step,
                finish_reason,
                usage: output.usage,
            });

            if output.calls.is_empty() {
                return TurnExit::Finished(finish_reason);
            }
            if !state.can_dispatch() {
                tracing::debug!(step, calls = output.calls.len(), "tool step bound reached");
                return TurnExit::Finished(finish_reason);
            }

            state.transition(TurnPhase::ToolDispatch);
            let prepared = match output
                .calls
                .iter()
                .map(|call| self.orchestrator.executor.prepare(call))
                .collect::<Result<Vec<_>>>()
            {
                Ok(prepared) => prepared,
                Err(err) => return TurnExit::Failed(err),
            };
            let calls: Vec<AgentToolCall> = prepared.iter().map(|p| p.call.clone()).collect();
            self.messages
                .push(ModelMessage::assistant_step(&output.text, &calls));

            let outcomes = tokio::select! {
                biased;
                _ = cancel.cancelled() => return TurnExit::Stopped,
                outcomes = self.dispatch(prepared) => outcomes,
            };
            let outcomes = match outcomes {
                Ok(outcomes) => outcomes,
                Err(err) => return TurnExit::Failed(err),
            };
            for (call, outcome) in outcomes {
                self.messages.push(ModelMessage::tool_result(
                    call.id,
                    outcome.to_value(),
                    outcome.is_error(),
                ));
            }

            if !state.can_dispatch() {
                tracing::debug!(step, "tool step bound reached after dispatch");
                return TurnExit::Finished(FinishReason::ToolCalls);
            }
            state.transition(TurnPhase::Generating);
        }
    }

    /// Stream one model step, forwarding deltas as events.
    async fn generate(&self, offer_tools: bool) -> Result<StepOutput> {
        let request = ProviderRequest {
            messages: self.messages.clone(),
            settings: GenerationSettings::chat(self.config.temperature),
            tools: offer_tools
                .then(|| self.orchestrator.executor.registry().definitions())
                .filter(|defs| !defs.is_empty()),
            stream_tool_calls: self.config.tool_streaming_enabled,
        };

        let stream = self
            .orchestrator
            .retry
            .execute(|| self.provider.stream_text(&request))
            .await?;
        let mut stream = match &self.orchestrator.smoothing {
            Some(smoothing) => smoothing.transform(stream),
            None => stream,
        };

        let message_id = self.emitter.message_id().to_string();
        let streaming_calls = self.config.tool_streaming_enabled;
        let mut output = StepOutput::default();
        while let Some(delta) = stream.next().await {
            let delta = delta?;
            match delta.event_type {
                StreamEventType::TextDelta => {
                    if delta.text.is_empty() {
                        continue;
                    }
                    output.text.push_str(&delta.text);
                    self.emitter.emit(TurnEventPayload::TextDelta {
                        message_id: message_id.clone(),
                        text: delta.text,
                    });
                }
                StreamEventType::ReasoningDelta => {
                    if !delta.text.is_empty() {
                        self.emitter.emit(TurnEventPayload::ReasoningDelta {
                            message_id: message_id.clone(),
                            text: delta.text,
                        });
                    }
                }
                StreamEventType::ToolCallStart => {
                    if let (true, Some(start)) = (streaming_calls, delta.tool_call_delta) {
                        self.emitter.emit(TurnEventPayload::ToolCallStart {
                            message_id: message_id.clone(),
                            tool_call_id: start.id,
                            tool_name: start.name,
                        });
                    }
                }
                StreamEventType::ToolCallDelta => {
                    if let (true, Some(fragment)) = (streaming_calls, delta.tool_call_delta) {
                        self.emitter.emit(TurnEventPayload::ToolCallDelta {
                            message_id: message_id.clone(),
                            tool_call_id: fragment.id,
                            tool_name: fragment.name,
                            args_text_delta: fragment.arguments_delta,
                        });
                    }
                }
                StreamEventType::ToolCall => {
                    if let Some(call) = delta.tool_call {
                        self.emitter.emit(TurnEventPayload::ToolCall {
                            message_id: message_id.clone(),
                            tool_call_id: call.id.clone(),
                            tool_name: call.name.clone(),
                            args: call.arguments.clone(),
                        });
                        output.calls.push(call);
                    }
                }
                StreamEventType::Done => {
                    output.finish_reason = delta.finish_reason;
                    output.usage = delta.usage;
                }
            }
        }
        Ok(output)
    }

    /// Run prepared calls: same-name calls one after another, different
    /// names concurrently. Results come back in call order.
    async fn dispatch(&self, prepared: Vec<PreparedCall>) -> Result<Vec<(AgentToolCall, ToolOutcome)>> {
        let mut groups: Vec<Vec<(usize, PreparedCall)>> = Vec::new();
        let mut group_of: HashMap<String, usize> = HashMap::new();
        for (index, call) in prepared.into_iter().enumerate() {
            let slot = *group_of.entry(call.call.name.clone()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push((index, call));
        }

        let runs = groups.into_iter().map(|group| async move {
            let mut done = Vec::with_capacity(group.len());
            for (index, call) in group {
                let outcome = self.run_call(&call).await?;
                done.push((index, call.call, outcome));
            }
            Ok::<_, LuminaryError>(done)
        });

        let mut results: Vec<(usize, AgentToolCall, ToolOutcome)> = Vec::new();
        for group in futures::future::join_all(runs).await {
            results.extend(group?);
        }
        results.sort_by_key(|(index, _, _)| *index);
        Ok(results
            .into_iter()
            .map(|(_, call, outcome)| (call, outcome))
            .collect())
    }

    async fn run_call(&self, prepared: &PreparedCall) -> Result<ToolOutcome> {
        let call = &prepared.call;
        let ctx = ToolExecutionContext::new(&call.id, &call.name)
            .with_cancel(self.cancel.child_token())
            .with_source_sink(Arc::new(self.emitter.clone()));
        let outcome = self.orchestrator.executor.run(prepared, &ctx).await?;
        self.emitter.emit(TurnEventPayload::ToolResult {
            message_id: self.emitter.message_id().to_string(),
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result: outcome.to_value(),
            is_error: outcome.is_error(),
        });
        Ok(outcome)
    }
}
