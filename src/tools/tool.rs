//! Tool trait, execution context, and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::arguments::ToolArguments;
use super::types::AgentToolParameters;
use crate::error::LuminaryError;
use crate::types::Source;

/// Sources retained per tool call; later ones are dropped.
pub const MAX_SOURCES_PER_CALL: usize = 5;

/// Receiver for auxiliary data a tool emits while it is still running.
///
/// The orchestrator implements this on top of its outbound event sink, so
/// side-channel items are ordered with every other event of the turn.
pub trait SourceSink: Send + Sync {
    fn emit_source(&self, tool_call_id: &str, index: usize, source: Source);
}

/// Context available during tool execution.
#[derive(Clone)]
pub struct ToolExecutionContext {
    /// Tool call id issued by the model.
    pub tool_call_id: String,
    /// Tool name as requested by the model.
    pub tool_name: String,
    /// Fires when the turn is canceled.
    pub cancel: CancellationToken,
    sources: Option<Arc<dyn SourceSink>>,
    emitted: Arc<AtomicUsize>,
}

impl std::fmt::Debug for ToolExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutionContext")
            .field("tool_call_id", &self.tool_call_id)
            .field("tool_name", &self.tool_name)
            .field("sources", &self.sources.as_ref().map(|_| ".."))
            .finish()
    }
}

impl ToolExecutionContext {
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            cancel: CancellationToken::new(),
            sources: None,
            emitted: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_source_sink(mut self, sink: Arc<dyn SourceSink>) -> Self {
        self.sources = Some(sink);
        self
    }

    /// Emit a source ahead of the tool result.
    ///
    /// Indices are assigned per call in emission order starting at 0. Returns
    /// the index, or `None` once [`MAX_SOURCES_PER_CALL`] have been emitted.
    pub fn emit_source(&self, source: Source) -> Option<usize> {
        let index = self
            .emitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < MAX_SOURCES_PER_CALL).then_some(n + 1)
            })
            .ok()?;
        match &self.sources {
            Some(sink) => sink.emit_source(&self.tool_call_id, index, source),
            None => tracing::debug!(
                tool = %self.tool_name,
                tool_call_id = %self.tool_call_id,
                index,
                "no source sink attached; source dropped"
            ),
        }
        Some(index)
    }

    /// Number of sources emitted so far.
    pub fn sources_emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }
}

/// Core tool trait -- implement to create custom tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &AgentToolParameters;

    /// Execute the tool with validated arguments.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, LuminaryError>;
}

/// Type alias for the tool handler function.
type ToolHandler = dyn Fn(
        ToolArguments,
        ToolExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, LuminaryError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool for quick tool creation.
pub struct AgentTool {
    name: String,
    description: String,
    parameters: AgentToolParameters,
    handler: Arc<ToolHandler>,
}

impl AgentTool {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: AgentToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, LuminaryError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, LuminaryError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
