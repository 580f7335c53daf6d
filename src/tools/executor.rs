//! Uniform tool invocation: lookup, validation, timeout, and error shaping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::arguments::ToolArguments;
use super::registry::ToolRegistry;
use super::tool::{Tool, ToolExecutionContext};
use super::validation::validate_arguments;
use crate::error::{ErrorKind, LuminaryError};
use crate::types::AgentToolCall;
use crate::util::with_timeout;

/// What a tool call resolved to once it ran.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The tool returned a result.
    Success(Value),
    /// The tool ran but failed. The message is fed back to the model.
    ExecutionError { message: String },
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ExecutionError { .. })
    }

    /// Value sent back to the model and to the client.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Success(value) => value.clone(),
            Self::ExecutionError { message } => serde_json::json!({ "error": message }),
        }
    }
}

/// A call that passed lookup and validation and is ready to run.
#[derive(Clone)]
pub struct PreparedCall {
    pub call: AgentToolCall,
    tool: Arc<dyn Tool>,
    args: ToolArguments,
}

impl std::fmt::Debug for PreparedCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedCall").field("call", &self.call).finish()
    }
}

/// Runs registry tools with validation and bounded execution time.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    default_timeout: Duration,
    timeouts: HashMap<String, Duration>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            default_timeout: Duration::from_secs(15),
            timeouts: HashMap::new(),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Override the timeout of one tool.
    pub fn with_tool_timeout(mut self, tool_name: impl Into<String>, timeout: Duration) -> Self {
        self.timeouts.insert(tool_name.into(), timeout);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn timeout_for(&self, tool_name: &str) -> Duration {
        self.timeouts
            .get(tool_name)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    /// Resolve the tool and validate the arguments without running anything.
    ///
    /// Fails with `UnknownTool` or `InvalidToolArguments`.
    pub fn prepare(&self, call: &AgentToolCall) -> Result<PreparedCall, LuminaryError> {
        let tool = self
            .registry
            .get(&call.name)
            .cloned()
            .ok_or_else(|| LuminaryError::UnknownTool(call.name.clone()))?;

        let arguments = normalize_arguments(&call.name, &call.arguments)?;
        validate_arguments(&arguments, &tool.parameters().schema).map_err(|message| {
            LuminaryError::InvalidToolArguments {
                tool_name: call.name.clone(),
                message,
            }
        })?;

        let mut call = call.clone();
        call.arguments = arguments.clone();
        Ok(PreparedCall {
            args: ToolArguments::new(&call.name, arguments),
            call,
            tool,
        })
    }

    /// Run a prepared call.
    ///
    /// Tool failures and timeouts resolve to [`ToolOutcome::ExecutionError`];
    /// only cancellation is returned as `Err`.
    pub async fn run(
        &self,
        prepared: &PreparedCall,
        ctx: &ToolExecutionContext,
    ) -> Result<ToolOutcome, LuminaryError> {
        let name = prepared.call.name.as_str();
        let timeout = self.timeout_for(name);
        let started = std::time::Instant::now();

        let execution = with_timeout(timeout, prepared.tool.execute(&prepared.args, ctx));
        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(LuminaryError::Canceled),
            result = execution => result,
        };

        match result {
            Ok(value) => {
                tracing::debug!(
                    tool = name,
                    tool_call_id = %prepared.call.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool call succeeded"
                );
                Ok(ToolOutcome::Success(value))
            }
            Err(LuminaryError::Canceled) => Err(LuminaryError::Canceled),
            Err(err) => {
                tracing::warn!(
                    tool = name,
                    tool_call_id = %prepared.call.id,
                    error = %err,
                    "tool call failed"
                );
                Ok(ToolOutcome::ExecutionError {
                    message: execution_message(name, &err),
                })
            }
        }
    }

    /// Prepare and run one call.
    pub async fn execute(
        &self,
        call: &AgentToolCall,
        ctx: &ToolExecutionContext,
    ) -> Result<ToolOutcome, LuminaryError> {
        let prepared = self.prepare(call)?;
        self.run(&prepared, ctx).await
    }
}

/// Decode string-encoded arguments and treat absent arguments as `{}`.
fn normalize_arguments(tool_name: &str, raw: &Value) -> Result<Value, LuminaryError> {
    match raw {
        Value::Null => Ok(Value::Object(Default::default())),
        Value::String(text) if text.trim().is_empty() => Ok(Value::Object(Default::default())),
        Value::String(text) => {
            serde_json::from_str(text).map_err(|e| LuminaryError::InvalidToolArguments {
                tool_name: tool_name.to_string(),
                message: format!("arguments are not valid JSON: {e}"),
            })
        }
        other => Ok(other.clone()),
    }
}

fn execution_message(tool_name: &str, err: &LuminaryError) -> String {
    match err {
        LuminaryError::Timeout(ms) => format!("{tool_name} timed out after {ms}ms"),
        LuminaryError::ToolExecution { message, .. } => message.clone(),
        // Upstream HTTP failures inside a tool are tool failures, not model ones.
        other if other.kind() == ErrorKind::ModelProvider => {
            format!("{tool_name} could not reach its service.")
        }
        other => other.user_message(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AgentTool, AgentToolParameters};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn call(name: &str, arguments: Value) -> AgentToolCall {
        AgentToolCall {
            id: "call-1".into(),
            name: name.into(),
            arguments,
        }
    }

    fn executor_with(tool: AgentTool) -> ToolExecutor {
        ToolExecutor::new(Arc::new(ToolRegistry::new().with(Arc::new(tool))))
    }

    #[tokio::test]
    async fn unknown_tool_is_never_invoked() {
        let executor = ToolExecutor::new(Arc::new(ToolRegistry::new()));
        let err = executor
            .execute(&call("launch_rockets", json!({})), &ToolExecutionContext::new("c", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, LuminaryError::UnknownTool(name) if name == "launch_rockets"));
    }

    #[tokio::test]
    async fn invalid_arguments_fail_before_execution() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let executor = executor_with(AgentTool::new(
            "web_search",
            "search",
            AgentToolParameters::object().string("query", "q", true).build(),
            move |_args, _ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!({})) }
            },
        ));

        let err = executor
            .execute(&call("web_search", json!({ "query": 7 })), &ToolExecutionContext::new("c", "web_search"))
            .await
            .unwrap_err();
        assert!(matches!(err, LuminaryError::InvalidToolArguments { .. }));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn string_encoded_arguments_are_decoded() {
        let executor = executor_with(AgentTool::new(
            "echo",
            "echo",
            AgentToolParameters::object().string("text", "t", true).build(),
            |args, _ctx| async move { Ok(json!(args.get_str("text")?)) },
        ));
        let prepared = executor
            .prepare(&call("echo", json!(r#"{"text":"hi"}"#)))
            .unwrap();
        assert_eq!(prepared.call.arguments, json!({ "text": "hi" }));
        let outcome = executor
            .run(&prepared, &ToolExecutionContext::new("c", "echo"))
            .await
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Success(json!("hi")));
    }

    #[tokio::test]
    async fn failures_become_structured_results() {
        let executor = executor_with(AgentTool::new(
            "get_weather",
            "weather",
            AgentToolParameters::empty(),
            |_args, _ctx| async { Err(LuminaryError::tool("get_weather", "upstream returned 502")) },
        ));
        let outcome = executor
            .execute(&call("get_weather", json!({})), &ToolExecutionContext::new("c", "get_weather"))
            .await
            .unwrap();
        assert!(outcome.is_error());
        assert_eq!(outcome.to_value(), json!({ "error": "upstream returned 502" }));
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_resolve_as_execution_errors() {
        let executor = executor_with(AgentTool::new(
            "run_code",
            "run",
            AgentToolParameters::empty(),
            |_args, _ctx| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(json!("never"))
            },
        ))
        .with_tool_timeout("run_code", Duration::from_secs(5));

        let outcome = executor
            .execute(&call("run_code", json!({})), &ToolExecutionContext::new("c", "run_code"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ToolOutcome::ExecutionError {
                message: "run_code timed out after 5000ms".into()
            }
        );
    }

    #[tokio::test]
    async fn internal_error_detail_is_not_sent_to_the_client() {
        let executor = executor_with(AgentTool::new(
            "get_weather",
            "weather",
            AgentToolParameters::empty(),
            |_args, _ctx| async {
                Err::<Value, _>(LuminaryError::Configuration(
                    "OPEN_METEO_URL=http://10.0.0.4:9000 refused".into(),
                ))
            },
        ));
        let outcome = executor
            .execute(&call("get_weather", json!({})), &ToolExecutionContext::new("c", "get_weather"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ToolOutcome::ExecutionError {
                message: "The assistant is not configured correctly.".into()
            }
        );

        let executor = executor_with(AgentTool::new(
            "get_weather",
            "weather",
            AgentToolParameters::empty(),
            |_args, _ctx| async { Err::<Value, _>(LuminaryError::api(502, "upstream html page")) },
        ));
        let outcome = executor
            .execute(&call("get_weather", json!({})), &ToolExecutionContext::new("c", "get_weather"))
            .await
            .unwrap();
        let ToolOutcome::ExecutionError { message } = outcome else {
            panic!("expected an execution error");
        };
        assert_eq!(message, "get_weather could not reach its service.");
    }

    #[tokio::test]
    async fn cancellation_stops_a_running_tool() {
        let executor = executor_with(AgentTool::new(
            "slow",
            "slow",
            AgentToolParameters::empty(),
            |_args, _ctx| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(json!(null))
            },
        ));
        let ctx = ToolExecutionContext::new("c", "slow");
        ctx.cancel.cancel();
        let err = executor.execute(&call("slow", json!({})), &ctx).await.unwrap_err();
        assert!(matches!(err, LuminaryError::Canceled));
    }
}
