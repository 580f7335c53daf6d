//! Short live descriptions of what a tool call is doing.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::runner::Orchestrator;
use crate::error::{LuminaryError, Result};
use crate::models::LanguageModel;
use crate::provider::ProviderRequest;
use crate::types::{GenerationSettings, ModelMessage, StreamEventType};

/// Model used when the request does not name one.
pub const EXPLAIN_MODEL: &str = "google/gemini-2.5-pro-exp-03-25:free";

const EXPLAIN_SYSTEM: &str =
    "You're a system that explains what a tool is currently doing in simple active phrases.";

/// Body of `POST /api/explain-tool`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExplainToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ExplainToolRequest {
    fn prompt(&self) -> String {
        format!(
            "Based on the tool \"{}\" and the following arguments: {}, describe what is currently \
             being done as an active step. Use present progressive tense (e.g., \"executing\", \
             \"generating\", \"fetching\") and avoid describing the tool itself. Focus only on \
             what action is being performed right now with these arguments. Respond with a short phrase.",
            self.tool_name, self.args
        )
    }
}

impl Orchestrator {
    /// Stream a short phrase describing a tool call. No tools are offered.
    pub async fn explain_tool(
        &self,
        request: &ExplainToolRequest,
    ) -> Result<BoxStream<'static, Result<String>>> {
        if request.tool_name.trim().is_empty() {
            return Err(LuminaryError::RequestValidation(
                "toolName must not be empty".into(),
            ));
        }
        let model: LanguageModel = request.model.as_deref().unwrap_or(EXPLAIN_MODEL).parse()?;
        let provider = self.provider_for(&model)?;
        let provider_request = ProviderRequest {
            messages: vec![
                ModelMessage::system(EXPLAIN_SYSTEM),
                ModelMessage::user(request.prompt()),
            ],
            settings: GenerationSettings::default(),
            tools: None,
            stream_tool_calls: false,
        };

        tracing::debug!(tool = %request.tool_name, model = %model, "explaining tool call");
        let stream = self
            .retry_policy()
            .execute(|| provider.stream_text(&provider_request))
            .await?;
        Ok(stream
            .filter_map(|delta| async move {
                match delta {
                    Ok(d) if d.event_type == StreamEventType::TextDelta && !d.text.is_empty() => {
                        Some(Ok(d.text))
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                }
            })
            .boxed())
    }
}
