//! Inbound chat requests: validation and conversion to model context.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::conversation::RequestSettings;
use crate::config::{ConversationConfig, CustomInstructions, RuntimeSettings};
use crate::error::{LuminaryError, Result};
use crate::types::{
    new_message_id, AgentToolCall, ChatMessage, ChatRole, ContentPart, MessagePart, ModelMessage,
    Role, ToolInvocationState,
};

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub settings: RequestSettings,
    #[serde(default)]
    pub custom_instructions: CustomInstructions,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Parse an untyped body, reporting the first malformed message by index.
    pub fn from_json(body: Value) -> Result<Self> {
        let Value::Object(mut body) = body else {
            return Err(LuminaryError::RequestValidation(
                "Request body must be a JSON object.".into(),
            ));
        };
        let Some(Value::Array(raw_messages)) = body.remove("messages") else {
            return Err(LuminaryError::RequestValidation(
                "Request body must include a 'messages' array.".into(),
            ));
        };

        let messages = raw_messages
            .into_iter()
            .enumerate()
            .map(|(i, raw)| -> Result<ChatMessage> {
                let mut message = serde_json::from_value::<ChatMessage>(raw).map_err(|e| {
                    LuminaryError::RequestValidation(format!("Invalid message at index {i}: {e}."))
                })?;
                if message.id.trim().is_empty() {
                    message.id = new_message_id();
                }
                Ok(message)
            })
            .collect::<Result<Vec<_>>>()?;

        let settings = optional_field(&mut body, "settings")?;
        let custom_instructions = optional_field(&mut body, "customInstructions")?;

        let request = Self {
            messages,
            settings,
            custom_instructions,
        };
        request.validate()?;
        Ok(request)
    }

    /// Check structural requirements without touching the model.
    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(LuminaryError::RequestValidation(
                "Request body must include at least one message.".into(),
            ));
        }
        for (i, message) in self.messages.iter().enumerate() {
            message.validate(i)?;
        }
        Ok(())
    }

    /// Resolve the per-turn configuration against runtime defaults.
    pub fn conversation_config(&self, runtime: &RuntimeSettings) -> Result<ConversationConfig> {
        self.settings
            .clone()
            .resolve(self.custom_instructions.clone(), runtime)
    }
}

fn optional_field<T>(body: &mut serde_json::Map<String, Value>, key: &str) -> Result<T>
where
    T: Default + serde::de::DeserializeOwned,
{
    match body.remove(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(raw) => serde_json::from_value(raw)
            .map_err(|e| LuminaryError::RequestValidation(format!("Invalid '{key}': {e}."))),
    }
}

/// Convert the most recent `window` client messages into model context.
///
/// `data` messages stay client-side. Completed tool invocations of earlier
/// assistant messages are replayed as tool calls followed by their results.
pub fn to_model_messages(messages: &[ChatMessage], window: usize) -> Vec<ModelMessage> {
    let start = messages.len().saturating_sub(window);
    let mut out = Vec::with_capacity(window.min(messages.len()));
    for message in &messages[start..] {
        match message.role {
            ChatRole::Data => continue,
            ChatRole::System => out.push(ModelMessage::system(message.text())),
            ChatRole::User => out.push(user_message(message)),
            ChatRole::Assistant => out.extend(assistant_messages(message)),
        }
    }
    out
}

fn user_message(message: &ChatMessage) -> ModelMessage {
    let mut content = Vec::new();
    let text = message.text();
    if !text.is_empty() {
        content.push(ContentPart::Text { text });
    }
    content.extend(
        message
            .attachments
            .iter()
            .filter(|a| a.is_image())
            .map(|a| ContentPart::Image {
                url: a.url.clone(),
                mime_type: a.content_type.clone().unwrap_or_default(),
            }),
    );
    ModelMessage {
        role: Role::User,
        content,
        timestamp: None,
    }
}

fn assistant_messages(message: &ChatMessage) -> Vec<ModelMessage> {
    let mut calls = Vec::new();
    let mut results = Vec::new();
    for part in &message.parts {
        let MessagePart::ToolInvocation { tool_invocation } = part else {
            continue;
        };
        let Some(result) = tool_invocation.result.clone() else {
            continue;
        };
        calls.push(AgentToolCall {
            id: tool_invocation.tool_call_id.clone(),
            name: tool_invocation.tool_name.clone(),
            arguments: tool_invocation.args.clone(),
        });
        results.push(ModelMessage::tool_result(
            &tool_invocation.tool_call_id,
            result,
            tool_invocation.state == ToolInvocationState::Error,
        ));
    }

    let text = message.text();
    if text.is_empty() && calls.is_empty() {
        return Vec::new();
    }
    let mut out = vec![ModelMessage::assistant_step(&text, &calls)];
    out.extend(results);
    out
}
