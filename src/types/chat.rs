//! Client-visible chat messages: ordered parts, tool invocations and sources.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::LuminaryError;

/// Role of a client-visible message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Data,
}

/// A message as exchanged with the client.
///
/// `parts` preserve emission order. `content` is the flat text form older
/// clients send instead of parts; it is used only when `parts` is empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default = "new_message_id")]
    pub id: String,
    pub role: ChatRole,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
    #[serde(default, alias = "experimental_attachments")]
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    /// Create an empty message with a fresh id.
    pub fn new(role: ChatRole) -> Self {
        Self::with_id(new_message_id(), role)
    }

    /// Create an empty message with the given id.
    pub fn with_id(id: impl Into<String>, role: ChatRole) -> Self {
        Self {
            id: id.into(),
            role,
            content: String::new(),
            parts: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Create a user message holding a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        let mut message = Self::new(ChatRole::User);
        message.parts.push(MessagePart::Text { text: text.into() });
        message
    }

    /// Concatenated text of all text parts (or `content` when there are none).
    pub fn text(&self) -> String {
        let joined: String = self
            .parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if joined.is_empty() && !self.has_text_parts() {
            return self.content.clone();
        }
        joined
    }

    fn has_text_parts(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, MessagePart::Text { .. }))
    }

    /// Tool invocations in emission order.
    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(|part| match part {
            MessagePart::ToolInvocation { tool_invocation } => Some(tool_invocation),
            _ => None,
        })
    }

    /// Look up a tool invocation by call id.
    pub fn tool_invocation_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolInvocation> {
        self.parts.iter_mut().find_map(|part| match part {
            MessagePart::ToolInvocation { tool_invocation }
                if tool_invocation.tool_call_id == tool_call_id =>
            {
                Some(tool_invocation)
            }
            _ => None,
        })
    }

    /// Sources attached to this message in arrival order.
    pub fn sources(&self) -> Vec<&Source> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Source { source, .. } => Some(source),
                _ => None,
            })
            .collect()
    }

    /// Check the structural requirements for a message sent by the client.
    pub fn validate(&self, index: usize) -> Result<(), LuminaryError> {
        if self.parts.is_empty() && self.content.is_empty() && self.attachments.is_empty() {
            return Err(LuminaryError::RequestValidation(format!(
                "Invalid message at index {index}: no content."
            )));
        }
        Ok(())
    }
}

/// Generate a message id.
pub fn new_message_id() -> String {
    format!("msg-{}", uuid::Uuid::new_v4().simple())
}

/// A single ordered part of a chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolInvocation {
        #[serde(rename = "toolInvocation")]
        tool_invocation: ToolInvocation,
    },
    Source {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        index: usize,
        source: Source,
    },
}

/// Lifecycle of a tool invocation part. Transitions only move forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToolInvocationState {
    Pending,
    Partial,
    Result,
    Error,
}

impl ToolInvocationState {
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Partial => 1,
            Self::Result | Self::Error => 2,
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// `partial` may repeat; terminal states accept nothing.
    pub fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() > self.rank() || (self == Self::Partial && next == Self::Partial)
    }
}

/// A tool call as rendered on the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolInvocationState,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub args_text: String,
}

impl ToolInvocation {
    pub fn pending(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            state: ToolInvocationState::Pending,
            args: serde_json::Value::Null,
            result: None,
            args_text: String::new(),
        }
    }

    /// Move to `next` if the transition is forward. Returns whether it moved.
    pub fn advance(&mut self, next: ToolInvocationState) -> bool {
        if !self.state.can_advance_to(next) {
            return false;
        }
        self.state = next;
        true
    }
}

/// File attached to a message (already uploaded elsewhere).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }
}

/// A citation produced by a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub favicon_url: String,
}

impl Source {
    /// Build a source, rejecting URLs that are not absolute http(s) URLs.
    ///
    /// The favicon defaults to one derived from the URL's domain.
    pub fn new(url: &str, title: impl Into<String>) -> Result<Self, LuminaryError> {
        let parsed = Url::parse(url)
            .map_err(|e| LuminaryError::RequestValidation(format!("invalid source url '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(LuminaryError::RequestValidation(format!(
                "invalid source url '{url}': not an http(s) address"
            )));
        }
        Ok(Self {
            favicon_url: favicon_for(&parsed),
            url: parsed.to_string(),
            title: title.into(),
            description: String::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Use an explicit favicon; an empty value keeps the derived one.
    pub fn with_favicon(mut self, favicon_url: impl Into<String>) -> Self {
        let favicon_url = favicon_url.into();
        if !favicon_url.is_empty() {
            self.favicon_url = favicon_url;
        }
        self
    }

    /// Host name of the source URL.
    pub fn domain(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

fn favicon_for(url: &Url) -> String {
    let domain = url.host_str().unwrap_or_default();
    format!("https://www.google.com/s2/favicons?domain={domain}")
}
