//! Error types for Luminary.

pub mod unified;

pub use unified::{ErrorCategory, ErrorKind};

use thiserror::Error;

/// Primary error type for all Luminary operations.
#[derive(Error, Debug)]
pub enum LuminaryError {
    #[error("Invalid request: {0}")]
    RequestValidation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool {tool_name}: {message}")]
    InvalidToolArguments { tool_name: String, message: String },

    #[error("Tool execution error: {tool_name} ({message})")]
    ToolExecution { tool_name: String, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Canceled")]
    Canceled,
}

impl LuminaryError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RequestValidation(_) => ErrorCategory::Validation,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::UnknownTool(_) | Self::InvalidToolArguments { .. } => ErrorCategory::ToolContract,
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Canceled => ErrorCategory::Canceled,
            Self::Stream(_) | Self::Io(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Wire classification carried by terminal error events.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RequestValidation(_) => ErrorKind::RequestValidation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::InvalidToolArguments { .. } => ErrorKind::InvalidToolArguments,
            Self::ToolExecution { .. } => ErrorKind::ToolExecution,
            Self::Canceled => ErrorKind::Canceled,
            _ => ErrorKind::ModelProvider,
        }
    }

    /// Short, non-technical message safe to show to the end user.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::RequestValidation => self.to_string(),
            ErrorKind::Configuration => "The assistant is not configured correctly.".to_string(),
            ErrorKind::UnknownTool => "The model tried to call an unknown tool.".to_string(),
            ErrorKind::InvalidToolArguments => {
                "The model called a tool with invalid arguments.".to_string()
            }
            ErrorKind::ToolExecution => "An error occurred during tool execution.".to_string(),
            ErrorKind::ModelProvider => {
                "The model is unavailable right now. Please try again.".to_string()
            }
            ErrorKind::Canceled => "The response was stopped.".to_string(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LuminaryError>;
