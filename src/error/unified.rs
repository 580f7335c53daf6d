//! Error classification shared by the orchestrator and the wire format.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Classification carried by terminal `error` events and HTTP error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    RequestValidation,
    Configuration,
    UnknownTool,
    InvalidToolArguments,
    ToolExecution,
    ModelProvider,
    Canceled,
}

impl ErrorKind {
    /// Whether a failure of this kind ends the turn when raised by a tool call.
    pub fn aborts_turn(self) -> bool {
        matches!(
            self,
            Self::UnknownTool | Self::InvalidToolArguments | Self::ModelProvider
        )
    }
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Configuration,
    ToolContract,
    ToolExecution,
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Serialization,
    Canceled,
    Unknown,
}
