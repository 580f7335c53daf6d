//! Tool system for function calling.

pub mod arguments;
pub mod builtin;
pub mod executor;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use executor::{PreparedCall, ToolExecutor, ToolOutcome};
pub use registry::{ToolKind, ToolRegistry};
pub use tool::{AgentTool, SourceSink, Tool, ToolExecutionContext, MAX_SOURCES_PER_CALL};
pub use types::AgentToolParameters;
pub use validation::validate_arguments;
