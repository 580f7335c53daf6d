//! Built-in assistant tools.
//!
//! Provides `run_code`, `generate_chart`, `get_weather`, `get_random_quote`
//! and `web_search`. Endpoints and timeouts come from [`ToolSettings`]; every
//! tool is returned as `Arc<dyn Tool>`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use luminary::config::ToolSettings;
//! use luminary::tools::builtin::default_registry;
//!
//! let registry = default_registry(&ToolSettings::default());
//! assert_eq!(registry.len(), 5);
//! ```

mod chart;
mod quote;
mod run_code;
mod weather;
mod web_search;

pub use chart::{generate_chart_tool, ChartPayload, ChartPoint};
pub use quote::get_random_quote_tool;
pub use run_code::RunCodeTool;
pub use weather::get_weather_tool;
pub use web_search::WebSearchTool;

use std::sync::Arc;

use crate::config::ToolSettings;
use crate::provider::http::shared_client;
use crate::tools::{Tool, ToolExecutor, ToolKind, ToolRegistry};

/// Create all built-in tools.
pub fn all_tools(settings: &ToolSettings) -> Vec<Arc<dyn Tool>> {
    let client = shared_client().clone();
    vec![
        Arc::new(RunCodeTool::new(client.clone(), &settings.piston_url)),
        generate_chart_tool(),
        get_weather_tool(client.clone(), &settings.weather_url),
        get_random_quote_tool(client.clone(), &settings.quote_url),
        Arc::new(WebSearchTool::new(client, &settings.search_url)),
    ]
}

/// Registry holding every built-in tool.
pub fn default_registry(settings: &ToolSettings) -> ToolRegistry {
    all_tools(settings)
        .into_iter()
        .fold(ToolRegistry::new(), |registry, tool| registry.with(tool))
}

/// Executor over the built-in tools with the configured timeouts.
pub fn default_executor(settings: &ToolSettings) -> ToolExecutor {
    ToolExecutor::new(Arc::new(default_registry(settings)))
        .with_default_timeout(settings.timeout())
        .with_tool_timeout(ToolKind::RunCode.as_ref(), settings.run_code_timeout())
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cutoff, _)) => text[..cutoff].to_string(),
        None => text.to_string(),
    }
}
