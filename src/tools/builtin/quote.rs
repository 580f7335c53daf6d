//! `get_random_quote`: fetches a quote; failures come back as a quote-shaped result.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolExecutionContext};

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    quote: String,
    author: String,
}

async fn fetch_quote(client: &reqwest::Client, endpoint: &str) -> Result<QuoteResponse, String> {
    let response = client
        .get(endpoint)
        .send()
        .await
        .map_err(|e| format!("Failed to fetch quote: {e}"))?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!(
            "Failed to fetch quote: {}",
            status.canonical_reason().unwrap_or(status.as_str())
        ));
    }
    response
        .json::<QuoteResponse>()
        .await
        .map_err(|e| format!("Failed to parse quote: {e}"))
}

/// Create the `get_random_quote` tool.
pub fn get_random_quote_tool(client: reqwest::Client, endpoint: &str) -> Arc<dyn Tool> {
    let endpoint = endpoint.to_string();
    Arc::new(AgentTool::new(
        "get_random_quote",
        "Fetch a random quote from a free API.",
        AgentToolParameters::empty(),
        move |_args, ctx: ToolExecutionContext| {
            let client = client.clone();
            let endpoint = endpoint.clone();
            async move {
                match fetch_quote(&client, &endpoint).await {
                    Ok(quote) => Ok(json!({ "content": quote.quote, "author": quote.author })),
                    Err(reason) => {
                        tracing::warn!(tool_call_id = %ctx.tool_call_id, %reason, "quote fetch failed");
                        Ok(json!({ "content": "Error fetching quote.", "author": reason }))
                    }
                }
            }
        },
    ))
}
