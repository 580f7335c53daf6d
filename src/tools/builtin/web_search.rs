//! `web_search`: queries a SearXNG-compatible JSON API.
//!
//! Produces two independent outputs: `result`, formatted snippets meant as
//! model context, and `sources`, citations for the UI. Each source is emitted
//! through the execution context before the result is returned.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::truncate_chars;
use crate::error::LuminaryError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};
use crate::types::Source;

/// Results kept per query.
pub const MAX_RESULTS: usize = 3;
const SNIPPET_CHARS: usize = 500;

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// The `web_search` tool.
pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
    parameters: AgentToolParameters,
}

impl WebSearchTool {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            parameters: AgentToolParameters::object()
                .string("query", "Search query", true)
                .build(),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, LuminaryError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LuminaryError::tool(
                "web_search",
                format!("search endpoint returned {status}"),
            ));
        }
        let body: SearchResponse = response.json().await?;

        let mut seen = HashSet::new();
        Ok(body
            .results
            .into_iter()
            .filter(|hit| hit.url.starts_with("http://") || hit.url.starts_with("https://"))
            .filter(|hit| seen.insert(hit.url.clone()))
            .take(MAX_RESULTS)
            .collect())
    }
}

fn format_snippet(source: &Source, content: &str) -> String {
    format!(
        "Source: {}\nTitle: {}\nDescription: {}\n{}",
        source.url, source.title, source.description, content
    )
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Performs a web search and returns snippets from the top results along with a list of source URLs."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, LuminaryError> {
        let query = args.get_str("query")?;
        tracing::debug!(tool_call_id = %ctx.tool_call_id, query, "searching");

        let hits = match self.search(query).await {
            Ok(hits) => hits,
            Err(err) => {
                tracing::warn!(tool_call_id = %ctx.tool_call_id, error = %err, "web search failed");
                return Ok(json!({
                    "result": [format!("[web_search] Unexpected error occurred: {err}")],
                    "sources": [],
                }));
            }
        };

        let mut result = Vec::with_capacity(hits.len());
        let mut sources = Vec::with_capacity(hits.len());
        for hit in hits {
            let collapsed = hit.content.split_whitespace().collect::<Vec<_>>().join(" ");
            let content = truncate_chars(&collapsed, SNIPPET_CHARS);
            let source = match Source::new(&hit.url, hit.title.trim()) {
                Ok(source) => source.with_description(content.clone()),
                Err(err) => {
                    tracing::debug!(url = %hit.url, error = %err, "skipping malformed result url");
                    continue;
                }
            };
            result.push(format_snippet(&source, &content));
            ctx.emit_source(source.clone());
            sources.push(source);
        }

        Ok(json!({ "result": result, "sources": sources }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::SourceSink;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(usize, String)>>);

    impl SourceSink for Recorder {
        fn emit_source(&self, _tool_call_id: &str, index: usize, source: Source) {
            self.0.lock().unwrap().push((index, source.url));
        }
    }

    #[tokio::test]
    async fn keeps_three_unique_http_results_and_emits_sources_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "rust async"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "url": "https://tokio.rs/", "title": "Tokio", "content": "An   async runtime" },
                    { "url": "https://tokio.rs/", "title": "dup", "content": "dup" },
                    { "url": "ftp://files.example/x", "title": "ftp", "content": "" },
                    { "url": "https://docs.rs/futures", "title": "futures", "content": "Futures" },
                    { "url": "https://rust-lang.github.io/async-book/", "title": "Async book", "content": "Book" },
                    { "url": "https://example.com/fourth", "title": "4th", "content": "x" }
                ]
            })))
            .mount(&server)
            .await;

        let recorder = Arc::new(Recorder::default());
        let ctx = ToolExecutionContext::new("call-7", "web_search").with_source_sink(recorder.clone());
        let tool = WebSearchTool::new(reqwest::Client::new(), &server.uri());
        let out = tool
            .execute(&ToolArguments::new("web_search", json!({ "query": "rust async" })), &ctx)
            .await
            .unwrap();

        let sources = out["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0]["faviconUrl"], "https://www.google.com/s2/favicons?domain=tokio.rs");
        assert_eq!(
            out["result"][0],
            "Source: https://tokio.rs/\nTitle: Tokio\nDescription: An async runtime\nAn async runtime"
        );
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                (0, "https://tokio.rs/".to_string()),
                (1, "https://docs.rs/futures".to_string()),
                (2, "https://rust-lang.github.io/async-book/".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failure_returns_single_line_and_no_sources() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tool = WebSearchTool::new(reqwest::Client::new(), &server.uri());
        let ctx = ToolExecutionContext::new("c", "web_search");
        let out = tool
            .execute(&ToolArguments::new("web_search", json!({ "query": "x" })), &ctx)
            .await
            .unwrap();
        assert_eq!(out["sources"], json!([]));
        assert_eq!(out["result"].as_array().unwrap().len(), 1);
        assert_eq!(ctx.sources_emitted(), 0);
    }
}
