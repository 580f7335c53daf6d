//! OpenAI-compatible Chat Completions streaming provider (Groq, OpenRouter).

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::LuminaryError;
use crate::models::ProviderKey;
use crate::types::*;

use super::http::{bearer_headers, parse_sse_data, shared_client, status_to_error};
use super::{DeltaStream, ModelProvider, ProviderRequest};

/// Provider for any API speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatibleProvider {
    provider: ProviderKey,
    model_id: String,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        provider: ProviderKey,
        model_id: impl Into<String>,
        api_key: String,
        base_url: String,
    ) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_request_body(&self, request: &ProviderRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_openai).collect();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), json!(self.model_id));
        body.insert("messages".into(), json!(messages));
        body.insert("stream".into(), json!(true));

        let settings = &request.settings;
        if let Some(max) = settings.max_tokens {
            body.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            body.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            body.insert("top_p".into(), top_p.into());
        }
        if let Some(ref stops) = settings.stop_sequences {
            body.insert("stop".into(), json!(stops));
        }
        if let Some(pp) = settings.presence_penalty {
            body.insert("presence_penalty".into(), pp.into());
        }
        if let Some(fp) = settings.frequency_penalty {
            body.insert("frequency_penalty".into(), fp.into());
        }
        if let Some(seed) = settings.seed {
            body.insert("seed".into(), seed.into());
        }

        if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
            let tool_defs: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), tool_defs.into());
        }

        Value::Object(body)
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    fn provider_name(&self) -> &str {
        self.provider.as_str()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn stream_text(&self, request: &ProviderRequest) -> Result<DeltaStream, LuminaryError> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(provider = self.provider.as_str(), model = %self.model_id, "stream_text");

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();
        let stream_tool_calls = request.stream_tool_calls;

        let stream = async_stream::stream! {
            let mut lines = SseLines::default();
            let mut assembler = StepAssembler::new(stream_tool_calls);
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(LuminaryError::Network(e));
                        return;
                    }
                };

                for line in lines.push(&chunk) {
                    let Some(data) = parse_sse_data(&line) else { continue };
                    match serde_json::from_str::<StreamChunk>(data) {
                        Ok(chunk) => {
                            if let Some(message) = chunk.error_message() {
                                yield Err(LuminaryError::Stream(message));
                                return;
                            }
                            for delta in assembler.ingest(chunk) {
                                yield Ok(delta);
                            }
                        }
                        Err(e) => debug!(error = %e, "skipping unparseable chunk"),
                    }
                }
            }

            for delta in assembler.finish() {
                yield Ok(delta);
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Splits a byte stream into non-empty, non-comment SSE lines.
///
/// Bytes are held until a newline arrives, so a UTF-8 sequence split across
/// network chunks is decoded whole.
#[derive(Default)]
struct SseLines {
    buffer: Vec<u8>,
}

impl SseLines {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            out.push(line);
        }
        out
    }
}

/// Folds wire chunks of one step into typed deltas.
///
/// Tool-call fragments are accumulated by index; complete calls are released
/// when the step reports a finish reason (or the stream ends).
struct StepAssembler {
    stream_tool_calls: bool,
    calls: BTreeMap<u32, PartialCall>,
    think: ThinkSplitter,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

#[derive(Default)]
struct PartialCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    announced: bool,
}

impl StepAssembler {
    fn new(stream_tool_calls: bool) -> Self {
        Self {
            stream_tool_calls,
            calls: BTreeMap::new(),
            think: ThinkSplitter::default(),
            finish_reason: None,
            usage: None,
        }
    }

    fn ingest(&mut self, chunk: StreamChunk) -> Vec<TextStreamDelta> {
        let mut out = Vec::new();
        if let Some(usage) = chunk.usage.or(chunk.x_groq.and_then(|x| x.usage)) {
            self.usage = Some(usage.into());
        }

        for choice in chunk.choices {
            let delta = choice.delta;
            if let Some(reasoning) = delta.reasoning.or(delta.reasoning_content) {
                if !reasoning.is_empty() {
                    out.push(TextStreamDelta::reasoning(reasoning));
                }
            }
            if let Some(content) = delta.content {
                out.extend(self.think.push(&content));
            }
            for fragment in delta.tool_calls.unwrap_or_default() {
                out.extend(self.ingest_tool_fragment(fragment));
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(FinishReason::from_wire(&reason));
                out.extend(self.flush_calls());
            }
        }
        out
    }

    fn ingest_tool_fragment(&mut self, fragment: ToolCallFragment) -> Vec<TextStreamDelta> {
        let mut out = Vec::new();
        let stream_tool_calls = self.stream_tool_calls;
        let call = self.calls.entry(fragment.index).or_default();
        if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
            call.id = Some(id);
        }
        let function = fragment.function.unwrap_or_default();
        if let Some(name) = function.name.filter(|n| !n.is_empty()) {
            call.name = Some(name);
        }
        if !call.announced {
            if let (Some(id), Some(name)) = (&call.id, &call.name) {
                call.announced = true;
                out.push(TextStreamDelta::tool_call_start(id.clone(), name.clone()));
            }
        }
        if let Some(args) = function.arguments.filter(|a| !a.is_empty()) {
            call.arguments.push_str(&args);
            if stream_tool_calls && call.announced {
                if let (Some(id), Some(name)) = (&call.id, &call.name) {
                    out.push(TextStreamDelta::tool_call_fragment(id.clone(), name.clone(), args));
                }
            }
        }
        out
    }

    fn flush_calls(&mut self) -> Vec<TextStreamDelta> {
        let mut out: Vec<TextStreamDelta> = self.think.flush().into_iter().collect();
        for (index, call) in std::mem::take(&mut self.calls) {
            let Some(name) = call.name else {
                debug!(index, "dropping tool call fragment without a name");
                continue;
            };
            let id = call
                .id
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
            if !call.announced {
                out.push(TextStreamDelta::tool_call_start(id.clone(), name.clone()));
            }
            out.push(TextStreamDelta::tool_call(AgentToolCall {
                id,
                name,
                arguments: parse_arguments(&call.arguments),
            }));
        }
        out
    }

    fn finish(mut self) -> Vec<TextStreamDelta> {
        let had_pending_calls = !self.calls.is_empty();
        let mut out = self.flush_calls();
        let reason = self.finish_reason.unwrap_or(if had_pending_calls {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        });
        out.push(TextStreamDelta::done(reason, self.usage));
        out
    }
}

/// Arguments that are not valid JSON are kept as the raw string; the tool
/// executor rejects them as invalid arguments.
fn parse_arguments(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return json!({});
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Splits inline `<think>...</think>` blocks out of content deltas.
#[derive(Default)]
struct ThinkSplitter {
    in_think: bool,
    pending: String,
}

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

impl ThinkSplitter {
    fn push(&mut self, content: &str) -> Vec<TextStreamDelta> {
        self.pending.push_str(content);
        let mut out = Vec::new();
        loop {
            let tag = if self.in_think { THINK_CLOSE } else { THINK_OPEN };
            if let Some(pos) = self.pending.find(tag) {
                let before: String = self.pending.drain(..pos).collect();
                self.pending.drain(..tag.len());
                self.emit(&mut out, before);
                self.in_think = !self.in_think;
                continue;
            }
            // Hold back a suffix that could be the start of a tag.
            let keep = partial_tag_suffix(&self.pending, tag);
            let cut = self.pending.len() - keep;
            let ready: String = self.pending.drain(..cut).collect();
            self.emit(&mut out, ready);
            return out;
        }
    }

    fn flush(&mut self) -> Option<TextStreamDelta> {
        let rest = std::mem::take(&mut self.pending);
        let mut out = Vec::new();
        self.emit(&mut out, rest);
        out.pop()
    }

    fn emit(&self, out: &mut Vec<TextStreamDelta>, text: String) {
        if text.is_empty() {
            return;
        }
        out.push(if self.in_think {
            TextStreamDelta::reasoning(text)
        } else {
            TextStreamDelta::text(text)
        });
    }
}

fn partial_tag_suffix(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&n| {
            text.len() >= n
                && text.is_char_boundary(text.len() - n)
                && tag.starts_with(&text[text.len() - n..])
        })
        .unwrap_or(0)
}

fn message_to_openai(msg: &ModelMessage) -> Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    if let [ContentPart::ToolResult(tr)] = msg.content.as_slice() {
        return json!({
            "role": "tool",
            "tool_call_id": tr.tool_call_id,
            "content": tr.result.to_string(),
        });
    }

    let tool_calls = msg.tool_calls();
    if !tool_calls.is_empty() {
        let tc_json: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments.to_string(),
                    }
                })
            })
            .collect();
        let text = msg.text();
        return json!({
            "role": role,
            "content": if text.is_empty() { Value::Null } else { Value::String(text) },
            "tool_calls": tc_json,
        });
    }

    let has_images = msg
        .content
        .iter()
        .any(|p| matches!(p, ContentPart::Image { .. }));
    if !has_images {
        return json!({ "role": role, "content": msg.text() });
    }

    let parts: Vec<Value> = msg
        .content
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(json!({ "type": "text", "text": text })),
            ContentPart::Image { url, .. } => Some(json!({
                "type": "image_url",
                "image_url": { "url": url }
            })),
            _ => None,
        })
        .collect();
    json!({ "role": role, "content": parts })
}

// Wire types (internal)

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    x_groq: Option<GroqExtra>,
    #[serde(default)]
    error: Option<Value>,
}

impl StreamChunk {
    fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        Some(
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        )
    }
}

#[derive(Deserialize)]
struct GroqExtra {
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallFragment>>,
}

#[derive(Deserialize)]
struct ToolCallFragment {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionFragment>,
}

#[derive(Deserialize, Default)]
struct FunctionFragment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(value: Value) -> StreamChunk {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn multibyte_text_split_across_chunks_is_decoded_whole() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut lines = SseLines::default();
        assert!(lines.push(&line[..split]).is_empty());
        let complete = lines.push(&line[split..]);
        assert_eq!(complete.len(), 1);

        let data = parse_sse_data(&complete[0]).unwrap();
        let mut assembler = StepAssembler::new(false);
        let text: String = assembler
            .ingest(serde_json::from_str(data).unwrap())
            .into_iter()
            .chain(assembler.finish())
            .filter(|d| d.event_type == StreamEventType::TextDelta)
            .map(|d| d.text)
            .collect();
        assert_eq!(text, "café");
    }

    #[test]
    fn comment_and_blank_lines_are_skipped() {
        let mut lines = SseLines::default();
        let out = lines.push(b": keep-alive\n\ndata: [DONE]\n");
        assert_eq!(out, vec!["data: [DONE]".to_string()]);
    }

    #[test]
    fn accumulates_tool_call_fragments_by_index() {
        let mut assembler = StepAssembler::new(true);
        let mut deltas = Vec::new();
        deltas.extend(assembler.ingest(chunk(json!({
            "choices": [{ "delta": { "tool_calls": [
                { "index": 0, "id": "call_a", "function": { "name": "web_search", "arguments": "{\"qu" } }
            ]}}]
        }))));
        deltas.extend(assembler.ingest(chunk(json!({
            "choices": [{ "delta": { "tool_calls": [
                { "index": 0, "function": { "arguments": "ery\":\"rust\"}" } }
            ]}, "finish_reason": "tool_calls" }]
        }))));
        deltas.extend(assembler.finish());

        let kinds: Vec<StreamEventType> = deltas.iter().map(|d| d.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                StreamEventType::ToolCallStart,
                StreamEventType::ToolCallDelta,
                StreamEventType::ToolCallDelta,
                StreamEventType::ToolCall,
                StreamEventType::Done,
            ]
        );
        let call = deltas[3].tool_call.clone().unwrap();
        assert_eq!(call.id, "call_a");
        assert_eq!(call.arguments, json!({ "query": "rust" }));
        assert_eq!(deltas[4].finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn without_tool_streaming_only_start_and_complete_call_are_emitted() {
        let mut assembler = StepAssembler::new(false);
        let mut deltas = assembler.ingest(chunk(json!({
            "choices": [{ "delta": { "tool_calls": [
                { "index": 0, "id": "c1", "function": { "name": "get_random_quote", "arguments": "{}" } }
            ]}, "finish_reason": "tool_calls" }]
        })));
        deltas.extend(assembler.finish());
        let kinds: Vec<StreamEventType> = deltas.iter().map(|d| d.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                StreamEventType::ToolCallStart,
                StreamEventType::ToolCall,
                StreamEventType::Done
            ]
        );
    }

    #[test]
    fn think_tags_split_into_reasoning_across_chunks() {
        let mut splitter = ThinkSplitter::default();
        let mut deltas = Vec::new();
        for piece in ["<thi", "nk>plan it</th", "ink>The answer", " is 4."] {
            deltas.extend(splitter.push(piece));
        }
        deltas.extend(splitter.flush());

        let reasoning: String = deltas
            .iter()
            .filter(|d| d.event_type == StreamEventType::ReasoningDelta)
            .map(|d| d.text.as_str())
            .collect();
        let text: String = deltas
            .iter()
            .filter(|d| d.event_type == StreamEventType::TextDelta)
            .map(|d| d.text.as_str())
            .collect();
        assert_eq!(reasoning, "plan it");
        assert_eq!(text, "The answer is 4.");
    }

    #[test]
    fn tool_messages_and_assistant_calls_use_openai_shape() {
        let call = AgentToolCall {
            id: "c1".into(),
            name: "get_weather".into(),
            arguments: json!({ "latitude": 1.0, "longitude": 2.0 }),
        };
        let assistant = message_to_openai(&ModelMessage::assistant_step("", &[call]));
        assert_eq!(assistant["content"], Value::Null);
        assert_eq!(assistant["tool_calls"][0]["function"]["name"], "get_weather");

        let tool = message_to_openai(&ModelMessage::tool_result("c1", json!({ "t": 1 }), false));
        assert_eq!(tool, json!({ "role": "tool", "tool_call_id": "c1", "content": "{\"t\":1}" }));
    }

    #[test]
    fn invalid_argument_json_is_kept_raw() {
        assert_eq!(parse_arguments("{oops"), Value::String("{oops".into()));
        assert_eq!(parse_arguments("  "), json!({}));
    }
}
