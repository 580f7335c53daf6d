//! `luminary chat`: run one turn and render it on the terminal.

use std::io::Write;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::ChatArgs;
use crate::client::{ChatSession, RemoteChat, UiDecision};
use crate::config::conversation::RequestSettings;
use crate::config::{CustomInstructions, LuminaryConfig};
use crate::error::Result;
use crate::orchestrator::{Orchestrator, TurnEvent, TurnEventPayload};

const RESULT_PREVIEW: usize = 200;

/// Handle `luminary chat <prompt>`.
pub async fn handle_chat(args: ChatArgs, config: LuminaryConfig) -> Result<()> {
    let mut session = ChatSession::new();
    session.push_user(args.prompt);
    let settings = RequestSettings {
        model: args.model,
        temperature: args.temperature,
        max_tool_steps: args.max_tool_steps,
        ..Default::default()
    };
    let request = session.request(settings, CustomInstructions::default());

    let mut events: BoxStream<'static, Result<TurnEvent>> = match args.server {
        Some(url) => RemoteChat::new(url).send(&request).await?,
        None => Orchestrator::from_config(config)
            .start_turn(request, CancellationToken::new())?
            .into_stream()
            .map(Ok)
            .boxed(),
    };

    loop {
        let next = tokio::select! {
            next = events.next() => next,
            _ = tokio::signal::ctrl_c() => {
                session.stop();
                eprintln!("\n(stopped)");
                break;
            }
        };
        let Some(event) = next else { break };
        let event = event?;
        render(&event.payload);
        for decision in session.ingest(&event) {
            match decision {
                UiDecision::RevealSources(message_id) => print_sources(&session, &message_id),
            }
        }
    }
    println!();
    Ok(())
}

fn render(payload: &TurnEventPayload) {
    match payload {
        TurnEventPayload::TextDelta { text, .. } => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        TurnEventPayload::ToolCall {
            tool_name,
            tool_call_id,
            ..
        } => eprintln!("\n⚡ {tool_name} ({tool_call_id})"),
        TurnEventPayload::ToolResult {
            result, is_error, ..
        } => {
            let preview = truncate(&result.to_string(), RESULT_PREVIEW);
            if *is_error {
                eprintln!("  ❌ {preview}");
            } else {
                eprintln!("  ✅ {preview}");
            }
        }
        TurnEventPayload::Error { message, .. } => eprintln!("\n❌ {message}"),
        _ => {}
    }
}

fn print_sources(session: &ChatSession, message_id: &str) {
    let Some(message) = session.message(message_id) else {
        return;
    };
    println!("\n\nSources:");
    for (n, source) in message.sources().iter().enumerate() {
        let label = if source.title.is_empty() {
            source.domain().unwrap_or_default()
        } else {
            source.title.clone()
        };
        println!("  [{}] {label} <{}>", n + 1, source.url);
    }
}

/// Cut at a char boundary at or before `max` bytes.
fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
