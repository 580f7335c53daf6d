//! Client for a remote `/api/chat` endpoint.

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest_eventsource::{Error as SseError, Event, EventSource, RequestBuilderExt};

use crate::error::{LuminaryError, Result};
use crate::orchestrator::{ChatRequest, TurnEvent};

/// Streams turns from a Luminary server over SSE.
#[derive(Debug, Clone)]
pub struct RemoteChat {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteChat {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a turn. Errors answered before streaming are returned here;
    /// the stream ends after the terminal event.
    pub async fn send(&self, request: &ChatRequest) -> Result<BoxStream<'static, Result<TurnEvent>>> {
        let url = format!("{}/api/chat", self.base_url);
        let mut source = self
            .client
            .post(&url)
            .json(request)
            .eventsource()
            .map_err(|e| LuminaryError::Stream(e.to_string()))?;

        match source.next().await {
            Some(Ok(Event::Open)) => {}
            Some(Ok(Event::Message(message))) => {
                tracing::debug!(event = %message.event, "stream opened without open event");
                let first = parse_event(&message.data);
                return Ok(events_after(source, Some(first)));
            }
            Some(Err(err)) => {
                source.close();
                return Err(rejection(err).await);
            }
            None => return Err(LuminaryError::Stream("event stream closed".into())),
        }
        tracing::debug!(url = %url, "remote turn started");
        Ok(events_after(source, None))
    }
}

fn events_after(
    mut source: EventSource,
    first: Option<Result<TurnEvent>>,
) -> BoxStream<'static, Result<TurnEvent>> {
    Box::pin(async_stream::stream! {
        if let Some(first) = first {
            let terminal = matches!(&first, Ok(event) if event.is_terminal());
            yield first;
            if terminal {
                source.close();
                return;
            }
        }
        while let Some(item) = source.next().await {
            match item {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => {
                    let event = parse_event(&message.data);
                    let terminal = matches!(&event, Ok(event) if event.is_terminal());
                    yield event;
                    if terminal {
                        break;
                    }
                }
                Err(SseError::StreamEnded) => break,
                Err(err) => {
                    yield Err(LuminaryError::Stream(err.to_string()));
                    break;
                }
            }
        }
        source.close();
    })
}

fn parse_event(data: &str) -> Result<TurnEvent> {
    serde_json::from_str(data)
        .map_err(|e| LuminaryError::Stream(format!("failed to parse event: {e}")))
}

/// Map a refused connection to the error the server reported.
async fn rejection(err: SseError) -> LuminaryError {
    match err {
        SseError::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or(body);
            match status.as_u16() {
                400 => LuminaryError::RequestValidation(message),
                500 => LuminaryError::Configuration(message),
                other => LuminaryError::api(other, message),
            }
        }
        SseError::Transport(err) => LuminaryError::Network(err),
        other => LuminaryError::Stream(other.to_string()),
    }
}
