//! Server-Sent Events support for the outbox

use crate::runtime::OutboundPrompt;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert the outbox broadcast into an SSE stream
pub fn outbox_stream(
    outbox_rx: broadcast::Receiver<OutboundPrompt>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let prompts = BroadcastStream::new(outbox_rx).filter_map(|result| match result {
        Ok(prompt) => Some(Ok(prompt_event(&prompt))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "Outbox reader lagged, prompts dropped");
            None
        }
    });

    Sse::new(prompts).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn prompt_event(prompt: &OutboundPrompt) -> Event {
    let data = serde_json::to_string(prompt).unwrap_or_else(|_| "{}".to_string());
    Event::default()
        .event("prompt")
        .id(prompt.id.to_string())
        .data(data)
}
