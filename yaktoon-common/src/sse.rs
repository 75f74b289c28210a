//! Server-Sent Events (SSE) utilities

use crate::events::YaktoonEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Events for one SSE client, starting from a snapshot of the current state
///
/// `rx` must be subscribed before `current` is read so nothing emitted in
/// between is lost. A terminal `current` is yielded alone. Otherwise bus events
/// accepted by `filter` follow until a terminal one or the bus closes.
pub fn updates<F>(
    mut rx: broadcast::Receiver<YaktoonEvent>,
    current: Option<YaktoonEvent>,
    label: String,
    filter: F,
) -> impl Stream<Item = YaktoonEvent>
where
    F: Fn(&YaktoonEvent) -> bool + Send + 'static,
{
    async_stream::stream! {
        if let Some(event) = current {
            let terminal = event.is_terminal();
            yield event;
            if terminal {
                debug!("SSE: {} already finished, closing", label);
                return;
            }
        }

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !filter(&event) {
                        continue;
                    }
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        debug!("SSE: terminal event sent to {}, closing", label);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: {} lagged, skipped {} events", label, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// Forward [`updates`] to an SSE client after a `ConnectionStatus` event
pub fn event_stream<F>(
    rx: broadcast::Receiver<YaktoonEvent>,
    current: Option<YaktoonEvent>,
    label: String,
    filter: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: Fn(&YaktoonEvent) -> bool + Send + 'static,
{
    info!("New SSE client connected: {}", label);

    let connected = futures::stream::once(async {
        Event::default().event("ConnectionStatus").data("connected")
    });
    let forwarded = updates(rx, current, label, filter).filter_map(|event| async move {
        match serde_json::to_string(&event) {
            Ok(data) => Some(Event::default().event(event.event_type()).data(data)),
            Err(e) => {
                warn!("SSE: failed to serialize event: {}", e);
                None
            }
        }
    });

    Sse::new(connected.chain(forwarded).map(Ok)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
