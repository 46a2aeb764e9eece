//! The live event stream (`GET /api/events`, `text/event-stream`).
//!
//! The first frame is always a `connected` event carrying the current
//! tick and timestamp. Every committed world event follows as an SSE
//! frame named by its event type. A `ping` keep-alive goes out every 30
//! seconds. Slow consumers are lossy by design: a subscriber that lags
//! past the broadcast capacity silently skips to the newest events --
//! the stream is a view, the log is the record.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use habitat_types::WorldEvent;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::debug;

use crate::state::AppState;

/// Keep-alive interval.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// `GET /api/events` -- subscribe to the live stream.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let deps = state.engine().deps();
    let tick = deps
        .store
        .get_world_state()
        .await
        .map_or(0, |s| s.current_tick);
    let rx = deps.bus.subscribe();

    let connected = Event::default().event("connected").data(
        json!({
            "tick": tick,
            "timestamp": Utc::now(),
        })
        .to_string(),
    );

    let live = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((frame(&event), rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Lossy on slow consumers: drop what was missed and
                    // resume at the newest event.
                    debug!(skipped, "SSE subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    let stream = stream::once(async move { Ok(connected) }).chain(live.map(Ok));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(PING_INTERVAL).text("ping"))
}

/// Render a committed world event as an SSE frame.
fn frame(event: &WorldEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| String::from("{}"));
    Event::default().event(event.event_type.as_str()).data(data)
}
