use std::convert::Infallible;

use axum::response::sse::Event;
use dvdash_engine::{Backfill, DashboardEvent, Subscription};
use futures::{stream, Stream, StreamExt};

/// SSE event name used for status snapshots. Packets go out as unnamed
/// events so existing dashboard pages keep reading them from `onmessage`.
pub const STATUS_EVENT: &str = "status";

/// Convert a dashboard event to an SSE frame. Serialization failures are
/// logged and the event skipped.
pub fn to_sse(event: &DashboardEvent) -> Option<Event> {
    let data = match event.payload_json() {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(error = %e, event_type = event.event_type(), "Failed to serialize event");
            return None;
        }
    };
    Some(match event {
        DashboardEvent::Packet(_) => Event::default().data(data),
        DashboardEvent::Status(_) => Event::default().event(STATUS_EVENT).data(data),
    })
}

/// The event sequence for one client: current status, then the backfilled
/// history if requested, then live events until the subscriber is dropped
/// or disconnected by the fanout.
pub fn client_stream(
    subscription: Subscription,
    backfill: Backfill,
    replay_history: bool,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let mut initial = Vec::with_capacity(backfill.history.len() + 1);
    initial.push(DashboardEvent::Status(backfill.status));
    if replay_history {
        initial.extend(backfill.history.into_iter().map(DashboardEvent::Packet));
    }

    stream::iter(initial)
        .chain(subscription)
        .filter_map(|event| futures::future::ready(to_sse(&event)))
        .map(Ok)
}
