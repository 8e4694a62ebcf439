// Live event stream endpoints

use std::convert::Infallible;

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{
        sse::{Event as SseEvent, Sse},
        IntoResponse,
    },
    Json,
};
use futures::stream::{self, Stream};
use tracing::{info, warn};

use qvend_core::events::HubStats;

use super::{middleware::AuthAdmin, AppResult, AppState};

/// GET /api/events
///
/// Server-sent event stream of console state changes. Browsers connect
/// with `EventSource`, which cannot attach an Authorization header, so
/// this endpoint is deliberately open; it only carries data the console
/// already shows.
///
/// The response stream owns the hub subscription. When the client goes
/// away axum drops the stream, which drops the subscription and
/// unregisters it from the hub.
pub async fn stream_events(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let subscription = state.hub.subscribe()?;

    info!(
        connection_id = %subscription.connection_id(),
        "Event stream opened"
    );

    let stream = event_stream(subscription);

    Ok((
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))],
        Sse::new(stream),
    ))
}

fn event_stream(
    subscription: qvend_core::events::Subscription,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.next_event().await?;

        // The wire carries the kind as the SSE event name and the payload
        // as the data line; sequence and timestamp stay server-side.
        match SseEvent::default()
            .event(event.kind.as_str())
            .json_data(&event.payload)
        {
            Ok(sse_event) => Some((Ok(sse_event), subscription)),
            Err(e) => {
                warn!(
                    connection_id = %subscription.connection_id(),
                    error = %e,
                    "Failed to serialize event, ending stream"
                );
                None
            }
        }
    })
}

/// GET /api/events/status
pub async fn events_status(
    _admin: AuthAdmin,
    State(state): State<AppState>,
) -> Json<HubStats> {
    Json(state.hub.stats())
}
