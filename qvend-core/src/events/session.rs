use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use super::event::{Event, EventKind};
use super::hub::{ConnectionId, EventHub};

/// Session progress on one streaming connection.
///
/// Closed has no variant: dropping the `Subscription` is the Closed
/// transition, and its `Drop` impl runs the unregistration.
#[derive(Debug)]
enum SessionState {
    Connecting,
    Replaying,
    Live,
}

/// One subscriber's view of the hub: the private delivery queue plus the
/// replay snapshot taken at registration.
///
/// Emits the synthetic connected event first, then the replay window,
/// then live events as they are fanned out, interleaving a heartbeat
/// whenever the stream has been idle for the configured interval.
/// Unregisters from the hub on drop, so cleanup runs on every exit path
/// of the owning connection task.
#[derive(Debug)]
pub struct Subscription {
    hub: Arc<EventHub>,
    connection_id: ConnectionId,
    rx: mpsc::UnboundedReceiver<Event>,
    replay: VecDeque<Event>,
    state: SessionState,
    last_emit: Instant,
    heartbeat_interval: Duration,
}

impl Subscription {
    pub(super) fn new(
        hub: Arc<EventHub>,
        connection_id: ConnectionId,
        rx: mpsc::UnboundedReceiver<Event>,
        replay: VecDeque<Event>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            hub,
            connection_id,
            rx,
            replay,
            state: SessionState::Connecting,
            last_emit: Instant::now(),
            heartbeat_interval,
        }
    }

    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Next event to emit to the client.
    ///
    /// Suspends only when the private queue is empty and no heartbeat is
    /// due. Returns `None` once the hub has dropped this subscriber's
    /// sender, which ends the stream.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            match self.state {
                SessionState::Connecting => {
                    self.state = SessionState::Replaying;
                    self.last_emit = Instant::now();
                    return Some(Event::connection_local(
                        EventKind::Connected,
                        serde_json::json!({
                            "status": "connected",
                            "connection_id": self.connection_id,
                        }),
                    ));
                }
                SessionState::Replaying => {
                    if let Some(event) = self.replay.pop_front() {
                        self.last_emit = Instant::now();
                        return Some(event);
                    }
                    self.state = SessionState::Live;
                }
                SessionState::Live => {
                    let heartbeat_due = self.last_emit + self.heartbeat_interval;

                    tokio::select! {
                        received = self.rx.recv() => match received {
                            Some(event) => {
                                self.last_emit = Instant::now();
                                return Some(event);
                            }
                            None => {
                                debug!(
                                    connection_id = %self.connection_id,
                                    "Delivery queue closed, ending stream"
                                );
                                return None;
                            }
                        },
                        () = tokio::time::sleep_until(heartbeat_due) => {
                            self.last_emit = Instant::now();
                            return Some(Event::connection_local(
                                EventKind::Heartbeat,
                                serde_json::json!({
                                    "timestamp": chrono::Utc::now(),
                                }),
                            ));
                        }
                    }
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventsConfig;
    use serde_json::json;

    fn test_hub(heartbeat_interval_seconds: u64) -> Arc<EventHub> {
        Arc::new(EventHub::new(&EventsConfig {
            history_size: 100,
            replay_window: 10,
            heartbeat_interval_seconds,
            max_connections: 0,
        }))
    }

    #[tokio::test]
    async fn test_connected_event_emitted_first() {
        let hub = test_hub(30);
        hub.publish(EventKind::UserCreated, json!({}));

        let mut session = hub.subscribe().unwrap();
        let first = session.next_event().await.unwrap();

        assert_eq!(first.kind, EventKind::Connected);
        assert!(first.sequence.is_none());
        assert_eq!(
            first.payload["connection_id"],
            session.connection_id().to_string()
        );
    }

    #[tokio::test]
    async fn test_replay_precedes_live_events() {
        let hub = test_hub(30);
        hub.publish(EventKind::UserCreated, json!({"name": "early"}));

        let mut session = hub.subscribe().unwrap();
        hub.publish(EventKind::UserDeleted, json!({"name": "late"}));

        assert_eq!(session.next_event().await.unwrap().kind, EventKind::Connected);

        let replayed = session.next_event().await.unwrap();
        assert_eq!(replayed.sequence, Some(1));
        assert_eq!(replayed.kind, EventKind::UserCreated);

        let live = session.next_event().await.unwrap();
        assert_eq!(live.sequence, Some(2));
        assert_eq!(live.kind, EventKind::UserDeleted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_on_idle_stream() {
        let hub = test_hub(30);
        let mut session = hub.subscribe().unwrap();

        assert_eq!(session.next_event().await.unwrap().kind, EventKind::Connected);

        // No publishes: the next emission is the idle heartbeat.
        let heartbeat = session.next_event().await.unwrap();
        assert_eq!(heartbeat.kind, EventKind::Heartbeat);
        assert!(heartbeat.sequence.is_none());
        assert!(heartbeat.payload.get("timestamp").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_delivery_resets_heartbeat_timer() {
        let hub = test_hub(30);
        let mut session = hub.subscribe().unwrap();
        assert_eq!(session.next_event().await.unwrap().kind, EventKind::Connected);

        tokio::time::advance(Duration::from_secs(29)).await;
        hub.publish(EventKind::UserCreated, json!({}));

        let event = session.next_event().await.unwrap();
        assert_eq!(event.kind, EventKind::UserCreated);

        // The heartbeat clock restarted at the delivery above; only after
        // a full interval of further idleness does a heartbeat appear.
        let next = session.next_event().await.unwrap();
        assert_eq!(next.kind, EventKind::Heartbeat);
    }

    #[tokio::test]
    async fn test_stream_ends_when_hub_drops_sender() {
        let hub = test_hub(30);
        let mut session = hub.subscribe().unwrap();
        assert_eq!(session.next_event().await.unwrap().kind, EventKind::Connected);

        hub.unsubscribe(&session.connection_id().to_string());

        assert!(session.next_event().await.is_none());
    }
}
