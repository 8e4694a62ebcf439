use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::event::{Event, EventKind};
use super::session::Subscription;
use crate::config::EventsConfig;
use crate::models::id::generate_id;
use crate::{Error, Result};

/// Handle for a streaming connection
pub type ConnectionId = String;

/// Snapshot of hub state for the diagnostic endpoint
#[derive(Debug, Clone, serde::Serialize)]
pub struct HubStats {
    pub active_connections: usize,
    pub total_events: u64,
    pub recent_events: Vec<Event>,
}

/// Log and registry state, guarded by one lock.
///
/// Append, fan-out, register, and unregister all go through this struct,
/// so "who is registered" and "what has been appended" never observe a
/// torn intermediate state.
#[derive(Debug)]
struct HubInner {
    next_sequence: u64,
    log: VecDeque<Event>,
    subscribers: HashMap<ConnectionId, mpsc::UnboundedSender<Event>>,
}

impl HubInner {
    /// Assign the next sequence number, store the event, evict from the
    /// head once the bound is exceeded
    fn append(&mut self, kind: EventKind, payload: serde_json::Value, bound: usize) -> Event {
        let event = Event::logged(self.next_sequence, kind, payload);
        self.next_sequence += 1;

        self.log.push_back(event.clone());
        while self.log.len() > bound {
            self.log.pop_front();
        }

        event
    }

    /// Push the event onto every live subscriber queue; senders whose
    /// receiving side is gone are removed after the pass
    fn fan_out(&mut self, event: &Event) -> usize {
        let mut sent_count = 0;
        let mut failed_connections = Vec::new();

        for (connection_id, sender) in &self.subscribers {
            match sender.send(event.clone()) {
                Ok(()) => sent_count += 1,
                Err(err) => {
                    warn!(
                        connection_id = %connection_id,
                        error = %err,
                        "Failed to deliver event, marking subscriber for cleanup"
                    );
                    failed_connections.push(connection_id.clone());
                }
            }
        }

        for connection_id in failed_connections {
            self.subscribers.remove(&connection_id);
        }

        sent_count
    }
}

/// In-memory hub publishing state-change events to connected dashboards.
///
/// Single-process only: events are not persisted and delivery to
/// disconnected subscribers is best-effort by design.
#[derive(Debug)]
pub struct EventHub {
    history_size: usize,
    replay_window: usize,
    heartbeat_interval: Duration,
    max_connections: usize,
    inner: Mutex<HubInner>,
}

impl EventHub {
    #[must_use]
    pub fn new(config: &EventsConfig) -> Self {
        Self {
            history_size: config.history_size,
            replay_window: config.replay_window,
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_seconds),
            max_connections: config.max_connections,
            inner: Mutex::new(HubInner {
                next_sequence: 1,
                log: VecDeque::new(),
                subscribers: HashMap::new(),
            }),
        }
    }

    /// Publish a state-change event.
    ///
    /// Appends to the log and fans out to every currently registered
    /// subscriber under one critical section, so a subscriber registering
    /// concurrently sees the event exactly once: either in its replay
    /// snapshot or on its private queue, never both. Completes in bounded
    /// time regardless of subscriber behavior and never fails.
    pub fn publish(&self, kind: EventKind, payload: serde_json::Value) -> Event {
        let (event, sent_count) = {
            let mut inner = self.inner.lock();
            let event = inner.append(kind, payload, self.history_size);
            let sent_count = inner.fan_out(&event);
            (event, sent_count)
        };

        debug!(
            sequence = event.sequence,
            kind = %event.kind,
            sent_count = sent_count,
            "Event published"
        );

        event
    }

    /// Register a new streaming subscriber.
    ///
    /// The replay snapshot is taken under the same lock that inserts the
    /// subscriber, which is what makes the push path race-free. Fails
    /// when the connection cap is reached so the caller can reject the
    /// connection instead of silently dropping it.
    pub fn subscribe(self: &Arc<Self>) -> Result<Subscription> {
        let connection_id: ConnectionId = generate_id();
        let (tx, rx) = mpsc::unbounded_channel();

        let replay = {
            let mut inner = self.inner.lock();

            if self.max_connections > 0 && inner.subscribers.len() >= self.max_connections {
                return Err(Error::TooManyConnections(format!(
                    "streaming connection limit of {} reached",
                    self.max_connections
                )));
            }

            let skip = inner.log.len().saturating_sub(self.replay_window);
            let replay: VecDeque<Event> = inner.log.iter().skip(skip).cloned().collect();

            inner.subscribers.insert(connection_id.clone(), tx);
            replay
        };

        info!(
            connection_id = %connection_id,
            replay_len = replay.len(),
            "Subscriber registered"
        );

        Ok(Subscription::new(
            Arc::clone(self),
            connection_id,
            rx,
            replay,
            self.heartbeat_interval,
        ))
    }

    /// Remove a subscriber; idempotent
    pub(crate) fn unsubscribe(&self, connection_id: &str) {
        let removed = self.inner.lock().subscribers.remove(connection_id);

        if removed.is_some() {
            info!(connection_id = %connection_id, "Subscriber unregistered");
        } else {
            debug!(
                connection_id = %connection_id,
                "Subscriber already unregistered"
            );
        }
    }

    /// All retained events with sequence greater than `index`, in order
    #[must_use]
    pub fn slice_since(&self, index: u64) -> Vec<Event> {
        self.inner
            .lock()
            .log
            .iter()
            .filter(|e| e.sequence.is_some_and(|seq| seq > index))
            .cloned()
            .collect()
    }

    /// Number of live streaming connections
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Total number of events ever published
    #[must_use]
    pub fn total_events(&self) -> u64 {
        self.inner.lock().next_sequence - 1
    }

    /// Snapshot for the diagnostic endpoint
    #[must_use]
    pub fn stats(&self) -> HubStats {
        let inner = self.inner.lock();
        let skip = inner.log.len().saturating_sub(self.replay_window);

        HubStats {
            active_connections: inner.subscribers.len(),
            total_events: inner.next_sequence - 1,
            recent_events: inner.log.iter().skip(skip).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use serde_json::json;

    fn test_hub(history_size: usize, replay_window: usize) -> Arc<EventHub> {
        Arc::new(EventHub::new(&EventsConfig {
            history_size,
            replay_window,
            heartbeat_interval_seconds: 30,
            max_connections: 0,
        }))
    }

    fn sequences(events: &[Event]) -> Vec<u64> {
        events.iter().filter_map(|e| e.sequence).collect()
    }

    #[tokio::test]
    async fn test_publish_assigns_increasing_sequences() {
        let hub = test_hub(100, 10);

        let first = hub.publish(EventKind::UserCreated, json!({"username": "a"}));
        let second = hub.publish(EventKind::UserDeleted, json!({"username": "a"}));

        assert_eq!(first.sequence, Some(1));
        assert_eq!(second.sequence, Some(2));
        assert_eq!(hub.total_events(), 2);
    }

    #[tokio::test]
    async fn test_bounded_history_evicts_from_head() {
        let hub = test_hub(3, 10);

        // N=3, M=2: after five publishes the log retains exactly three
        // events, the oldest being sequence M+1 = 3.
        for i in 0..5 {
            hub.publish(EventKind::UserCreated, json!({"n": i}));
        }

        let retained = hub.slice_since(0);
        assert_eq!(sequences(&retained), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_slice_since_beyond_latest_is_empty() {
        let hub = test_hub(100, 10);
        hub.publish(EventKind::UserCreated, json!({}));
        hub.publish(EventKind::UserCreated, json!({}));

        assert!(hub.slice_since(2).is_empty());
        assert!(hub.slice_since(99).is_empty());
    }

    #[tokio::test]
    async fn test_slice_since_partial() {
        let hub = test_hub(100, 10);
        for _ in 0..4 {
            hub.publish(EventKind::UserCreated, json!({}));
        }

        assert_eq!(sequences(&hub.slice_since(2)), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_fan_out_reaches_all_subscribers() {
        let hub = test_hub(100, 10);

        let mut s1 = hub.subscribe().unwrap();
        let mut s2 = hub.subscribe().unwrap();
        assert_eq!(hub.connection_count(), 2);

        hub.publish(EventKind::UserCreated, json!({"username": "a"}));

        // Skip the synthetic connected event on each stream.
        assert_eq!(s1.next_event().await.unwrap().kind, EventKind::Connected);
        assert_eq!(s2.next_event().await.unwrap().kind, EventKind::Connected);

        let e1 = s1.next_event().await.unwrap();
        let e2 = s2.next_event().await.unwrap();
        assert_eq!(e1.sequence, Some(1));
        assert_eq!(e2.sequence, Some(1));
    }

    #[tokio::test]
    async fn test_registration_point_splits_delivery() {
        // S1 registered before X, S2 after X but before Y: both must
        // receive Y; only S1 must receive X.
        let hub = test_hub(100, 0);

        let mut s1 = hub.subscribe().unwrap();
        let x = hub.publish(EventKind::UserCreated, json!({"name": "x"}));
        let mut s2 = hub.subscribe().unwrap();
        let y = hub.publish(EventKind::UserCreated, json!({"name": "y"}));

        assert_eq!(s1.next_event().await.unwrap().kind, EventKind::Connected);
        assert_eq!(s1.next_event().await.unwrap().sequence, x.sequence);
        assert_eq!(s1.next_event().await.unwrap().sequence, y.sequence);

        assert_eq!(s2.next_event().await.unwrap().kind, EventKind::Connected);
        assert_eq!(s2.next_event().await.unwrap().sequence, y.sequence);
    }

    #[tokio::test]
    async fn test_replay_then_live_is_strictly_increasing() {
        // Concrete scenario: bound N=3, publish A..D, replay last 2 gives
        // [C, D], then a live publish E arrives; total view [C, D, E].
        let hub = test_hub(3, 2);

        for name in ["a", "b", "c", "d"] {
            hub.publish(EventKind::UserCreated, json!({"name": name}));
        }
        assert_eq!(sequences(&hub.slice_since(0)), vec![2, 3, 4]);

        let mut session = hub.subscribe().unwrap();
        hub.publish(EventKind::UserCreated, json!({"name": "e"}));

        assert_eq!(
            session.next_event().await.unwrap().kind,
            EventKind::Connected
        );

        let mut observed = Vec::new();
        for _ in 0..3 {
            observed.push(session.next_event().await.unwrap());
        }
        assert_eq!(sequences(&observed), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_no_double_delivery_across_replay_boundary() {
        let hub = test_hub(100, 100);

        for _ in 0..50 {
            hub.publish(EventKind::UserCreated, json!({}));
        }
        let mut session = hub.subscribe().unwrap();
        for _ in 0..50 {
            hub.publish(EventKind::UserCreated, json!({}));
        }

        assert_eq!(
            session.next_event().await.unwrap().kind,
            EventKind::Connected
        );

        let mut seen = Vec::new();
        for _ in 0..100 {
            let event = session.next_event().await.unwrap();
            seen.push(event.sequence.unwrap());
        }

        let mut deduped = seen.clone();
        deduped.dedup();
        assert_eq!(seen, deduped, "a sequence number was delivered twice");
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.first(), Some(&1));
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_dropped_subscription_unregisters() {
        let hub = test_hub(100, 10);

        let session = hub.subscribe().unwrap();
        assert_eq!(hub.connection_count(), 1);

        drop(session);
        assert_eq!(hub.connection_count(), 0);

        // Publishing after cleanup must not attempt delivery to it.
        hub.publish(EventKind::UserDeleted, json!({}));
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let hub = test_hub(100, 10);

        let session = hub.subscribe().unwrap();
        let connection_id = session.connection_id().to_string();

        hub.unsubscribe(&connection_id);
        assert_eq!(hub.connection_count(), 0);

        // Second removal (and the one from Drop) are no-ops.
        hub.unsubscribe(&connection_id);
        drop(session);
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_does_not_block_on_slow_subscriber() {
        let hub = test_hub(100, 10);

        // A subscriber that never reads its queue.
        let _idle = hub.subscribe().unwrap();

        let publishing = async {
            for i in 0..10_000 {
                hub.publish(EventKind::UserCreated, json!({"n": i}));
            }
        };

        tokio::time::timeout(std::time::Duration::from_secs(5), publishing)
            .await
            .expect("publish must not wait on subscriber queues");
    }

    #[tokio::test]
    async fn test_connection_cap_rejects_with_error() {
        let hub = Arc::new(EventHub::new(&EventsConfig {
            history_size: 100,
            replay_window: 10,
            heartbeat_interval_seconds: 30,
            max_connections: 1,
        }));

        let _first = hub.subscribe().unwrap();
        let err = hub.subscribe().unwrap_err();
        assert!(matches!(err, Error::TooManyConnections(_)));

        // Capacity is released once the first subscriber goes away.
        drop(_first);
        assert!(hub.subscribe().is_ok());
    }

    #[tokio::test]
    async fn test_stats_snapshot() {
        let hub = test_hub(100, 5);

        let _session = hub.subscribe().unwrap();
        for _ in 0..8 {
            hub.publish(EventKind::UserCreated, json!({}));
        }

        let stats = hub.stats();
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.total_events, 8);
        assert_eq!(sequences(&stats.recent_events), vec![4, 5, 6, 7, 8]);
    }
}
