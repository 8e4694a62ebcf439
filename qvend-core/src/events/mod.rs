//! Live event fan-out.
//!
//! A state change on one request-handling task is published once and
//! delivered, in order, to every open dashboard stream. The hub owns an
//! append-only bounded event log and the registry of live subscribers,
//! both behind a single lock so that "committed to the log" and "offered
//! to every current subscriber" are atomic with respect to concurrent
//! registration. Each subscriber drains a private unbounded queue from
//! its own stream session, so publishing never waits on a slow client.

mod event;
mod hub;
mod session;

pub use event::{Event, EventKind};
pub use hub::{ConnectionId, EventHub, HubStats};
pub use session::Subscription;
