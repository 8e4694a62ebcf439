//! HTTP surface of the Q profile vending console.

pub mod http;

pub use http::{create_router, AppState};
