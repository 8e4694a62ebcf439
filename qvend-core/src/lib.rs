//! qvend-core: domain layer for the Q profile vending console.
//!
//! Holds configuration, the error taxonomy, user models and persistence,
//! the identity-directory client, and the live event fan-out subsystem
//! consumed by the HTTP layer.

pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod repository;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};
