//! live-notify library crate.
//!
//! Watches one live-streaming identity and announces each broadcast once.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod scheduler;

pub use error::{Error, Result};
