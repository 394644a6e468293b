//! HTTP trigger.
//!
//! Each request to the trigger path runs exactly one tick and answers with
//! its [`TickReport`](crate::monitor::TickReport).

pub mod error;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use routes::create_router;
pub use server::{ApiServer, ApiServerConfig, AppState};
