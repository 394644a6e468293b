//! Repository layer for database access.

pub mod dedup;
pub mod kv;

pub use dedup::*;
pub use kv::*;
