//! Notification delivery.
//!
//! A single destination receives a pre-formatted message. Channels report
//! success or failure and never retry on their own; the caller decides what a
//! failed delivery means.

pub mod channels;
pub mod message;

pub use channels::{DiscordChannel, DiscordConfig, DiscordTarget, NotificationChannel};
pub use message::unescape_template;
