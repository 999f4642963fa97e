//! Typed client for the hosted messaging platform.
//!
//! Wraps the three platform surfaces the relays use: plain outbound messages,
//! proxy sessions with masked participants, and hosted conversations. Every
//! call maps a non-success platform response to a typed error carrying the
//! platform's own message; nothing here retries.

pub mod client;
pub mod config;
pub mod testutils;
pub mod types;

pub use client::{MessagingClient, MessagingError};
pub use config::PlatformConfig;
