//! # wallflower-client
//!
//! Client-side WebSocket adapter for a hosted Elm-derived backend platform.
//!
//! This crate provides:
//! - A WebSocket-like surface (open/message/close/error callbacks plus a
//!   `send` method) over the host's JSON-and-base64 transport envelope
//! - Session-cookie discipline so the host routes traffic to a persistent
//!   per-session actor
//! - Leader avoidance: the host elects one client per session to run
//!   authoritative logic, and a library client is the wrong process for
//!   that role — when elected, the adapter tears down, rotates to a fresh
//!   session, and reconnects with jittered exponential backoff until it is
//!   merely a follower
//!
//! Messages sent while the connection is still being established are
//! queued and drained in order the moment the socket opens.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
mod socket;

pub use client::Client;
pub use config::ClientConfig;
pub use connection::ReadyState;
pub use error::ClientError;
pub use events::{CloseEvent, SetupEvent};
