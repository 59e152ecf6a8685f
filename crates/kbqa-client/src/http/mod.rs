//! reqwest-backed knowledge-base server client.
//!
//! Implements the `KbApi` trait against the server's JSON endpoints and the
//! streamed ask endpoint.

mod api;
mod client;
mod config;

pub use client::HttpKbClient;
pub use config::HttpConfig;
