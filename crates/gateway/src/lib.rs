//! HTTP gateway for the SousChef cooking assistant.
//!
//! Wires the pipeline stages, stores, and quota ledger into an axum
//! router and streams turn results to clients over SSE.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;

pub use state::AppState;
