//! Shared Lex fallback domain primitives.
//!
//! This crate owns the Lex V2 request/reply contracts, dispatcher
//! configuration, and the bridge from a fallback event to a streamed agent
//! completion. It intentionally excludes AWS SDK and Lambda runtime concerns;
//! those live in `lex_fallback_lambda`.

pub mod agent;
pub mod config;
pub mod contract;
pub mod dispatcher;
pub mod error;
pub mod trace;
