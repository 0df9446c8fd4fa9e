//! AWS-oriented adapters and handlers for the Lex fallback Lambda.
//!
//! This crate owns runtime integration details (environment configuration,
//! logging setup, the Bedrock Agent Runtime client, and the Lambda event
//! handler). Dispatch semantics and wire contracts live in
//! `lex_fallback_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
