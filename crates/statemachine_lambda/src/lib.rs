//! Lambda-facing side of the state machine steps.
//!
//! Handlers here take raw runtime events, hand them to the
//! `statemachine_core` invoker and persist what comes out. Storage backends
//! (local directory or S3) and the HTTP downloader live under `adapters`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod runtime;
