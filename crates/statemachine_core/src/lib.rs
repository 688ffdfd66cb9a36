//! Workflow step primitives shared by every state machine deployment.
//!
//! This crate owns the envelope contract, the step registry and the invoker
//! that dispatches one trigger to one step. It intentionally excludes AWS SDK
//! and Lambda runtime concerns; those live in `statemachine_lambda`.

pub mod contract;
pub mod envelope;
pub mod error;
pub mod invoker;
pub mod logging;
pub mod registry;
pub mod steps;
pub mod storage_keys;
