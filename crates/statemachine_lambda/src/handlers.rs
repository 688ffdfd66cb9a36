pub mod transfer;
pub mod workflow;
