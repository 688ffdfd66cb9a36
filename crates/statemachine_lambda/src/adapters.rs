pub mod download;
pub mod object_store;
pub mod s3;
pub mod state_store;
