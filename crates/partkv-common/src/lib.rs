//! partkv Common - Shared types and utilities
//!
//! This crate provides the routing types, error definitions, and
//! configuration shared by the shard and coordinator crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
