//! statrag-core
//!
//! Shared domain types, the error taxonomy, provider traits, the chunker,
//! baseline loading and configuration for the statrag retrieval engine.

pub mod baseline;
pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
