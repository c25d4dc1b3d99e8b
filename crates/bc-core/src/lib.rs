//! bc-core: shared configuration and error types.
//!
//! This crate is the foundational dependency for all other bc-* crates,
//! providing the application configuration and a unified error type.

pub mod config;
pub mod error;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
