//! # bc-encode
//!
//! Everything needed to hand an upload to the external encoder.
//!
//! This crate provides:
//!
//! - **Scratch files** ([`ScratchPair`]) -- a uniquely named (input, output)
//!   path pair that is removed from disk when dropped.
//! - **Encoder invocation** ([`EncoderCommand`]) -- runs
//!   `<program> [args...] <input> <output>` with a timeout.
//! - **Encoder discovery** ([`check_encoder`]) -- resolves the configured
//!   program on `PATH` and reports its version.

pub mod command;
pub mod scratch;
pub mod tools;

pub use command::{EncoderCommand, EncoderOutput};
pub use scratch::ScratchPair;
pub use tools::{check_encoder, EncoderInfo};
