//! bc-client: the terminal side of a conversion.
//!
//! - [`ConvertClient`] uploads a file to `POST /api/convert` and collects the
//!   artifact
//! - [`Playback`] types status lines out at a fixed per-character delay and
//!   runs queued side effects in order
//! - [`TokenBalance`] and [`ConversionCounter`] gate and count conversions
//! - [`Converter`] strings them together into the submission flow

pub mod counter;
pub mod flow;
pub mod playback;
pub mod submit;
pub mod tokens;

pub use counter::ConversionCounter;
pub use flow::{ClientSession, ConversionReport, Converter};
pub use playback::{Cue, MemorySink, Playback, PlaybackHandle, StdoutSink};
pub use submit::{Artifact, ConvertClient, UploadFile};
pub use tokens::TokenBalance;
