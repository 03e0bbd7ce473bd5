//! Tools that we could imagine being in the Rust standard library, but aren't.

mod custom_format;
pub use custom_format::*;

/// Logging configuration shared by programs embedding the lighting engine.
pub mod log;
