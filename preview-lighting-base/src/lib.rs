//! This library is an internal component of [`preview-lighting`],
//! which defines some core mathematical types and functions.
//! Do not depend on this library; use only [`preview-lighting`] instead.
//!
//! [`preview-lighting`]: https://crates.io/crates/preview-lighting/

// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![warn(clippy::missing_inline_in_public_items)]

/// Do not use this module directly; its contents are re-exported from `preview-lighting`.
pub mod math;

/// Do not use this module directly; its contents are re-exported from `preview-lighting`.
pub mod raycast;

/// Do not use this module directly; its contents are re-exported from `preview-lighting`.
pub mod time;

/// Do not use this module directly; its contents are re-exported from `preview-lighting`.
pub mod util;

// reexport for convenience of our tests
#[doc(hidden)]
pub use euclid;
