//! Preview lighting computes an approximate, shadowed light overlay for editable
//! level geometry, without invoking an offline light compiler.
//!
//! The host editor owns the scene; this crate only observes it through the
//! [`SceneGraph`](scene::SceneGraph), [`ShaderSystem`](scene::ShaderSystem), and
//! [`VirtualFileSystem`](scene::VirtualFileSystem) traits, and draws through an
//! [`OverlayBackend`](render::OverlayBackend).
//!
//! ## Overview
//!
//! * [`PreviewLighting`] is the context object. The host tells it when the scene
//!   changed ([`PreviewLighting::mark_dirty()`]), calls [`PreviewLighting::update()`]
//!   once per frame, and then [`PreviewLighting::render_overlay()`].
//! * Each update may *rescan* the scene: every light is extracted afresh, every brush
//!   and patch is hashed, and the result is diffed against the previous scan so that
//!   only the surfaces whose lighting could have changed are queued for relighting.
//! * Queued surfaces are relit under a time budget. Brush faces receive small
//!   lightmap textures; patches receive per-vertex colors. Shadows are traced against
//!   a bounding volume hierarchy of all opaque geometry.
//!
//! ## Crate features
//!
//! * `save`:
//!   Enable [`serde`] serialization of [`PreviewOptions`] and of the in-memory scene
//!   description in [`scene::memory`].
//!
//! ## Dependencies and global state
//!
//! `preview_lighting` has no global state, other than writing log messages using the
//! [`log`] crate.
#![cfg_attr(
    not(feature = "save"),
    doc = "[`serde`]: https://docs.rs/serde/"
)]
// Crate-specific lint settings. (General settings can be found in the workspace manifest.)
#![forbid(unsafe_code)]
// Lenience for tests.
#![cfg_attr(test,
    allow(clippy::float_cmp), // deterministic tests
    allow(clippy::redundant_clone), // prefer regularity over efficiency
)]

extern crate alloc;

pub mod bvh;
mod context;
pub mod evaluate;
mod hash;
pub mod light;
pub mod lightmap;
mod options;
mod queue;
pub mod render;
mod rescan;
pub mod scene;

pub use context::{PreviewLighting, UpdateInfo};
pub use options::{GameConvention, PreviewModel, PreviewOptions};

/// Mathematical types used throughout the crate.
pub mod math {
    #[doc(inline)]
    pub use preview_lighting_base::math::*;
}

/// Ray intersection tests used for shadow queries.
pub mod raycast {
    #[doc(inline)]
    pub use preview_lighting_base::raycast::*;
}

/// Time budgets and statistics for incremental work.
pub mod time {
    #[doc(inline)]
    pub use preview_lighting_base::time::*;
}

/// Tools that we could imagine being in the Rust standard library, but aren't.
pub mod util {
    #[doc(inline)]
    pub use preview_lighting_base::util::*;
}

/// Re-export the version of the `euclid` vector math library we're using.
pub use euclid;
