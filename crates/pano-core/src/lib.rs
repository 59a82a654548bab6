//! Core data model and geometry primitives for `panorama-rs`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt2`, ...),
//! - the panorama data model (source images, variables, links, control points),
//! - in-memory raster buffers with alpha masks,
//! - the image ↔ panorama coordinate transform,
//! - control-point error statistics.
//!
//! Transform pipeline:
//! `pano = projection ∘ rotation(y, p, r) ∘ distortion⁻¹ ∘ normalize(pixel)`

/// Linear algebra type aliases and small geometric helpers.
pub mod math;
/// Panorama data model: images, variables, links, control points, options.
pub mod model;
/// Progress reporting and cooperative cancellation.
pub mod progress;
/// Owned raster buffers, alpha masks, and pixel type tags.
pub mod raster;
/// Control-point error statistics.
pub mod stats;
/// Image ↔ panorama coordinate transforms.
pub mod transform;

pub use math::*;
pub use model::*;
pub use progress::*;
pub use raster::*;
pub use stats::*;
pub use transform::*;
