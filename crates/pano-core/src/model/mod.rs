//! Panorama data model.
//!
//! A [`Panorama`] is an ordered collection of [`SrcImage`]s (stable indices
//! within one optimization run), a list of [`ControlPoint`]s referencing
//! those indices, global [`PanoOptions`], and per-variable link state
//! ([`VarLinks`]).

mod control_point;
mod image;
mod links;
mod options;
mod panorama;
mod variables;

pub use control_point::{ControlPoint, CpMode};
pub use image::{ResponseType, SrcImage};
pub use links::VarLinks;
pub use options::{PanoOptions, Projection, Rect};
pub use panorama::{Panorama, PhotometricSnapshot};
pub use variables::{var_set, VarSet, Variable};

use thiserror::Error;

/// Invariant violations in the panorama data model.
///
/// These indicate caller bugs and are reported rather than silently
/// corrected.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("image index {0} out of range ({1} images)")]
    ImageIndex(usize, usize),
    #[error("control point {cp} references pixel ({x}, {y}) outside image {image} ({w}x{h})")]
    ControlPointOutOfBounds {
        cp: usize,
        image: usize,
        x: f64,
        y: f64,
        w: usize,
        h: usize,
    },
}
