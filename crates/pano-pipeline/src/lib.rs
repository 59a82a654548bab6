//! Heuristic drivers layered on top of the optimizers.
//!
//! The smart photometric driver escalates through staged variable sets with
//! plausibility gates and rollback; the cleaners flag outlier control points
//! without mutating the panorama.

pub mod cleaner;
pub mod smart;

pub use cleaner::{
    clean_control_points_global, clean_control_points_pairwise, control_points_in_masks,
};
pub use smart::{smart_optimize_photometric, PhotometricMode, SmartPhotometricReport};
