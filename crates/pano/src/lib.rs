//! High-level entry crate for the panorama alignment and merging toolbox.
//!
//! The library splits the stitching core into four layers, re-exported here
//! under stable module names:
//!
//! - **[`core`]**: the panorama data model (images, variables, link groups,
//!   control points), raster buffers, geometric transforms, and
//!   control-point statistics.
//! - **[`optim`]**: non-linear least-squares problems — geometric pose
//!   alignment over control points and photometric alignment (exposure,
//!   vignetting, response, white balance) over sampled point pairs, plus
//!   the point-pair sampler.
//! - **[`blend`]**: the seam merge engine — watershed seam placement and
//!   hard-seam or gradient-domain (Poisson) blending.
//! - **[`pipeline`]**: heuristic drivers — the staged photometric
//!   optimization with plausibility gates and the control-point cleaners.
//!
//! ## Typical flow
//!
//! ```no_run
//! use pano::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut panorama = Panorama::default();
//! # let rasters: Vec<Raster> = vec![];
//! // Clean up control points, then align geometry.
//! let bad = clean_control_points_pairwise(&panorama, 2.0, &NoProgress)?;
//! panorama.remove_control_points(&bad);
//!
//! // Sample photometric evidence and run the staged optimizer.
//! let sampled = sample_point_pairs(
//!     &panorama,
//!     &rasters,
//!     SamplingPolicy::RandomPoints { seed: 1 },
//!     &SamplerOptions::default(),
//!     &NoProgress,
//! )?;
//! smart_optimize_photometric(
//!     &mut panorama,
//!     &sampled.pairs,
//!     PhotometricMode::OptimizeLdr,
//!     &PhotometricOptions::default(),
//!     &NoProgress,
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! The `pano` crate is the public compatibility boundary; the lower-level
//! crates may evolve more quickly.

/// Panorama data model, rasters, transforms, and statistics.
pub mod core {
    pub use pano_core::*;
}

/// Non-linear least-squares optimization and point-pair sampling.
pub mod optim {
    pub use pano_optim::*;
}

/// Seam placement and blending.
pub mod blend {
    pub use pano_blend::*;
}

/// Heuristic drivers: staged photometric optimization and cleaners.
pub mod pipeline {
    pub use pano_pipeline::*;
}

/// Convenient re-exports for common use cases.
pub mod prelude {
    pub use pano_blend::{merge_images, MergeOptions};
    pub use pano_core::{
        cp_error_stats, cp_radial_stats, var_set, ControlPoint, CpErrorStats, CpMode, Mask,
        NoProgress, PanoOptions, Panorama, PixelType, ProgressSink, Projection, Raster, Real,
        SrcImage, StatsFilter, VarSet, Variable,
    };
    pub use pano_optim::{
        optimize_geometric, optimize_photometric, sample_point_pairs, PhotometricOptions,
        PointPair, SamplerOptions, SamplingPolicy, SolveOptions,
    };
    pub use pano_pipeline::{
        clean_control_points_global, clean_control_points_pairwise, control_points_in_masks,
        smart_optimize_photometric, PhotometricMode,
    };
}
