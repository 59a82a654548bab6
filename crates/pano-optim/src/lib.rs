//! Non-linear least-squares problems for panorama alignment.
//!
//! This crate provides the shared optimizer scaffolding (a dense
//! [`NllsProblem`] trait with a Levenberg-Marquardt backend), the geometric
//! pose problem over control points, the photometric exposure / vignetting /
//! response problem over sampled point pairs, and the point-pair sampler
//! that feeds it.

pub mod backend_lm;
pub mod geometric;
pub mod photometric;
pub mod robust;
pub mod sampler;
pub mod traits;

pub use backend_lm::LmBackend;
pub use geometric::{optimize_geometric, GeometricReport};
pub use photometric::{
    optimize_photometric, PhotometricOptions, PhotometricReport, PointPair,
};
pub use robust::RobustKernel;
pub use sampler::{sample_point_pairs, SampleResult, SamplerOptions, SamplingPolicy};
pub use traits::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
