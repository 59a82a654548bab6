//! Seam-based merging of overlapping panorama images.
//!
//! The merge pipeline: seed label maps from the two validity masks, a
//! smoothed color-distance map over the overlap, seeded region growing to
//! place the seam where the images disagree least, then either a hard pixel
//! copy along the seam or a gradient-domain blend through a multigrid
//! Poisson solve.

pub mod distance;
pub mod labels;
pub mod merge;
pub mod poisson;
pub mod seam;
pub mod watershed;

pub use labels::{LabelMap, LABEL_BOTH, LABEL_BOUNDARY, LABEL_IMAGE1, LABEL_IMAGE2, LABEL_NONE};
pub use merge::{merge_images, MergeOptions};
