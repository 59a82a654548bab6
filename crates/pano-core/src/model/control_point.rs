//! Point correspondences between image pairs.

use crate::math::Real;
use serde::{Deserialize, Serialize};

/// Constraint mode of a control point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpMode {
    /// General X-Y point correspondence.
    Normal,
    /// Vertical line: only the x coordinate is constrained.
    VerticalLine,
    /// Horizontal line: only the y coordinate is constrained.
    HorizontalLine,
}

impl CpMode {
    /// Line-only control points constrain a single axis.
    pub fn is_line(self) -> bool {
        !matches!(self, CpMode::Normal)
    }
}

/// A correspondence between pixel positions in two images.
///
/// `error` is the reprojection residual from the most recent
/// [`crate::Panorama::recompute_cp_errors`] call and is stale until then.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPoint {
    pub image1: usize,
    pub x1: Real,
    pub y1: Real,
    pub image2: usize,
    pub x2: Real,
    pub y2: Real,
    pub mode: CpMode,
    #[serde(default)]
    pub error: Real,
}

impl ControlPoint {
    pub fn new(image1: usize, x1: Real, y1: Real, image2: usize, x2: Real, y2: Real) -> Self {
        Self {
            image1,
            x1,
            y1,
            image2,
            x2,
            y2,
            mode: CpMode::Normal,
            error: 0.0,
        }
    }

    /// Unordered image pair of this correspondence.
    pub fn pair(&self) -> (usize, usize) {
        if self.image1 <= self.image2 {
            (self.image1, self.image2)
        } else {
            (self.image2, self.image1)
        }
    }

    /// Whether this point connects the same unordered image pair.
    pub fn connects(&self, a: usize, b: usize) -> bool {
        self.pair() == if a <= b { (a, b) } else { (b, a) }
    }
}
