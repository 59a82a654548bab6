//! The panorama aggregate.

use super::{ControlPoint, CpMode, ModelError, PanoOptions, SrcImage, VarLinks, Variable};
use crate::math::{Pt2, Real};
use crate::transform::ImageTransform;
use serde::{Deserialize, Serialize};

/// Saved photometric variable values for explicit commit/rollback.
///
/// The smart photometric driver takes one snapshot per pass and restores it
/// when a pass produces implausible results.
#[derive(Debug, Clone)]
pub struct PhotometricSnapshot {
    values: Vec<Vec<(Variable, Real)>>,
}

/// A full panorama: images, control points, options, and link state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Panorama {
    images: Vec<SrcImage>,
    control_points: Vec<ControlPoint>,
    pub options: PanoOptions,
    pub links: VarLinks,
}

impl Panorama {
    pub fn new(options: PanoOptions) -> Self {
        Self {
            images: Vec::new(),
            control_points: Vec::new(),
            options,
            links: VarLinks::new(),
        }
    }

    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[SrcImage] {
        &self.images
    }

    pub fn image(&self, i: usize) -> &SrcImage {
        &self.images[i]
    }

    pub fn image_mut(&mut self, i: usize) -> &mut SrcImage {
        &mut self.images[i]
    }

    /// Append an image, returning its stable index.
    pub fn add_image(&mut self, image: SrcImage) -> usize {
        self.images.push(image);
        self.images.len() - 1
    }

    pub fn control_points(&self) -> &[ControlPoint] {
        &self.control_points
    }

    pub fn control_points_mut(&mut self) -> &mut Vec<ControlPoint> {
        &mut self.control_points
    }

    pub fn add_control_point(&mut self, cp: ControlPoint) {
        self.control_points.push(cp);
    }

    /// Remove control points by original index, descending-safe.
    pub fn remove_control_points(&mut self, indices: &[usize]) {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        for idx in sorted.into_iter().rev() {
            if idx < self.control_points.len() {
                self.control_points.remove(idx);
            }
        }
    }

    /// Write a variable, propagating the value across its link group.
    pub fn set_linked_var(&mut self, image: usize, var: Variable, value: Real) {
        let repr = self.links.representatives(var, self.images.len());
        let group = repr[image];
        for (i, r) in repr.iter().enumerate() {
            if *r == group {
                self.images[i].set_var(var, value);
            }
        }
    }

    /// Whether two images share all of yaw, pitch, and roll.
    pub fn position_linked(&self, a: usize, b: usize) -> bool {
        let n = self.images.len();
        self.links.is_linked(a, b, Variable::Yaw, n)
            && self.links.is_linked(a, b, Variable::Pitch, n)
            && self.links.is_linked(a, b, Variable::Roll, n)
    }

    /// Fail-fast validation of control-point invariants.
    pub fn validate(&self) -> Result<(), ModelError> {
        let n = self.images.len();
        for (idx, cp) in self.control_points.iter().enumerate() {
            for (img, x, y) in [(cp.image1, cp.x1, cp.y1), (cp.image2, cp.x2, cp.y2)] {
                if img >= n {
                    return Err(ModelError::ImageIndex(img, n));
                }
                let (w, h) = (self.images[img].width, self.images[img].height);
                if !(0.0..=w as Real).contains(&x) || !(0.0..=h as Real).contains(&y) {
                    return Err(ModelError::ControlPointOutOfBounds {
                        cp: idx,
                        image: img,
                        x,
                        y,
                        w,
                        h,
                    });
                }
            }
        }
        Ok(())
    }

    /// Extract a two-image sub-panorama restricted to control points of
    /// `mode` connecting the pair. Image `a` maps to index 0, `b` to 1.
    /// Link state is not carried over; the sub-panorama is used for
    /// isolated pairwise optimization only.
    pub fn subset_pair(&self, a: usize, b: usize, mode: CpMode) -> Panorama {
        let mut sub = Panorama::new(self.options.clone());
        sub.add_image(self.images[a].clone());
        sub.add_image(self.images[b].clone());
        for cp in &self.control_points {
            if cp.mode != mode || !cp.connects(a, b) {
                continue;
            }
            let mut c = cp.clone();
            if c.image1 == a {
                c.image1 = 0;
                c.image2 = 1;
            } else {
                // Keep point1 with the first sub image.
                std::mem::swap(&mut c.x1, &mut c.x2);
                std::mem::swap(&mut c.y1, &mut c.y2);
                c.image1 = 0;
                c.image2 = 1;
            }
            sub.add_control_point(c);
        }
        sub
    }

    /// Reprojection residual of one control point in canvas pixels.
    ///
    /// Both endpoints are mapped into panorama space; Normal points use the
    /// Euclidean distance, line points their single constrained axis.
    /// Unprojectable endpoints yield a large finite error so they sort as
    /// outliers instead of poisoning statistics with NaN.
    pub fn cp_error(&self, cp: &ControlPoint) -> Real {
        let t1 = ImageTransform::new(&self.images[cp.image1], &self.options);
        let t2 = ImageTransform::new(&self.images[cp.image2], &self.options);
        let p1 = t1.image_to_pano(Pt2::new(cp.x1, cp.y1));
        let p2 = t2.image_to_pano(Pt2::new(cp.x2, cp.y2));
        match (p1, p2) {
            (Some(p1), Some(p2)) => {
                let mut dx = p1.x - p2.x;
                let dy = p1.y - p2.y;
                // A 360 degree canvas wraps horizontally.
                if self.options.hfov >= 360.0 {
                    let w = self.options.width as Real;
                    if dx.abs() > w / 2.0 {
                        dx = w - dx.abs();
                    }
                }
                match cp.mode {
                    CpMode::Normal => (dx * dx + dy * dy).sqrt(),
                    CpMode::VerticalLine => dx.abs(),
                    CpMode::HorizontalLine => dy.abs(),
                }
            }
            _ => 1.0e6,
        }
    }

    /// Recompute the stored error of every control point.
    pub fn recompute_cp_errors(&mut self) {
        let errors: Vec<Real> = self
            .control_points
            .iter()
            .map(|cp| self.cp_error(cp))
            .collect();
        for (cp, e) in self.control_points.iter_mut().zip(errors) {
            cp.error = e;
        }
    }

    /// Snapshot every photometric variable of every image.
    pub fn snapshot_photometric(&self) -> PhotometricSnapshot {
        let values = self
            .images
            .iter()
            .map(|img| {
                Variable::ALL
                    .iter()
                    .filter(|v| v.is_photometric())
                    .map(|v| (*v, img.var(*v)))
                    .collect()
            })
            .collect();
        PhotometricSnapshot { values }
    }

    /// Restore a previously taken photometric snapshot.
    pub fn restore_photometric(&mut self, snapshot: &PhotometricSnapshot) {
        for (img, values) in self.images.iter_mut().zip(&snapshot.values) {
            for (var, value) in values {
                img.set_var(*var, *value);
            }
        }
    }
}
