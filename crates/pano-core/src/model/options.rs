//! Global panorama output options.

use crate::math::Real;
use serde::{Deserialize, Serialize};

/// Output projection of the panorama canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    Rectilinear,
    Cylindrical,
    Equirectangular,
}

/// Axis-aligned integer rectangle, upper-left inclusive, lower-right exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Rect {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i64 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i64 {
        (self.bottom - self.top).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Smallest rectangle covering both operands; empty operands are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }

    /// Grow by `margin` on every side.
    pub fn padded(&self, margin: i64) -> Rect {
        Rect {
            left: self.left - margin,
            top: self.top - margin,
            right: self.right + margin,
            bottom: self.bottom + margin,
        }
    }
}

/// Global output options of a panorama.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanoOptions {
    pub projection: Projection,
    pub width: usize,
    pub height: usize,
    /// Horizontal field of view of the canvas in degrees.
    pub hfov: Real,
    /// Output region of interest in canvas pixels.
    pub roi: Rect,
    /// Index of the image whose exposure/white balance anchors the
    /// photometric optimization.
    pub color_ref_image: usize,
}

impl Default for PanoOptions {
    fn default() -> Self {
        Self {
            projection: Projection::Equirectangular,
            width: 3000,
            height: 1500,
            hfov: 360.0,
            roi: Rect::new(0, 0, 3000, 1500),
            color_ref_image: 0,
        }
    }
}

impl PanoOptions {
    /// Vertical field of view implied by projection, hfov, and aspect.
    pub fn vfov(&self) -> Real {
        let aspect = self.height as Real / self.width as Real;
        match self.projection {
            Projection::Equirectangular | Projection::Cylindrical => self.hfov * aspect,
            Projection::Rectilinear => {
                let half = crate::math::deg_to_rad(self.hfov / 2.0).tan() * aspect;
                2.0 * crate::math::rad_to_deg(half.atan())
            }
        }
    }

    /// Set the output height so the canvas pixel aspect matches the
    /// projection's angular aspect for the given vertical coverage.
    pub fn fit_height(&mut self, vfov: Real) {
        let vfov = vfov.clamp(1.0, 180.0);
        let h = self.width as Real * vfov / self.hfov.max(1.0);
        self.height = (h.round() as usize).max(1);
        self.roi = Rect::new(0, 0, self.width as i64, self.height as i64);
    }

    /// Reset the region of interest to the full canvas.
    pub fn roi_full(&mut self) {
        self.roi = Rect::new(0, 0, self.width as i64, self.height as i64);
    }
}
