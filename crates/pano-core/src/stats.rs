//! Control-point error statistics.
//!
//! Statistics are computed over the stored `error` field; callers must
//! refresh errors (e.g. [`crate::Panorama::recompute_cp_errors`]) first.
//! An empty qualifying set yields an all-zero result, never NaN.

use crate::math::{Pt2, Real};
use crate::model::Panorama;
use serde::{Deserialize, Serialize};

/// Restriction of the control-point set entering the statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatsFilter {
    /// Only control points touching this image.
    pub image: Option<usize>,
    /// Skip control points whose images are inactive.
    pub only_active: bool,
    /// Exclude line-only control points.
    pub skip_line_cp: bool,
}

/// Summary statistics of control-point error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpErrorStats {
    pub min: Real,
    pub max: Real,
    pub mean: Real,
    pub variance: Real,
    /// Number of qualifying control points.
    pub n: usize,
}

impl CpErrorStats {
    pub fn stddev(&self) -> Real {
        self.variance.sqrt()
    }
}

/// Radial statistics: error stats plus percentiles of control-point
/// distance from image center (normalized so the half diagonal is 1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RadialCpStats {
    pub error: CpErrorStats,
    pub radius_p10: Real,
    pub radius_p90: Real,
}

fn qualifies(pano: &Panorama, cp_idx: usize, filter: &StatsFilter) -> bool {
    let cp = &pano.control_points()[cp_idx];
    if filter.skip_line_cp && cp.mode.is_line() {
        return false;
    }
    if let Some(img) = filter.image {
        if cp.image1 != img && cp.image2 != img {
            return false;
        }
    }
    if filter.only_active
        && !(pano.image(cp.image1).active && pano.image(cp.image2).active)
    {
        return false;
    }
    true
}

/// Compute error statistics over the filtered control points.
pub fn cp_error_stats(pano: &Panorama, filter: &StatsFilter) -> CpErrorStats {
    let errors: Vec<Real> = (0..pano.control_points().len())
        .filter(|i| qualifies(pano, *i, filter))
        .map(|i| pano.control_points()[i].error)
        .collect();
    stats_of(&errors)
}

fn stats_of(errors: &[Real]) -> CpErrorStats {
    if errors.is_empty() {
        return CpErrorStats::default();
    }
    let n = errors.len();
    let mut min = Real::INFINITY;
    let mut max = Real::NEG_INFINITY;
    let mut sum = 0.0;
    for &e in errors {
        min = min.min(e);
        max = max.max(e);
        sum += e;
    }
    let mean = sum / n as Real;
    let variance = errors.iter().map(|e| (e - mean) * (e - mean)).sum::<Real>() / n as Real;
    CpErrorStats {
        min,
        max,
        mean,
        variance,
        n,
    }
}

/// Error statistics plus 10th/90th percentile of normalized radial distance
/// of the control-point endpoints from their image centers.
pub fn cp_radial_stats(pano: &Panorama, filter: &StatsFilter) -> RadialCpStats {
    let mut errors = Vec::new();
    let mut radii = Vec::new();
    for i in 0..pano.control_points().len() {
        if !qualifies(pano, i, filter) {
            continue;
        }
        let cp = &pano.control_points()[i];
        errors.push(cp.error);
        for (img, x, y) in [(cp.image1, cp.x1, cp.y1), (cp.image2, cp.x2, cp.y2)] {
            let im = pano.image(img);
            let c = Pt2::new(im.width as Real / 2.0, im.height as Real / 2.0);
            let half_diag = (c.x * c.x + c.y * c.y).sqrt();
            let d = ((x - c.x).powi(2) + (y - c.y).powi(2)).sqrt();
            radii.push(if half_diag > 0.0 { d / half_diag } else { 0.0 });
        }
    }
    let error = stats_of(&errors);
    if radii.is_empty() {
        return RadialCpStats::default();
    }
    radii.sort_by(|a, b| a.partial_cmp(b).unwrap());
    RadialCpStats {
        error,
        radius_p10: percentile(&radii, 0.10),
        radius_p90: percentile(&radii, 0.90),
    }
}

fn percentile(sorted: &[Real], q: Real) -> Real {
    debug_assert!(!sorted.is_empty());
    let pos = q * (sorted.len() - 1) as Real;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as Real;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControlPoint, CpMode, PanoOptions, SrcImage};

    fn pano_with_errors(errors: &[Real]) -> Panorama {
        let mut pano = Panorama::new(PanoOptions::default());
        pano.add_image(SrcImage::new(100, 100));
        pano.add_image(SrcImage::new(100, 100));
        for &e in errors {
            let mut cp = ControlPoint::new(0, 50.0, 50.0, 1, 50.0, 50.0);
            cp.error = e;
            pano.add_control_point(cp);
        }
        pano
    }

    #[test]
    fn stats_match_direct_computation() {
        let pano = pano_with_errors(&[2.0, 4.0, 30.0]);
        let s = cp_error_stats(&pano, &StatsFilter::default());
        assert_eq!(s.n, 3);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 30.0);
        assert!((s.mean - 12.0).abs() < 1e-12);
        // Direct: ((10)^2 + (8)^2 + (18)^2) / 3
        let expected_var = (100.0 + 64.0 + 324.0) / 3.0;
        assert!((s.variance - expected_var).abs() < 1e-9);
    }

    #[test]
    fn empty_set_yields_zeros_not_nan() {
        let pano = pano_with_errors(&[]);
        let s = cp_error_stats(&pano, &StatsFilter::default());
        assert_eq!(s, CpErrorStats::default());
        assert!(!s.mean.is_nan());
        let r = cp_radial_stats(&pano, &StatsFilter::default());
        assert_eq!(r, RadialCpStats::default());
    }

    #[test]
    fn line_points_can_be_excluded() {
        let mut pano = pano_with_errors(&[1.0, 5.0]);
        pano.control_points_mut()[1].mode = CpMode::VerticalLine;
        let all = cp_error_stats(&pano, &StatsFilter::default());
        assert_eq!(all.n, 2);
        let filtered = cp_error_stats(
            &pano,
            &StatsFilter {
                skip_line_cp: true,
                ..Default::default()
            },
        );
        assert_eq!(filtered.n, 1);
        assert_eq!(filtered.mean, 1.0);
    }

    #[test]
    fn inactive_images_can_be_excluded() {
        let mut pano = pano_with_errors(&[1.0, 2.0]);
        pano.image_mut(1).active = false;
        let s = cp_error_stats(
            &pano,
            &StatsFilter {
                only_active: true,
                ..Default::default()
            },
        );
        assert_eq!(s.n, 0);
    }

    #[test]
    fn radial_percentiles_cover_spread() {
        let mut pano = Panorama::new(PanoOptions::default());
        pano.add_image(SrcImage::new(100, 100));
        pano.add_image(SrcImage::new(100, 100));
        // One central pair, one corner pair.
        pano.add_control_point(ControlPoint::new(0, 50.0, 50.0, 1, 50.0, 50.0));
        pano.add_control_point(ControlPoint::new(0, 5.0, 5.0, 1, 95.0, 95.0));
        let r = cp_radial_stats(&pano, &StatsFilter::default());
        assert!(r.radius_p10 < 0.2);
        assert!(r.radius_p90 > 0.7);
    }
}
