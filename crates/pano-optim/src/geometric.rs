//! Geometric pose/lens optimization over control points.
//!
//! The heavy lifting is delegated to the LM backend; what lives here is the
//! variable-linking logic (folding per-image requests through link groups)
//! and the control-point residual layout.

use crate::backend_lm::LmBackend;
use crate::photometric::VarMapping;
use crate::traits::{NllsProblem, NllsSolverBackend, SolveOptions};
use anyhow::{ensure, Result};
use log::debug;
use nalgebra::DVector;
use pano_core::{CpMode, Panorama, Real, VarSet};
use std::cell::RefCell;

/// Outcome of a geometric optimization run.
#[derive(Debug, Clone)]
pub struct GeometricReport {
    /// RMS control-point error in canvas pixels after optimization.
    pub rms_error: Real,
    pub iterations: usize,
    pub converged: bool,
}

struct GeometricProblem {
    pano: RefCell<Panorama>,
    mapping: VarMapping,
}

impl NllsProblem for GeometricProblem {
    fn num_params(&self) -> usize {
        self.mapping.len()
    }

    fn num_residuals(&self) -> usize {
        2 * self.pano.borrow().control_points().len()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let mut pano = self.pano.borrow_mut();
        self.mapping.from_x(&mut pano, x);

        let n = pano.control_points().len();
        let mut r = DVector::zeros(2 * n);
        for i in 0..n {
            let cp = &pano.control_points()[i];
            let (dx, dy) = cp_offsets(&pano, i);
            match cp.mode {
                CpMode::Normal => {
                    r[2 * i] = dx;
                    r[2 * i + 1] = dy;
                }
                CpMode::VerticalLine => r[2 * i] = dx,
                CpMode::HorizontalLine => r[2 * i + 1] = dy,
            }
        }
        r
    }
}

/// Signed canvas-space offsets of one control point's endpoints.
fn cp_offsets(pano: &Panorama, cp_idx: usize) -> (Real, Real) {
    use pano_core::{ImageTransform, Pt2};
    let cp = &pano.control_points()[cp_idx];
    let t1 = ImageTransform::new(pano.image(cp.image1), &pano.options);
    let t2 = ImageTransform::new(pano.image(cp.image2), &pano.options);
    match (
        t1.image_to_pano(Pt2::new(cp.x1, cp.y1)),
        t2.image_to_pano(Pt2::new(cp.x2, cp.y2)),
    ) {
        (Some(p1), Some(p2)) => {
            let mut dx = p1.x - p2.x;
            if pano.options.hfov >= 360.0 {
                let w = pano.options.width as Real;
                if dx > w / 2.0 {
                    dx -= w;
                } else if dx < -w / 2.0 {
                    dx += w;
                }
            }
            (dx, p1.y - p2.y)
        }
        // Unprojectable endpoints repel the optimizer with a large
        // finite residual rather than NaN.
        _ => (1.0e6, 1.0e6),
    }
}

/// Optimize the requested geometric variables of each image.
///
/// `sets[i]` names the variables to optimize for image `i`; linked variables
/// collapse to one parameter per group. On completion the values are written
/// back and all control-point errors are recomputed.
pub fn optimize_geometric(
    pano: &mut Panorama,
    sets: &[VarSet],
    opts: &SolveOptions,
) -> Result<GeometricReport> {
    ensure!(
        sets.len() == pano.num_images(),
        "need one variable set per image ({} != {})",
        sets.len(),
        pano.num_images()
    );
    pano.validate()?;

    let geometric_only = sets
        .iter()
        .map(|s| s.iter().copied().filter(|v| v.is_geometric()).collect())
        .collect::<Vec<VarSet>>();
    let mapping = VarMapping::per_image(pano, &geometric_only);
    if mapping.is_empty() {
        debug!("no geometric variables requested, skipping optimization");
        pano.recompute_cp_errors();
        let rms = rms_cp_error(pano);
        return Ok(GeometricReport {
            rms_error: rms,
            iterations: 0,
            converged: true,
        });
    }
    ensure!(
        !pano.control_points().is_empty(),
        "no control points to optimize against"
    );

    let problem = GeometricProblem {
        pano: RefCell::new(pano.clone()),
        mapping: mapping.clone(),
    };
    let x0 = mapping.to_x(pano);
    let (x_opt, report) = LmBackend.solve(&problem, x0, opts);

    mapping.from_x(pano, &x_opt);
    pano.recompute_cp_errors();

    Ok(GeometricReport {
        rms_error: rms_cp_error(pano),
        iterations: report.iterations,
        converged: report.converged,
    })
}

fn rms_cp_error(pano: &Panorama) -> Real {
    let cps = pano.control_points();
    if cps.is_empty() {
        return 0.0;
    }
    let sq: Real = cps.iter().map(|cp| cp.error * cp.error).sum();
    (sq / cps.len() as Real).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pano_core::{var_set, ControlPoint, ImageTransform, PanoOptions, Pt2, SrcImage, Variable};

    /// Two images with a known yaw offset; control points generated from
    /// the ground truth geometry.
    fn two_image_scene(yaw2_true: Real, yaw2_init: Real) -> Panorama {
        let mut pano = Panorama::new(PanoOptions::default());
        let img1 = SrcImage::new(800, 600);
        let mut img2 = SrcImage::new(800, 600);
        img2.yaw = yaw2_true;
        pano.add_image(img1.clone());
        pano.add_image(img2.clone());

        let t1 = ImageTransform::new(&img1, &pano.options);
        let t2 = ImageTransform::new(&img2, &pano.options);
        for &(x, y) in &[
            (700.0, 200.0),
            (750.0, 300.0),
            (680.0, 420.0),
            (720.0, 500.0),
            (760.0, 150.0),
        ] {
            // Points visible in both frames.
            if let Some(p2) = t1.image_to_other(&t2, Pt2::new(x, y)) {
                pano.add_control_point(ControlPoint::new(0, x, y, 1, p2.x, p2.y));
            }
        }
        assert!(pano.control_points().len() >= 4, "bad test geometry");
        pano.image_mut(1).yaw = yaw2_init;
        pano
    }

    #[test]
    fn recovers_yaw_offset() {
        let mut pano = two_image_scene(30.0, 25.0);
        let sets = vec![
            VarSet::new(),
            var_set(&[Variable::Yaw, Variable::Pitch, Variable::Roll]),
        ];
        let report = optimize_geometric(&mut pano, &sets, &SolveOptions::default()).unwrap();
        assert!(report.converged);
        assert!(
            (pano.image(1).yaw - 30.0).abs() < 0.05,
            "yaw = {}",
            pano.image(1).yaw
        );
        assert!(report.rms_error < 0.5, "rms = {}", report.rms_error);
    }

    #[test]
    fn photometric_requests_are_ignored() {
        let mut pano = two_image_scene(20.0, 20.0);
        let sets = vec![var_set(&[Variable::Exposure]), var_set(&[Variable::Exposure])];
        let report = optimize_geometric(&mut pano, &sets, &SolveOptions::default()).unwrap();
        assert_eq!(report.iterations, 0);
        assert!(report.converged);
    }

    #[test]
    fn errors_are_recomputed_after_optimization() {
        let mut pano = two_image_scene(30.0, 28.0);
        let sets = vec![VarSet::new(), var_set(&[Variable::Yaw])];
        optimize_geometric(&mut pano, &sets, &SolveOptions::default()).unwrap();
        for cp in pano.control_points() {
            assert!(cp.error < 1.0, "stale or large error: {}", cp.error);
        }
    }
}
