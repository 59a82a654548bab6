//! Photometric optimization: exposure, white balance, vignetting, and
//! response curves from sampled pixel-pair correspondences.

pub mod transform;
pub mod vars;

pub use transform::{ImagePhotometric, ResponseCurve, RESPONSE_LUT_SIZE};
pub use vars::VarMapping;

use crate::backend_lm::LmBackend;
use crate::robust::RobustKernel;
use crate::traits::{NllsProblem, NllsSolverBackend, SolveOptions};
use anyhow::{ensure, Result};
use log::{debug, info};
use nalgebra::DVector;
use pano_core::{Panorama, ProgressSink, Pt2, Real, VarSet};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};

/// A sampled photometric correspondence between two images.
///
/// Colors are normalized device values in [0, 1]; positions are in original
/// image resolution. Produced by the sampler, consumed by one optimization
/// run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPair {
    pub image1: usize,
    pub pos1: Pt2,
    pub color1: [Real; 3],
    pub image2: usize,
    pub pos2: Pt2,
    pub color2: [Real; 3],
}

/// Options for one photometric optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotometricOptions {
    /// Huber threshold on normalized intensity residuals.
    pub huber_sigma: Real,
    /// Smallest meaningful intensity quantum of the source pixel format;
    /// the cost tolerance scales with `(0.1 · step)²`.
    pub pixel_step: Real,
    pub max_iters: usize,
}

impl Default for PhotometricOptions {
    fn default() -> Self {
        Self {
            huber_sigma: 5.0 / 255.0,
            pixel_step: 1.0 / 255.0,
            max_iters: 250,
        }
    }
}

/// Outcome of a photometric optimization run.
///
/// `cancelled`, `converged`, and errors are three distinct outcomes; a
/// cancelled run leaves the panorama untouched.
#[derive(Debug, Clone, Default)]
pub struct PhotometricReport {
    /// Unweighted RMS intensity error over all pair residuals.
    pub rms_error: Real,
    pub iterations: usize,
    pub converged: bool,
    pub cancelled: bool,
    /// False when the filtered variable set was empty and nothing ran.
    pub optimized: bool,
}

struct PhotometricProblem<'a> {
    pano: RefCell<Panorama>,
    mapping: VarMapping,
    pairs: &'a [PointPair],
    kernel: RobustKernel,
    progress: &'a dyn ProgressSink,
    cancelled: Cell<bool>,
    evals: Cell<usize>,
    max_evals: usize,
}

impl<'a> PhotometricProblem<'a> {
    fn residuals_with_kernel(&self, x: &DVector<Real>, kernel: RobustKernel) -> DVector<Real> {
        let mut pano = self.pano.borrow_mut();
        self.mapping.from_x(&mut pano, x);

        let transforms: Vec<ImagePhotometric> = pano
            .images()
            .iter()
            .map(ImagePhotometric::new)
            .collect();

        let n_images = transforms.len();
        let mut r = DVector::zeros(n_images + 6 * self.pairs.len());
        for (i, t) in transforms.iter().enumerate() {
            r[i] = t.monotonicity_penalty();
        }

        for (k, pair) in self.pairs.iter().enumerate() {
            let t1 = &transforms[pair.image1];
            let t2 = &transforms[pair.image2];

            // Radiance seen through image 2, predicted in image 1.
            let rad2 = t2.inverse(pair.color2, pair.pos2);
            let pred1 = t1.forward(rad2, pair.pos1);
            // And the symmetric direction.
            let rad1 = t1.inverse(pair.color1, pair.pos1);
            let pred2 = t2.forward(rad1, pair.pos2);

            let base = n_images + 6 * k;
            for c in 0..3 {
                r[base + c] = kernel.weight(pair.color1[c] - pred1[c]);
                r[base + 3 + c] = kernel.weight(pair.color2[c] - pred2[c]);
            }
        }
        r
    }
}

impl<'a> NllsProblem for PhotometricProblem<'a> {
    fn num_params(&self) -> usize {
        self.mapping.len()
    }

    fn num_residuals(&self) -> usize {
        self.pano.borrow().num_images() + 6 * self.pairs.len()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        self.residuals_with_kernel(x, self.kernel)
    }

    fn poll_cancel(&self) -> bool {
        if self.cancelled.get() {
            return true;
        }
        let evals = self.evals.get() + 1;
        self.evals.set(evals);
        let frac = (evals as f64 / self.max_evals as f64).min(1.0);
        if !self.progress.report(frac, "optimizing photometric parameters") {
            self.cancelled.set(true);
            return true;
        }
        false
    }
}

/// Optimize photometric variables against sampled point pairs.
///
/// The requested variable set is filtered down to photometric variables;
/// an empty filtered set is a successful no-op. On completion the optimized
/// values are written back to `pano` (honoring link groups) and the final
/// unweighted RMS error is recomputed. A cancelled run reports
/// `cancelled = true` and leaves `pano` unchanged.
pub fn optimize_photometric(
    pano: &mut Panorama,
    vars: &VarSet,
    pairs: &[PointPair],
    opts: &PhotometricOptions,
    progress: &dyn ProgressSink,
) -> Result<PhotometricReport> {
    let photometric: VarSet = vars.iter().copied().filter(|v| v.is_photometric()).collect();
    if photometric.is_empty() {
        debug!("no photometric variables requested, skipping optimization");
        return Ok(PhotometricReport::default());
    }
    ensure!(!pairs.is_empty(), "no point pairs to optimize against");
    for pair in pairs {
        ensure!(
            pair.image1 < pano.num_images() && pair.image2 < pano.num_images(),
            "point pair references image out of range"
        );
    }

    let mapping = VarMapping::photometric(pano, &photometric);
    if mapping.is_empty() {
        debug!("photometric variable set folded to zero parameters, skipping");
        return Ok(PhotometricReport::default());
    }

    let problem = PhotometricProblem {
        pano: RefCell::new(pano.clone()),
        mapping: mapping.clone(),
        pairs,
        kernel: RobustKernel::Huber {
            sigma: opts.huber_sigma,
        },
        progress,
        cancelled: Cell::new(false),
        evals: Cell::new(0),
        max_evals: opts.max_iters * (mapping.len() + 1),
    };

    let x0 = mapping.to_x(pano);
    let solve_opts = SolveOptions {
        max_iters: opts.max_iters,
        ftol: (opts.pixel_step * 0.1) * (opts.pixel_step * 0.1),
        ..Default::default()
    };

    info!(
        "photometric optimization: {} parameters, {} pairs",
        mapping.len(),
        pairs.len()
    );
    let (x_opt, report) = LmBackend.solve(&problem, x0, &solve_opts);

    if problem.cancelled.get() {
        info!("photometric optimization cancelled");
        return Ok(PhotometricReport {
            cancelled: true,
            optimized: true,
            iterations: report.iterations,
            ..Default::default()
        });
    }

    mapping.from_x(pano, &x_opt);

    // Final quality measure without robust weighting.
    let raw = problem.residuals_with_kernel(&x_opt, RobustKernel::None);
    let pair_rows = 6 * pairs.len();
    let sq_sum: Real = raw
        .iter()
        .skip(pano.num_images())
        .map(|e| e * e)
        .sum();
    let rms = if pair_rows > 0 {
        (sq_sum / pair_rows as Real).sqrt()
    } else {
        0.0
    };
    info!(
        "photometric optimization finished: rms = {:.6}, converged = {}",
        rms, report.converged
    );

    Ok(PhotometricReport {
        rms_error: rms,
        iterations: report.iterations,
        converged: report.converged,
        cancelled: false,
        optimized: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pano_core::{var_set, NoProgress, PanoOptions, ResponseType, SrcImage, Variable};

    /// Two images of the same flat scene, image 2 exposed one stop brighter.
    fn synthetic_exposure_pano(initial_guess: Real) -> (Panorama, Vec<PointPair>) {
        let mut pano = Panorama::new(PanoOptions::default());
        for _ in 0..2 {
            let mut img = SrcImage::new(100, 100);
            img.response_type = ResponseType::Linear;
            pano.add_image(img);
        }
        // Ground truth: image2 = image1 * 2 in linear radiance.
        pano.image_mut(1).exposure = initial_guess;
        pano.options.color_ref_image = 0;

        let mut pairs = Vec::new();
        for i in 0..20 {
            let radiance = 0.05 + 0.02 * i as Real;
            let pos = Pt2::new(10.0 + 4.0 * i as Real, 50.0);
            pairs.push(PointPair {
                image1: 0,
                pos1: pos,
                color1: [radiance; 3],
                image2: 1,
                pos2: pos,
                color2: [radiance * 2.0; 3],
            });
        }
        (pano, pairs)
    }

    #[test]
    fn recovers_synthetic_exposure_difference() {
        // True offset: gain2 = 2 => exposure2 = -1. Initial guesses span
        // [0.5, 4.0] times the true ratio.
        for guess in [-2.0, -1.5, 0.0, 1.0] {
            let (mut pano, pairs) = synthetic_exposure_pano(guess);
            let report = optimize_photometric(
                &mut pano,
                &var_set(&[Variable::Exposure]),
                &pairs,
                &PhotometricOptions::default(),
                &NoProgress,
            )
            .unwrap();
            assert!(report.optimized);
            assert!(
                report.rms_error < 1e-3,
                "guess {guess}: rms {}",
                report.rms_error
            );
            assert!(
                (pano.image_mut(1).exposure - (-1.0)).abs() < 0.01,
                "guess {guess}: exposure {}",
                pano.image_mut(1).exposure
            );
        }
    }

    #[test]
    fn empty_variable_set_is_a_noop() {
        let (mut pano, pairs) = synthetic_exposure_pano(0.5);
        let before = pano.clone();
        let report = optimize_photometric(
            &mut pano,
            &var_set(&[Variable::Yaw, Variable::Pitch]),
            &pairs,
            &PhotometricOptions::default(),
            &NoProgress,
        )
        .unwrap();
        assert!(!report.optimized);
        assert_eq!(
            pano.image(1).exposure,
            before.image(1).exposure,
            "no-op must not touch the panorama"
        );
    }

    #[test]
    fn cancellation_leaves_panorama_untouched() {
        let (mut pano, pairs) = synthetic_exposure_pano(1.0);
        let before = pano.clone();
        let sink = pano_core::CancelAfter::new(2);
        let report = optimize_photometric(
            &mut pano,
            &var_set(&[Variable::Exposure]),
            &pairs,
            &PhotometricOptions::default(),
            &sink,
        )
        .unwrap();
        assert!(report.cancelled);
        assert!(!report.converged);
        assert_eq!(pano.image(1).exposure, before.image(1).exposure);
    }

    #[test]
    fn rejects_out_of_range_pair() {
        let (mut pano, mut pairs) = synthetic_exposure_pano(0.0);
        pairs[0].image2 = 7;
        let err = optimize_photometric(
            &mut pano,
            &var_set(&[Variable::Exposure]),
            &pairs,
            &PhotometricOptions::default(),
            &NoProgress,
        );
        assert!(err.is_err());
    }
}
