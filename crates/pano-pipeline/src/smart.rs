//! Staged photometric optimization with plausibility gates.
//!
//! Full photometric optimization (exposure + vignetting + response + white
//! balance) from a cold start is brittle: with thin overlap data the
//! vignetting and white-balance terms happily absorb noise. The driver
//! escalates through staged variable sets, snapshots before each risky
//! pass, and rolls back any pass whose result fails a physical plausibility
//! check.

use anyhow::Result;
use log::{debug, info, warn};
use pano_core::{Panorama, ProgressSink, Real, VarSet, Variable};
use pano_optim::photometric::{optimize_photometric, PhotometricOptions, PhotometricReport};
use pano_optim::PointPair;
use serde::{Deserialize, Serialize};

/// What the photometric optimization should recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotometricMode {
    /// Exposure, vignetting, response.
    OptimizeLdr,
    /// Exposure, vignetting, response, white balance.
    OptimizeLdrWb,
    /// Vignetting and response; exposures are trusted (bracketed input).
    OptimizeHdr,
    /// As HDR plus white balance.
    OptimizeHdrWb,
}

impl PhotometricMode {
    fn wants_white_balance(self) -> bool {
        matches!(self, PhotometricMode::OptimizeLdrWb | PhotometricMode::OptimizeHdrWb)
    }

    fn is_hdr(self) -> bool {
        matches!(self, PhotometricMode::OptimizeHdr | PhotometricMode::OptimizeHdrWb)
    }
}

/// Outcome of the staged driver.
#[derive(Debug, Clone, Default)]
pub struct SmartPhotometricReport {
    /// Report of the last pass that ran.
    pub report: PhotometricReport,
    /// Whether vignetting survived its plausibility checks.
    pub vignetting_kept: bool,
    /// Whether white balance survived its plausibility check.
    pub white_balance_kept: bool,
}

const VIGNETTE_VARS: [Variable; 3] =
    [Variable::VignetteB, Variable::VignetteC, Variable::VignetteD];
const RESPONSE_VARS: [Variable; 5] = [
    Variable::ResponseA,
    Variable::ResponseB,
    Variable::ResponseC,
    Variable::ResponseD,
    Variable::ResponseE,
];
const WB_VARS: [Variable; 2] = [Variable::WhiteBalanceRed, Variable::WhiteBalanceBlue];

/// Run the staged photometric optimization.
///
/// A cancelled pass aborts the whole protocol; the panorama keeps whatever
/// the previously committed passes produced.
pub fn smart_optimize_photometric(
    pano: &mut Panorama,
    pairs: &[PointPair],
    mode: PhotometricMode,
    opts: &PhotometricOptions,
    progress: &dyn ProgressSink,
) -> Result<SmartPhotometricReport> {
    let mut active = VarSet::new();
    let mut out = SmartPhotometricReport::default();

    // Pass 1: exposure alone. HDR inputs carry bracketed exposures that
    // must not move.
    if !mode.is_hdr() {
        active.insert(Variable::Exposure);
        info!("photometric pass 1: exposure");
        out.report = optimize_photometric(pano, &active, pairs, opts, progress)?;
        if out.report.cancelled {
            return Ok(out);
        }
    }

    // Pass 2: vignetting, only when several exposure stacks constrain it.
    let stacks = exposure_stacks(pano);
    if stacks > 1 {
        let snapshot = pano.snapshot_photometric();
        let mut trial = active.clone();
        trial.extend(VIGNETTE_VARS);
        info!("photometric pass 2: vignetting ({stacks} stacks)");
        out.report = optimize_photometric(pano, &trial, pairs, opts, progress)?;
        if out.report.cancelled {
            return Ok(out);
        }
        if vignetting_plausible(pano) {
            active = trial;
            out.vignetting_kept = true;
        } else {
            warn!("implausible vignetting, rolling the pass back");
            pano.restore_photometric(&snapshot);
        }
    } else {
        debug!("single exposure stack, vignetting stays off");
    }

    // Pass 3: response curve, plus white balance when requested.
    let snapshot = pano.snapshot_photometric();
    active.extend(RESPONSE_VARS);
    if mode.wants_white_balance() {
        active.extend(WB_VARS);
        out.white_balance_kept = true;
    }
    info!("photometric pass 3: combined set ({} variables)", active.len());
    out.report = optimize_photometric(pano, &active, pairs, opts, progress)?;
    if out.report.cancelled {
        return Ok(out);
    }

    // Re-validate; a failing group invalidates the whole pass.
    let mut failed = VarSet::new();
    if out.vignetting_kept && !vignetting_plausible(pano) {
        warn!("vignetting turned implausible in the combined pass");
        failed.extend(VIGNETTE_VARS);
        out.vignetting_kept = false;
    }
    if out.white_balance_kept && !white_balance_plausible(pano) {
        warn!("implausible white balance, dropping it");
        failed.extend(WB_VARS);
        out.white_balance_kept = false;
    }
    if !failed.is_empty() {
        pano.restore_photometric(&snapshot);
        active.retain(|v| !failed.contains(v));
        if active.is_empty() {
            return Ok(out);
        }
        info!("re-running reduced set ({} variables)", active.len());
        out.report = optimize_photometric(pano, &active, pairs, opts, progress)?;
    }

    Ok(out)
}

/// Number of exposure stacks: images sharing a position (linked, or equal
/// orientation to within 1e-9 degrees) form one stack.
pub fn exposure_stacks(pano: &Panorama) -> usize {
    let n = pano.num_images();
    let mut stack = (0..n).collect::<Vec<usize>>();
    for a in 0..n {
        for b in (a + 1)..n {
            let same_pose = {
                let (ia, ib) = (pano.image(a), pano.image(b));
                (ia.yaw - ib.yaw).abs() < 1e-9
                    && (ia.pitch - ib.pitch).abs() < 1e-9
                    && (ia.roll - ib.roll).abs() < 1e-9
            };
            if pano.position_linked(a, b) || same_pose {
                let (ra, rb) = (stack[a], stack[b]);
                if ra != rb {
                    let keep = ra.min(rb);
                    for r in stack.iter_mut() {
                        if *r == ra || *r == rb {
                            *r = keep;
                        }
                    }
                }
            }
        }
    }
    let mut roots: Vec<usize> = stack;
    roots.sort_unstable();
    roots.dedup();
    roots.len()
}

/// The vignetting polynomial of every image must stay within [0.7, 1.1]
/// over the whole radius range; real lenses darken corners mildly, they do
/// not brighten them or crush them to black.
pub fn vignetting_plausible(pano: &Panorama) -> bool {
    for img in pano.images() {
        for i in (0..=250usize).step_by(10) {
            let r = i as Real / 250.0;
            let v = img.vignetting_at(r * r);
            if !(0.7..=1.1).contains(&v) {
                return false;
            }
        }
    }
    true
}

/// White-balance factors beyond 3 (or non-positive) are implausible.
pub fn white_balance_plausible(pano: &Panorama) -> bool {
    pano.images().iter().all(|img| {
        img.wb_red > 0.0 && img.wb_red <= 3.0 && img.wb_blue > 0.0 && img.wb_blue <= 3.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pano_core::{NoProgress, PanoOptions, Pt2, ResponseType, SrcImage};

    fn two_image_pano() -> Panorama {
        let mut pano = Panorama::new(PanoOptions::default());
        for i in 0..2 {
            let mut img = SrcImage::new(100, 100);
            img.yaw = 30.0 * i as Real;
            img.response_type = ResponseType::Linear;
            pano.add_image(img);
        }
        pano.options.color_ref_image = 0;
        pano
    }

    fn exposure_pairs(ratio: Real) -> Vec<PointPair> {
        (0..20)
            .map(|i| {
                let radiance = 0.05 + 0.02 * i as Real;
                let pos = Pt2::new(10.0 + 4.0 * i as Real, 50.0);
                PointPair {
                    image1: 0,
                    pos1: pos,
                    color1: [radiance; 3],
                    image2: 1,
                    pos2: pos,
                    color2: [radiance * ratio; 3],
                }
            })
            .collect()
    }

    #[test]
    fn recovers_exposure_through_the_staged_protocol() {
        let mut pano = two_image_pano();
        let out = smart_optimize_photometric(
            &mut pano,
            &exposure_pairs(2.0),
            PhotometricMode::OptimizeLdr,
            &PhotometricOptions::default(),
            &NoProgress,
        )
        .unwrap();
        assert!(!out.report.cancelled);
        assert!(
            (pano.image(1).exposure - (-1.0)).abs() < 0.05,
            "exposure = {}",
            pano.image(1).exposure
        );
        // Non-WB mode never touches white balance.
        assert_eq!(pano.image(1).wb_red, 1.0);
        assert_eq!(pano.image(1).wb_blue, 1.0);
    }

    #[test]
    fn consistent_input_stays_put() {
        let mut pano = two_image_pano();
        let out = smart_optimize_photometric(
            &mut pano,
            &exposure_pairs(1.0),
            PhotometricMode::OptimizeLdrWb,
            &PhotometricOptions::default(),
            &NoProgress,
        )
        .unwrap();
        assert!(out.report.rms_error < 1e-3, "rms = {}", out.report.rms_error);
        assert!((pano.image(1).exposure).abs() < 0.01);
        assert!((pano.image(1).wb_red - 1.0).abs() < 0.05);
    }

    #[test]
    fn cancellation_aborts_the_protocol() {
        let mut pano = two_image_pano();
        let before_exposure = pano.image(1).exposure;
        let sink = pano_core::CancelAfter::new(1);
        let out = smart_optimize_photometric(
            &mut pano,
            &exposure_pairs(2.0),
            PhotometricMode::OptimizeLdr,
            &PhotometricOptions::default(),
            &sink,
        )
        .unwrap();
        assert!(out.report.cancelled);
        assert_eq!(pano.image(1).exposure, before_exposure);
    }

    #[test]
    fn stack_counting_merges_linked_and_identical_poses() {
        let mut pano = Panorama::new(PanoOptions::default());
        for yaw in [0.0, 0.0, 25.0, 50.0] {
            let mut img = SrcImage::new(10, 10);
            img.yaw = yaw;
            pano.add_image(img);
        }
        // Images 0 and 1 share a pose; 2 and 3 are linked explicitly.
        pano.links.link(2, 3, Variable::Yaw);
        pano.links.link(2, 3, Variable::Pitch);
        pano.links.link(2, 3, Variable::Roll);
        assert_eq!(exposure_stacks(&pano), 2);
    }

    #[test]
    fn vignetting_gate_rejects_dark_corners() {
        let mut pano = two_image_pano();
        assert!(vignetting_plausible(&pano));
        pano.image_mut(0).vig_b = -0.9;
        assert!(!vignetting_plausible(&pano));
        // Brightening corners is just as implausible.
        pano.image_mut(0).vig_b = 0.4;
        assert!(!vignetting_plausible(&pano));
    }

    #[test]
    fn white_balance_gate_rejects_extreme_factors() {
        let mut pano = two_image_pano();
        assert!(white_balance_plausible(&pano));
        pano.image_mut(1).wb_red = 3.5;
        assert!(!white_balance_plausible(&pano));
        pano.image_mut(1).wb_red = 1.0;
        pano.image_mut(1).wb_blue = -0.2;
        assert!(!white_balance_plausible(&pano));
    }

    #[test]
    fn mode_roundtrips_through_json() {
        let json = serde_json::to_string(&PhotometricMode::OptimizeLdrWb).unwrap();
        let back: PhotometricMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PhotometricMode::OptimizeLdrWb);
    }
}
