//! Integration test for photometric exposure recovery.
//!
//! Synthetic point pairs carry a known 2x brightness ratio between two
//! images; the optimizer must recover the corresponding -1 EV offset from a
//! range of initial guesses, leaving the reference image anchored.

use pano_core::{var_set, NoProgress, PanoOptions, Panorama, Pt2, Real, ResponseType, SrcImage, Variable};
use pano_optim::{optimize_photometric, PhotometricOptions, PointPair};

fn scene() -> Panorama {
    let mut pano = Panorama::new(PanoOptions::default());
    for i in 0..2 {
        let mut img = SrcImage::new(1000, 800);
        img.yaw = 25.0 * i as Real;
        img.response_type = ResponseType::Linear;
        pano.add_image(img);
    }
    pano.options.color_ref_image = 0;
    pano
}

fn pairs_with_ratio(ratio: Real) -> Vec<PointPair> {
    (0..30)
        .map(|i| {
            let radiance = 0.04 + 0.015 * i as Real;
            let pos = Pt2::new(20.0 + 30.0 * i as Real, 400.0);
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
fn exposure_offset_is_recovered_from_varied_starts() {
    let pairs = pairs_with_ratio(2.0);
    // Initial guesses from half to four times the true gain.
    for start in [-2.0, -0.5, 0.0, 1.0] {
        let mut pano = scene();
        pano.image_mut(1).exposure = start;
        let report = optimize_photometric(
            &mut pano,
            &var_set(&[Variable::Exposure]),
            &pairs,
            &PhotometricOptions::default(),
            &NoProgress,
        )
        .expect("optimization should run");
        assert!(report.optimized && !report.cancelled);
        assert!(
            report.rms_error < 1e-3,
            "start {start}: rms = {}",
            report.rms_error
        );
        assert!(
            (pano.image(1).exposure - (-1.0)).abs() < 0.02,
            "start {start}: exposure = {}",
            pano.image(1).exposure
        );
        // The reference image is the gauge anchor and must not move.
        assert_eq!(pano.image(0).exposure, 0.0, "start {start}");
    }
}

#[test]
fn consistent_pairs_leave_everything_in_place() {
    let mut pano = scene();
    let report = optimize_photometric(
        &mut pano,
        &var_set(&[Variable::Exposure, Variable::WhiteBalanceRed]),
        &pairs_with_ratio(1.0),
        &PhotometricOptions::default(),
        &NoProgress,
    )
    .expect("optimization should run");
    assert!(report.rms_error < 1e-4, "rms = {}", report.rms_error);
    assert!(pano.image(1).exposure.abs() < 0.01);
    assert!((pano.image(1).wb_red - 1.0).abs() < 0.02);
}
