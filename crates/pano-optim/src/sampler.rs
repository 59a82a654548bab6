//! Photometric point-pair sampling.
//!
//! Candidates are drawn from overlapping image regions, filtered by
//! intensity limits, scored by a Laplacian-of-Gaussian "badness" vote
//! (strong edges make unreliable photometric evidence), and binned by
//! radial distance from the image center so the final draw is approximately
//! uniform across radius. A radius-uniform sample is essential for
//! vignetting estimation, which is only observable away from the center.

use crate::photometric::PointPair;
use anyhow::{ensure, Result};
use log::{debug, info};
use pano_core::{
    ImageTransform, Panorama, ProgressSink, Pt2, Raster, Real,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of radial histogram bins.
const RADIUS_BINS: usize = 10;
/// Random sampling over-draws by this factor before the radius-uniform cut.
const OVERSAMPLE: usize = 5;

/// Candidate generation policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Exhaustive grid scan with the given pixel step.
    AllPoints { step: usize },
    /// Random draws, seedable for reproducibility.
    RandomPoints { seed: u64 },
}

/// Sampling options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerOptions {
    /// Requested number of point pairs.
    pub num_points: usize,
    /// Lower intensity limit in normalized units; near-black exclusion.
    pub min_intensity: Real,
    /// Upper intensity limit in normalized units; near-white exclusion.
    pub max_intensity: Real,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            num_points: 200,
            min_intensity: 2.0 / 255.0,
            max_intensity: 250.0 / 255.0,
        }
    }
}

/// Result of a sampling run.
#[derive(Debug, Clone, Default)]
pub struct SampleResult {
    pub pairs: Vec<PointPair>,
    pub cancelled: bool,
}

type Candidate = (f32, PointPair);
type Histogram = Vec<Vec<Candidate>>;

/// Extract photometric correspondences between overlapping images.
///
/// `rasters[i]` is the (possibly downsampled) pixel buffer of image `i`;
/// the panorama is copied and its logical sizes rescaled to match before
/// sampling, and the returned coordinates are scaled back to the original
/// resolution. Cancellation is polled at row/point granularity.
pub fn sample_point_pairs(
    pano: &Panorama,
    rasters: &[Raster],
    policy: SamplingPolicy,
    opts: &SamplerOptions,
    progress: &dyn ProgressSink,
) -> Result<SampleResult> {
    ensure!(
        rasters.len() == pano.num_images(),
        "need one raster per image ({} != {})",
        rasters.len(),
        pano.num_images()
    );
    ensure!(opts.num_points > 0, "requested zero point pairs");

    // Work on a copy whose logical sizes match the loaded pixel data.
    let mut work = pano.clone();
    let mut scale_back = Vec::with_capacity(rasters.len());
    for (i, raster) in rasters.iter().enumerate() {
        let img = work.image_mut(i);
        let sx = img.width as Real / raster.width() as Real;
        img.shift_d /= sx;
        img.shift_e /= sx;
        img.vig_center_x /= sx;
        img.vig_center_y /= sx;
        img.width = raster.width();
        img.height = raster.height();
        scale_back.push(sx);
    }
    canonicalize(&mut work);

    if !progress.report(0.0, "computing edge votes") {
        return Ok(SampleResult {
            cancelled: true,
            ..Default::default()
        });
    }

    // Per-image Laplacian-of-Gaussian badness votes; images are independent.
    let votes: Vec<Vec<f32>> = rasters.par_iter().map(laplacian_votes).collect();

    let transforms: Vec<ImageTransform> = work
        .images()
        .iter()
        .map(|img| ImageTransform::new(img, &work.options))
        .collect();

    let cancelled = AtomicBool::new(false);
    let histogram = match policy {
        SamplingPolicy::AllPoints { step } => generate_grid(
            &work,
            rasters,
            &votes,
            &transforms,
            opts,
            step.max(1),
            progress,
            &cancelled,
        ),
        SamplingPolicy::RandomPoints { seed } => generate_random(
            &work,
            rasters,
            &votes,
            &transforms,
            opts,
            seed,
            progress,
            &cancelled,
        ),
    };

    if cancelled.load(Ordering::Relaxed) {
        return Ok(SampleResult {
            cancelled: true,
            ..Default::default()
        });
    }

    let mut pairs = draw_radius_uniform(histogram, opts.num_points);
    // Back to original resolution.
    for pair in &mut pairs {
        let s1 = scale_back[pair.image1];
        let s2 = scale_back[pair.image2];
        pair.pos1 = Pt2::new(pair.pos1.x * s1, pair.pos1.y * s1);
        pair.pos2 = Pt2::new(pair.pos2.x * s2, pair.pos2.y * s2);
    }

    info!("sampled {} point pairs", pairs.len());
    Ok(SampleResult {
        pairs,
        cancelled: false,
    })
}

/// Re-center the panorama and fit the canvas to the current alignment so
/// overlap projections share one canonical coordinate system.
fn canonicalize(pano: &mut Panorama) {
    let n = pano.num_images();
    if n == 0 {
        return;
    }
    let mean_yaw: Real =
        pano.images().iter().map(|i| i.yaw).sum::<Real>() / n as Real;
    for i in 0..n {
        let yaw = pano.image(i).yaw - mean_yaw;
        pano.image_mut(i).yaw = yaw;
    }

    // Angular extents from per-image yaw/pitch plus half field of view.
    let mut hfov: Real = 0.0;
    let mut vfov: Real = 0.0;
    let mut width_sum = 0.0;
    for img in pano.images() {
        let img_vfov = img.hfov * img.height as Real / img.width as Real;
        hfov = hfov.max(2.0 * img.yaw.abs() + img.hfov);
        vfov = vfov.max(2.0 * img.pitch.abs() + img_vfov);
        width_sum += img.width as Real * 360.0 / img.hfov;
    }
    let hfov = hfov.clamp(10.0, 360.0);
    let vfov = vfov.clamp(10.0, 180.0);

    // Roughly 1:1 pixel density between sources and canvas.
    let full_width = width_sum / pano.num_images() as Real;
    pano.options.hfov = hfov;
    pano.options.width = ((full_width * hfov / 360.0).round() as usize).max(16);
    pano.options.fit_height(vfov);
    pano.options.roi_full();
    debug!(
        "sampling canvas: {}x{} hfov {:.1}",
        pano.options.width, pano.options.height, pano.options.hfov
    );
}

/// Absolute Laplacian of a Gaussian-smoothed (sigma 1) luminance image.
fn laplacian_votes(raster: &Raster) -> Vec<f32> {
    let (w, h) = (raster.width(), raster.height());
    let max = raster.pixel_type().max_value() as f32;
    let mut lum = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let rgb = raster.rgb(x, y);
            lum[y * w + x] = (rgb[0] + rgb[1] + rgb[2]) / (3.0 * max);
        }
    }

    // Separable 5-tap Gaussian, sigma 1: [1, 4, 6, 4, 1] / 16.
    const TAPS: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];
    let clamp = |v: isize, hi: usize| v.clamp(0, hi as isize - 1) as usize;
    let mut tmp = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, t) in TAPS.iter().enumerate() {
                let xx = clamp(x as isize + k as isize - 2, w);
                acc += t * lum[y * w + xx];
            }
            tmp[y * w + x] = acc;
        }
    }
    let mut smooth = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, t) in TAPS.iter().enumerate() {
                let yy = clamp(y as isize + k as isize - 2, h);
                acc += t * tmp[yy * w + x];
            }
            smooth[y * w + x] = acc;
        }
    }

    let mut votes = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let c = smooth[y * w + x];
            let l = smooth[y * w + clamp(x as isize - 1, w)];
            let r = smooth[y * w + clamp(x as isize + 1, w)];
            let u = smooth[clamp(y as isize - 1, h) * w + x];
            let d = smooth[clamp(y as isize + 1, h) * w + x];
            votes[y * w + x] = (4.0 * c - l - r - u - d).abs();
        }
    }
    votes
}

fn within_limits(color: &[Real; 3], opts: &SamplerOptions) -> bool {
    color
        .iter()
        .all(|c| *c >= opts.min_intensity && *c <= opts.max_intensity)
}

fn normalized_rgb(raster: &Raster, x: usize, y: usize) -> [Real; 3] {
    let max = raster.pixel_type().max_value();
    let rgb = raster.rgb(x, y);
    [
        rgb[0] as Real / max,
        rgb[1] as Real / max,
        rgb[2] as Real / max,
    ]
}

fn normalized_bilinear(raster: &Raster, p: Pt2) -> [Real; 3] {
    let max = raster.pixel_type().max_value();
    let rgb = raster.bilinear(p.x, p.y);
    [
        rgb[0] as Real / max,
        rgb[1] as Real / max,
        rgb[2] as Real / max,
    ]
}

/// Evaluate one candidate source pixel against every later image, pushing
/// accepted pairs into the radius histogram.
#[allow(clippy::too_many_arguments)]
fn consider_candidate(
    pano: &Panorama,
    rasters: &[Raster],
    votes: &[Vec<f32>],
    transforms: &[ImageTransform],
    opts: &SamplerOptions,
    i: usize,
    x: usize,
    y: usize,
    histogram: &mut Histogram,
) {
    let color1 = normalized_rgb(&rasters[i], x, y);
    if !within_limits(&color1, opts) {
        return;
    }
    let img = pano.image(i);
    let (cx, cy) = (img.width as Real / 2.0, img.height as Real / 2.0);
    let half_diag = (cx * cx + cy * cy).sqrt();
    let p1 = Pt2::new(x as Real, y as Real);

    for j in (i + 1)..pano.num_images() {
        if !pano.image(j).active {
            continue;
        }
        let Some(p2) = transforms[i].image_to_other(&transforms[j], p1) else {
            continue;
        };
        let color2 = normalized_bilinear(&rasters[j], p2);
        if !within_limits(&color2, opts) {
            continue;
        }

        let r1 = ((p1.x - cx).powi(2) + (p1.y - cy).powi(2)).sqrt() / half_diag;
        let bin = ((r1 * RADIUS_BINS as Real) as usize).min(RADIUS_BINS - 1);

        let vote1 = votes[i][y * rasters[i].width() + x];
        let jx = (p2.x.round() as usize).min(rasters[j].width() - 1);
        let jy = (p2.y.round() as usize).min(rasters[j].height() - 1);
        let vote2 = votes[j][jy * rasters[j].width() + jx];

        histogram[bin].push((
            vote1 + vote2,
            PointPair {
                image1: i,
                pos1: p1,
                color1,
                image2: j,
                pos2: p2,
                color2,
            },
        ));
    }
}

#[allow(clippy::too_many_arguments)]
fn generate_grid(
    pano: &Panorama,
    rasters: &[Raster],
    votes: &[Vec<f32>],
    transforms: &[ImageTransform],
    opts: &SamplerOptions,
    step: usize,
    progress: &dyn ProgressSink,
    cancelled: &AtomicBool,
) -> Histogram {
    // Shared-nothing per-image histograms, merged after the join barrier.
    let per_image: Vec<Histogram> = (0..pano.num_images())
        .into_par_iter()
        .map(|i| {
            let mut hist: Histogram = vec![Vec::new(); RADIUS_BINS];
            if !pano.image(i).active {
                return hist;
            }
            let (w, h) = (rasters[i].width(), rasters[i].height());
            for y in (0..h).step_by(step) {
                if cancelled.load(Ordering::Relaxed) {
                    break;
                }
                if !progress.report(y as f64 / h as f64, "scanning overlap points") {
                    cancelled.store(true, Ordering::Relaxed);
                    break;
                }
                for x in (0..w).step_by(step) {
                    consider_candidate(
                        pano, rasters, votes, transforms, opts, i, x, y, &mut hist,
                    );
                }
            }
            hist
        })
        .collect();

    merge_histograms(per_image)
}

#[allow(clippy::too_many_arguments)]
fn generate_random(
    pano: &Panorama,
    rasters: &[Raster],
    votes: &[Vec<f32>],
    transforms: &[ImageTransform],
    opts: &SamplerOptions,
    seed: u64,
    progress: &dyn ProgressSink,
    cancelled: &AtomicBool,
) -> Histogram {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut hist: Histogram = vec![Vec::new(); RADIUS_BINS];
    let draws = opts.num_points * OVERSAMPLE;
    for k in 0..draws {
        if k % 64 == 0 && !progress.report(k as f64 / draws as f64, "sampling random points") {
            cancelled.store(true, Ordering::Relaxed);
            return hist;
        }
        let i = rng.gen_range(0..pano.num_images());
        if !pano.image(i).active {
            continue;
        }
        let x = rng.gen_range(0..rasters[i].width());
        let y = rng.gen_range(0..rasters[i].height());
        consider_candidate(pano, rasters, votes, transforms, opts, i, x, y, &mut hist);
    }
    hist
}

fn merge_histograms(per_image: Vec<Histogram>) -> Histogram {
    let mut merged: Histogram = vec![Vec::new(); RADIUS_BINS];
    for hist in per_image {
        for (bin, mut candidates) in hist.into_iter().enumerate() {
            merged[bin].append(&mut candidates);
        }
    }
    merged
}

/// Round-robin across radius bins, flattest candidates first, so the draw
/// is approximately radius-uniform instead of center-biased.
fn draw_radius_uniform(mut histogram: Histogram, count: usize) -> Vec<PointPair> {
    for bin in histogram.iter_mut() {
        bin.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    let mut pairs = Vec::with_capacity(count);
    let mut cursor = vec![0usize; histogram.len()];
    'outer: loop {
        let mut advanced = false;
        for (bin, cur) in histogram.iter().zip(cursor.iter_mut()) {
            if *cur < bin.len() {
                pairs.push(bin[*cur].1.clone());
                *cur += 1;
                advanced = true;
                if pairs.len() >= count {
                    break 'outer;
                }
            }
        }
        if !advanced {
            break;
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pano_core::{NoProgress, PanoOptions, PixelType, SrcImage};

    /// Two half-overlapping images of a smooth gradient scene.
    fn gradient_scene() -> (Panorama, Vec<Raster>) {
        let mut pano = Panorama::new(PanoOptions::default());
        let mut a = SrcImage::new(64, 64);
        a.hfov = 40.0;
        let mut b = a.clone();
        b.yaw = 20.0; // half-frame overlap
        pano.add_image(a);
        pano.add_image(b);

        let mut rasters = Vec::new();
        for _ in 0..2 {
            let mut r = Raster::new(64, 64, 3, PixelType::UInt8);
            for y in 0..64 {
                for x in 0..64 {
                    let v = 40.0 + (x + y) as f32;
                    r.set_rgb(x, y, [v, v, v]);
                }
            }
            rasters.push(r);
        }
        (pano, rasters)
    }

    #[test]
    fn grid_sampler_finds_overlap_pairs() {
        let (pano, rasters) = gradient_scene();
        let result = sample_point_pairs(
            &pano,
            &rasters,
            SamplingPolicy::AllPoints { step: 2 },
            &SamplerOptions {
                num_points: 50,
                ..Default::default()
            },
            &NoProgress,
        )
        .unwrap();
        assert!(!result.cancelled);
        assert!(!result.pairs.is_empty(), "no overlap pairs found");
        assert!(result.pairs.len() <= 50);
        for pair in &result.pairs {
            assert!(pair.image1 < 2 && pair.image2 < 2);
            assert!(within_limits(&pair.color1, &SamplerOptions::default()));
        }
    }

    #[test]
    fn random_sampler_is_reproducible() {
        let (pano, rasters) = gradient_scene();
        let opts = SamplerOptions {
            num_points: 20,
            ..Default::default()
        };
        let a = sample_point_pairs(
            &pano,
            &rasters,
            SamplingPolicy::RandomPoints { seed: 7 },
            &opts,
            &NoProgress,
        )
        .unwrap();
        let b = sample_point_pairs(
            &pano,
            &rasters,
            SamplingPolicy::RandomPoints { seed: 7 },
            &opts,
            &NoProgress,
        )
        .unwrap();
        assert_eq!(a.pairs.len(), b.pairs.len());
        for (pa, pb) in a.pairs.iter().zip(b.pairs.iter()) {
            assert_eq!(pa.pos1, pb.pos1);
        }
    }

    #[test]
    fn intensity_limits_reject_extremes() {
        let (pano, mut rasters) = gradient_scene();
        // Saturate one image; every pair through it must be rejected.
        for y in 0..64 {
            for x in 0..64 {
                rasters[1].set_rgb(x, y, [255.0, 255.0, 255.0]);
            }
        }
        let result = sample_point_pairs(
            &pano,
            &rasters,
            SamplingPolicy::AllPoints { step: 2 },
            &SamplerOptions::default(),
            &NoProgress,
        )
        .unwrap();
        assert!(result.pairs.is_empty());
    }

    #[test]
    fn cancellation_returns_promptly() {
        let (pano, rasters) = gradient_scene();
        let sink = pano_core::CancelAfter::new(0);
        let result = sample_point_pairs(
            &pano,
            &rasters,
            SamplingPolicy::AllPoints { step: 1 },
            &SamplerOptions::default(),
            &sink,
        )
        .unwrap();
        assert!(result.cancelled);
        assert!(result.pairs.is_empty());
    }

    #[test]
    fn coordinates_are_rescaled_to_original_resolution() {
        let (mut pano, rasters) = gradient_scene();
        // Logical size is 2x the loaded raster.
        pano.image_mut(0).width = 128;
        pano.image_mut(0).height = 128;
        pano.image_mut(1).width = 128;
        pano.image_mut(1).height = 128;
        let result = sample_point_pairs(
            &pano,
            &rasters,
            SamplingPolicy::AllPoints { step: 2 },
            &SamplerOptions {
                num_points: 10,
                ..Default::default()
            },
            &NoProgress,
        )
        .unwrap();
        assert!(!result.pairs.is_empty());
        // Working coords are < 64; rescaled ones may exceed that.
        assert!(result
            .pairs
            .iter()
            .any(|p| p.pos1.x > 63.0 || p.pos1.y > 63.0 || p.pos2.x > 63.0));
    }

    #[test]
    fn policy_and_options_roundtrip_through_json() {
        let json = serde_json::to_string(&SamplingPolicy::RandomPoints { seed: 42 }).unwrap();
        assert!(json.contains("random_points"), "{json}");
        let back: SamplingPolicy = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, SamplingPolicy::RandomPoints { seed: 42 }));

        let opts = SamplerOptions {
            num_points: 500,
            ..Default::default()
        };
        let back: SamplerOptions =
            serde_json::from_str(&serde_json::to_string(&opts).unwrap()).unwrap();
        assert_eq!(back.num_points, 500);
        assert_eq!(back.min_intensity, opts.min_intensity);
    }
}
