//! Statistical control-point cleaning.
//!
//! Both cleaners flag outliers by index and leave the panorama untouched;
//! the caller decides whether to remove the flagged points.

use anyhow::Result;
use log::{debug, info};
use pano_core::{
    cp_error_stats, var_set, CpMode, Panorama, ProgressSink, Pt2, Real, StatsFilter, VarSet,
    Variable,
};
use pano_optim::{optimize_geometric, SolveOptions};

/// Outlier threshold from error statistics.
///
/// With a heavy-tailed error distribution (stddev above the mean) the mean
/// alone separates outliers; otherwise allow `n` standard deviations.
fn outlier_limit(mean: Real, stddev: Real, n: Real) -> Real {
    if stddev > mean {
        mean
    } else {
        mean + n * stddev
    }
}

/// Flag outlier control points pair by pair.
///
/// For every unordered image pair that is not position-linked and shares
/// more than 3 Normal-mode control points, the pair is isolated into a
/// two-image sub-panorama, the second image's orientation is optimized
/// against the pair's own points, and points whose error exceeds the
/// statistical limit are flagged. Indices refer to the original
/// control-point list. A cancelled run returns the points flagged so far.
pub fn clean_control_points_pairwise(
    pano: &Panorama,
    n: Real,
    progress: &dyn ProgressSink,
) -> Result<Vec<usize>> {
    let num = pano.num_images();
    let mut pairs = Vec::new();
    for a in 0..num {
        for b in (a + 1)..num {
            if pano.position_linked(a, b) {
                continue;
            }
            if pano
                .control_points()
                .iter()
                .any(|cp| cp.mode == CpMode::Normal && cp.connects(a, b))
            {
                pairs.push((a, b));
            }
        }
    }

    let mut flagged = Vec::new();
    for (k, &(a, b)) in pairs.iter().enumerate() {
        if !progress.report(k as f64 / pairs.len() as f64, "cleaning control point pairs") {
            info!("pairwise cleaning cancelled after {k} pairs");
            return Ok(flagged);
        }

        let mut sub = pano.subset_pair(a, b, CpMode::Normal);
        if sub.control_points().len() <= 3 {
            debug!("pair ({a}, {b}): too few points, skipping");
            continue;
        }
        let sets = vec![
            VarSet::new(),
            var_set(&[Variable::Yaw, Variable::Pitch, Variable::Roll]),
        ];
        optimize_geometric(&mut sub, &sets, &SolveOptions::default())?;

        let stats = cp_error_stats(&sub, &StatsFilter::default());
        let limit = outlier_limit(stats.mean, stats.stddev(), n);

        // Sub points were extracted in original order; the i-th sub point is
        // the i-th original point connecting this pair in Normal mode.
        let original: Vec<usize> = pano
            .control_points()
            .iter()
            .enumerate()
            .filter(|(_, cp)| cp.mode == CpMode::Normal && cp.connects(a, b))
            .map(|(i, _)| i)
            .collect();
        for (sub_cp, orig_idx) in sub.control_points().iter().zip(original) {
            if sub_cp.error > limit {
                flagged.push(orig_idx);
            }
        }
    }

    flagged.sort_unstable();
    flagged.dedup();
    info!("pairwise cleaning flagged {} control points", flagged.len());
    Ok(flagged)
}

/// Flag outlier control points against global error statistics.
///
/// With `skip_optimization` the stored errors are used as-is; otherwise the
/// orientations of all images but the first are optimized on a scratch copy
/// first. Line control points only participate when `include_line_cps`.
pub fn clean_control_points_global(
    pano: &Panorama,
    n: Real,
    skip_optimization: bool,
    include_line_cps: bool,
) -> Result<Vec<usize>> {
    let mut work = pano.clone();
    if !skip_optimization {
        let sets: Vec<VarSet> = (0..work.num_images())
            .map(|i| {
                if i == 0 {
                    VarSet::new()
                } else {
                    var_set(&[Variable::Yaw, Variable::Pitch, Variable::Roll])
                }
            })
            .collect();
        optimize_geometric(&mut work, &sets, &SolveOptions::default())?;
    }

    let filter = StatsFilter {
        skip_line_cp: !include_line_cps,
        ..Default::default()
    };
    let stats = cp_error_stats(&work, &filter);
    if stats.n == 0 {
        return Ok(Vec::new());
    }
    let limit = outlier_limit(stats.mean, stats.stddev(), n);

    let flagged: Vec<usize> = work
        .control_points()
        .iter()
        .enumerate()
        .filter(|(_, cp)| {
            (include_line_cps || !cp.mode.is_line()) && cp.error > limit
        })
        .map(|(i, _)| i)
        .collect();
    info!(
        "global cleaning flagged {} of {} control points (limit {:.2})",
        flagged.len(),
        stats.n,
        limit
    );
    Ok(flagged)
}

/// Indices of control points with an endpoint inside a positive mask
/// polygon of its source image.
pub fn control_points_in_masks(pano: &Panorama) -> Vec<usize> {
    pano.control_points()
        .iter()
        .enumerate()
        .filter(|(_, cp)| {
            pano.image(cp.image1).in_masks(Pt2::new(cp.x1, cp.y1))
                || pano.image(cp.image2).in_masks(Pt2::new(cp.x2, cp.y2))
        })
        .map(|(i, _)| i)
        .collect()
}
