//! Two-image merge: seam placement plus hard copy or gradient blend.

use crate::distance::color_distance_map;
use crate::labels::{LabelMap, LABEL_BOTH, LABEL_IMAGE1, LABEL_IMAGE2};
use crate::poisson::{self, PoissonGrid, POISSON_MAX_CYCLES, POISSON_TOLERANCE};
use crate::seam::seam_map;
use crate::watershed::{grow_regions, grow_regions_wrapped};
use anyhow::{ensure, Result};
use log::{debug, info};
use pano_core::{Mask, Raster, Rect};
use serde::{Deserialize, Serialize};

/// Options for one merge operation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Treat the canvas as horizontally periodic (360° panoramas).
    pub wrap: bool,
    /// Copy patch pixels across the seam instead of gradient blending.
    pub hard_seam: bool,
}

/// Merge `image2`/`mask2` into `image1`/`mask1` at `offset`.
///
/// The canvas grows when the patch extends past it. The seam is placed by
/// seeded region growing over the color-distance map of the overlap; the
/// patch side of the seam is then either copied verbatim (`hard_seam`) or
/// blended in the gradient domain through a Poisson solve. `mask2` is OR-ed
/// into `mask1` at the end.
pub fn merge_images(
    image1: &mut Raster,
    mask1: &mut Mask,
    image2: &Raster,
    mask2: &Mask,
    offset: (i64, i64),
    opts: &MergeOptions,
) -> Result<()> {
    ensure!(
        image1.channels() == image2.channels(),
        "channel counts differ ({} != {})",
        image1.channels(),
        image2.channels()
    );
    ensure!(
        mask1.width() == image1.width() && mask1.height() == image1.height(),
        "canvas mask size does not match the canvas"
    );
    ensure!(
        mask2.width() == image2.width() && mask2.height() == image2.height(),
        "patch mask size does not match the patch"
    );

    // Grow the canvas so the patch fits entirely.
    let left = offset.0.min(0);
    let top = offset.1.min(0);
    let right = (image1.width() as i64).max(offset.0 + image2.width() as i64);
    let bottom = (image1.height() as i64).max(offset.1 + image2.height() as i64);
    let (new_w, new_h) = ((right - left) as usize, (bottom - top) as usize);
    let offset = (offset.0 - left, offset.1 - top);
    if new_w != image1.width() || new_h != image1.height() {
        debug!("growing canvas to {new_w}x{new_h}");
        image1.grow(new_w, new_h, (-left) as usize, (-top) as usize);
        mask1.grow(new_w, new_h, (-left) as usize, (-top) as usize);
    }

    let mut labels = LabelMap::from_masks(mask1, mask2, offset);
    let overlap = labels.bounding_rect(LABEL_BOTH);

    if overlap.is_empty() {
        debug!("no overlap, copying patch verbatim");
        copy_patch(image1, image2, mask2, offset, &labels, |_, _, _| true);
        mask1.or_at(mask2, offset.0, offset.1);
        return Ok(());
    }
    if !labels.contains_label(LABEL_IMAGE2) {
        debug!("patch adds no coverage, keeping existing pixels");
        mask1.or_at(mask2, offset.0, offset.1);
        return Ok(());
    }
    if !labels.contains_label(LABEL_IMAGE1) {
        debug!("patch covers the whole canvas, copying verbatim");
        copy_patch(image1, image2, mask2, offset, &labels, |_, _, _| true);
        mask1.or_at(mask2, offset.0, offset.1);
        return Ok(());
    }

    let canvas_rect = Rect::new(0, 0, new_w as i64, new_h as i64);
    let region = overlap.padded(1).intersect(&canvas_rect);
    let (rw, rh) = (region.width() as usize, region.height() as usize);
    let wrap_active = opts.wrap && rw == new_w;

    let dist = color_distance_map(image1, image2, offset, region, wrap_active);

    let mut local = vec![0u8; rw * rh];
    for y in 0..rh {
        for x in 0..rw {
            local[y * rw + x] =
                labels.get(region.left as usize + x, region.top as usize + y);
        }
    }
    if wrap_active {
        grow_regions_wrapped(&mut local, &dist, rw, rh);
    } else {
        grow_regions(&mut local, &dist, rw, rh);
    }
    for y in 0..rh {
        for x in 0..rw {
            labels.set(
                region.left as usize + x,
                region.top as usize + y,
                local[y * rw + x],
            );
        }
    }

    if opts.hard_seam {
        info!("merging with a hard seam over {rw}x{rh} overlap");
        copy_patch(image1, image2, mask2, offset, &labels, |_, _, label| {
            label == LABEL_IMAGE2
        });
    } else {
        info!("gradient-blending over {rw}x{rh} overlap");
        // Pixels the patch brings in outside the old coverage come verbatim.
        copy_patch(image1, image2, mask2, offset, &labels, |cx, cy, label| {
            label == LABEL_IMAGE2 && !mask1.is_set(cx, cy)
        });
        blend_gradient(image1, mask1, image2, offset, &labels, region, wrap_active);
    }

    mask1.or_at(mask2, offset.0, offset.1);
    Ok(())
}

/// Copy patch pixels into the canvas wherever the predicate accepts the
/// (canvas x, canvas y, label) triple; only `mask2`-valid pixels qualify.
fn copy_patch(
    image1: &mut Raster,
    image2: &Raster,
    mask2: &Mask,
    offset: (i64, i64),
    labels: &LabelMap,
    pred: impl Fn(usize, usize, u8) -> bool,
) {
    for py in 0..image2.height() {
        for px in 0..image2.width() {
            if !mask2.is_set(px, py) {
                continue;
            }
            let cx = px as i64 + offset.0;
            let cy = py as i64 + offset.1;
            if cx < 0 || cy < 0 || cx as usize >= image1.width() || cy as usize >= image1.height()
            {
                continue;
            }
            let (cx, cy) = (cx as usize, cy as usize);
            if pred(cx, cy, labels.get(cx, cy)) {
                image1.copy_pixel(cx, cy, image2, px, py);
            }
        }
    }
}

/// Poisson-blend the contested pixels the patch won.
///
/// The gradient target is the patch's own gradient inside its region and
/// the average of both images' gradients across kept seam segments, so
/// low-frequency exposure differences spread out instead of forming a
/// visible edge.
fn blend_gradient(
    image1: &mut Raster,
    mask1: &Mask,
    image2: &Raster,
    offset: (i64, i64),
    labels: &LabelMap,
    region: Rect,
    wrap: bool,
) {
    let (rw, rh) = (region.width() as usize, region.height() as usize);
    let mut local = vec![0u8; rw * rh];
    for y in 0..rh {
        for x in 0..rw {
            local[y * rw + x] =
                labels.get(region.left as usize + x, region.top as usize + y);
        }
    }
    let seam = seam_map(&local, rw, rh);

    let patch_val = |cx: usize, cy: usize, ch: usize| -> Option<f64> {
        let px = cx as i64 - offset.0;
        let py = cy as i64 - offset.1;
        if px >= 0 && py >= 0 && (px as usize) < image2.width() && (py as usize) < image2.height()
        {
            Some(image2.get(px as usize, py as usize, ch) as f64)
        } else {
            None
        }
    };

    // Unknowns: contested pixels the watershed gave to the patch.
    let is_unknown = |x: usize, y: usize| -> bool {
        let cx = region.left as usize + x;
        let cy = region.top as usize + y;
        local[y * rw + x] == LABEL_IMAGE2 && mask1.is_set(cx, cy)
    };

    let neighbors = |x: usize, y: usize| -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(4);
        for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
            let mut nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if wrap {
                nx = nx.rem_euclid(rw as i64);
            } else if nx < 0 || nx as usize >= rw {
                continue;
            }
            if ny < 0 || ny as usize >= rh {
                continue;
            }
            out.push((nx as usize, ny as usize));
        }
        out
    };

    for ch in 0..image1.channels() {
        let mut grid = PoissonGrid::new(rw, rh, wrap);
        for y in 0..rh {
            for x in 0..rw {
                let i = y * rw + x;
                let cx = region.left as usize + x;
                let cy = region.top as usize + y;
                if is_unknown(x, y) {
                    grid.fixed[i] = false;
                    // Seeded with the patch's own values.
                    grid.values[i] =
                        patch_val(cx, cy, ch).unwrap_or(image1.get(cx, cy, ch) as f64);
                } else if mask1.is_set(cx, cy) {
                    grid.values[i] = image1.get(cx, cy, ch) as f64;
                } else {
                    grid.values[i] =
                        patch_val(cx, cy, ch).unwrap_or(image1.get(cx, cy, ch) as f64);
                }
            }
        }

        for y in 0..rh {
            for x in 0..rw {
                let i = y * rw + x;
                if grid.fixed[i] {
                    continue;
                }
                let cx = region.left as usize + x;
                let cy = region.top as usize + y;
                let p2 = patch_val(cx, cy, ch);
                let p1 = image1.get(cx, cy, ch) as f64;
                let mut rhs = 0.0;
                for (nx, ny) in neighbors(x, y) {
                    let ncx = region.left as usize + nx;
                    let ncy = region.top as usize + ny;
                    let q2 = patch_val(ncx, ncy, ch);
                    let q1 = image1.get(ncx, ncy, ch) as f64;
                    let g2 = match (p2, q2) {
                        (Some(a), Some(b)) => Some(b - a),
                        _ => None,
                    };
                    let g1 = q1 - p1;
                    let ni = ny * rw + nx;
                    let g = if seam[i] == 1 && seam[ni] == -1 {
                        // Across a kept seam segment both images get a say.
                        match g2 {
                            Some(g2) => 0.5 * (g2 + g1),
                            None => g1,
                        }
                    } else {
                        g2.unwrap_or(g1)
                    };
                    rhs -= g;
                }
                grid.rhs[i] = rhs;
            }
        }

        poisson::solve(&mut grid, POISSON_TOLERANCE, POISSON_MAX_CYCLES);

        for y in 0..rh {
            for x in 0..rw {
                if grid.fixed[y * rw + x] {
                    continue;
                }
                let cx = region.left as usize + x;
                let cy = region.top as usize + y;
                image1.set(cx, cy, ch, grid.values[y * rw + x] as f32);
            }
        }
    }
}
