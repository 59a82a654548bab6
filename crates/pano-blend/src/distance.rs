//! Color-distance map over the overlap region.
//!
//! The watershed grows along low-distance pixels, so the seam settles where
//! the two images agree best. Distances are normalized to 0..255 and lightly
//! smoothed so single-pixel noise does not zig-zag the seam.

use pano_core::{Raster, Real, Rect};
use rayon::prelude::*;

/// Per-pixel difference between the canvas and the patch over `region`
/// (canvas coordinates), normalized to 0..255.
///
/// RGB rasters use the Euclidean channel distance, grayscale the absolute
/// difference. The normalization divisor is capped at 25% of the pixel
/// type's range (values above it saturate at 255) so a few extreme outlier
/// pixels cannot flatten the rest of the map's dynamic range. Pixels where
/// the patch has no data get distance 0; they are never contested.
pub fn color_distance_map(
    canvas: &Raster,
    patch: &Raster,
    offset: (i64, i64),
    region: Rect,
    wrap: bool,
) -> Vec<f32> {
    let (w, h) = (region.width() as usize, region.height() as usize);
    let mut map = vec![0.0f32; w * h];
    let mut max_dist = 0.0f64;
    for y in 0..h {
        let cy = region.top as usize + y;
        for x in 0..w {
            let cx = region.left as usize + x;
            let px = cx as i64 - offset.0;
            let py = cy as i64 - offset.1;
            if px < 0
                || py < 0
                || px as usize >= patch.width()
                || py as usize >= patch.height()
            {
                continue;
            }
            let d = if canvas.channels() == 3 {
                let a = canvas.rgb(cx, cy);
                let b = patch.rgb(px as usize, py as usize);
                let mut sq = 0.0f64;
                for c in 0..3 {
                    let e = a[c] as f64 - b[c] as f64;
                    sq += e * e;
                }
                sq.sqrt()
            } else {
                (canvas.get(cx, cy, 0) as f64 - patch.get(px as usize, py as usize, 0) as f64)
                    .abs()
            };
            max_dist = max_dist.max(d);
            map[y * w + x] = d as f32;
        }
    }

    let cap = 0.25 * canvas.pixel_type().max_value();
    if max_dist > 0.0 {
        let scale = 255.0 / max_dist.min(cap);
        for v in map.iter_mut() {
            *v = (*v as f64 * scale).min(255.0) as f32;
        }
    }

    let radius = (w.max(h) / 1000).max(1);
    if 2 * radius + 1 <= w.min(h) {
        gaussian_smooth(&mut map, w, h, radius, wrap);
    }
    map
}

/// Separable Gaussian with a truncated kernel of the given radius.
fn gaussian_smooth(map: &mut [f32], w: usize, h: usize, radius: usize, wrap: bool) {
    let sigma = (radius as Real / 2.0).max(0.5);
    let mut kernel = Vec::with_capacity(2 * radius + 1);
    for k in 0..=2 * radius {
        let d = k as Real - radius as Real;
        kernel.push((-d * d / (2.0 * sigma * sigma)).exp() as f32);
    }
    let sum: f32 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }

    let index_x = |x: isize| -> usize {
        if wrap {
            x.rem_euclid(w as isize) as usize
        } else {
            x.clamp(0, w as isize - 1) as usize
        }
    };

    // Horizontal pass, row-parallel.
    let src = map.to_vec();
    map.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, kv) in kernel.iter().enumerate() {
                let xx = index_x(x as isize + k as isize - radius as isize);
                acc += kv * src[y * w + xx];
            }
            *out = acc;
        }
    });

    // Vertical pass; rows of the output depend only on the intermediate.
    let src = map.to_vec();
    map.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, kv) in kernel.iter().enumerate() {
                let yy = (y as isize + k as isize - radius as isize).clamp(0, h as isize - 1)
                    as usize;
                acc += kv * src[yy * w + x];
            }
            *out = acc;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pano_core::PixelType;

    #[test]
    fn identical_images_have_zero_distance() {
        let mut a = Raster::new(8, 8, 3, PixelType::UInt8);
        for y in 0..8 {
            for x in 0..8 {
                a.set_rgb(x, y, [10.0 * x as f32, 5.0, 0.0]);
            }
        }
        let map = color_distance_map(&a, &a.clone(), (0, 0), Rect::new(0, 0, 8, 8), false);
        assert!(map.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn one_outlier_does_not_flatten_the_map() {
        // Uniform difference of 20 on u8 data plus a single 255 outlier in
        // the corner. The capped divisor keeps the common pixels around
        // 20 / 63.75 * 255 = 80 instead of squashing them toward 20.
        let a = Raster::new(8, 8, 1, PixelType::UInt8);
        let mut b = Raster::new(8, 8, 1, PixelType::UInt8);
        for y in 0..8 {
            for x in 0..8 {
                b.set(x, y, 0, 20.0);
            }
        }
        b.set(0, 0, 0, 255.0);
        let map = color_distance_map(&a, &b, (0, 0), Rect::new(0, 0, 8, 8), false);
        assert!((map[4 * 8 + 4] - 80.0).abs() < 0.5, "got {}", map[4 * 8 + 4]);
        // The outlier itself saturates (modulo smoothing).
        assert!(map[0] > 200.0, "got {}", map[0]);
    }

    #[test]
    fn out_of_patch_pixels_get_zero() {
        let a = Raster::new(8, 8, 1, PixelType::UInt8);
        let mut b = Raster::new(4, 8, 1, PixelType::UInt8);
        for y in 0..8 {
            for x in 0..4 {
                b.set(x, y, 0, 200.0);
            }
        }
        let map = color_distance_map(&a, &b, (0, 0), Rect::new(0, 0, 8, 8), false);
        // Columns 4.. have no patch data.
        for y in 0..8usize {
            assert_eq!(map[y * 8 + 7], 0.0);
        }
        assert!(map[0] > 0.0);
    }
}
