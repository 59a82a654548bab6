//! Seam boundary extraction from a grown label map.
//!
//! The gradient blend averages the two images' gradients only across the
//! seam itself. Short, isolated seam fragments come from mask noise and are
//! dropped before blending.

use crate::labels::{LABEL_BOUNDARY, LABEL_IMAGE1, LABEL_IMAGE2};

/// Seam segments shorter than this many pixels are discarded.
pub const MIN_SEAM_SEGMENT: usize = 8;

/// Signed seam map: `+1` on the patch side of the seam, `-1` on the canvas
/// side, `0` elsewhere.
///
/// A patch-side pixel is on the seam when a 4-neighbor belongs to the canvas
/// side; watershed boundary pixels count as canvas side. Connected segments
/// (8-connected, both signs together) shorter than [`MIN_SEAM_SEGMENT`] are
/// cleared.
pub fn seam_map(labels: &[u8], width: usize, height: usize) -> Vec<i8> {
    let mut seam = vec![0i8; width * height];
    let canvas_side = |l: u8| l == LABEL_IMAGE1 || l == LABEL_BOUNDARY;

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let l = labels[i];
            let mut near_canvas = false;
            let mut near_patch = false;
            for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
                    continue;
                }
                let nl = labels[ny as usize * width + nx as usize];
                near_canvas |= canvas_side(nl);
                near_patch |= nl == LABEL_IMAGE2;
            }
            if l == LABEL_IMAGE2 && near_canvas {
                seam[i] = 1;
            } else if canvas_side(l) && near_patch {
                seam[i] = -1;
            }
        }
    }

    drop_short_segments(&mut seam, width, height);
    seam
}

/// Flood-fill connected seam components and clear the short ones.
fn drop_short_segments(seam: &mut [i8], width: usize, height: usize) {
    let mut visited = vec![false; seam.len()];
    let mut component = Vec::new();
    let mut stack = Vec::new();

    for start in 0..seam.len() {
        if seam[start] == 0 || visited[start] {
            continue;
        }
        component.clear();
        stack.push(start);
        visited[start] = true;
        while let Some(i) = stack.pop() {
            component.push(i);
            let (x, y) = (i % width, i / width);
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
                        continue;
                    }
                    let ni = ny as usize * width + nx as usize;
                    if seam[ni] != 0 && !visited[ni] {
                        visited[ni] = true;
                        stack.push(ni);
                    }
                }
            }
        }
        if component.len() < MIN_SEAM_SEGMENT {
            for &i in &component {
                seam[i] = 0;
            }
        }
    }
}
