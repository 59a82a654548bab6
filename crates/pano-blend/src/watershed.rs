//! Seeded region growing over the color-distance map.
//!
//! The two coverage fronts (canvas and patch) grow into the contested
//! overlap in order of increasing color distance, so they meet along the
//! line where the images agree best. Equal distances pop in insertion
//! order, so equally matched fronts advance in lockstep and meet near the
//! middle of the overlap instead of one front racing through it.

use crate::labels::{LABEL_BOTH, LABEL_BOUNDARY, LABEL_IMAGE1, LABEL_IMAGE2};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(PartialEq)]
struct Front {
    dist: f32,
    seq: u64,
    y: u32,
    x: u32,
    label: u8,
}

impl Eq for Front {}

impl Ord for Front {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we pop the lowest distance.
        // The sequence number makes equal-priority pops FIFO.
        other
            .dist
            .total_cmp(&self.dist)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const NEIGHBORS: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Grow the seed labels into every contested (`LABEL_BOTH`) pixel.
///
/// On return each contested pixel carries `LABEL_IMAGE1`, `LABEL_IMAGE2`, or
/// `LABEL_BOUNDARY` where the two fronts met. `LABEL_NONE` pixels are
/// off-limits and never claimed. Contested pixels unreachable from either
/// front fall back to `LABEL_IMAGE1` (keep the existing canvas).
pub fn grow_regions(labels: &mut [u8], dist: &[f32], width: usize, height: usize) {
    debug_assert_eq!(labels.len(), width * height);
    debug_assert_eq!(dist.len(), width * height);

    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let label = labels[i];
            if label != LABEL_IMAGE1 && label != LABEL_IMAGE2 {
                continue;
            }
            let contested_neighbor = NEIGHBORS.iter().any(|(dx, dy)| {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                nx >= 0
                    && ny >= 0
                    && (nx as usize) < width
                    && (ny as usize) < height
                    && labels[ny as usize * width + nx as usize] == LABEL_BOTH
            });
            if contested_neighbor {
                heap.push(Front {
                    dist: dist[i],
                    seq,
                    y: y as u32,
                    x: x as u32,
                    label,
                });
                seq += 1;
            }
        }
    }

    while let Some(front) = heap.pop() {
        let (x, y) = (front.x as usize, front.y as usize);
        for (dx, dy) in NEIGHBORS {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
                continue;
            }
            let ni = ny as usize * width + nx as usize;
            if labels[ni] != LABEL_BOTH {
                continue;
            }
            let opposing = NEIGHBORS.iter().any(|(ddx, ddy)| {
                let mx = nx + ddx;
                let my = ny + ddy;
                mx >= 0
                    && my >= 0
                    && (mx as usize) < width
                    && (my as usize) < height
                    && {
                        let l = labels[my as usize * width + mx as usize];
                        (l == LABEL_IMAGE1 || l == LABEL_IMAGE2) && l != front.label
                    }
            });
            if opposing {
                // Fronts met; boundary pixels do not seed further growth.
                labels[ni] = LABEL_BOUNDARY;
            } else {
                labels[ni] = front.label;
                heap.push(Front {
                    dist: dist[ni],
                    seq,
                    y: ny as u32,
                    x: nx as u32,
                    label: front.label,
                });
                seq += 1;
            }
        }
    }

    for label in labels.iter_mut() {
        if *label == LABEL_BOTH {
            *label = LABEL_IMAGE1;
        }
    }
}

/// Wraparound variant for overlaps spanning the full canvas width.
///
/// The buffers are duplicated side by side so the growth can cross the
/// horizontal wrap, then the central band (each pixel at least half a width
/// from a lateral edge) is folded back.
pub fn grow_regions_wrapped(labels: &mut [u8], dist: &[f32], width: usize, height: usize) {
    let w2 = width * 2;
    let mut labels2 = vec![0u8; w2 * height];
    let mut dist2 = vec![0.0f32; w2 * height];
    for y in 0..height {
        for x in 0..width {
            let v = labels[y * width + x];
            let d = dist[y * width + x];
            labels2[y * w2 + x] = v;
            labels2[y * w2 + x + width] = v;
            dist2[y * w2 + x] = d;
            dist2[y * w2 + x + width] = d;
        }
    }

    grow_regions(&mut labels2, &dist2, w2, height);

    let half = width / 2;
    for y in 0..height {
        for x in 0..width {
            let sx = x + if x < half { width } else { 0 };
            labels[y * width + x] = labels2[y * w2 + sx];
        }
    }
}
