//! Seed label maps built from the two validity masks.

use pano_core::{Mask, Rect};

/// Neither image covers the pixel.
pub const LABEL_NONE: u8 = 0;
/// Only the canvas image covers the pixel.
pub const LABEL_IMAGE1: u8 = 1;
/// Only the incoming patch covers the pixel.
pub const LABEL_IMAGE2: u8 = 2;
/// Both images cover the pixel; ownership is decided by the watershed.
pub const LABEL_BOTH: u8 = 3;
/// Watershed boundary where the two fronts met.
pub const LABEL_BOUNDARY: u8 = 255;

/// Per-pixel ownership labels over the merge canvas.
#[derive(Debug, Clone)]
pub struct LabelMap {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl LabelMap {
    /// Combine the canvas mask with the patch mask placed at `offset`.
    ///
    /// Bit 0 is canvas coverage, bit 1 is patch coverage, giving the four
    /// seed labels directly.
    pub fn from_masks(mask1: &Mask, mask2: &Mask, offset: (i64, i64)) -> Self {
        let (width, height) = (mask1.width(), mask1.height());
        let mut data = vec![LABEL_NONE; width * height];
        for y in 0..height {
            for x in 0..width {
                let mut label = u8::from(mask1.is_set(x, y));
                let px = x as i64 - offset.0;
                let py = y as i64 - offset.1;
                if px >= 0
                    && py >= 0
                    && (px as usize) < mask2.width()
                    && (py as usize) < mask2.height()
                    && mask2.is_set(px as usize, py as usize)
                {
                    label |= 2;
                }
                data[y * width + x] = label;
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Bounding rectangle of all pixels matching `label` exactly.
    pub fn bounding_rect(&self, label: u8) -> Rect {
        let mut rect = Rect::default();
        let mut found = false;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) != label {
                    continue;
                }
                let (xi, yi) = (x as i64, y as i64);
                if !found {
                    rect = Rect::new(xi, yi, xi + 1, yi + 1);
                    found = true;
                } else {
                    rect.left = rect.left.min(xi);
                    rect.top = rect.top.min(yi);
                    rect.right = rect.right.max(xi + 1);
                    rect.bottom = rect.bottom.max(yi + 1);
                }
            }
        }
        rect
    }

    /// Whether any pixel carries `label` exactly.
    pub fn contains_label(&self, label: u8) -> bool {
        self.data.iter().any(|v| *v == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_labels_partition_coverage() {
        // Canvas 4x2 fully valid, patch 2x2 at (3, 0): one overlap column.
        let mask1 = Mask::full(4, 2);
        let mask2 = Mask::full(2, 2);
        let labels = LabelMap::from_masks(&mask1, &mask2, (3, 0));
        assert_eq!(labels.get(0, 0), LABEL_IMAGE1);
        assert_eq!(labels.get(3, 0), LABEL_BOTH);
        assert_eq!(labels.get(3, 1), LABEL_BOTH);
        // The patch extends past the canvas; the off-canvas column is lost.
        assert_eq!(labels.width(), 4);
    }

    #[test]
    fn bounding_rect_of_overlap() {
        let mask1 = Mask::full(6, 3);
        let mask2 = Mask::full(3, 3);
        let labels = LabelMap::from_masks(&mask1, &mask2, (2, 0));
        let overlap = labels.bounding_rect(LABEL_BOTH);
        assert_eq!(overlap, Rect::new(2, 0, 5, 3));
        assert!(!labels.contains_label(LABEL_IMAGE2));
        assert!(labels.bounding_rect(LABEL_IMAGE2).is_empty());
    }
}
