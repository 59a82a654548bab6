//! Link-group folding between panorama variables and the flat parameter
//! vector.
//!
//! Each optimized entry is one `(variable, representative image)` pair where
//! the representative is the lowest index in the variable's link group.
//! Reading takes the representative's value; writing propagates the value to
//! every group member, so linked images never diverge.

use nalgebra::DVector;
use pano_core::{Panorama, Real, VarSet, Variable};

/// Flat parameter layout after link folding.
#[derive(Debug, Clone)]
pub struct VarMapping {
    specs: Vec<(Variable, usize)>,
}

impl VarMapping {
    /// Fold a photometric variable set over all images.
    ///
    /// Exposure and white-balance entries whose link group contains the
    /// panorama's color reference image are excluded: the reference anchors
    /// the photometric gauge, otherwise a global gain shift would leave the
    /// residuals unchanged.
    pub fn photometric(pano: &Panorama, vars: &VarSet) -> Self {
        let n = pano.num_images();
        let anchor = pano.options.color_ref_image;
        let mut specs = Vec::new();
        for var in vars.iter().copied().filter(|v| v.is_photometric()) {
            let repr = pano.links.representatives(var, n);
            let mut seen = vec![false; n];
            for img in 0..n {
                let r = repr[img];
                if seen[r] {
                    continue;
                }
                seen[r] = true;
                if var.is_exposure() && anchor < n && repr[anchor] == r {
                    continue;
                }
                specs.push((var, r));
            }
        }
        Self { specs }
    }

    /// Fold per-image variable requests (geometric optimization).
    ///
    /// An entry is created once per link group that contains at least one
    /// requesting image.
    pub fn per_image(pano: &Panorama, sets: &[VarSet]) -> Self {
        let n = pano.num_images();
        debug_assert_eq!(sets.len(), n);
        let mut specs = Vec::new();
        for var in Variable::ALL {
            let repr = pano.links.representatives(var, n);
            let mut seen = vec![false; n];
            for img in 0..n {
                if !sets[img].contains(&var) {
                    continue;
                }
                let r = repr[img];
                if !seen[r] {
                    seen[r] = true;
                    specs.push((var, r));
                }
            }
        }
        Self { specs }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn specs(&self) -> &[(Variable, usize)] {
        &self.specs
    }

    /// Read the parameter vector from the panorama.
    pub fn to_x(&self, pano: &Panorama) -> DVector<Real> {
        DVector::from_iterator(
            self.specs.len(),
            self.specs.iter().map(|(var, img)| pano.image(*img).var(*var)),
        )
    }

    /// Write the parameter vector back, propagating across link groups.
    pub fn from_x(&self, pano: &mut Panorama, x: &DVector<Real>) {
        debug_assert_eq!(x.len(), self.specs.len());
        for ((var, img), value) in self.specs.iter().zip(x.iter()) {
            pano.set_linked_var(*img, *var, *value);
        }
    }
}
