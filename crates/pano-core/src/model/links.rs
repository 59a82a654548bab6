//! Variable link state.
//!
//! Linking a variable across images collapses it to a single degree of
//! freedom. Links are recorded pairwise and the equivalence classes are
//! recovered transitively, so group membership stays correct however the
//! caller orders its `link` calls.

use super::Variable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pairwise variable links with transitive group recovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VarLinks {
    /// Pairwise relations per variable, stored unordered.
    pairs: BTreeMap<Variable, Vec<(usize, usize)>>,
}

impl VarLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `var` is linked between images `a` and `b`.
    pub fn link(&mut self, a: usize, b: usize, var: Variable) {
        if a == b {
            return;
        }
        let pair = if a < b { (a, b) } else { (b, a) };
        let pairs = self.pairs.entry(var).or_default();
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
    }

    /// Remove a pairwise link. Transitive connectivity through other pairs
    /// is unaffected.
    pub fn unlink(&mut self, a: usize, b: usize, var: Variable) {
        let pair = if a < b { (a, b) } else { (b, a) };
        if let Some(pairs) = self.pairs.get_mut(&var) {
            pairs.retain(|p| *p != pair);
        }
    }

    /// Whether `a` and `b` share `var`, following links transitively.
    pub fn is_linked(&self, a: usize, b: usize, var: Variable, num_images: usize) -> bool {
        let repr = self.representatives(var, num_images);
        a < num_images && b < num_images && repr[a] == repr[b]
    }

    /// For each image, the lowest image index of its link group for `var`.
    ///
    /// Unlinked images are their own representative. Recomputed from the
    /// pairwise relations on every call, so stale caches cannot survive a
    /// link-state change.
    pub fn representatives(&self, var: Variable, num_images: usize) -> Vec<usize> {
        let mut parent: Vec<usize> = (0..num_images).collect();

        fn find(parent: &mut Vec<usize>, mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        if let Some(pairs) = self.pairs.get(&var) {
            for &(a, b) in pairs {
                if a < num_images && b < num_images {
                    let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                    if ra != rb {
                        // Union by value keeps the lowest index as root.
                        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
                        parent[hi] = lo;
                    }
                }
            }
        }

        (0..num_images).map(|i| find(&mut parent, i)).collect()
    }

    /// Link groups for `var` as sorted member lists, singletons included.
    pub fn groups(&self, var: Variable, num_images: usize) -> Vec<Vec<usize>> {
        let repr = self.representatives(var, num_images);
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (img, r) in repr.iter().enumerate() {
            groups.entry(*r).or_default().push(img);
        }
        groups.into_values().collect()
    }
}
