//! Multigrid Poisson solver for gradient-domain blending.
//!
//! One scalar channel at a time: unknown pixels satisfy the discrete Poisson
//! equation against a prescribed gradient field, fixed pixels are Dirichlet
//! data. The solve coarsens the grid while it stays large enough, relaxes
//! the coarsest level to convergence, then prolongates and re-relaxes each
//! finer level (cascadic multigrid). All arithmetic is `f64`.

use log::debug;

/// Convergence threshold on the largest per-sweep update, in channel units
/// relative to an 8-bit range.
pub const POISSON_TOLERANCE: f64 = 0.01;
/// Upper bound on relaxation sweeps across all levels.
pub const POISSON_MAX_CYCLES: usize = 500;

/// Coarsening stops when either dimension would drop below this.
const MIN_LEVEL_DIM: usize = 16;

/// One rectangular solve domain.
///
/// `rhs[p]` is the negated divergence of the target gradient field at `p`
/// so a Gauss-Seidel update reads `u(p) = (Σ u(q) + rhs(p)) / deg(p)`.
/// Entries of `rhs` for fixed pixels are ignored.
#[derive(Debug, Clone)]
pub struct PoissonGrid {
    pub width: usize,
    pub height: usize,
    /// Horizontal neighbors wrap around when set.
    pub wrap: bool,
    pub fixed: Vec<bool>,
    pub values: Vec<f64>,
    pub rhs: Vec<f64>,
}

impl PoissonGrid {
    pub fn new(width: usize, height: usize, wrap: bool) -> Self {
        Self {
            width,
            height,
            wrap,
            fixed: vec![true; width * height],
            values: vec![0.0; width * height],
            rhs: vec![0.0; width * height],
        }
    }

    fn neighbors(&self, x: usize, y: usize) -> impl Iterator<Item = usize> + '_ {
        let (w, h, wrap) = (self.width, self.height, self.wrap);
        [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .filter_map(move |(dx, dy)| {
                let mut nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if wrap {
                    nx = nx.rem_euclid(w as i64);
                } else if nx < 0 || nx as usize >= w {
                    return None;
                }
                if ny < 0 || ny as usize >= h {
                    return None;
                }
                Some(ny as usize * w + nx as usize)
            })
    }

    /// One Gauss-Seidel sweep; returns the largest absolute update.
    fn relax(&mut self) -> f64 {
        let mut max_delta = 0.0f64;
        for y in 0..self.height {
            for x in 0..self.width {
                let i = y * self.width + x;
                if self.fixed[i] {
                    continue;
                }
                let mut sum = 0.0;
                let mut deg = 0.0;
                for n in self.neighbors(x, y).collect::<Vec<_>>() {
                    sum += self.values[n];
                    deg += 1.0;
                }
                if deg == 0.0 {
                    continue;
                }
                let next = (sum + self.rhs[i]) / deg;
                max_delta = max_delta.max((next - self.values[i]).abs());
                self.values[i] = next;
            }
        }
        max_delta
    }

    /// Half-resolution grid; a coarse pixel is unknown only when all of its
    /// fine pixels are, so Dirichlet data is never smeared away.
    fn coarsen(&self) -> PoissonGrid {
        let cw = (self.width + 1) / 2;
        let ch = (self.height + 1) / 2;
        let mut coarse = PoissonGrid::new(cw, ch, self.wrap);
        for cy in 0..ch {
            for cx in 0..cw {
                let ci = cy * cw + cx;
                let mut value = 0.0;
                let mut rhs = 0.0;
                let mut count = 0.0f64;
                let mut all_free = true;
                for sy in 0..2 {
                    for sx in 0..2 {
                        let fx = 2 * cx + sx;
                        let fy = 2 * cy + sy;
                        if fx >= self.width || fy >= self.height {
                            continue;
                        }
                        let fi = fy * self.width + fx;
                        value += self.values[fi];
                        rhs += self.rhs[fi];
                        count += 1.0;
                        all_free &= !self.fixed[fi];
                    }
                }
                coarse.values[ci] = value / count.max(1.0);
                // Gradient sums scale with the doubled grid spacing.
                coarse.rhs[ci] = 2.0 * rhs / count.max(1.0);
                coarse.fixed[ci] = !all_free;
            }
        }
        coarse
    }

    /// Pull coarse values into this grid's unknowns.
    fn prolongate_from(&mut self, coarse: &PoissonGrid) {
        for y in 0..self.height {
            for x in 0..self.width {
                let i = y * self.width + x;
                if self.fixed[i] {
                    continue;
                }
                let ci = (y / 2) * coarse.width + (x / 2);
                if !coarse.fixed[ci] {
                    self.values[i] = coarse.values[ci];
                }
            }
        }
    }
}

/// Solve the grid in place; returns the number of relaxation sweeps used.
pub fn solve(grid: &mut PoissonGrid, tolerance: f64, max_cycles: usize) -> usize {
    // Build the coarsening ladder up front.
    let mut ladder = vec![grid.clone()];
    loop {
        let top = &ladder[ladder.len() - 1];
        if top.width.min(top.height) < 2 * MIN_LEVEL_DIM {
            break;
        }
        let next = top.coarsen();
        ladder.push(next);
    }

    let mut sweeps = 0usize;
    let mut solved: Option<PoissonGrid> = None;
    for mut level in ladder.into_iter().rev() {
        if let Some(coarse) = &solved {
            level.prolongate_from(coarse);
        }
        while sweeps < max_cycles {
            sweeps += 1;
            if level.relax() < tolerance {
                break;
            }
        }
        solved = Some(level);
    }

    let result = solved.unwrap_or_else(|| grid.clone());
    grid.values = result.values;
    debug!("poisson solve used {sweeps} sweeps");
    sweeps
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1-D Laplace problem embedded in a strip: fixed ends 0 and 30, zero
    /// rhs, solution is the linear ramp.
    #[test]
    fn laplace_strip_converges_to_linear_ramp() {
        let w = 31;
        let mut grid = PoissonGrid::new(w, 3, false);
        for y in 0..3 {
            for x in 1..w - 1 {
                if y == 1 {
                    grid.fixed[y * w + x] = false;
                }
            }
        }
        for x in 0..w {
            grid.values[x] = x as f64; // top row fixed at the ramp
            grid.values[2 * w + x] = x as f64; // bottom row too
        }
        grid.values[w] = 0.0;
        grid.values[w + w - 1] = (w - 1) as f64;

        solve(&mut grid, 1e-4, 5000);
        for x in 0..w {
            assert!(
                (grid.values[w + x] - x as f64).abs() < 0.05,
                "x = {x}: {}",
                grid.values[w + x]
            );
        }
    }

    #[test]
    fn constant_rhs_bows_the_solution() {
        let w = 17;
        let mut grid = PoissonGrid::new(w, 3, false);
        for x in 1..w - 1 {
            grid.fixed[w + x] = false;
            grid.rhs[w + x] = 1.0;
        }
        solve(&mut grid, 1e-6, 5000);
        // Zero boundary, positive forcing: interior rises above the ends.
        assert!(grid.values[w + w / 2] > grid.values[w] + 0.1);
    }

    #[test]
    fn coarsening_averages_values_and_doubles_the_rhs() {
        let mut grid = PoissonGrid::new(40, 34, false);
        // One fully free 2x2 block with known values and unit rhs.
        for (k, (fx, fy)) in [(10, 10), (11, 10), (10, 11), (11, 11)].iter().enumerate() {
            let i = fy * 40 + fx;
            grid.fixed[i] = false;
            grid.values[i] = 4.0 * (k + 1) as f64;
            grid.rhs[i] = 1.0;
        }
        // A block with one fixed pixel stays Dirichlet on the coarse grid.
        grid.fixed[12 * 40 + 20] = false;
        grid.fixed[12 * 40 + 21] = false;
        grid.fixed[13 * 40 + 20] = false;

        let coarse = grid.coarsen();
        assert_eq!((coarse.width, coarse.height), (20, 17));
        assert!(!coarse.fixed[5 * 20 + 5]);
        assert_eq!(coarse.values[5 * 20 + 5], 10.0);
        assert_eq!(coarse.rhs[5 * 20 + 5], 2.0);
        assert!(coarse.fixed[6 * 20 + 10]);
    }

    #[test]
    fn wrap_connects_lateral_edges() {
        // Single-row ring, one fixed pixel; with wrap, the whole ring
        // relaxes to the fixed value.
        let w = 8;
        let mut grid = PoissonGrid::new(w, 1, true);
        for x in 0..w {
            grid.fixed[x] = x == 3;
        }
        grid.values[3] = 7.0;
        solve(&mut grid, 1e-6, 5000);
        for x in 0..w {
            assert!((grid.values[x] - 7.0).abs() < 0.01, "x = {x}");
        }
    }
}
