use nalgebra::{DMatrix, DVector};
use pano_core::Real;

/// Generic non-linear least squares problem with dense parameter/residual
/// vectors.
///
/// Residuals are expected to carry any robust weighting already applied;
/// the default Jacobian is a numerical forward difference of `residuals`.
pub trait NllsProblem {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;
    /// Number of residual rows in the problem.
    fn num_residuals(&self) -> usize;

    /// Residuals for the current parameters.
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;

    /// Numerical forward-difference Jacobian.
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let r0 = self.residuals(x);
        let mut j = DMatrix::zeros(r0.len(), x.len());
        let mut xp = x.clone();
        for col in 0..x.len() {
            let h = 1e-6 * x[col].abs().max(1.0);
            xp[col] = x[col] + h;
            let r1 = self.residuals(&xp);
            xp[col] = x[col];
            for row in 0..r0.len() {
                j[(row, col)] = (r1[row] - r0[row]) / h;
            }
        }
        j
    }

    /// Cooperative cancellation poll, checked once per residual evaluation.
    ///
    /// Returning `true` aborts the surrounding solver loop. The solver has
    /// no cancellation return channel of its own; callers must check the
    /// problem's post-hoc cancelled flag to distinguish cancellation from
    /// convergence.
    fn poll_cancel(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Maximum number of solver iterations before termination.
    ///
    /// The LM backend follows the MINPACK convention and interprets this
    /// as a patience cap on function evaluations.
    pub max_iters: usize,
    /// Relative tolerance on the objective (cost) reduction.
    pub ftol: Real,
    /// Orthogonality/gradient tolerance.
    pub gtol: Real,
    /// Relative tolerance on parameter updates.
    pub xtol: Real,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 200,
            ftol: 1e-10,
            gtol: 1e-10,
            xtol: 1e-10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveReport {
    pub iterations: usize,
    pub final_cost: Real,
    pub converged: bool,
}

pub trait NllsSolverBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic;

    impl NllsProblem for Quadratic {
        fn num_params(&self) -> usize {
            2
        }
        fn num_residuals(&self) -> usize {
            2
        }
        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            nalgebra::dvector![x[0] * x[0] - 4.0, x[0] * x[1] - 2.0]
        }
    }

    #[test]
    fn numeric_jacobian_matches_analytic() {
        let p = Quadratic;
        let x = nalgebra::dvector![3.0, -1.5];
        let j = p.jacobian(&x);
        // Analytic: [[2 x0, 0], [x1, x0]]
        assert!((j[(0, 0)] - 6.0).abs() < 1e-4);
        assert!(j[(0, 1)].abs() < 1e-6);
        assert!((j[(1, 0)] + 1.5).abs() < 1e-4);
        assert!((j[(1, 1)] - 3.0).abs() < 1e-4);
    }
}
