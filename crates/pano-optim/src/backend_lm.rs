//! Levenberg-Marquardt backend over the `levenberg-marquardt` crate.
//!
//! Cancellation is cooperative: [`NllsProblem::poll_cancel`] is checked on
//! every residual evaluation and aborts the minimization by withholding
//! residuals. The crate reports that as an unsuccessful `User` termination,
//! so callers must consult their problem's cancelled flag to tell
//! cancellation apart from a genuine failure.

use crate::traits::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use pano_core::Real;

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<Real>,
}

impl<'a, P: NllsProblem> LeastSquaresProblem<Real, Dyn, Dyn> for LmWrapper<'a, P> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        if self.problem.poll_cancel() {
            return None;
        }
        Some(self.problem.residuals(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        Some(self.problem.jacobian(&self.params))
    }
}

/// Dense LM backend.
#[derive(Debug, Default, Clone)]
pub struct LmBackend;

impl NllsSolverBackend for LmBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        let lm = LevenbergMarquardt::new()
            .with_ftol(opts.ftol)
            .with_xtol(opts.xtol)
            .with_gtol(opts.gtol)
            .with_patience(opts.max_iters.max(1));

        let wrapper = LmWrapper {
            problem,
            params: x0,
        };

        let (wrapper, report) = lm.minimize(wrapper);
        let x_opt = wrapper.params();

        (
            x_opt,
            SolveReport {
                iterations: report.number_of_evaluations,
                final_cost: report.objective_function,
                converged: report.termination.was_successful(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::LmBackend;
    use crate::traits::{NllsProblem, NllsSolverBackend, SolveOptions};
    use nalgebra::DVector;
    use pano_core::Real;
    use std::cell::Cell;

    #[derive(Debug)]
    struct OneDimProblem;

    impl NllsProblem for OneDimProblem {
        fn num_params(&self) -> usize {
            1
        }
        fn num_residuals(&self) -> usize {
            1
        }
        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_element(1, x[0] - 3.0)
        }
    }

    #[test]
    fn lm_backend_solves_trivial_problem() {
        let backend = LmBackend;
        let problem = OneDimProblem;
        let x0 = DVector::from_element(1, 10.0);
        let opts = SolveOptions::default();

        let (x_opt, report) = backend.solve(&problem, x0, &opts);

        assert!(
            (x_opt[0] - 3.0).abs() < 1e-6,
            "expected optimizer to reach 3.0, got {}",
            x_opt[0]
        );
        assert!(report.converged, "LM backend did not converge: {report:?}");
    }

    struct CancellingProblem {
        budget: Cell<usize>,
        cancelled: Cell<bool>,
    }

    impl NllsProblem for CancellingProblem {
        fn num_params(&self) -> usize {
            1
        }
        fn num_residuals(&self) -> usize {
            1
        }
        fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
            DVector::from_element(1, x[0] - 3.0)
        }
        fn poll_cancel(&self) -> bool {
            let left = self.budget.get();
            if left == 0 {
                self.cancelled.set(true);
                return true;
            }
            self.budget.set(left - 1);
            false
        }
    }

    #[test]
    fn cancellation_aborts_without_convergence() {
        let backend = LmBackend;
        let problem = CancellingProblem {
            budget: Cell::new(1),
            cancelled: Cell::new(false),
        };
        let x0 = DVector::from_element(1, 1000.0);
        let (_, report) = backend.solve(&problem, x0, &SolveOptions::default());

        assert!(problem.cancelled.get(), "poll_cancel never tripped");
        assert!(!report.converged);
    }
}
