use nalgebra::{DMatrix, DVector};

use crate::status::StatusCode;
use crate::traits::{HomotopySystem, RealOf, TrackerScalar};

/// Newton iteration refining a predicted point toward a true solution of
/// H(x, t) = 0 at fixed t. Evaluation buffers are reused across calls.
pub struct Corrector<C: TrackerScalar> {
    jacobian: DMatrix<C>,
    residual: DVector<C>,
}

impl<C: TrackerScalar> Corrector<C> {
    pub fn new(dim: usize) -> Self {
        Self {
            jacobian: DMatrix::zeros(dim, dim),
            residual: DVector::zeros(dim),
        }
    }

    /// Runs bounded Newton iteration from `start`, writing the result into
    /// `corrected` regardless of the outcome.
    ///
    /// Convergence is declared on the Newton update norm, not the residual,
    /// once at least `min_num_iterations` have run. A point whose norm
    /// escapes `truncation_threshold` is reported as `GoingToInfinity`;
    /// step-size adjustment cannot recover that, so callers must propagate
    /// it rather than retry.
    #[allow(clippy::too_many_arguments)]
    pub fn correct<S: HomotopySystem<C>>(
        &mut self,
        corrected: &mut DVector<C>,
        system: &S,
        start: &DVector<C>,
        time: C,
        tolerance: RealOf<C>,
        min_num_iterations: usize,
        max_num_iterations: usize,
        truncation_threshold: RealOf<C>,
    ) -> StatusCode {
        corrected.copy_from(start);

        for iteration in 1..=max_num_iterations {
            system.residual(corrected, time, &mut self.residual);
            system.jacobian(corrected, time, &mut self.jacobian);
            self.residual.neg_mut();

            let delta = match self.jacobian.clone().lu().solve(&self.residual) {
                Some(delta) => delta,
                None => return StatusCode::MatrixSolveFailure,
            };

            *corrected += &delta;

            if corrected.norm() > truncation_threshold {
                return StatusCode::GoingToInfinity;
            }
            if delta.norm() < tolerance && iteration >= min_num_iterations {
                return StatusCode::Success;
            }
        }

        StatusCode::FailedToConverge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex;

    type C64 = Complex<f64>;

    /// H(x, t) = x^2 - t, with solution branch x(t) = sqrt(t).
    struct SquareRoot;

    impl HomotopySystem<C64> for SquareRoot {
        fn num_variables(&self) -> usize {
            1
        }

        fn residual(&self, x: &DVector<C64>, t: C64, out: &mut DVector<C64>) {
            out[0] = x[0] * x[0] - t;
        }

        fn jacobian(&self, x: &DVector<C64>, _t: C64, out: &mut DMatrix<C64>) {
            out[(0, 0)] = Complex::new(2.0, 0.0) * x[0];
        }

        fn time_derivative(&self, _x: &DVector<C64>, _t: C64, out: &mut DVector<C64>) {
            out[0] = Complex::new(-1.0, 0.0);
        }
    }

    #[test]
    fn test_newton_converges_quadratically() {
        let mut corrector = Corrector::new(1);
        let start = DVector::from_vec(vec![Complex::new(2.2, 0.0)]);
        let mut corrected = DVector::zeros(1);

        let code = corrector.correct(
            &mut corrected,
            &SquareRoot,
            &start,
            Complex::new(4.0, 0.0),
            1e-10,
            1,
            10,
            1e5,
        );
        assert_eq!(code, StatusCode::Success);
        assert_relative_eq!(corrected[0].re, 2.0, epsilon = 1e-9);
        assert_relative_eq!(corrected[0].im, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_exhausted_budget_fails_to_converge() {
        let mut corrector = Corrector::new(1);
        // Far from the root with a single allowed iteration.
        let start = DVector::from_vec(vec![Complex::new(50.0, 0.0)]);
        let mut corrected = DVector::zeros(1);

        let code = corrector.correct(
            &mut corrected,
            &SquareRoot,
            &start,
            Complex::new(4.0, 0.0),
            1e-12,
            1,
            1,
            1e5,
        );
        assert_eq!(code, StatusCode::FailedToConverge);
    }

    #[test]
    fn test_min_iterations_forces_extra_polish() {
        let mut corrector = Corrector::new(1);
        // Already converged start point; with min_num_iterations = 2 the
        // corrector still runs two updates before declaring success.
        let start = DVector::from_vec(vec![Complex::new(2.0, 0.0)]);
        let mut corrected = DVector::zeros(1);

        let code = corrector.correct(
            &mut corrected,
            &SquareRoot,
            &start,
            Complex::new(4.0, 0.0),
            1e-10,
            2,
            10,
            1e5,
        );
        assert_eq!(code, StatusCode::Success);
        assert_relative_eq!(corrected[0].re, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_jacobian_is_solve_failure() {
        let mut corrector = Corrector::new(1);
        // Newton at x = 0 has a singular Jacobian for x^2 - t.
        let start = DVector::from_vec(vec![Complex::new(0.0, 0.0)]);
        let mut corrected = DVector::zeros(1);

        let code = corrector.correct(
            &mut corrected,
            &SquareRoot,
            &start,
            Complex::new(4.0, 0.0),
            1e-10,
            1,
            10,
            1e5,
        );
        assert_eq!(code, StatusCode::MatrixSolveFailure);
    }

    #[test]
    fn test_escaping_point_reports_going_to_infinity() {
        let mut corrector = Corrector::new(1);
        let start = DVector::from_vec(vec![Complex::new(2.1, 0.0)]);
        let mut corrected = DVector::zeros(1);

        // A tiny truncation bound makes the first corrected point escape.
        let code = corrector.correct(
            &mut corrected,
            &SquareRoot,
            &start,
            Complex::new(4.0, 0.0),
            1e-10,
            1,
            10,
            1.0,
        );
        assert_eq!(code, StatusCode::GoingToInfinity);
    }
}
