use nalgebra::{convert, DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::status::StatusCode;
use crate::traits::{HomotopySystem, RealOf, TrackerScalar};

/// Explicit ODE scheme used by the predictor.
///
/// Both schemes integrate the Davidenko field dx/dt = -J(x, t)^-1 dH/dt,
/// so every stage costs one Jacobian evaluation and one LU solve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PredictorChoice {
    Euler,
    RungeKutta4,
}

/// Estimate of how sensitive the Jacobian solve is to perturbation.
///
/// Recomputed periodically rather than every step; the refresh frequency is
/// caller-configured.
#[derive(Debug, Clone, Copy)]
pub struct ConditioningEstimate<C: TrackerScalar> {
    pub norm_jacobian: RealOf<C>,
    pub norm_jacobian_inverse: RealOf<C>,
    pub condition_number: RealOf<C>,
}

impl<C: TrackerScalar> ConditioningEstimate<C> {
    /// Neutral estimate used before the first refresh.
    pub fn unit() -> Self {
        let one: RealOf<C> = convert(1.0);
        Self {
            norm_jacobian: one,
            norm_jacobian_inverse: one,
            condition_number: one,
        }
    }
}

/// Produces a predicted next space point by extrapolation, without enforcing
/// exact satisfaction of the system. Stage buffers are reused across calls.
pub struct Predictor<C: TrackerScalar> {
    choice: PredictorChoice,
    jacobian: DMatrix<C>,
    dh_dt: DVector<C>,
    k1: DVector<C>,
    k2: DVector<C>,
    k3: DVector<C>,
    k4: DVector<C>,
    stage_point: DVector<C>,
}

impl<C: TrackerScalar> Predictor<C> {
    pub fn new(dim: usize, choice: PredictorChoice) -> Self {
        Self {
            choice,
            jacobian: DMatrix::zeros(dim, dim),
            dh_dt: DVector::zeros(dim),
            k1: DVector::zeros(dim),
            k2: DVector::zeros(dim),
            k3: DVector::zeros(dim),
            k4: DVector::zeros(dim),
            stage_point: DVector::zeros(dim),
        }
    }

    pub fn choice(&self) -> PredictorChoice {
        self.choice
    }

    /// Computes the predicted space point at `current_time + delta_t`.
    ///
    /// Refreshes the conditioning estimate from the first-stage Jacobian when
    /// `steps_since_check` has reached `check_frequency`, resetting the
    /// counter; otherwise the counter advances. A singular solve in any stage
    /// returns `MatrixSolveFailure` and leaves `predicted` unspecified.
    #[allow(clippy::too_many_arguments)]
    pub fn predict<S: HomotopySystem<C>>(
        &mut self,
        predicted: &mut DVector<C>,
        system: &S,
        current_space: &DVector<C>,
        current_time: C,
        delta_t: C,
        conditioning: &mut ConditioningEstimate<C>,
        steps_since_check: &mut usize,
        check_frequency: usize,
    ) -> StatusCode {
        let code = davidenko_velocity(
            system,
            current_space,
            current_time,
            &mut self.jacobian,
            &mut self.dh_dt,
            &mut self.k1,
        );
        if !code.is_success() {
            return code;
        }

        if *steps_since_check >= check_frequency {
            let code = refresh_conditioning(&self.jacobian, conditioning);
            if !code.is_success() {
                return code;
            }
            *steps_since_check = 0;
        } else {
            *steps_since_check += 1;
        }

        match self.choice {
            PredictorChoice::Euler => {
                let one = C::from_real(convert(1.0));
                predicted.copy_from(current_space);
                predicted.axpy(delta_t, &self.k1, one);
                StatusCode::Success
            }
            PredictorChoice::RungeKutta4 => {
                self.predict_rk4(predicted, system, current_space, current_time, delta_t)
            }
        }
    }

    /// Classic fourth-order Runge-Kutta over the Davidenko field. `k1` must
    /// already hold the velocity at (current_space, current_time).
    fn predict_rk4<S: HomotopySystem<C>>(
        &mut self,
        predicted: &mut DVector<C>,
        system: &S,
        current_space: &DVector<C>,
        current_time: C,
        delta_t: C,
    ) -> StatusCode {
        let one = C::from_real(convert(1.0));
        let half: RealOf<C> = convert(0.5);
        let sixth: RealOf<C> = convert(1.0 / 6.0);
        let two: RealOf<C> = convert(2.0);

        let half_dt = delta_t.scale(half);
        let mid_time = current_time + half_dt;
        let end_time = current_time + delta_t;

        // k2 = v(x + dt/2 k1, t + dt/2)
        self.stage_point.copy_from(current_space);
        self.stage_point.axpy(half_dt, &self.k1, one);
        let code = davidenko_velocity(
            system,
            &self.stage_point,
            mid_time,
            &mut self.jacobian,
            &mut self.dh_dt,
            &mut self.k2,
        );
        if !code.is_success() {
            return code;
        }

        // k3 = v(x + dt/2 k2, t + dt/2)
        self.stage_point.copy_from(current_space);
        self.stage_point.axpy(half_dt, &self.k2, one);
        let code = davidenko_velocity(
            system,
            &self.stage_point,
            mid_time,
            &mut self.jacobian,
            &mut self.dh_dt,
            &mut self.k3,
        );
        if !code.is_success() {
            return code;
        }

        // k4 = v(x + dt k3, t + dt)
        self.stage_point.copy_from(current_space);
        self.stage_point.axpy(delta_t, &self.k3, one);
        let code = davidenko_velocity(
            system,
            &self.stage_point,
            end_time,
            &mut self.jacobian,
            &mut self.dh_dt,
            &mut self.k4,
        );
        if !code.is_success() {
            return code;
        }

        // x_next = x + dt/6 * (k1 + 2 k2 + 2 k3 + k4)
        let dt_sixth = delta_t.scale(sixth);
        let dt_third = dt_sixth.scale(two);
        predicted.copy_from(current_space);
        predicted.axpy(dt_sixth, &self.k1, one);
        predicted.axpy(dt_third, &self.k2, one);
        predicted.axpy(dt_third, &self.k3, one);
        predicted.axpy(dt_sixth, &self.k4, one);
        StatusCode::Success
    }
}

/// Solves J(x, t) k = -dH/dt(x, t) for the path velocity at one stage point.
fn davidenko_velocity<C: TrackerScalar, S: HomotopySystem<C>>(
    system: &S,
    x: &DVector<C>,
    t: C,
    jacobian: &mut DMatrix<C>,
    dh_dt: &mut DVector<C>,
    velocity: &mut DVector<C>,
) -> StatusCode {
    system.jacobian(x, t, jacobian);
    system.time_derivative(x, t, dh_dt);
    dh_dt.neg_mut();
    match jacobian.clone().lu().solve(dh_dt) {
        Some(v) => {
            velocity.copy_from(&v);
            StatusCode::Success
        }
        None => StatusCode::MatrixSolveFailure,
    }
}

/// Frobenius norm of J and a one-probe estimate of |J^-1| from a normalized
/// constant right-hand side.
fn refresh_conditioning<C: TrackerScalar>(
    jacobian: &DMatrix<C>,
    conditioning: &mut ConditioningEstimate<C>,
) -> StatusCode {
    let dim = jacobian.nrows();
    let entry: RealOf<C> = convert(1.0 / (dim as f64).sqrt());
    let probe = DVector::from_element(dim, C::from_real(entry));
    match jacobian.clone().lu().solve(&probe) {
        Some(y) => {
            let norm_jacobian = jacobian.norm();
            let norm_jacobian_inverse = y.norm();
            conditioning.norm_jacobian = norm_jacobian;
            conditioning.norm_jacobian_inverse = norm_jacobian_inverse;
            conditioning.condition_number = norm_jacobian * norm_jacobian_inverse;
            StatusCode::Success
        }
        None => StatusCode::MatrixSolveFailure,
    }
}
