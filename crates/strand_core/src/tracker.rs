use anyhow::{bail, Result};
use nalgebra::{convert, DVector};

use crate::config::TrackerConfig;
use crate::correct::Corrector;
use crate::events::{EventBus, EventSink, TrackingEvent};
use crate::predict::{ConditioningEstimate, Predictor};
use crate::status::StatusCode;
use crate::traits::{HomotopySystem, RealOf, TrackerScalar};

/// Mutable per-path state.
///
/// Created fresh by `initialize` and mutated exclusively by the tracker's own
/// methods during stepping; the predictor and corrector receive references to
/// individual fields but never hold them across calls.
#[derive(Debug, Clone)]
pub struct TrackerState<C: TrackerScalar> {
    pub(crate) current_time: C,
    pub(crate) end_time: C,
    pub(crate) current_step_size: RealOf<C>,
    pub(crate) next_step_size: RealOf<C>,
    pub(crate) current_space: DVector<C>,
    pub(crate) predicted_space: DVector<C>,
    pub(crate) tentative_space: DVector<C>,
    pub(crate) num_successful_steps: usize,
    pub(crate) num_successful_steps_since_increase: usize,
    pub(crate) num_steps_since_conditioning_check: usize,
    pub(crate) conditioning: ConditioningEstimate<C>,
}

impl<C: TrackerScalar> TrackerState<C> {
    pub fn current_time(&self) -> C {
        self.current_time
    }

    pub fn end_time(&self) -> C {
        self.end_time
    }

    pub fn current_step_size(&self) -> RealOf<C> {
        self.current_step_size
    }

    pub fn current_space(&self) -> &DVector<C> {
        &self.current_space
    }

    pub fn num_successful_steps(&self) -> usize {
        self.num_successful_steps
    }

    pub fn num_successful_steps_since_increase(&self) -> usize {
        self.num_successful_steps_since_increase
    }

    pub fn conditioning(&self) -> &ConditioningEstimate<C> {
        &self.conditioning
    }
}

/// Capability shared by tracker variants.
///
/// The fixed-precision tracker below is the only implementation here; an
/// adaptive-precision variant slots in beside it without changing callers.
pub trait PathTracker<C: TrackerScalar> {
    /// Sets up the tracker for a fresh path. Returns `Success`
    /// unconditionally; malformed input is the caller's responsibility.
    fn initialize(&mut self, start_time: C, end_time: C, start_point: &DVector<C>) -> StatusCode;

    /// Checks that the step and step-size budgets are still intact.
    fn pre_iteration_check(&self) -> StatusCode;

    /// Runs one predict-correct step, adjusting the step size as necessary.
    fn iteration(&mut self) -> StatusCode;

    /// Checks whether the current space point has escaped the truncation
    /// bound.
    fn check_going_to_infinity(&self) -> StatusCode;

    /// Copies the current space point into `solution`. Performs no
    /// validation of the terminal status; the caller must check the code
    /// before trusting the result.
    fn extract_solution(&self, solution: &mut DVector<C>);

    /// Whether the current time has reached the end time.
    fn is_finished(&self) -> bool;
}

/// The fixed-precision path tracker: a predictor-corrector loop with
/// asymmetric step-size control over a homotopy H(x, t).
///
/// One instance tracks one path at a time, strictly sequentially. Distinct
/// instances share only the borrowed system and may run in parallel.
pub struct FixedPrecisionTracker<'a, C: TrackerScalar, S: HomotopySystem<C>> {
    system: &'a S,
    config: TrackerConfig,
    predictor: Predictor<C>,
    corrector: Corrector<C>,
    state: TrackerState<C>,
    events: EventBus<C>,
}

impl<'a, C: TrackerScalar, S: HomotopySystem<C>> FixedPrecisionTracker<'a, C, S> {
    pub fn new(system: &'a S, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let dim = system.num_variables();
        if dim == 0 {
            bail!("System has zero variables.");
        }

        let zero = C::from_real(convert(0.0));
        let initial_step: RealOf<C> = convert(config.stepping.initial_step_size);
        Ok(Self {
            system,
            predictor: Predictor::new(dim, config.predictor),
            corrector: Corrector::new(dim),
            state: TrackerState {
                current_time: zero,
                end_time: zero,
                current_step_size: initial_step,
                next_step_size: initial_step,
                current_space: DVector::zeros(dim),
                predicted_space: DVector::zeros(dim),
                tentative_space: DVector::zeros(dim),
                num_successful_steps: 0,
                num_successful_steps_since_increase: 0,
                num_steps_since_conditioning_check: config.conditioning_check_frequency,
                conditioning: ConditioningEstimate::unit(),
            },
            events: EventBus::new(),
            config,
        })
    }

    /// Registers an observer for lifecycle events.
    pub fn subscribe(&mut self, sink: Box<dyn EventSink<C>>) {
        self.events.subscribe(sink);
    }

    pub fn state(&self) -> &TrackerState<C> {
        &self.state
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Tracks one full path from `start_time` to `end_time`, writing the
    /// solution into `solution` on success.
    ///
    /// Non-terminal failure codes from `iteration` keep the loop running
    /// with the already-shrunk step size; persistent failure surfaces as
    /// `MinStepSizeReached` through the pre-iteration check. `start_point`
    /// must have the system's variable count.
    pub fn track_path(
        &mut self,
        start_time: C,
        end_time: C,
        start_point: &DVector<C>,
        solution: &mut DVector<C>,
    ) -> StatusCode {
        self.initialize(start_time, end_time, start_point);

        while !self.is_finished() {
            let code = self.pre_iteration_check();
            if !code.is_success() {
                self.events.publish(TrackingEvent::TrackingEnded);
                return code;
            }

            let code = self.iteration();
            if code == StatusCode::GoingToInfinity {
                self.on_infinite_truncation();
                self.events.publish(TrackingEvent::TrackingEnded);
                return code;
            }
            if code.is_success() {
                let code = self.check_going_to_infinity();
                if !code.is_success() {
                    self.on_infinite_truncation();
                    self.events.publish(TrackingEvent::TrackingEnded);
                    return code;
                }
            }
        }

        self.events.publish(TrackingEvent::TrackingEnded);
        self.extract_solution(solution);
        StatusCode::Success
    }

    /// Runs the corrector alone at a fixed time, to the tracking tolerance.
    ///
    /// Does not advance time or touch the loop's counters; used to polish a
    /// point after tracking terminates.
    pub fn refine(
        &mut self,
        refined: &mut DVector<C>,
        start_point: &DVector<C>,
        time: C,
    ) -> StatusCode {
        let tolerance: RealOf<C> = convert(self.config.newton.tracking_tolerance);
        self.refine_with_tolerance(refined, start_point, time, tolerance)
    }

    /// Same as `refine`, with an explicit tolerance on the Newton update.
    pub fn refine_with_tolerance(
        &mut self,
        refined: &mut DVector<C>,
        start_point: &DVector<C>,
        time: C,
        tolerance: RealOf<C>,
    ) -> StatusCode {
        self.corrector.correct(
            refined,
            self.system,
            start_point,
            time,
            tolerance,
            self.config.newton.min_num_iterations,
            self.config.newton.max_num_iterations,
            convert(self.config.path_truncation_threshold),
        )
    }

    /// Commits the pending step size as current.
    fn update_step_size(&mut self) {
        self.state.current_step_size = self.state.next_step_size;
    }

    /// Immediate shrink applied on any single failure.
    fn shrink_step_size(&mut self) {
        let factor: RealOf<C> = convert(self.config.stepping.step_size_fail_factor);
        self.state.next_step_size = self.state.current_step_size * factor;
        self.update_step_size();
    }

    /// Success bookkeeping, including the growth policy: the step size grows
    /// only after a configured streak of successes since the last increase,
    /// clamped to the maximum.
    fn increment_counters_success(&mut self) {
        self.state.num_successful_steps += 1;
        self.state.num_successful_steps_since_increase += 1;

        if self.state.num_successful_steps_since_increase
            >= self.config.stepping.consecutive_successes_before_increase
        {
            let factor: RealOf<C> = convert(self.config.stepping.step_size_success_factor);
            let max_step: RealOf<C> = convert(self.config.stepping.max_step_size);
            let grown = self.state.current_step_size * factor;
            self.state.next_step_size = if grown > max_step { max_step } else { grown };
            self.state.num_successful_steps_since_increase = 0;
            self.update_step_size();
        }

        self.events.publish(TrackingEvent::SuccessfulStep {
            num_successful_steps: self.state.num_successful_steps,
        });
    }

    /// Failure forfeits the growth streak; the total success count is
    /// untouched.
    fn increment_counters_fail(&mut self) {
        self.state.num_successful_steps_since_increase = 0;
        self.events.publish(TrackingEvent::FailedStep {
            num_successful_steps: self.state.num_successful_steps,
        });
    }

    fn on_infinite_truncation(&mut self) {
        let space_norm = self.state.current_space.norm();
        self.events
            .publish(TrackingEvent::InfinitePathTruncation { space_norm });
    }
}

impl<'a, C: TrackerScalar, S: HomotopySystem<C>> PathTracker<C>
    for FixedPrecisionTracker<'a, C, S>
{
    fn initialize(&mut self, start_time: C, end_time: C, start_point: &DVector<C>) -> StatusCode {
        self.state.current_time = start_time;
        self.state.end_time = end_time;
        self.state.current_space.copy_from(start_point);

        if self.config.reinitialize_step_size {
            // Bound the first step so at least min_num_steps steps are
            // geometrically plausible.
            let initial: RealOf<C> = convert(self.config.stepping.initial_step_size);
            let spread = (start_time - end_time).modulus()
                / convert(self.config.stepping.min_num_steps as f64);
            let step = if spread < initial { spread } else { initial };
            self.state.current_step_size = step;
            self.state.next_step_size = step;
        }

        self.state.num_successful_steps = 0;
        self.state.num_successful_steps_since_increase = 0;
        // Primed to the frequency so the first iteration refreshes the
        // conditioning estimate.
        self.state.num_steps_since_conditioning_check = self.config.conditioning_check_frequency;

        self.events.publish(TrackingEvent::Initializing {
            start_time,
            end_time,
        });
        StatusCode::Success
    }

    fn pre_iteration_check(&self) -> StatusCode {
        if self.state.num_successful_steps >= self.config.stepping.max_num_steps {
            return StatusCode::MaxNumStepsTaken;
        }
        let min_step: RealOf<C> = convert(self.config.stepping.min_step_size);
        if self.state.current_step_size < min_step {
            return StatusCode::MinStepSizeReached;
        }
        StatusCode::Success
    }

    fn iteration(&mut self) -> StatusCode {
        if self.is_finished() {
            return StatusCode::Success;
        }

        self.events.publish(TrackingEvent::NewStep {
            current_time: self.state.current_time,
            step_size: self.state.current_step_size,
        });

        // Step toward end_time, clamped so the final step lands exactly on
        // it.
        let remaining = self.state.end_time - self.state.current_time;
        let distance = remaining.modulus();
        let (delta_t, lands_on_end) = if distance <= self.state.current_step_size {
            (remaining, true)
        } else {
            (
                remaining.unscale(distance).scale(self.state.current_step_size),
                false,
            )
        };

        let predictor_code = self.predictor.predict(
            &mut self.state.predicted_space,
            self.system,
            &self.state.current_space,
            self.state.current_time,
            delta_t,
            &mut self.state.conditioning,
            &mut self.state.num_steps_since_conditioning_check,
            self.config.conditioning_check_frequency,
        );
        if !predictor_code.is_success() {
            self.events.publish(TrackingEvent::PredictorFailed {
                code: predictor_code,
            });
            self.shrink_step_size();
            self.increment_counters_fail();
            return predictor_code;
        }

        if !self.events.is_empty() {
            // Snapshot only when somebody is listening.
            let event = TrackingEvent::SuccessfulPredict {
                predicted: self.state.predicted_space.clone(),
            };
            self.events.publish(event);
        }

        let tentative_time = self.state.current_time + delta_t;
        let corrector_code = self.corrector.correct(
            &mut self.state.tentative_space,
            self.system,
            &self.state.predicted_space,
            tentative_time,
            convert(self.config.newton.tracking_tolerance),
            self.config.newton.min_num_iterations,
            self.config.newton.max_num_iterations,
            convert(self.config.path_truncation_threshold),
        );
        if corrector_code == StatusCode::GoingToInfinity {
            // No corrective action is possible; propagate untouched.
            self.increment_counters_fail();
            return corrector_code;
        }
        if !corrector_code.is_success() {
            self.events.publish(TrackingEvent::CorrectorFailed {
                code: corrector_code,
            });
            self.shrink_step_size();
            self.increment_counters_fail();
            return corrector_code;
        }

        if !self.events.is_empty() {
            let event = TrackingEvent::SuccessfulCorrect {
                corrected: self.state.tentative_space.clone(),
            };
            self.events.publish(event);
        }

        self.state
            .current_space
            .copy_from(&self.state.tentative_space);
        self.state.current_time = if lands_on_end {
            self.state.end_time
        } else {
            tentative_time
        };
        self.increment_counters_success();
        StatusCode::Success
    }

    fn check_going_to_infinity(&self) -> StatusCode {
        let threshold: RealOf<C> = convert(self.config.path_truncation_threshold);
        if self.state.current_space.norm() > threshold {
            StatusCode::GoingToInfinity
        } else {
            StatusCode::Success
        }
    }

    fn extract_solution(&self, solution: &mut DVector<C>) {
        *solution = self.state.current_space.clone();
    }

    fn is_finished(&self) -> bool {
        self.state.current_time == self.state.end_time
    }
}
