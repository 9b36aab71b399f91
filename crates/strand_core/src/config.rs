use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::predict::PredictorChoice;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("step sizes must satisfy 0 < min <= initial <= max (min {min}, initial {initial}, max {max})")]
    BadStepSizes { min: f64, initial: f64, max: f64 },
    #[error("step size factors must satisfy 0 < fail < 1 <= success (fail {fail}, success {success})")]
    BadStepFactors { fail: f64, success: f64 },
    #[error("step counts must satisfy 1 <= min_num_steps and max_num_steps >= 1 (min {min}, max {max})")]
    BadStepCounts { min: usize, max: usize },
    #[error("newton iteration bounds must satisfy 1 <= min <= max (min {min}, max {max})")]
    BadNewtonBounds { min: usize, max: usize },
    #[error("tracking tolerance must be positive and finite (got {0})")]
    BadTolerance(f64),
    #[error("path truncation threshold must be positive and finite (got {0})")]
    BadTruncationThreshold(f64),
}

/// Step-size policy for the tracking loop.
///
/// Shrinking is immediate on any single failure; growth requires a streak of
/// consecutive successes, so the controller distrusts the step size after any
/// setback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SteppingConfig {
    pub initial_step_size: f64,
    pub min_step_size: f64,
    pub max_step_size: f64,
    /// Lower bound on how many steps the whole path should geometrically
    /// take; caps the first step at |start - end| / min_num_steps.
    pub min_num_steps: usize,
    pub max_num_steps: usize,
    /// Multiplier applied to the step size after a failed step. In (0, 1).
    pub step_size_fail_factor: f64,
    /// Multiplier applied when the success streak justifies growth. >= 1.
    pub step_size_success_factor: f64,
    /// Successful steps required since the last increase before the step
    /// size is allowed to grow.
    pub consecutive_successes_before_increase: usize,
}

impl Default for SteppingConfig {
    fn default() -> Self {
        Self {
            initial_step_size: 0.1,
            min_step_size: 1e-10,
            max_step_size: 0.1,
            min_num_steps: 1,
            max_num_steps: 10_000,
            step_size_fail_factor: 0.5,
            step_size_success_factor: 2.0,
            consecutive_successes_before_increase: 5,
        }
    }
}

impl SteppingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_step_size > 0.0
            && self.min_step_size <= self.initial_step_size
            && self.initial_step_size <= self.max_step_size)
        {
            return Err(ConfigError::BadStepSizes {
                min: self.min_step_size,
                initial: self.initial_step_size,
                max: self.max_step_size,
            });
        }
        if !(self.step_size_fail_factor > 0.0
            && self.step_size_fail_factor < 1.0
            && self.step_size_success_factor >= 1.0)
        {
            return Err(ConfigError::BadStepFactors {
                fail: self.step_size_fail_factor,
                success: self.step_size_success_factor,
            });
        }
        if self.min_num_steps == 0 || self.max_num_steps == 0 {
            return Err(ConfigError::BadStepCounts {
                min: self.min_num_steps,
                max: self.max_num_steps,
            });
        }
        Ok(())
    }
}

/// Bounds and tolerance for the Newton corrector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewtonConfig {
    pub min_num_iterations: usize,
    pub max_num_iterations: usize,
    /// Convergence tolerance on the Newton update norm, not the residual.
    pub tracking_tolerance: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            min_num_iterations: 1,
            max_num_iterations: 2,
            tracking_tolerance: 1e-5,
        }
    }
}

impl NewtonConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_num_iterations == 0 || self.min_num_iterations > self.max_num_iterations {
            return Err(ConfigError::BadNewtonBounds {
                min: self.min_num_iterations,
                max: self.max_num_iterations,
            });
        }
        if !(self.tracking_tolerance > 0.0 && self.tracking_tolerance.is_finite()) {
            return Err(ConfigError::BadTolerance(self.tracking_tolerance));
        }
        Ok(())
    }
}

/// Complete configuration for a fixed-precision tracker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub stepping: SteppingConfig,
    pub newton: NewtonConfig,
    pub predictor: PredictorChoice,
    /// Space-norm bound past which a path is considered to diverge.
    pub path_truncation_threshold: f64,
    /// How many steps may pass between conditioning-estimate refreshes.
    pub conditioning_check_frequency: usize,
    /// Whether `initialize` recomputes the step size from the configured
    /// initial value and the start/end separation.
    pub reinitialize_step_size: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stepping: SteppingConfig::default(),
            newton: NewtonConfig::default(),
            predictor: PredictorChoice::Euler,
            path_truncation_threshold: 1e5,
            conditioning_check_frequency: 1,
            reinitialize_step_size: true,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stepping.validate()?;
        self.newton.validate()?;
        if !(self.path_truncation_threshold > 0.0 && self.path_truncation_threshold.is_finite()) {
            return Err(ConfigError::BadTruncationThreshold(
                self.path_truncation_threshold,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        TrackerConfig::default().validate().expect("defaults valid");
    }

    #[test]
    fn test_rejects_inverted_step_sizes() {
        let config = SteppingConfig {
            min_step_size: 1.0,
            initial_step_size: 0.1,
            ..SteppingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadStepSizes { .. })
        ));
    }

    #[test]
    fn test_rejects_growing_fail_factor() {
        let config = SteppingConfig {
            step_size_fail_factor: 1.5,
            ..SteppingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadStepFactors { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_newton_minimum() {
        let config = NewtonConfig {
            min_num_iterations: 0,
            ..NewtonConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadNewtonBounds { .. })
        ));
    }

    #[test]
    fn test_rejects_negative_tolerance() {
        let config = NewtonConfig {
            tracking_tolerance: -1e-6,
            ..NewtonConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::BadTolerance(_))));
    }
}
