use serde::{Deserialize, Serialize};

/// Outcome of a tracker stage.
///
/// This closed set is the sole channel by which stages report results; codes
/// are returned, never thrown, and linear-algebra failures inside the
/// predictor or corrector surface here rather than as errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatusCode {
    /// The step or check completed as intended.
    Success,
    /// A linear solve against the Jacobian failed (singular or non-finite).
    MatrixSolveFailure,
    /// The corrector exhausted its iteration budget without converging.
    FailedToConverge,
    /// The space point escaped the truncation bound; unrecoverable by
    /// step-size adjustment.
    GoingToInfinity,
    /// The configured maximum number of successful steps was reached.
    MaxNumStepsTaken,
    /// The step size fell below the configured minimum.
    MinStepSizeReached,
}

impl StatusCode {
    pub fn is_success(self) -> bool {
        matches!(self, StatusCode::Success)
    }

    /// Codes that end the path outright. Shrinking the step size and
    /// retrying cannot recover any of these.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StatusCode::GoingToInfinity
                | StatusCode::MaxNumStepsTaken
                | StatusCode::MinStepSizeReached
        )
    }
}
