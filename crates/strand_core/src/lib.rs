//! Strand: homotopy continuation path tracking.
//!
//! The crate tracks a solution x(t) of a parameterized system H(x, t) = 0 as
//! the homotopy parameter t moves from a start value to a target value, using
//! a predictor-corrector loop with adaptive step-size control in fixed
//! (double) precision.
//!
//! The pieces compose as follows:
//!
//! * [`HomotopySystem`] is the numeric interface a problem implements:
//!   residual, space Jacobian, and time derivative.
//! * [`Predictor`](predict::Predictor) extrapolates along the Davidenko field
//!   dx/dt = -J(x, t)^-1 dH/dt with Euler or classic Runge-Kutta 4.
//! * [`Corrector`](correct::Corrector) runs bounded Newton iteration back
//!   onto the path.
//! * [`FixedPrecisionTracker`] owns the loop: step-size policy, failure
//!   taxonomy ([`StatusCode`]), divergence truncation, and lifecycle events.
//!
//! ```
//! use nalgebra::{DMatrix, DVector};
//! use num_complex::Complex;
//! use strand_core::{FixedPrecisionTracker, HomotopySystem, StatusCode, TrackerConfig};
//!
//! type C64 = Complex<f64>;
//!
//! // H(x, t) = x - t, whose solution path is simply x(t) = t.
//! struct Line;
//!
//! impl HomotopySystem<C64> for Line {
//!     fn num_variables(&self) -> usize {
//!         1
//!     }
//!     fn residual(&self, x: &DVector<C64>, t: C64, out: &mut DVector<C64>) {
//!         out[0] = x[0] - t;
//!     }
//!     fn jacobian(&self, _x: &DVector<C64>, _t: C64, out: &mut DMatrix<C64>) {
//!         out[(0, 0)] = Complex::new(1.0, 0.0);
//!     }
//!     fn time_derivative(&self, _x: &DVector<C64>, _t: C64, out: &mut DVector<C64>) {
//!         out[0] = Complex::new(-1.0, 0.0);
//!     }
//! }
//!
//! let system = Line;
//! let mut tracker = FixedPrecisionTracker::new(&system, TrackerConfig::default()).unwrap();
//!
//! let start = DVector::from_vec(vec![Complex::new(1.0, 0.0)]);
//! let mut solution = DVector::zeros(1);
//! let code = tracker.track_path(
//!     Complex::new(1.0, 0.0),
//!     Complex::new(0.0, 0.0),
//!     &start,
//!     &mut solution,
//! );
//! assert_eq!(code, StatusCode::Success);
//! assert!(solution[0].norm() < 1e-5);
//! ```

pub mod config;
pub mod correct;
pub mod events;
pub mod predict;
pub mod status;
pub mod tracker;
pub mod traits;

pub use config::{ConfigError, NewtonConfig, SteppingConfig, TrackerConfig};
pub use events::{EventBus, EventSink, LogSink, TrackingEvent};
pub use predict::{ConditioningEstimate, PredictorChoice};
pub use status::StatusCode;
pub use tracker::{FixedPrecisionTracker, PathTracker, TrackerState};
pub use traits::{HomotopySystem, RealOf, TrackerScalar};
