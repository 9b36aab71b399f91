use nalgebra::{ComplexField, DMatrix, DVector, RealField};
use std::fmt::Debug;

/// A trait for complex scalars that can drive the path tracker.
///
/// The commensurate real type used for step sizes, norms, and tolerances is
/// `Real`, pinned to `ComplexField::RealField` by the supertrait bound;
/// a mismatched real/complex pairing cannot be expressed at all.
pub trait TrackerScalar:
    ComplexField<RealField = <Self as TrackerScalar>::Real> + Copy + Debug
{
    type Real: RealField + Copy + Debug;
}

impl<C> TrackerScalar for C
where
    C: ComplexField + Copy + Debug,
    C::RealField: Copy + Debug,
{
    type Real = C::RealField;
}

/// The real type paired with a tracker scalar.
pub type RealOf<C> = <C as TrackerScalar>::Real;

/// A parameterized system H(x, t) whose solution path is tracked as the
/// homotopy parameter t moves from a start value to a target value.
///
/// The tracker consumes this purely as a black-box numeric function; all
/// evaluation methods write into caller-supplied buffers and are infallible.
/// Behavior at non-numeric (NaN/Inf) inputs is the system's responsibility.
pub trait HomotopySystem<C: TrackerScalar> {
    /// Number of space variables.
    fn num_variables(&self) -> usize;

    /// Evaluates the residual H(x, t) into `out`.
    fn residual(&self, x: &DVector<C>, t: C, out: &mut DVector<C>);

    /// Evaluates the space Jacobian dH/dx at (x, t) into `out`.
    fn jacobian(&self, x: &DVector<C>, t: C, out: &mut DMatrix<C>);

    /// Evaluates the time derivative dH/dt at (x, t) into `out`.
    fn time_derivative(&self, x: &DVector<C>, t: C, out: &mut DVector<C>);
}
