use std::{
    fmt,
    ops::{Add, Deref},
};

use thiserror::Error;
use uom::{
    Conversion,
    si::{f64::Time, time},
};

/// A strictly positive step size used to advance the [`SimulationClock`].
///
/// Wrapping the step in its own type moves the "step must be positive" check
/// to configuration time: a clock can never be built with a step that would
/// stall or reverse the solution loop.
///
/// ```
/// use stride_core::TimeIncrement;
/// use uom::si::time::second;
///
/// let dt = TimeIncrement::new::<second>(0.5).unwrap();
/// assert_eq!(dt.to_string(), "0.5 s");
/// ```
///
/// [`SimulationClock`]: crate::SimulationClock
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TimeIncrement(Time);

/// Error returned when constructing an invalid [`TimeIncrement`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimeIncrementError {
    #[error("time step must be greater than zero, got {0} s")]
    NotPositive(f64),

    #[error("time step must be finite, got {0} s")]
    NotFinite(f64),
}

impl TimeIncrement {
    /// Constructs a `TimeIncrement` from a value in the unit `U`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is zero, negative or not finite.
    pub fn new<U>(value: f64) -> Result<Self, TimeIncrementError>
    where
        U: time::Unit + Conversion<f64, T = f64>,
    {
        Self::from_time(Time::new::<U>(value))
    }

    /// Constructs a `TimeIncrement` from a step size in seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if `seconds` is zero, negative or not finite.
    pub fn from_seconds(seconds: f64) -> Result<Self, TimeIncrementError> {
        Self::new::<time::second>(seconds)
    }

    /// Constructs a `TimeIncrement` from an existing [`Time`].
    ///
    /// # Errors
    ///
    /// Returns an error if `time` is zero, negative or not finite.
    pub fn from_time(time: Time) -> Result<Self, TimeIncrementError> {
        let seconds = time.get::<time::second>();
        if !seconds.is_finite() {
            Err(TimeIncrementError::NotFinite(seconds))
        } else if seconds > 0.0 {
            Ok(Self(time))
        } else {
            Err(TimeIncrementError::NotPositive(seconds))
        }
    }

    /// Returns the step size in seconds.
    #[must_use]
    pub fn seconds(&self) -> f64 {
        self.0.get::<time::second>()
    }

    /// Consumes the increment and returns the underlying [`Time`].
    #[must_use]
    pub fn into_inner(self) -> Time {
        self.0
    }
}

impl TryFrom<Time> for TimeIncrement {
    type Error = TimeIncrementError;

    fn try_from(time: Time) -> Result<Self, Self::Error> {
        Self::from_time(time)
    }
}

impl Deref for TimeIncrement {
    type Target = Time;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Add<TimeIncrement> for Time {
    type Output = Time;

    fn add(self, rhs: TimeIncrement) -> Self::Output {
        self + rhs.0
    }
}

impl fmt::Display for TimeIncrement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} s", self.seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::si::time::{millisecond, minute, second};

    #[test]
    fn converts_units_to_seconds() {
        let dt = TimeIncrement::new::<minute>(1.5).unwrap();
        assert_relative_eq!(dt.seconds(), 90.0);

        let dt = TimeIncrement::new::<millisecond>(250.0).unwrap();
        assert_relative_eq!(dt.seconds(), 0.25);
    }

    #[test]
    fn advances_a_time() {
        let t = Time::new::<second>(2.0);
        let dt = TimeIncrement::from_seconds(0.5).unwrap();
        assert_relative_eq!((t + dt).get::<second>(), 2.5);
    }

    #[test]
    fn rejects_zero_and_negative_steps() {
        assert_eq!(
            TimeIncrement::from_seconds(0.0),
            Err(TimeIncrementError::NotPositive(0.0))
        );
        assert_eq!(
            TimeIncrement::from_seconds(-1.0),
            Err(TimeIncrementError::NotPositive(-1.0))
        );
    }

    #[test]
    fn rejects_non_finite_steps() {
        assert!(matches!(
            TimeIncrement::from_seconds(f64::NAN),
            Err(TimeIncrementError::NotFinite(_))
        ));
        assert!(matches!(
            TimeIncrement::from_seconds(f64::INFINITY),
            Err(TimeIncrementError::NotFinite(_))
        ));
    }
}
