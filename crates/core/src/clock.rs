use uom::si::{f64::Time, time::second};

use crate::TimeIncrement;

/// How the solution loop compares the clock against the end time.
///
/// The guard is evaluated before the clock advances, so with either variant
/// the final step may land past `end_time` by less than one step
/// ([`Exclusive`]) or by up to one full step ([`Inclusive`]).
///
/// [`Exclusive`]: EndTimeGuard::Exclusive
/// [`Inclusive`]: EndTimeGuard::Inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum EndTimeGuard {
    /// Continue while `current_time < end_time`.
    ///
    /// Runs `ceil((end_time - start_time) / delta_time)` steps, so the clock
    /// stops on `end_time` whenever the step divides the interval.
    Exclusive,

    /// Continue while `current_time <= end_time`.
    ///
    /// Runs `floor((end_time - start_time) / delta_time) + 1` steps. Existing
    /// parameter files and their reference outputs assume this guard.
    #[default]
    Inclusive,
}

/// The simulation time and step counter.
///
/// The clock is owned by the controller, which is the only caller of
/// [`advance`](Self::advance). Hooks, output gates and solvers receive it by
/// shared reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    start_time: Time,
    end_time: Time,
    delta_time: TimeIncrement,
    current_time: Time,
    step: usize,
}

impl SimulationClock {
    /// Creates a clock positioned at `start_time` with no steps taken.
    #[must_use]
    pub fn new(start_time: Time, end_time: Time, delta_time: TimeIncrement) -> Self {
        Self {
            start_time,
            end_time,
            delta_time,
            current_time: start_time,
            step: 0,
        }
    }

    /// Creates a clock from times given in seconds.
    #[must_use]
    pub fn from_seconds(start_time: f64, end_time: f64, delta_time: TimeIncrement) -> Self {
        Self::new(
            Time::new::<second>(start_time),
            Time::new::<second>(end_time),
            delta_time,
        )
    }

    /// Returns whether the loop should run another step.
    #[must_use]
    pub fn should_continue(&self, guard: EndTimeGuard) -> bool {
        match guard {
            EndTimeGuard::Exclusive => self.current_time < self.end_time,
            EndTimeGuard::Inclusive => self.current_time <= self.end_time,
        }
    }

    /// Advances the clock by one step of `delta_time`.
    pub fn advance(&mut self) {
        self.current_time = self.current_time + self.delta_time;
        self.step += 1;
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> Time {
        self.current_time
    }

    /// Returns the current simulation time in seconds.
    #[must_use]
    pub fn seconds(&self) -> f64 {
        self.current_time.get::<second>()
    }

    /// Returns the time the current step started from.
    ///
    /// Before the first step this is the start time.
    #[must_use]
    pub fn previous_time(&self) -> Time {
        if self.step == 0 {
            self.start_time
        } else {
            self.current_time - *self.delta_time
        }
    }

    #[must_use]
    pub fn start_time(&self) -> Time {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> Time {
        self.end_time
    }

    #[must_use]
    pub fn delta_time(&self) -> TimeIncrement {
        self.delta_time
    }

    /// Returns the number of steps taken, which is also the 1-based index of
    /// the step in progress.
    #[must_use]
    pub fn step(&self) -> usize {
        self.step
    }
}
