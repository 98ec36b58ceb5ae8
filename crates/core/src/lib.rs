//! Core traits and types for Stride.
//!
//! Stride advances a simulation through discrete time steps and invokes
//! pluggable units of work at fixed points of that loop. This crate defines the
//! shared abstractions the driver, the built-in processes and user code build
//! on:
//!
//! - [`SimulationClock`]: the time and step counter owned by the controller
//! - [`Hook`]: a lifecycle hook with one callback per [`Phase`]
//! - [`OutputGate`]: decides per step whether output is written, and writes it
//! - [`Solver`]: the opaque stepping engine invoked once per step
//! - [`Model`]: the shared state hooks and solvers read and mutate
//!
//! Every dynamically dispatched seam reports failures as a [`BoxError`], so
//! concrete implementations keep their own error types.

mod clock;
mod context;
mod hook;
mod model;
mod output;
mod solver;
mod time_increment;

pub use clock::{EndTimeGuard, SimulationClock};
pub use context::{BuildContext, Context};
pub use hook::{Hook, Phase};
pub use model::{Model, ModelError, ModelPart};
pub use output::OutputGate;
pub use solver::Solver;
pub use time_increment::{TimeIncrement, TimeIncrementError};

/// A type-erased error returned across dynamically dispatched seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
