//! Built-in processes, output gates and solvers for Stride.
//!
//! Each type can be built programmatically or from the JSON block that
//! configures it. The constructors that take JSON all have the shape
//! `fn(&serde_json::Value, &BuildContext) -> Result<Self, _>`, which is what
//! the driver's registry expects of a factory.
//!
//! | Name | Kind | Type |
//! |------|------|------|
//! | `forward_euler` | solver | [`ForwardEuler`] |
//! | `assign_scalar_variable` | process | [`AssignScalarVariable`] |
//! | `json_output` | process | [`JsonOutput`] |
//! | `check_json_results` | process | [`CheckJsonResults`] |
//! | `tabular` | output gate | [`TabularOutput`] |

mod assign;
mod check;
mod euler;
mod json_output;
mod results;
mod tabular;

pub use assign::{AssignError, AssignScalarVariable, Interval, IntervalError};
pub use check::{CheckError, CheckJsonResults};
pub use euler::{ForwardEuler, ForwardEulerError, StateVariable};
pub use json_output::{JsonOutput, JsonOutputError};
pub use results::Results;
pub use tabular::{OutputControl, TabularError, TabularOutput};
