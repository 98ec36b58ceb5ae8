use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Time histories of scalar variables, per model part.
///
/// This is the file format [`JsonOutput`](crate::JsonOutput) writes and
/// [`CheckJsonResults`](crate::CheckJsonResults) reads:
///
/// ```json
/// {
///   "TIME": [0.5, 1.0],
///   "support": { "DISPLACEMENT": [0.1, 0.2] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Results {
    #[serde(rename = "TIME")]
    pub time: Vec<f64>,

    #[serde(flatten)]
    pub parts: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
}

impl Results {
    /// Returns the recorded history of `variable` on `part`.
    #[must_use]
    pub fn series(&self, part: &str, variable: &str) -> Option<&[f64]> {
        self.parts
            .get(part)
            .and_then(|variables| variables.get(variable))
            .map(Vec::as_slice)
    }

    /// Appends one record: the time, then one value per `(variable, value)`.
    pub fn record<'a>(
        &mut self,
        time: f64,
        part: &str,
        values: impl IntoIterator<Item = (&'a str, f64)>,
    ) {
        self.time.push(time);
        let variables = self.parts.entry(part.to_owned()).or_default();
        for (variable, value) in values {
            variables.entry(variable.to_owned()).or_default().push(value);
        }
    }

    /// Linearly interpolates `variable` on `part` at `time`.
    ///
    /// Returns `None` if the variable was never recorded or `time` lies
    /// outside the recorded range.
    #[must_use]
    pub fn interpolate(&self, part: &str, variable: &str, time: f64) -> Option<f64> {
        interpolate(&self.time, self.series(part, variable)?, time)
    }

    /// Returns the first and last recorded times.
    #[must_use]
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((*self.time.first()?, *self.time.last()?))
    }
}

fn interpolate(times: &[f64], values: &[f64], time: f64) -> Option<f64> {
    let len = times.len().min(values.len());
    let (times, values) = (&times[..len], &values[..len]);
    let (&first, &last) = (times.first()?, times.last()?);

    // Absorbs the drift of a clock that accumulates its step.
    let slack = 1e-9 * first.abs().max(last.abs()).max(1.0);
    if time < first - slack || time > last + slack {
        return None;
    }

    let upper = times.partition_point(|&t| t < time);
    if upper == 0 {
        return Some(values[0]);
    }
    if upper == len {
        return Some(values[len - 1]);
    }

    let (t0, t1) = (times[upper - 1], times[upper]);
    let (v0, v1) = (values[upper - 1], values[upper]);
    if t1 == t0 {
        return Some(v1);
    }
    Some(v0 + (time - t0) / (t1 - t0) * (v1 - v0))
}
