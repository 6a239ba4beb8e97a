use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Most regular grid points a single grid may produce.
pub const MAX_GRID_POINTS: usize = 10_000_000;

/// Reporting grid of a run: `start`, `start + delta`, ... up to `end`,
/// plus any extra times in `add`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeGrid {
    pub start: f64,
    pub delta: f64,
    pub end: f64,
    pub add: Vec<f64>,
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self {
            start: 0.0,
            delta: 1.0,
            end: 24.0,
            add: Vec::new(),
        }
    }
}

impl TimeGrid {
    pub fn new(start: f64, delta: f64, end: f64) -> Self {
        Self {
            start,
            delta,
            end,
            add: Vec::new(),
        }
    }

    /// Grid from 0 to `end` every `delta`.
    pub fn until(end: f64, delta: f64) -> Self {
        Self::new(0.0, delta, end)
    }

    pub fn with_times(mut self, times: &[f64]) -> Self {
        self.add.extend_from_slice(times);
        self
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if !self.start.is_finite() || !self.end.is_finite() || !self.delta.is_finite() {
            return Err(ParameterError::InvalidGrid(
                "start, delta and end must be finite".to_string(),
            ));
        }
        if self.delta <= 0.0 {
            return Err(ParameterError::InvalidGrid(format!(
                "delta must be > 0, got {}",
                self.delta
            )));
        }
        if self.end < self.start {
            return Err(ParameterError::InvalidGrid(format!(
                "end ({}) is before start ({})",
                self.end, self.start
            )));
        }
        let intervals = (self.end - self.start) / self.delta;
        if !(intervals < MAX_GRID_POINTS as f64) {
            return Err(ParameterError::InvalidGrid(format!(
                "delta {} gives more than {} points between {} and {}",
                self.delta, MAX_GRID_POINTS, self.start, self.end
            )));
        }
        if let Some(t) = self
            .add
            .iter()
            .find(|t| !t.is_finite() || **t < self.start || **t > self.end)
        {
            return Err(ParameterError::InvalidGrid(format!(
                "additional time {} is outside [{}, {}]",
                t, self.start, self.end
            )));
        }
        Ok(())
    }

    /// Sorted, de-duplicated report times.
    pub fn report_times(&self) -> Result<Vec<f64>, ParameterError> {
        self.validate()?;
        // multiply rather than accumulate so the last point does not drift
        let n = ((self.end - self.start) / self.delta + 1e-9).floor() as usize;
        let mut times: Vec<f64> = (0..=n)
            .map(|i| (self.start + i as f64 * self.delta).min(self.end))
            .collect();
        times.extend(self.add.iter().copied());
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup_by(|a, b| same_time(*a, *b));
        Ok(times)
    }

    /// The final time of the run.
    pub fn horizon(&self) -> f64 {
        self.end
    }
}

/// Two times closer than this relative tolerance denote the same instant.
pub(crate) fn same_time(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
}
