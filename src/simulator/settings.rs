use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Configuration of the stiff integrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Relative tolerance (default: 1e-6).
    pub rtol: f64,
    /// Absolute tolerance (default: 1e-9).
    pub atol: f64,
    /// Initial step size. `None` estimates it from the initial derivative.
    pub h0: Option<f64>,
    /// Absolute floor for the step size (default: 0). A run fails with a step
    /// size underflow when a step would drop below `max(h_min, 16·ε·|t|)`.
    pub h_min: f64,
    /// Largest step. `None` leaves steps bounded only by stop times.
    pub h_max: Option<f64>,
    /// Total step attempts allowed per run (default: 500 000).
    pub max_steps: usize,
    /// Consecutive rejected attempts allowed (default: 50).
    pub max_rejections: usize,
    /// Wall-clock budget per run, in seconds.
    pub max_wall_time: Option<f64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            h0: None,
            h_min: 0.0,
            h_max: None,
            max_steps: 500_000,
            max_rejections: 50,
            max_wall_time: None,
        }
    }
}

impl SolverSettings {
    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_wall_time(mut self, seconds: f64) -> Self {
        self.max_wall_time = Some(seconds);
        self
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ParameterError::OutOfDomain {
                    name: name.to_string(),
                    value,
                    reason: "must be finite and > 0".to_string(),
                })
            }
        };
        positive("rtol", self.rtol)?;
        positive("atol", self.atol)?;
        if !(self.h_min.is_finite() && self.h_min >= 0.0) {
            return Err(ParameterError::OutOfDomain {
                name: "h_min".to_string(),
                value: self.h_min,
                reason: "must be finite and >= 0".to_string(),
            });
        }
        if let Some(h0) = self.h0 {
            positive("h0", h0)?;
        }
        if let Some(h_max) = self.h_max {
            positive("h_max", h_max)?;
        }
        if let Some(wall) = self.max_wall_time {
            positive("max_wall_time", wall)?;
        }
        if self.max_steps == 0 {
            return Err(ParameterError::OutOfDomain {
                name: "max_steps".to_string(),
                value: 0.0,
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: SolverSettings = serde_json::from_str(r#"{ "rtol": 1e-8 }"#).unwrap();
        assert_eq!(settings.rtol, 1e-8);
        assert_eq!(settings.atol, 1e-9);
        assert_eq!(settings.max_steps, 500_000);
        assert!(settings.h0.is_none());
    }

    #[test]
    fn rejects_non_positive_tolerances() {
        let settings = SolverSettings::default().with_tolerances(0.0, 1e-9);
        assert!(settings.validate().is_err());
        assert!(SolverSettings::default().validate().is_ok());
    }
}
