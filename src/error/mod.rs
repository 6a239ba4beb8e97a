use thiserror::Error;

/// Errors raised while loading and validating a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("Invalid expression in {context}: {message}")]
    Parse { context: String, message: String },
    #[error("Name '{name}' is declared more than once")]
    DuplicateName { name: String },
    #[error("Name '{name}' is reserved for the solver time")]
    ReservedName { name: String },
    #[error("Undefined identifier '{name}' in {context}")]
    UndefinedIdentifier { name: String, context: String },
    #[error("'{name}' is referenced in {context} before it is defined")]
    ForwardReference { name: String, context: String },
    #[error("'{name}' is not available in {context}")]
    NotInScope { name: String, context: String },
    #[error("Unknown function '{name}' in {context}")]
    UnknownFunction { name: String, context: String },
    #[error("Function '{name}' in {context} takes {expected} argument(s), got {found}")]
    WrongArity {
        name: String,
        context: String,
        expected: usize,
        found: usize,
    },
    #[error("Compartment '{compartment}' has no derivative expression")]
    MissingDerivative { compartment: String },
    #[error("Derivative given for unknown compartment '{name}'")]
    UnknownDerivativeTarget { name: String },
    #[error("Compartment '{compartment}' has more than one derivative expression")]
    DuplicateDerivative { compartment: String },
    #[error("Dose targets unknown compartment '{name}'")]
    UnknownDoseTarget { name: String },
    #[error("Dose into '{compartment}' has invalid time {time}")]
    InvalidDoseTime { compartment: String, time: f64 },
}

/// Errors raised while compiling capture expressions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Invalid capture expression '{capture}': {message}")]
    Parse { capture: String, message: String },
    #[error("Capture '{capture}' references undefined identifier '{name}'")]
    UndefinedIdentifier { capture: String, name: String },
    #[error("Capture '{capture}' references '{name}' before it is defined")]
    ForwardReference { capture: String, name: String },
}

/// Errors raised while preparing a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Unknown parameter '{name}'")]
    Unknown { name: String },
    #[error("Required parameter '{name}' has no value")]
    Missing { name: String },
    #[error("Parameter '{name}' = {value} is outside its domain: {reason}")]
    OutOfDomain {
        name: String,
        value: f64,
        reason: String,
    },
    #[error("'{name}' evaluated to a non-finite value ({value})")]
    NonFinite { name: String, value: f64 },
    #[error("Covariate '{name}' is required but was not supplied")]
    MissingCovariate { name: String },
    #[error("Covariate '{name}' is not declared by the model")]
    UnknownCovariate { name: String },
    #[error("Invalid time grid: {0}")]
    InvalidGrid(String),
    #[error("Invalid dose into '{compartment}': {reason}")]
    InvalidDose { compartment: String, reason: String },
}

/// Why the integrator gave up on a run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    #[error("step size underflow")]
    StepSizeUnderflow,
    #[error("too many consecutive step rejections")]
    TooManyRejections,
    #[error("step budget exceeded")]
    StepBudgetExceeded,
    #[error("wall-clock budget exceeded")]
    WallClockExceeded,
    #[error("non-finite derivative")]
    NonFiniteDerivative,
}

/// A run aborted during integration, with the last accepted time and state.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Integration failed at t = {time}: {reason}")]
pub struct IntegrationFailure {
    pub reason: FailureReason,
    pub time: f64,
    pub state: Vec<f64>,
}

#[derive(Error, Debug)]
pub enum MassbalError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Integration(#[from] IntegrationFailure),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Run was cancelled before it started")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integration_failure_names_its_reason() {
        let failure = IntegrationFailure {
            reason: FailureReason::TooManyRejections,
            time: 2.5,
            state: vec![1.0],
        };
        assert_eq!(
            failure.to_string(),
            "Integration failed at t = 2.5: too many consecutive step rejections"
        );
        assert_eq!(
            MassbalError::from(failure).to_string(),
            "Integration failed at t = 2.5: too many consecutive step rejections"
        );
    }
}
