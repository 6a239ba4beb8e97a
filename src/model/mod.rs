//! Loading and validation of compartmental models.
//!
//! A model arrives as a [ModelSpec] (usually deserialized from JSON) or is
//! assembled with a [ModelBuilder]. [ModelDefinition::from_spec] checks the
//! namespace, resolves every identifier against the scope of its section and
//! compiles all expressions once.

pub mod builder;
pub mod definition;
pub mod spec;
mod validation;

pub use builder::ModelBuilder;
pub use definition::ModelDefinition;
pub use spec::{
    Assignment, CaptureSpec, CompartmentSpec, CovariateSpec, DoseSpec, ExpressionOrNumber,
    ModelSpec, OdeSpec, ParameterSpec,
};
