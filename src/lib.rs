//! Simulation of stiff compartmental mass-balance models.
//!
//! Models are declared as data: compartments, parameters, covariates, ordered
//! MAIN and ODE assignments, one derivative per compartment, captured outputs
//! and a dosing rule. They are validated and compiled once, then simulated
//! with an L-stable Rosenbrock integrator, alone or in parallel batches.
//!
//! ```
//! use massbal::prelude::*;
//!
//! let model = ModelDefinition::from_json(r#"{
//!     "name": "decay",
//!     "grid": { "delta": 1, "end": 10 },
//!     "compartments": [ { "name": "A", "init": 1 } ],
//!     "parameters": [ { "name": "k", "value": 0.5 } ],
//!     "ode": { "derivatives": [ { "name": "A", "expr": "-k * A" } ] }
//! }"#).unwrap();
//!
//! let run = Run::new(model.parameters());
//! let table = model.simulate(&run, &SolverSettings::default()).unwrap();
//! assert_eq!(table.len(), 11);
//! ```

pub mod data;
pub mod error;
pub mod expr;
pub mod model;
pub mod simulator;

pub use crate::data::{Covariates, OutputRow, OutputTable, ParameterSet, TimeGrid};
pub use crate::error::{
    CaptureError, DefinitionError, FailureReason, IntegrationFailure, MassbalError, ParameterError,
};
pub use crate::model::{ModelBuilder, ModelDefinition, ModelSpec};
pub use crate::simulator::{
    simulate_batch, BatchOptions, CancelToken, Population, Run, SolverSettings, SolverStatistics,
};

pub mod prelude {
    pub mod data {
        pub use crate::data::{Bolus, Covariates, Event, Infusion, OutputTable, ParameterSet, TimeGrid};
    }
    pub mod simulator {
        pub use crate::simulator::{
            CapturePipeline, EventScheduler, Integrator, OdeSystem, Rhs, SolverPhase,
        };
    }

    pub use crate::data::{Covariates, OutputTable, ParameterSet, TimeGrid};
    pub use crate::error::MassbalError;
    pub use crate::model::{ModelBuilder, ModelDefinition, ModelSpec};
    pub use crate::simulator::{
        simulate_batch, BatchOptions, CancelToken, Population, Run, SolverSettings,
    };
}
