//! Integration of compiled models.
//!
//! A run flows through [Rhs] (the derivative of the model for one set of
//! inputs), the [Integrator] (stiff Rosenbrock stepping between stop times),
//! the [EventScheduler] (boluses and infusion rate changes) and the
//! [CapturePipeline] (reported outputs), driven by
//! [crate::ModelDefinition::simulate].

pub mod batch;
pub mod capture;
pub mod evaluator;
pub mod integrator;
pub mod population;
pub mod runner;
pub mod scheduler;
pub mod settings;

pub use batch::{simulate_batch, BatchOptions, CancelToken};
pub use capture::CapturePipeline;
pub use evaluator::{EvalError, OdeSystem, Rhs};
pub use integrator::{Integrator, SolverPhase, SolverStatistics};
pub use population::Population;
pub use runner::Run;
pub use scheduler::{Action, EventScheduler, ScheduledAction, StopTime};
pub use settings::SolverSettings;
