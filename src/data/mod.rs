pub mod event;
pub mod grid;
pub mod output;
pub mod parameters;

pub use event::*;
pub use grid::TimeGrid;
pub use output::{OutputRow, OutputTable};
pub use parameters::{Covariates, ParameterSet};
