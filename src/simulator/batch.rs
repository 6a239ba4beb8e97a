use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::OutputTable;
use crate::error::MassbalError;
use crate::model::ModelDefinition;
use crate::simulator::runner::Run;
use crate::simulator::settings::SolverSettings;

/// Shared flag used to stop a batch early.
///
/// Cancellation is checked before each run starts; runs already in progress
/// finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for [simulate_batch].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Show a progress bar on stderr
    pub progress: bool,
    #[serde(skip)]
    pub cancel: Option<CancelToken>,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Simulate independent runs of one model in parallel.
///
/// Results are returned in the order of `runs`. A failing run only affects
/// its own entry.
pub fn simulate_batch(
    model: &ModelDefinition,
    runs: &[Run],
    settings: &SolverSettings,
    options: &BatchOptions,
) -> Vec<Result<OutputTable, MassbalError>> {
    let start = Instant::now();
    let bar = if options.progress {
        let bar = ProgressBar::new(runs.len() as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{prefix} [{bar:40}] {pos}/{len} ({eta})")
        {
            bar.set_style(style);
        }
        bar.set_prefix(model.name().to_string());
        Some(bar)
    } else {
        None
    };

    let results: Vec<Result<OutputTable, MassbalError>> = runs
        .par_iter()
        .enumerate()
        .map(|(i, run)| {
            if options.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                return Err(MassbalError::Cancelled);
            }
            let result = model.simulate(run, settings);
            if let Err(e) = &result {
                warn!(model = %model.name(), run = i, error = %e, "run failed");
            }
            if let Some(bar) = &bar {
                bar.inc(1);
            }
            result
        })
        .collect();

    if let Some(bar) = bar {
        bar.finish();
    }
    let failed = results.iter().filter(|r| r.is_err()).count();
    info!(
        model = %model.name(),
        runs = runs.len(),
        failed,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "batch finished"
    );
    results
}
