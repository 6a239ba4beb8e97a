use std::io::Write;

use ndarray::Array2;
use serde::Serialize;

use crate::error::MassbalError;
use crate::simulator::SolverStatistics;

/// One reported time point: compartment amounts followed by capture values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub time: f64,
    pub states: Vec<f64>,
    pub captures: Vec<f64>,
}

/// The result of a run: one row per report time.
///
/// Columns are `time`, then one column per compartment in declaration order,
/// then one column per capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputTable {
    compartments: Vec<String>,
    captures: Vec<String>,
    rows: Vec<OutputRow>,
    statistics: SolverStatistics,
}

impl OutputTable {
    pub(crate) fn new(compartments: Vec<String>, captures: Vec<String>, capacity: usize) -> Self {
        Self {
            compartments,
            captures,
            rows: Vec::with_capacity(capacity),
            statistics: SolverStatistics::default(),
        }
    }

    pub(crate) fn push(&mut self, row: OutputRow) {
        self.rows.push(row);
    }

    pub(crate) fn set_statistics(&mut self, statistics: SolverStatistics) {
        self.statistics = statistics;
    }

    /// Column names, starting with `time`.
    pub fn columns(&self) -> Vec<&str> {
        std::iter::once("time")
            .chain(self.compartments.iter().map(String::as_str))
            .chain(self.captures.iter().map(String::as_str))
            .collect()
    }

    pub fn compartments(&self) -> &[String] {
        &self.compartments
    }

    pub fn capture_names(&self) -> &[String] {
        &self.captures
    }

    pub fn rows(&self) -> &[OutputRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.time).collect()
    }

    pub fn statistics(&self) -> &SolverStatistics {
        &self.statistics
    }

    /// Values of a named column (`time`, a compartment or a capture).
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        if name == "time" {
            return Some(self.times());
        }
        if let Some(i) = self.compartments.iter().position(|c| c == name) {
            return Some(self.rows.iter().map(|r| r.states[i]).collect());
        }
        let i = self.captures.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r.captures[i]).collect())
    }

    /// Dense `rows x columns` matrix in [OutputTable::columns] order.
    pub fn to_array(&self) -> Array2<f64> {
        let ncols = 1 + self.compartments.len() + self.captures.len();
        let nstates = self.compartments.len();
        Array2::from_shape_fn((self.rows.len(), ncols), |(i, j)| {
            let row = &self.rows[i];
            match j {
                0 => row.time,
                j if j <= nstates => row.states[j - 1],
                j => row.captures[j - 1 - nstates],
            }
        })
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), MassbalError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.columns())?;
        for row in &self.rows {
            let record = std::iter::once(row.time)
                .chain(row.states.iter().copied())
                .chain(row.captures.iter().copied())
                .map(|v| v.to_string());
            wtr.write_record(record)?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}
