use serde::{Deserialize, Serialize};

/// A dosing event with its amount already evaluated for one run.
///
/// Events represent discrete inputs into the system:
/// - [Bolus] doses (instantaneous additions to a compartment)
/// - [Infusion]s (zero-order input over a duration)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Event {
    Bolus(Bolus),
    Infusion(Infusion),
}

impl Event {
    /// Get the time of the event
    pub fn time(&self) -> f64 {
        match self {
            Event::Bolus(bolus) => bolus.time,
            Event::Infusion(infusion) => infusion.time,
        }
    }

    /// The compartment index receiving the input
    pub fn input(&self) -> usize {
        match self {
            Event::Bolus(bolus) => bolus.input,
            Event::Infusion(infusion) => infusion.input,
        }
    }
}

/// An instantaneous addition of `amount` to compartment `input` at `time`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Bolus {
    time: f64,
    amount: f64,
    input: usize,
}

impl Bolus {
    pub fn new(time: f64, amount: f64, input: usize) -> Self {
        Bolus {
            time,
            amount,
            input,
        }
    }
    pub fn amount(&self) -> f64 {
        self.amount
    }
    /// The compartment number (zero-indexed) that receives the bolus
    pub fn input(&self) -> usize {
        self.input
    }
    pub fn time(&self) -> f64 {
        self.time
    }
}

/// A constant-rate input of `amount` over `duration`, starting at `time`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Infusion {
    time: f64,
    amount: f64,
    input: usize,
    duration: f64,
}

impl Infusion {
    pub fn new(time: f64, amount: f64, input: usize, duration: f64) -> Self {
        Infusion {
            time,
            amount,
            input,
            duration,
        }
    }
    pub fn amount(&self) -> f64 {
        self.amount
    }
    pub fn input(&self) -> usize {
        self.input
    }
    pub fn time(&self) -> f64 {
        self.time
    }
    pub fn duration(&self) -> f64 {
        self.duration
    }
    /// Time at which the infusion stops
    pub fn end(&self) -> f64 {
        self.time + self.duration
    }
    pub fn rate(&self) -> f64 {
        self.amount / self.duration
    }
}
