use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Ordered name → value bindings for the parameters of one run.
///
/// A [ParameterSet] is usually obtained from [crate::ModelDefinition::parameters],
/// which pre-populates every declared parameter with its default. Parameters
/// declared without a default hold `None` until they are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    entries: Vec<(String, Option<f64>)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter without checking whether it already exists.
    pub(crate) fn declare(&mut self, name: &str, value: Option<f64>) {
        self.entries.push((name.to_string(), value));
    }

    /// Set the value of a declared parameter.
    ///
    /// Returns [ParameterError::Unknown] when `name` was never declared, so a typo
    /// in an override can not silently leave the default in place.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => {
                *v = Some(value);
                Ok(())
            }
            None => Err(ParameterError::Unknown {
                name: name.to_string(),
            }),
        }
    }

    /// Builder-style [ParameterSet::set].
    pub fn with(mut self, name: &str, value: f64) -> Result<Self, ParameterError> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Insert or replace a value; used when assembling a set by hand.
    pub fn insert(&mut self, name: &str, value: f64) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = Some(value),
            None => self.declare(name, Some(value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (name, value) in iter {
            set.insert(&name.into(), value);
        }
        set
    }
}

/// Per-run covariates such as body weight or dose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Covariates {
    entries: Vec<(String, f64)>,
}

impl Covariates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
