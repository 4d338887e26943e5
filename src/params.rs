use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SlicerError};

pub const THRESHOLD: &str = "threshold";
pub const SMOOTHING: &str = "smoothing";
pub const MIN_AREA: &str = "min_area";
pub const BORDER_MARGIN: &str = "border_margin";
pub const MERGE_TOLERANCE: &str = "merge_tolerance";

/// A bounded, steppable numeric knob
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    name: String,
    label: String,
    min: f64,
    max: f64,
    step: f64,
    default: f64,
    current: f64,
}

impl Parameter {
    /// Create a parameter, checking its bounds
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        min: f64,
        max: f64,
        step: f64,
        default: f64,
    ) -> Result<Self> {
        let name = name.into();
        if ![min, max, step, default].iter().all(|v| v.is_finite()) {
            return Err(SlicerError::InvalidConfiguration(format!(
                "{}: bounds must be finite",
                name
            )));
        }
        if min >= max {
            return Err(SlicerError::InvalidConfiguration(format!(
                "{}: min ({}) must be below max ({})",
                name, min, max
            )));
        }
        if step <= 0.0 {
            return Err(SlicerError::InvalidConfiguration(format!(
                "{}: step must be positive, got {}",
                name, step
            )));
        }
        if default < min || default > max {
            return Err(SlicerError::InvalidConfiguration(format!(
                "{}: default {} outside [{}, {}]",
                name, default, min, max
            )));
        }

        Ok(Self {
            name,
            label: label.into(),
            min,
            max,
            step,
            default,
            current: default,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Assign a new value, snapped onto the step grid anchored at the default.
    /// Returns the value actually stored.
    pub fn set(&mut self, value: f64) -> Result<f64> {
        if !value.is_finite() || value < self.min || value > self.max {
            return Err(SlicerError::InvalidValue {
                name: self.name.clone(),
                value,
            });
        }
        self.current = self.snap(value);
        Ok(self.current)
    }

    pub fn step_up(&mut self) -> f64 {
        self.current = self.snap((self.current + self.step).min(self.max));
        self.current
    }

    pub fn step_down(&mut self) -> f64 {
        self.current = self.snap((self.current - self.step).max(self.min));
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.default;
    }

    fn snap(&self, value: f64) -> f64 {
        let steps = ((value - self.default) / self.step).round();
        let snapped = self.default + steps * self.step;
        // The grid may overshoot a bound that is not a whole number of steps away
        if snapped > self.max {
            snapped - self.step
        } else if snapped < self.min {
            snapped + self.step
        } else {
            snapped
        }
        .clamp(self.min, self.max)
    }
}

/// Ordered collection of parameters; iteration order is presentation order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    /// Build a set from already validated parameters, rejecting duplicate names
    pub fn new(params: Vec<Parameter>) -> Result<Self> {
        for (i, p) in params.iter().enumerate() {
            if params[..i].iter().any(|q| q.name == p.name) {
                return Err(SlicerError::InvalidConfiguration(format!(
                    "duplicate parameter name: {}",
                    p.name
                )));
            }
        }
        Ok(Self { params })
    }

    /// The knobs recognised by the detection engine
    pub fn detection() -> Result<Self> {
        Self::new(vec![
            Parameter::new(THRESHOLD, "Background threshold", 0.0, 255.0, 1.0, 220.0)?,
            Parameter::new(SMOOTHING, "Smoothing (sigma)", 0.0, 10.0, 0.5, 0.0)?,
            Parameter::new(MIN_AREA, "Minimum photo area (px)", 0.0, 10_000_000.0, 500.0, 5_000.0)?,
            Parameter::new(BORDER_MARGIN, "Border margin (px)", -50.0, 50.0, 1.0, 0.0)?,
            Parameter::new(MERGE_TOLERANCE, "Merge tolerance (px)", 0.0, 200.0, 1.0, 5.0)?,
        ])
    }

    pub fn get(&self, name: &str) -> Result<&Parameter> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| SlicerError::NotFound(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        self.params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| SlicerError::NotFound(name.to_string()))
    }

    /// Current value of a parameter
    pub fn value(&self, name: &str) -> Result<f64> {
        self.get(name).map(Parameter::current)
    }

    pub fn set(&mut self, name: &str, value: f64) -> Result<f64> {
        self.get_mut(name)?.set(value)
    }

    pub fn reset_all(&mut self) {
        for p in &mut self.params {
            p.reset();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Apply name → value overrides in presentation order.
    /// Names the set does not know are rejected before anything is changed.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, f64>) -> Result<()> {
        if let Some(unknown) = overrides.keys().find(|k| self.get(k).is_err()) {
            return Err(SlicerError::NotFound(unknown.clone()));
        }
        for p in &mut self.params {
            if let Some(&value) = overrides.get(&p.name) {
                let stored = p.set(value)?;
                debug!(name = %p.name, requested = value, stored, "Parameter override applied");
            }
        }
        Ok(())
    }

    /// Load overrides from a JSON object of name → number
    pub fn load_overrides(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let overrides: BTreeMap<String, f64> = serde_json::from_str(&text)?;
        self.apply_overrides(&overrides)
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}
