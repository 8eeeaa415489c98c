//! Transforms applied to the simulated series after the constant has been added.

use crate::errors::TsaResult;
use crate::parameters::{Parameter, ParameterOwner};
use crate::series::{FloatValue, Series};
use crate::stressmodels::check_parameter_count;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    Threshold(ThresholdTransform),
}

impl Transform {
    pub fn name(&self) -> &str {
        match self {
            Transform::Threshold(t) => &t.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Transform::Threshold(_) => "ThresholdTransform",
        }
    }

    pub fn nparam(&self) -> usize {
        match self {
            Transform::Threshold(_) => 2,
        }
    }

    /// Parameters, with defaults derived from the observed series
    pub fn set_parameters(&self, oseries: &Series) -> Vec<Parameter> {
        match self {
            Transform::Threshold(t) => t.set_parameters(oseries),
        }
    }

    pub fn simulate(&self, h: &Series, p: &[FloatValue]) -> TsaResult<Series> {
        check_parameter_count(p, self.nparam())?;
        match self {
            Transform::Threshold(t) => Ok(t.simulate(h, p)),
        }
    }
}

impl From<ThresholdTransform> for Transform {
    fn from(value: ThresholdTransform) -> Self {
        Transform::Threshold(value)
    }
}

/// Damps the simulated series above a threshold level.
///
/// Above `p[0]` the series rises by a factor `p[1]` only:
/// `h = p[0] + (h - p[0]) * p[1]`. This mimics surface drainage that limits
/// how high groundwater levels can rise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTransform {
    name: String,
    value: Option<FloatValue>,
    vmin: Option<FloatValue>,
    vmax: Option<FloatValue>,
}

impl Default for ThresholdTransform {
    fn default() -> Self {
        Self::new("transform")
    }
}

impl ThresholdTransform {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            vmin: None,
            vmax: None,
        }
    }

    /// Use a fixed initial threshold and bounds instead of ones derived from the observations
    pub fn with_level(mut self, value: FloatValue, vmin: FloatValue, vmax: FloatValue) -> Self {
        self.value = Some(value);
        self.vmin = Some(vmin);
        self.vmax = Some(vmax);
        self
    }

    fn set_parameters(&self, oseries: &Series) -> Vec<Parameter> {
        let owner = ParameterOwner::Transform;
        vec![
            Parameter::new(
                &format!("{}_1", self.name),
                self.value.unwrap_or_else(|| oseries.mean()),
                Some(self.vmin.unwrap_or_else(|| oseries.min())),
                Some(self.vmax.unwrap_or_else(|| oseries.max())),
                true,
                owner.clone(),
            ),
            Parameter::bounded(&format!("{}_2", self.name), 0.5, 0.0, 1.0, owner),
        ]
    }

    fn simulate(&self, h: &Series, p: &[FloatValue]) -> Series {
        let (level, factor) = (p[0], p[1]);
        h.map_values(|v| if v > level { level + (v - level) * factor } else { v })
    }
}
