//! Noise model with exponential decay of the residuals.
//!
//! Residuals of a time series model are usually autocorrelated. Assuming the
//! correlation decays exponentially with the time between observations, the
//! innovations
//!
//! $$ v_i = r_i - e^{-\Delta t_i / \alpha} r_{i-1} $$
//!
//! are approximately independent and can be minimised instead of the residuals.
//! This works on irregular time steps as well.

use crate::errors::{TsaError, TsaResult};
use crate::parameters::{Parameter, ParameterOwner};
use crate::series::{FloatValue, Series};
use ndarray::{Array, Array1};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseModel {
    name: String,
}

impl Default for NoiseModel {
    fn default() -> Self {
        Self {
            name: "noise".to_string(),
        }
    }
}

impl NoiseModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nparam(&self) -> usize {
        1
    }

    pub fn set_parameters(&self) -> Vec<Parameter> {
        vec![Parameter::bounded(
            &format!("{}_alpha", self.name),
            14.0,
            0.0,
            5000.0,
            ParameterOwner::NoiseModel,
        )]
    }

    /// Innovations of the residual series.
    ///
    /// `delt[i]` is the time in days since residual `i - 1` (`delt[0]` is
    /// ignored). A non-positive `alpha` means no correlation, and the
    /// innovations are the residuals.
    pub fn simulate(
        &self,
        res: &Series,
        delt: &Array1<FloatValue>,
        p: &[FloatValue],
    ) -> TsaResult<Series> {
        if p.len() != 1 {
            return Err(TsaError::ParameterCount {
                expected: 1,
                got: p.len(),
            });
        }
        if delt.len() != res.len() {
            return Err(TsaError::Error(format!(
                "{} time steps given for {} residuals",
                delt.len(),
                res.len()
            )));
        }
        let alpha = p[0];
        let r = res.values();
        let innovations = Array::from_iter((0..r.len()).map(|i| {
            if i == 0 || alpha <= 0.0 {
                r[i]
            } else {
                r[i] - (-delt[i] / alpha).exp() * r[i - 1]
            }
        }));
        Ok(Series::from_parts("Innovations", res.index().clone(), innovations))
    }

    pub fn dump(&self) -> NoiseModelDump {
        NoiseModelDump {
            r#type: "NoiseModel".to_string(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseModelDump {
    pub r#type: String,
    pub name: String,
}
