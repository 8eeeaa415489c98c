use crate::errors::{TsaError, TsaResult};
use crate::frequency::Frequency;
use crate::parameters::ParameterTable;
use crate::rfunc::ResponseFunction;
use crate::series::{date_range, FloatValue, Series, Time};
use crate::timeseries::TimeSeries;
use crate::utils::convolve;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::check_parameter_count;

/// Several wells sharing one response function.
///
/// Each stress has its own distance to the observation point. The
/// contribution is the sum of the convolution of every stress with the block
/// response evaluated at its distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellModel {
    name: String,
    rfunc: ResponseFunction,
    stresses: Vec<TimeSeries>,
    distances: Vec<f64>,
    parameters: ParameterTable,
}

impl WellModel {
    pub fn new(
        stresses: Vec<TimeSeries>,
        rfunc: ResponseFunction,
        name: &str,
        distances: Vec<f64>,
    ) -> TsaResult<Self> {
        if stresses.is_empty() {
            return Err(TsaError::Settings(format!(
                "well model '{}' needs at least one stress",
                name
            )));
        }
        if stresses.len() != distances.len() {
            return Err(TsaError::Settings(format!(
                "well model '{}' has {} stresses but {} distances",
                name,
                stresses.len(),
                distances.len()
            )));
        }
        let start = stresses.iter().map(|s| s.tmin()).fold(f64::NEG_INFINITY, f64::max);
        let end = stresses.iter().map(|s| s.tmax()).fold(f64::INFINITY, f64::min);
        if start > end {
            return Err(TsaError::EmptyIntersection {
                name: name.to_string(),
            });
        }
        let parameters = ParameterTable::from_parameters(rfunc.set_parameters(name));
        Ok(Self {
            name: name.to_string(),
            rfunc,
            stresses,
            distances,
            parameters,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rfunc(&self) -> &ResponseFunction {
        &self.rfunc
    }

    pub fn stresses(&self) -> &[TimeSeries] {
        &self.stresses
    }

    pub(crate) fn stresses_mut(&mut self) -> &mut [TimeSeries] {
        &mut self.stresses
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut ParameterTable {
        &mut self.parameters
    }

    pub fn simulate(
        &self,
        p: &[FloatValue],
        tmin: Time,
        tmax: Time,
        freq: &Frequency,
    ) -> TsaResult<Series> {
        check_parameter_count(p, self.rfunc.nparam())?;
        let index = date_range(tmin, tmax, freq);
        let mut h: Array1<FloatValue> = Array1::zeros(index.len());
        for (stress, r) in self.stresses.iter().zip(self.distances.iter()) {
            let block = self.rfunc.block(p, freq.dt(), Some(*r))?;
            let stress = stress.between(tmin, tmax, freq);
            h += &convolve(stress.values().view(), block.view());
        }
        Ok(Series::from_parts(&self.name, index, h))
    }
}
