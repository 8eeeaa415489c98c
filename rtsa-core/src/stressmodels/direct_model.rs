use crate::errors::TsaResult;
use crate::frequency::Frequency;
use crate::parameters::ParameterTable;
use crate::rfunc::ResponseFunction;
use crate::series::{date_range, FloatValue, Series, Time};
use crate::timeseries::TimeSeries;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::check_parameter_count;

/// Superposition of step responses to every change in the stress level.
///
/// No convolution is involved: the stress is differenced and each nonzero
/// change starts a step response of that magnitude. The cost is
/// O(changes x simulation length), so this model is meant for stresses that
/// change level only occasionally.
///
/// Every value of the regular stress holds over the step that ends at its
/// timestamp, so the change from `s[k - 1]` to `s[k]` happens at `t[k - 1]`.
/// Before its first timestamp the stress is taken to be zero, which makes the
/// first value a change of `s[0]` one step before `t[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectResponseModel {
    name: String,
    rfunc: ResponseFunction,
    stress: TimeSeries,
    parameters: ParameterTable,
}

impl DirectResponseModel {
    pub fn new(stress: TimeSeries, rfunc: ResponseFunction, name: &str) -> Self {
        let parameters = ParameterTable::from_parameters(rfunc.set_parameters(name));
        Self {
            name: name.to_string(),
            rfunc,
            stress,
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rfunc(&self) -> &ResponseFunction {
        &self.rfunc
    }

    pub fn stress(&self) -> &TimeSeries {
        &self.stress
    }

    pub(crate) fn stress_mut(&mut self) -> &mut TimeSeries {
        &mut self.stress
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut ParameterTable {
        &mut self.parameters
    }

    /// Times and magnitudes of the level changes of the stress
    pub fn events(&self) -> Vec<(Time, FloatValue)> {
        let series = self.stress.series();
        let (index, values) = (series.index(), series.values());
        if index.is_empty() {
            return vec![];
        }
        let step = self
            .stress
            .freq()
            .map(|f| f.dt())
            .or_else(|| (index.len() > 1).then(|| index[1] - index[0]))
            .unwrap_or(1.0);
        let first = (index[0] - step, values[0]);
        std::iter::once(first)
            .chain((1..index.len()).map(|k| (index[k - 1], values[k] - values[k - 1])))
            .filter(|(_, change)| *change != 0.0 && change.is_finite())
            .collect()
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
        for (t_event, change) in self.events() {
            if t_event >= tmax {
                break;
            }
            let elapsed = index.mapv(|t| t - t_event);
            let response = self.rfunc.step_at(p, &elapsed, None)?;
            h.scaled_add(change, &response);
        }
        Ok(Series::from_parts(&self.name, index, h))
    }
}
