use crate::errors::TsaResult;
use crate::frequency::Frequency;
use crate::parameters::ParameterTable;
use crate::rfunc::ResponseFunction;
use crate::series::{FloatValue, Series, Time};
use crate::timeseries::TimeSeries;
use crate::utils::convolve;
use serde::{Deserialize, Serialize};

/// Convolution of a single stress with a response function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleStressModel {
    name: String,
    rfunc: ResponseFunction,
    stress: TimeSeries,
    parameters: ParameterTable,
}

impl SingleStressModel {
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

    /// Contribution on the grid from `tmin` through `tmax`
    pub fn simulate(
        &self,
        p: &[FloatValue],
        tmin: Time,
        tmax: Time,
        freq: &Frequency,
    ) -> TsaResult<Series> {
        let stress = self.stress.between(tmin, tmax, freq);
        let block = self.rfunc.block(p, freq.dt(), None)?;
        let h = convolve(stress.values().view(), block.view());
        Ok(Series::from_parts(&self.name, stress.index().clone(), h))
    }
}
