use crate::errors::TsaResult;
use crate::frequency::Frequency;
use crate::parameters::{Parameter, ParameterOwner, ParameterTable};
use crate::rfunc::ResponseFunction;
use crate::series::{FloatValue, Series, Time};
use crate::timeseries::TimeSeries;
use crate::utils::convolve;
use serde::{Deserialize, Serialize};

use super::check_parameter_count;

/// Convolution of two stresses combined as `stress0 + f * stress1`.
///
/// The typical use is precipitation and evaporation, where `f` is the
/// evaporation factor. Both stresses are restricted to the timestamps they
/// have in common.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualStressModel {
    name: String,
    rfunc: ResponseFunction,
    stresses: [TimeSeries; 2],
    parameters: ParameterTable,
}

impl DualStressModel {
    pub fn new(
        stress0: TimeSeries,
        stress1: TimeSeries,
        rfunc: ResponseFunction,
        name: &str,
    ) -> TsaResult<Self> {
        let (stress0, stress1) = TimeSeries::intersect(&stress0, &stress1, name)?;
        let mut parameters = ParameterTable::from_parameters(rfunc.set_parameters(name));
        parameters.insert(Parameter::bounded(
            &format!("{}_f", name),
            -1.0,
            -2.0,
            2.0,
            ParameterOwner::StressModel(name.to_string()),
        ));
        Ok(Self {
            name: name.to_string(),
            rfunc,
            stresses: [stress0, stress1],
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

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut ParameterTable {
        &mut self.parameters
    }

    pub fn nparam(&self) -> usize {
        self.rfunc.nparam() + 1
    }

    /// The combined stress `stress0 + f * stress1` on the simulation grid
    pub fn get_stress(
        &self,
        p: &[FloatValue],
        tmin: Time,
        tmax: Time,
        freq: &Frequency,
    ) -> TsaResult<Series> {
        check_parameter_count(p, self.nparam())?;
        let f = p[p.len() - 1];
        let stress0 = self.stresses[0].between(tmin, tmax, freq);
        let stress1 = self.stresses[1].between(tmin, tmax, freq);
        let combined = stress0.values() + &(stress1.values() * f);
        Ok(Series::from_parts(
            &self.name,
            stress0.index().clone(),
            combined,
        ))
    }

    pub fn simulate(
        &self,
        p: &[FloatValue],
        tmin: Time,
        tmax: Time,
        freq: &Frequency,
    ) -> TsaResult<Series> {
        let stress = self.get_stress(p, tmin, tmax, freq)?;
        let block = self.rfunc.block(&p[..self.rfunc.nparam()], freq.dt(), None)?;
        let h = convolve(stress.values().view(), block.view());
        Ok(Series::from_parts(&self.name, stress.index().clone(), h))
    }
}
