use crate::errors::TsaResult;
use crate::frequency::Frequency;
use crate::parameters::ParameterTable;
use crate::recharge::RechargeFunction;
use crate::rfunc::ResponseFunction;
use crate::series::{FloatValue, Series, Time};
use crate::timeseries::TimeSeries;
use crate::utils::convolve;
use serde::{Deserialize, Serialize};

use super::check_parameter_count;

/// Convolution of the recharge computed from precipitation and evaporation.
///
/// The parameters of the response function come first, followed by those of
/// the recharge function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RechargeModel {
    name: String,
    rfunc: ResponseFunction,
    recharge: RechargeFunction,
    prec: TimeSeries,
    evap: TimeSeries,
    parameters: ParameterTable,
}

impl RechargeModel {
    /// Fails if precipitation and evaporation have no timestamps in common
    pub fn new(
        prec: TimeSeries,
        evap: TimeSeries,
        rfunc: ResponseFunction,
        recharge: RechargeFunction,
        name: &str,
    ) -> TsaResult<Self> {
        let (prec, evap) = TimeSeries::intersect(&prec, &evap, name)?;
        let mut parameters = ParameterTable::from_parameters(rfunc.set_parameters(name));
        parameters.extend(recharge.set_parameters(name));
        Ok(Self {
            name: name.to_string(),
            rfunc,
            recharge,
            prec,
            evap,
            parameters,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rfunc(&self) -> &ResponseFunction {
        &self.rfunc
    }

    pub fn recharge(&self) -> &RechargeFunction {
        &self.recharge
    }

    pub fn prec(&self) -> &TimeSeries {
        &self.prec
    }

    pub fn evap(&self) -> &TimeSeries {
        &self.evap
    }

    pub(crate) fn stresses_mut(&mut self) -> [&mut TimeSeries; 2] {
        [&mut self.prec, &mut self.evap]
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut ParameterTable {
        &mut self.parameters
    }

    pub fn nparam(&self) -> usize {
        self.rfunc.nparam() + self.recharge.nparam()
    }

    /// Recharge on the simulation grid
    pub fn get_stress(
        &self,
        p: &[FloatValue],
        tmin: Time,
        tmax: Time,
        freq: &Frequency,
    ) -> TsaResult<Series> {
        check_parameter_count(p, self.nparam())?;
        let prec = self.prec.between(tmin, tmax, freq);
        let evap = self.evap.between(tmin, tmax, freq);
        let recharge = self.recharge.simulate(
            prec.values().view(),
            evap.values().view(),
            &p[self.rfunc.nparam()..],
            freq.dt(),
        )?;
        Ok(Series::from_parts(&self.name, prec.index().clone(), recharge))
    }

    pub fn simulate(
        &self,
        p: &[FloatValue],
        tmin: Time,
        tmax: Time,
        freq: &Frequency,
    ) -> TsaResult<Series> {
        let recharge = self.get_stress(p, tmin, tmax, freq)?;
        let block = self
            .rfunc
            .block(&p[..self.rfunc.nparam()], freq.dt(), None)?;
        let h = convolve(recharge.values().view(), block.view());
        Ok(Series::from_parts(&self.name, recharge.index().clone(), h))
    }
}
