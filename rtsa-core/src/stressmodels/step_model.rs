use crate::errors::TsaResult;
use crate::frequency::Frequency;
use crate::parameters::{Parameter, ParameterOwner, ParameterTable};
use crate::rfunc::ResponseFunction;
use crate::series::{date_range, FloatValue, Series, Time};
use serde::{Deserialize, Serialize};

use super::check_parameter_count;

/// A step change starting at `tstart`.
///
/// The contribution is zero up to `tstart` and follows the step response of
/// the response function (evaluated at whole days since `tstart`) afterwards.
/// With the default [`ResponseFunction::One`] this is a sudden jump of size `d`.
/// `tstart` is stored as a parameter that does not vary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepModel {
    name: String,
    rfunc: ResponseFunction,
    tstart: Time,
    parameters: ParameterTable,
}

impl StepModel {
    pub fn new(tstart: Time, name: &str, rfunc: Option<ResponseFunction>) -> Self {
        let rfunc = rfunc.unwrap_or_else(ResponseFunction::one);
        let mut parameters = ParameterTable::from_parameters(rfunc.set_parameters(name));
        parameters.insert(Parameter::new(
            &format!("{}_tstart", name),
            tstart,
            None,
            None,
            false,
            ParameterOwner::StressModel(name.to_string()),
        ));
        Self {
            name: name.to_string(),
            rfunc,
            tstart,
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rfunc(&self) -> &ResponseFunction {
        &self.rfunc
    }

    pub fn tstart(&self) -> Time {
        self.tstart
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

    pub fn simulate(
        &self,
        p: &[FloatValue],
        tmin: Time,
        tmax: Time,
        freq: &Frequency,
    ) -> TsaResult<Series> {
        check_parameter_count(p, self.nparam())?;
        let n = self.rfunc.nparam();
        let tstart = p[n];
        let index = date_range(tmin, tmax, freq);
        let elapsed = index.mapv(|t| (t - tstart).floor());
        let h = self.rfunc.step_at(&p[..n], &elapsed, None)?;
        Ok(Series::from_parts(&self.name, index, h))
    }
}
