//! Stress models turn stresses into a contribution to the simulated series.
//!
//! Every stress model owns its stresses, a response function (where one
//! applies) and the parameters of both. Given its slice of the parameter
//! vector, a stress model simulates its contribution on a regular grid
//! from `tmin` through `tmax`. Stresses are extended over that grid with
//! their fill rules first, so the grid may start well before the first
//! stress value (warmup).
//!
//! The kinds of stress model form the closed set [`StressModel`].

mod constant;
mod direct_model;
mod dual_stress_model;
mod recharge_model;
mod step_model;
mod stress_model;
mod well_model;

pub use constant::Constant;
pub use direct_model::DirectResponseModel;
pub use dual_stress_model::DualStressModel;
pub use recharge_model::RechargeModel;
pub use step_model::StepModel;
pub use stress_model::SingleStressModel;
pub use well_model::WellModel;

use crate::errors::{TsaError, TsaResult};
use crate::frequency::Frequency;
use crate::parameters::ParameterTable;
use crate::rfunc::ResponseFunction;
use crate::series::{FloatValue, Series, Time};
use crate::timeseries::{TimeSeries, TimeSeriesDump};
use serde::{Deserialize, Serialize};

pub(crate) fn check_parameter_count(p: &[FloatValue], expected: usize) -> TsaResult<()> {
    if p.len() == expected {
        Ok(())
    } else {
        Err(TsaError::ParameterCount {
            expected,
            got: p.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StressModel {
    Convolution(SingleStressModel),
    Dual(DualStressModel),
    Recharge(RechargeModel),
    Well(WellModel),
    Step(StepModel),
    Direct(DirectResponseModel),
    Constant(Constant),
}

macro_rules! dispatch {
    ($self:expr, $sm:ident => $body:expr) => {
        match $self {
            StressModel::Convolution($sm) => $body,
            StressModel::Dual($sm) => $body,
            StressModel::Recharge($sm) => $body,
            StressModel::Well($sm) => $body,
            StressModel::Step($sm) => $body,
            StressModel::Direct($sm) => $body,
            StressModel::Constant($sm) => $body,
        }
    };
}

impl StressModel {
    pub fn name(&self) -> &str {
        dispatch!(self, sm => sm.name())
    }

    /// Name of the kind of stress model
    pub fn kind(&self) -> &'static str {
        match self {
            StressModel::Convolution(_) => "StressModel",
            StressModel::Dual(_) => "StressModel2",
            StressModel::Recharge(_) => "RechargeModel",
            StressModel::Well(_) => "WellModel",
            StressModel::Step(_) => "StepModel",
            StressModel::Direct(_) => "DirectResponseModel",
            StressModel::Constant(_) => "Constant",
        }
    }

    pub fn parameters(&self) -> &ParameterTable {
        dispatch!(self, sm => sm.parameters())
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut ParameterTable {
        dispatch!(self, sm => sm.parameters_mut())
    }

    pub fn nparam(&self) -> usize {
        self.parameters().len()
    }

    pub fn rfunc(&self) -> Option<&ResponseFunction> {
        match self {
            StressModel::Convolution(sm) => Some(sm.rfunc()),
            StressModel::Dual(sm) => Some(sm.rfunc()),
            StressModel::Recharge(sm) => Some(sm.rfunc()),
            StressModel::Well(sm) => Some(sm.rfunc()),
            StressModel::Step(sm) => Some(sm.rfunc()),
            StressModel::Direct(sm) => Some(sm.rfunc()),
            StressModel::Constant(_) => None,
        }
    }

    /// The stresses owned by this model
    pub fn stresses(&self) -> Vec<&TimeSeries> {
        match self {
            StressModel::Convolution(sm) => vec![sm.stress()],
            StressModel::Dual(sm) => sm.stresses().iter().collect(),
            StressModel::Recharge(sm) => vec![sm.prec(), sm.evap()],
            StressModel::Well(sm) => sm.stresses().iter().collect(),
            StressModel::Direct(sm) => vec![sm.stress()],
            StressModel::Step(_) | StressModel::Constant(_) => vec![],
        }
    }

    fn stresses_mut(&mut self) -> Vec<&mut TimeSeries> {
        match self {
            StressModel::Convolution(sm) => vec![sm.stress_mut()],
            StressModel::Dual(sm) => sm.stresses_mut().into_iter().collect(),
            StressModel::Recharge(sm) => sm.stresses_mut().into_iter().collect(),
            StressModel::Well(sm) => sm.stresses_mut().into_iter().collect(),
            StressModel::Direct(sm) => vec![sm.stress_mut()],
            StressModel::Step(_) | StressModel::Constant(_) => vec![],
        }
    }

    /// First time covered by the stresses, `None` for models without stresses
    pub fn tmin(&self) -> Option<Time> {
        self.stresses().iter().map(|s| s.tmin()).reduce(f64::min)
    }

    /// Last time covered by the stresses, `None` for models without stresses
    pub fn tmax(&self) -> Option<Time> {
        self.stresses().iter().map(|s| s.tmax()).reduce(f64::max)
    }

    /// Frequencies declared for, or inferred from, the stresses
    pub fn frequencies(&self) -> Vec<Frequency> {
        self.stresses()
            .iter()
            .filter_map(|s| s.freq().cloned())
            .collect()
    }

    /// Re-sample all stresses to `freq`
    pub fn update_stress(&mut self, freq: &Frequency) -> TsaResult<()> {
        for stress in self.stresses_mut() {
            stress.update_series(Some(freq))?;
        }
        Ok(())
    }

    /// Contribution on the regular grid from `tmin` through `tmax`
    pub fn simulate(
        &self,
        p: &[FloatValue],
        tmin: Time,
        tmax: Time,
        freq: &Frequency,
    ) -> TsaResult<Series> {
        check_parameter_count(p, self.nparam())?;
        dispatch!(self, sm => sm.simulate(p, tmin, tmax, freq))
    }

    /// The input series that is convolved, on the simulation grid.
    ///
    /// For the dual and recharge models this is the combined stress, which
    /// depends on the parameters. Models without stresses return nothing.
    pub fn get_stress(
        &self,
        p: &[FloatValue],
        tmin: Time,
        tmax: Time,
        freq: &Frequency,
    ) -> TsaResult<Vec<Series>> {
        Ok(match self {
            StressModel::Dual(sm) => vec![sm.get_stress(p, tmin, tmax, freq)?],
            StressModel::Recharge(sm) => vec![sm.get_stress(p, tmin, tmax, freq)?],
            _ => self
                .stresses()
                .iter()
                .map(|s| s.between(tmin, tmax, freq))
                .collect(),
        })
    }

    pub fn set_initial(&mut self, name: &str, value: FloatValue) -> bool {
        self.parameters_mut().set_initial(name, value)
    }

    pub fn set_pmin(&mut self, name: &str, value: Option<FloatValue>) -> bool {
        self.parameters_mut().set_pmin(name, value)
    }

    pub fn set_pmax(&mut self, name: &str, value: Option<FloatValue>) -> bool {
        self.parameters_mut().set_pmax(name, value)
    }

    pub fn set_vary(&mut self, name: &str, value: bool) -> bool {
        self.parameters_mut().set_vary(name, value)
    }

    /// Snapshot of everything needed to rebuild this stress model
    pub fn dump(&self, series: bool) -> StressModelDump {
        StressModelDump {
            stressmodel: self.kind().to_string(),
            rfunc: self.rfunc().map(|r| r.name().to_string()),
            name: self.name().to_string(),
            up: self.rfunc().map(|r| r.up()),
            cutoff: self.rfunc().map(|r| r.cutoff()),
            stress: self.stresses().iter().map(|s| s.dump(series)).collect(),
            recharge: match self {
                StressModel::Recharge(sm) => Some(sm.recharge().name().to_string()),
                _ => None,
            },
            distances: match self {
                StressModel::Well(sm) => Some(sm.distances().to_vec()),
                _ => None,
            },
            tstart: match self {
                StressModel::Step(sm) => Some(sm.tstart()),
                _ => None,
            },
        }
    }
}

impl From<SingleStressModel> for StressModel {
    fn from(value: SingleStressModel) -> Self {
        StressModel::Convolution(value)
    }
}

impl From<DualStressModel> for StressModel {
    fn from(value: DualStressModel) -> Self {
        StressModel::Dual(value)
    }
}

impl From<RechargeModel> for StressModel {
    fn from(value: RechargeModel) -> Self {
        StressModel::Recharge(value)
    }
}

impl From<WellModel> for StressModel {
    fn from(value: WellModel) -> Self {
        StressModel::Well(value)
    }
}

impl From<StepModel> for StressModel {
    fn from(value: StepModel) -> Self {
        StressModel::Step(value)
    }
}

impl From<DirectResponseModel> for StressModel {
    fn from(value: DirectResponseModel) -> Self {
        StressModel::Direct(value)
    }
}

impl From<Constant> for StressModel {
    fn from(value: Constant) -> Self {
        StressModel::Constant(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressModelDump {
    pub stressmodel: String,
    pub rfunc: Option<String>,
    pub name: String,
    pub up: Option<bool>,
    pub cutoff: Option<f64>,
    pub stress: Vec<TimeSeriesDump>,
    pub recharge: Option<String>,
    pub distances: Option<Vec<f64>>,
    pub tstart: Option<Time>,
}

#[cfg(test)]
mod tests;
