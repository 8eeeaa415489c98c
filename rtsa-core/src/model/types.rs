//! Type definitions for the model module.

use crate::errors::{TsaError, TsaResult};
use crate::frequency::Frequency;
use crate::noisemodel::NoiseModelDump;
use crate::parameters::ParameterTable;
use crate::series::Time;
use crate::stressmodels::StressModelDump;
use crate::timeseries::TimeSeriesDump;
use crate::transform::Transform;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Settings that control how a model is simulated and calibrated.
///
/// Missing fields take their default when deserialised, so a settings file
/// only needs to list what it changes:
///
/// ```toml
/// freq = "D"
/// warmup = 1825.0
/// noise = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Start of the calibration window, set by `initialize`
    pub tmin: Option<Time>,
    /// End of the calibration window, set by `initialize`
    pub tmax: Option<Time>,
    /// Simulation frequency. Derived from the series when the first stress
    /// model is added if not given.
    pub freq: Option<Frequency>,
    /// Length of the warmup period in days
    pub warmup: f64,
    /// Offset of the simulation grid within a time step, in days
    pub time_offset: Time,
    /// Calibrate on the innovations of the noise model instead of the residuals
    pub noise: bool,
    /// Fit the constant as a parameter. Otherwise it is set to the mean of the residuals.
    pub fit_constant: bool,
    /// Name of the solver of the last calibration
    pub solver: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            tmin: None,
            tmax: None,
            freq: None,
            warmup: 3650.0,
            time_offset: 0.0,
            noise: true,
            fit_constant: true,
            solver: None,
        }
    }
}

impl ModelSettings {
    pub fn from_toml_str(s: &str) -> TsaResult<Self> {
        toml::from_str(s).map_err(|e| TsaError::Settings(e.to_string()))
    }
}

/// Window and grid of a simulation.
///
/// Unset fields fall back to the model settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationOptions {
    pub tmin: Option<Time>,
    pub tmax: Option<Time>,
    pub freq: Option<Frequency>,
    /// Warmup in days
    pub warmup: Option<f64>,
    /// Include the warmup period in the returned series
    pub return_warmup: bool,
}

impl SimulationOptions {
    pub fn between(tmin: Time, tmax: Time) -> Self {
        Self {
            tmin: Some(tmin),
            tmax: Some(tmax),
            ..Self::default()
        }
    }
}

/// Options of `Model::initialize` and `Model::solve`
#[derive(Debug, Clone, PartialEq)]
pub struct InitializeOptions {
    pub tmin: Option<Time>,
    pub tmax: Option<Time>,
    pub freq: Option<Frequency>,
    pub warmup: Option<f64>,
    /// Use the noise model. Defaults to whether a noise model is attached.
    pub noise: Option<bool>,
    /// Start from the initial values of the sub-models. If false the optimal
    /// values of a previous calibration are used as initial values.
    pub initial: bool,
    pub fit_constant: Option<bool>,
}

impl Default for InitializeOptions {
    fn default() -> Self {
        Self {
            tmin: None,
            tmax: None,
            freq: None,
            warmup: None,
            noise: None,
            initial: true,
            fit_constant: None,
        }
    }
}

/// Which series bound the default simulation window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    /// The observations, used for calibration. Explicit bounds are clipped to
    /// the observed period.
    Oseries,
    /// The stresses, the domain on which a simulation is possible
    Stresses,
}

/// How the simulation is compared with the observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignmentPolicy {
    /// Every observation time is on the simulation grid
    Direct,
    /// The simulation is linearly interpolated onto the observation times
    Interpolate,
}

/// Outcome of the last calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub solver: String,
    /// Number of objective evaluations
    pub nfev: usize,
}

/// Snapshot of a model sufficient to rebuild it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDump {
    pub name: String,
    pub oseries: TimeSeriesDump,
    pub stressmodels: IndexMap<String, StressModelDump>,
    pub constant: bool,
    pub transform: Option<Transform>,
    pub noisemodel: Option<NoiseModelDump>,
    pub parameters: ParameterTable,
    pub settings: ModelSettings,
    pub fit: Option<FitSummary>,
}
