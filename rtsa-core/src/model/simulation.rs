//! Simulation pipeline: simulation, observations, residuals and noise.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::errors::{TsaError, TsaResult};
use crate::parameters::ParameterOwner;
use crate::rfunc::ResponseFunction;
use crate::series::{search_sorted, FloatValue, Series, Time};
use crate::stressmodels::StressModel;
use ndarray::{Array, Array1};

use super::runtime::Model;
use super::timing::Window;
use super::types::{AlignmentPolicy, SimulationOptions, TimeBound};

impl Model {
    /// Simulate the model.
    ///
    /// Without `p` the optimal parameters are used where available and the
    /// initial parameters otherwise. The result is named `Simulation` and only
    /// holds defined values.
    pub fn simulate(&self, p: Option<&[FloatValue]>, options: &SimulationOptions) -> TsaResult<Series> {
        let p = self.resolve_parameters(p)?;
        let window = self.window(options, TimeBound::Stresses)?;
        self.simulate_window(&p, &window, options.return_warmup, true)
    }

    pub(super) fn simulate_window(
        &self,
        p: &[FloatValue],
        window: &Window,
        return_warmup: bool,
        apply_transform: bool,
    ) -> TsaResult<Series> {
        let index = self.sim_index(window);
        let (start, end) = match (index.first(), index.last()) {
            (Some(start), Some(end)) => (*start, *end),
            _ => {
                return Err(TsaError::InvalidTimeRange {
                    tmin: window.tmin,
                    tmax: window.tmax,
                })
            }
        };

        let mut h: Array1<FloatValue> = Array1::zeros(index.len());
        for (name, stressmodel) in &self.stressmodels {
            let ps = self.parameter_slice(&ParameterOwner::StressModel(name.clone()), p)?;
            let contribution = stressmodel.simulate(ps, start, end, &window.freq)?;
            h += contribution.reindex(&index, 0.0).values();
        }
        if self.constant.is_some() {
            h += self.parameter_slice(&ParameterOwner::Constant, p)?[0];
        }
        let mut sim = Series::new("Simulation", index, h)?;
        if let (Some(transform), true) = (&self.transform, apply_transform) {
            sim = transform.simulate(&sim, self.parameter_slice(&ParameterOwner::Transform, p)?)?;
        }

        if !return_warmup {
            sim = sim.between(window.tmin, window.tmax);
        }
        Ok(sim.dropna().with_name("Simulation"))
    }

    /// Observations used for calibration.
    ///
    /// Within the calibration window, only the observation nearest to each
    /// simulation time is kept, so the observations never have a higher
    /// resolution than the simulation. Observation times are not changed.
    pub fn observations(&self, options: &SimulationOptions) -> TsaResult<Series> {
        let window = self.window(options, TimeBound::Oseries)?;
        let index = self.sim_index(&window);
        Ok(self.observations_on(&window, &index))
    }

    fn observations_on(&self, window: &Window, sim_index: &Array1<Time>) -> Series {
        let key = (window.tmin, window.tmax);
        let cached = self.cache.borrow().oseries_calib.get(self.epoch, &key);
        let calib = match cached {
            Some(calib) => calib,
            None => {
                let calib = self.oseries.series().between(window.tmin, window.tmax).dropna();
                self.cache
                    .borrow_mut()
                    .oseries_calib
                    .set(self.epoch, key, calib.clone());
                calib
            }
        };
        let selected = nearest_sample(calib.index(), sim_index);
        calib.select(&selected)
    }

    /// Residuals, the observations minus the simulation.
    ///
    /// When some observation times are not on the simulation grid the
    /// simulation is interpolated onto the observation times. This is decided
    /// once for a window and kept until the model changes.
    pub fn residuals(&self, p: Option<&[FloatValue]>, options: &SimulationOptions) -> TsaResult<Series> {
        let p = self.resolve_parameters(p)?;
        let window = self.window(options, TimeBound::Oseries)?;
        let sim = self.simulate_window(&p, &window, false, true)?;
        let obs = self.observations_on(&window, sim.index());

        let simulated = match self.alignment(&window, &obs, &sim) {
            AlignmentPolicy::Direct => obs.index().mapv(|t| sim.get(t).unwrap_or(f64::NAN)),
            AlignmentPolicy::Interpolate => sim.interpolate_at(obs.index()),
        };
        let mut res = Series::new("Residuals", obs.index().clone(), obs.values() - &simulated)?;
        if self.normalize_residuals {
            let mean = res.mean();
            res.values_mut().mapv_inplace(|v| v - mean);
        }

        let undefined = res.count_non_finite();
        if undefined > 0 {
            self.report(Diagnostic::warning(
                DiagnosticKind::NumericalDegeneracy,
                format!("{} of {} residuals are not finite", undefined, res.len()),
            ));
        }
        Ok(res)
    }

    fn alignment(&self, window: &Window, obs: &Series, sim: &Series) -> AlignmentPolicy {
        let cached = self.cache.borrow().alignment.get(self.epoch, window);
        if let Some(policy) = cached {
            return policy;
        }
        let policy = if obs.index().iter().all(|t| sim.position(*t).is_some()) {
            AlignmentPolicy::Direct
        } else {
            self.report(Diagnostic::info(
                DiagnosticKind::InterpolationEnabled,
                "There are observations between the simulation time steps. Linear interpolation is used",
            ));
            AlignmentPolicy::Interpolate
        };
        self.cache
            .borrow_mut()
            .alignment
            .set(self.epoch, window.clone(), policy);
        policy
    }

    /// Innovations of the residuals under the noise model.
    ///
    /// The time step of every residual is the time in days since the previous
    /// residual, not since the previous observation of the full series. The
    /// two differ where observations are missing or were not selected for the
    /// simulation grid, and for the first residual, whose step is undefined.
    /// Fails if the model has no noise model.
    pub fn noise(&self, p: Option<&[FloatValue]>, options: &SimulationOptions) -> TsaResult<Series> {
        let noisemodel = self.noisemodel.as_ref().ok_or(TsaError::MissingNoiseModel)?;
        let p = self.resolve_parameters(p)?;
        let res = self.residuals(Some(&*p), options)?;
        let alpha = match self.layout.slice(&ParameterOwner::NoiseModel, &p) {
            Some(alpha) => alpha.to_vec(),
            None => self.noise_parameters.optimal_values().to_vec(),
        };
        let noise = noisemodel.simulate(&res, &res.time_steps(), &alpha)?;

        let undefined = noise.count_non_finite();
        if undefined > 0 {
            self.report(Diagnostic::warning(
                DiagnosticKind::NumericalDegeneracy,
                format!("{} of {} innovations are not finite", undefined, noise.len()),
            ));
        }
        Ok(noise)
    }

    /// Same as [`Model::noise`]
    pub fn innovations(&self, p: Option<&[FloatValue]>, options: &SimulationOptions) -> TsaResult<Series> {
        self.noise(p, options)
    }

    /// Contribution of a single stress model, using the current parameters
    pub fn get_contribution(&self, name: &str, options: &SimulationOptions) -> TsaResult<Series> {
        let stressmodel = self
            .stressmodels
            .get(name)
            .ok_or_else(|| TsaError::UnknownStressModel(name.to_string()))?;
        let p = self.get_parameters(Some(&ParameterOwner::StressModel(name.to_string())));
        let window = self.window(options, TimeBound::Stresses)?;
        let index = self.sim_index(&window);
        let (start, end) = match (index.first(), index.last()) {
            (Some(start), Some(end)) => (*start, *end),
            _ => return Ok(Series::from_parts(name, Array1::zeros(0), Array1::zeros(0))),
        };
        let contribution = stressmodel.simulate(&p.to_vec(), start, end, &window.freq)?;
        if options.return_warmup {
            Ok(contribution)
        } else {
            Ok(contribution.between(window.tmin, window.tmax))
        }
    }

    /// Effect of the transform: the simulation minus the simulation without transform
    pub fn get_transform_contribution(&self, options: &SimulationOptions) -> TsaResult<Series> {
        let p = self.resolve_parameters(None)?;
        let window = self.window(options, TimeBound::Stresses)?;
        let sim = self.simulate_window(&p, &window, options.return_warmup, true)?;
        let raw = self.simulate_window(&p, &window, options.return_warmup, false)?;
        let raw = raw.reindex(sim.index(), f64::NAN);
        Series::new("transform", sim.index().clone(), sim.values() - raw.values())
    }

    /// Block response of a stress model on the model frequency.
    ///
    /// `r` is the distance for radial response functions, the first distance
    /// of a well model is used if it is not given.
    pub fn get_block_response(&self, name: &str, r: Option<f64>) -> TsaResult<Series> {
        let (p, r) = self.response_parameters(name, r)?;
        let rfunc = self.rfunc_of(name)?;
        let dt = self.freq().dt();
        let block = rfunc.block(&p, dt, r)?;
        Ok(response_series(name, block, dt))
    }

    /// Step response of a stress model on the model frequency
    pub fn get_step_response(&self, name: &str, r: Option<f64>) -> TsaResult<Series> {
        let (p, r) = self.response_parameters(name, r)?;
        let rfunc = self.rfunc_of(name)?;
        let dt = self.freq().dt();
        let step = rfunc.step(&p, dt, r)?;
        Ok(response_series(name, step, dt))
    }

    fn rfunc_of(&self, name: &str) -> TsaResult<ResponseFunction> {
        self.stressmodels
            .get(name)
            .ok_or_else(|| TsaError::UnknownStressModel(name.to_string()))?
            .rfunc()
            .copied()
            .ok_or_else(|| TsaError::Error(format!("Stress model '{}' has no response function", name)))
    }

    fn response_parameters(&self, name: &str, r: Option<f64>) -> TsaResult<(Vec<FloatValue>, Option<f64>)> {
        let rfunc = self.rfunc_of(name)?;
        let p = self.get_parameters(Some(&ParameterOwner::StressModel(name.to_string())));
        let p = p
            .iter()
            .take(rfunc.nparam())
            .copied()
            .collect::<Vec<_>>();
        let r = match (r, self.stressmodels.get(name)) {
            (Some(r), _) => Some(r),
            (None, Some(StressModel::Well(well))) => well.distances().first().copied(),
            _ => None,
        };
        Ok((p, r))
    }

    /// The stresses of a stress model on the simulation grid, without warmup
    pub fn get_stress(&self, name: &str, options: &SimulationOptions) -> TsaResult<Vec<Series>> {
        let stressmodel = self
            .stressmodels
            .get(name)
            .ok_or_else(|| TsaError::UnknownStressModel(name.to_string()))?;
        let p = self.get_parameters(Some(&ParameterOwner::StressModel(name.to_string())));
        let window = self.window(options, TimeBound::Stresses)?;
        stressmodel.get_stress(&p.to_vec(), window.tmin, window.tmax, &window.freq)
    }
}

/// Positions of the observations nearest to each simulation time.
///
/// Simulation times outside the observed period are ignored. Every
/// observation is selected at most once.
fn nearest_sample(observed: &Array1<Time>, sim_index: &Array1<Time>) -> Array1<Time> {
    let n = observed.len();
    if n <= 1 {
        return observed.clone();
    }
    let (first, last) = (observed[0], observed[n - 1]);
    let mut selected: Vec<Time> = vec![];
    for &t in sim_index.iter().filter(|t| **t >= first && **t <= last) {
        let j = search_sorted(observed, t).min(n - 1);
        let nearest = if j > 0 && (t - observed[j - 1]) <= (observed[j] - t) {
            j - 1
        } else {
            j
        };
        if selected.last() != Some(&observed[nearest]) {
            selected.push(observed[nearest]);
        }
    }
    Array::from_vec(selected)
}

fn response_series(name: &str, values: Array1<FloatValue>, dt: f64) -> Series {
    let index = Array::from_iter((1..=values.len()).map(|k| k as f64 * dt));
    Series::from_parts(name, index, values)
}
