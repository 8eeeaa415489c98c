//! Frequency, time offset and simulation window of a model.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::errors::{TsaError, TsaResult};
use crate::frequency::Frequency;
use crate::series::{date_range, Time, TIME_TOLERANCE};
use ndarray::Array1;

use super::runtime::Model;
use super::types::{SimulationOptions, TimeBound};

/// A resolved simulation window
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Window {
    pub tmin: Time,
    pub tmax: Time,
    pub freq: Frequency,
    /// Warmup in days
    pub warmup: f64,
}

impl Model {
    /// Frequency of the simulation, daily until one is set
    pub fn freq(&self) -> Frequency {
        self.settings.freq.clone().unwrap_or_default()
    }

    /// Derive the model frequency from the series.
    ///
    /// The frequency of the observed series is used if it has one. Otherwise
    /// the smallest frequency among the stresses is used, and daily if none of
    /// the stresses has a frequency either. All stresses are resampled to the
    /// new frequency.
    pub fn set_freq(&mut self) -> TsaResult<()> {
        let freq = self.infer_freq();
        for stressmodel in self.stressmodels.values_mut() {
            stressmodel.update_stress(&freq)?;
        }
        log::info!("Frequency of model '{}' set to {}", self.name, freq);
        self.settings.freq = Some(freq);
        self.settings.time_offset = self.resolve_time_offset()?;
        self.invalidate();
        Ok(())
    }

    fn infer_freq(&self) -> Frequency {
        if let Some(freq) = self.oseries.freq() {
            return freq.clone();
        }
        let mut freqs: Vec<Frequency> = vec![];
        for freq in self.stressmodels.values().flat_map(|sm| sm.frequencies()) {
            if !freqs.contains(&freq) {
                freqs.push(freq);
            }
        }
        match freqs.into_iter().min_by(|a, b| a.dt().total_cmp(&b.dt())) {
            Some(freq) => freq,
            None => {
                self.report(Diagnostic::info(
                    DiagnosticKind::FrequencyDefaulted,
                    "Frequency of the model cannot be determined, daily is used",
                ));
                Frequency::daily()
            }
        }
    }

    /// Offset of the simulation grid, taken from the first stress of every stress model.
    ///
    /// All stresses must start at the same position within a time step.
    pub(super) fn resolve_time_offset(&self) -> TsaResult<Time> {
        let freq = self.freq();
        let mut offsets: Vec<Time> = vec![];
        for stressmodel in self.stressmodels.values() {
            if let Some(stress) = stressmodel.stresses().first() {
                let offset = stress.time_offset(&freq);
                if !offsets.iter().any(|o| (o - offset).abs() < TIME_TOLERANCE) {
                    offsets.push(offset);
                }
            }
        }
        match offsets.len() {
            0 => Ok(0.0),
            1 => Ok(offsets[0]),
            _ => Err(TsaError::InconsistentTimeOffset(offsets)),
        }
    }

    /// First and last time covered by any of the stresses
    fn stress_span(&self) -> Option<(Time, Time)> {
        let tmin = self.stressmodels.values().filter_map(|sm| sm.tmin()).reduce(f64::min)?;
        let tmax = self.stressmodels.values().filter_map(|sm| sm.tmax()).reduce(f64::max)?;
        Some((tmin, tmax))
    }

    /// Resolve the bounds of a simulation or calibration window.
    ///
    /// Missing bounds are taken from the observations or the stresses,
    /// depending on `bound`. With [`TimeBound::Oseries`] explicit bounds are
    /// clipped to the observed period. The result is moved onto the
    /// simulation grid: `tmin` up and `tmax` down.
    pub fn get_tmin_tmax(
        &self,
        tmin: Option<Time>,
        tmax: Option<Time>,
        freq: Option<&Frequency>,
        bound: TimeBound,
    ) -> TsaResult<(Time, Time)> {
        let freq = freq.cloned().unwrap_or_else(|| self.freq());
        let observed = (self.oseries.tmin(), self.oseries.tmax());
        let (ts_tmin, ts_tmax) = match bound {
            TimeBound::Oseries => observed,
            TimeBound::Stresses => self.stress_span().unwrap_or(observed),
        };
        let (tmin, tmax) = match bound {
            TimeBound::Oseries => (
                tmin.map_or(ts_tmin, |t| t.max(ts_tmin)),
                tmax.map_or(ts_tmax, |t| t.min(ts_tmax)),
            ),
            TimeBound::Stresses => (tmin.unwrap_or(ts_tmin), tmax.unwrap_or(ts_tmax)),
        };

        let offset = self.settings.time_offset;
        let tmin = freq.ceil(tmin - offset) + offset;
        let tmax = freq.floor(tmax - offset) + offset;
        if tmax <= tmin {
            return Err(TsaError::InvalidTimeRange { tmin, tmax });
        }
        if bound == TimeBound::Oseries && self.oseries.series().between(tmin, tmax).is_empty() {
            return Err(TsaError::NoObservations { tmin, tmax });
        }
        Ok((tmin, tmax))
    }

    /// Resolve options against the settings
    pub(super) fn window(&self, options: &SimulationOptions, bound: TimeBound) -> TsaResult<Window> {
        let freq = options
            .freq
            .clone()
            .or_else(|| self.settings.freq.clone())
            .unwrap_or_default();
        let (tmin, tmax) = self.get_tmin_tmax(
            options.tmin.or(self.settings.tmin),
            options.tmax.or(self.settings.tmax),
            Some(&freq),
            bound,
        )?;
        Ok(Window {
            tmin,
            tmax,
            freq,
            warmup: options.warmup.unwrap_or(self.settings.warmup),
        })
    }

    /// Times at which the model is simulated, including the warmup period.
    ///
    /// The grid starts at `tmin - warmup`, moved down onto the grid, and ends
    /// at `tmax`.
    pub(crate) fn sim_index(&self, window: &Window) -> Array1<Time> {
        let cached = self.cache.borrow().sim_index.get(self.epoch, window);
        if let Some(index) = cached {
            return index;
        }
        let offset = self.settings.time_offset;
        let start = window.freq.floor(window.tmin - window.warmup - offset) + offset;
        let index = date_range(start, window.tmax, &window.freq);
        self.cache
            .borrow_mut()
            .sim_index
            .set(self.epoch, window.clone(), index.clone());
        index
    }
}
