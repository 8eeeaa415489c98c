//! Calibration of a model by an external solver.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::errors::{TsaError, TsaResult};
use crate::parameters::ParameterTable;
use crate::series::FloatValue;
use crate::solver::{CalibrationProblem, Solver};
use ndarray::Array1;

use super::runtime::Model;
use super::types::{FitSummary, InitializeOptions, SimulationOptions, TimeBound};

/// The objective surface of a model.
///
/// The objective is the noise when the model calibrates on the innovations
/// and the residuals otherwise, always over the calibration window stored in
/// the settings.
#[derive(Debug)]
pub struct ModelObjective<'a> {
    model: &'a Model,
    options: SimulationOptions,
}

impl CalibrationProblem for ModelObjective<'_> {
    fn parameters(&self) -> &ParameterTable {
        &self.model.parameters
    }

    fn objective(&self, p: &[FloatValue]) -> TsaResult<Array1<FloatValue>> {
        let series = if self.model.uses_noise() {
            self.model.noise(Some(p), &self.options)?
        } else {
            self.model.residuals(Some(p), &self.options)?
        };
        Ok(series.into_values())
    }
}

impl Model {
    /// Prepare the model for calibration.
    ///
    /// Fixes the calibration window, frequency, warmup and whether the noise
    /// model and the constant take part, rebuilds the parameter table and
    /// invalidates every cached value. When the constant is not fitted it is
    /// fixed at zero and the residuals are normalised instead.
    pub fn initialize(&mut self, options: &InitializeOptions) -> TsaResult<()> {
        let noise = match options.noise {
            None => self.noisemodel.is_some(),
            Some(true) if self.noisemodel.is_none() => {
                self.report(Diagnostic::warning(
                    DiagnosticKind::NoiseDisabled,
                    "Solving with a noise model while no noise model is present, no noise model is used",
                ));
                false
            }
            Some(noise) => noise,
        };
        self.settings.noise = noise;

        if let Some(freq) = &options.freq {
            if self.settings.freq.as_ref() != Some(freq) {
                for stressmodel in self.stressmodels.values_mut() {
                    stressmodel.update_stress(freq)?;
                }
                self.settings.freq = Some(freq.clone());
                self.settings.time_offset = self.resolve_time_offset()?;
            }
        }
        if let Some(warmup) = options.warmup {
            self.settings.warmup = warmup;
        }
        let (tmin, tmax) = self.get_tmin_tmax(options.tmin, options.tmax, None, TimeBound::Oseries)?;
        self.settings.tmin = Some(tmin);
        self.settings.tmax = Some(tmax);
        if let Some(fit_constant) = options.fit_constant {
            self.settings.fit_constant = fit_constant;
        }

        self.rebuild_parameters(!options.initial);
        self.normalize_residuals = false;
        if !self.settings.fit_constant {
            if let Some(constant) = &self.constant {
                let name = constant.parameter_name();
                self.parameters.set_vary(&name, false);
                self.parameters.set_initial(&name, 0.0);
            }
            self.normalize_residuals = true;
        }
        log::debug!(
            "Initialized model '{}' on [{}, {}] with {} parameters",
            self.name,
            tmin,
            tmax,
            self.parameters.len()
        );
        Ok(())
    }

    /// The objective surface for the current settings
    pub fn calibration_problem(&self) -> ModelObjective<'_> {
        ModelObjective {
            model: self,
            options: SimulationOptions::default(),
        }
    }

    /// Calibrate the model.
    ///
    /// Initialises the model, runs the solver and stores the optimal values
    /// and standard errors in the parameter table. If the constant is not
    /// fitted, its optimal value is the mean of the residuals of the fit.
    pub fn solve<S: Solver + ?Sized>(
        &mut self,
        solver: &mut S,
        options: &InitializeOptions,
    ) -> TsaResult<FitSummary> {
        self.initialize(options)?;
        self.settings.solver = Some(solver.name().to_string());

        let result = solver.solve(&self.calibration_problem())?;
        if result.optimal_params.len() != self.parameters.len()
            || result.stderr.len() != self.parameters.len()
        {
            return Err(TsaError::ParameterCount {
                expected: self.parameters.len(),
                got: result.optimal_params.len(),
            });
        }
        for (parameter, (optimal, stderr)) in self
            .parameters
            .iter_mut()
            .zip(result.optimal_params.iter().zip(result.stderr.iter()))
        {
            parameter.optimal = Some(*optimal);
            parameter.stderr = *stderr;
        }

        if !self.settings.fit_constant {
            self.normalize_residuals = false;
            let p = self.parameters.optimal_values().to_vec();
            let mean = self.residuals(Some(&p), &SimulationOptions::default())?.mean();
            if let Some(name) = self.constant.as_ref().map(|c| c.parameter_name()) {
                if let Some(parameter) = self.parameters.get_mut(&name) {
                    parameter.optimal = Some(mean);
                }
            }
        }

        let summary = FitSummary {
            solver: solver.name().to_string(),
            nfev: result.nfev,
        };
        log::info!(
            "Model '{}' solved with {} in {} function evaluations",
            self.name,
            summary.solver,
            summary.nfev
        );
        self.fit = Some(summary.clone());
        Ok(summary)
    }
}
