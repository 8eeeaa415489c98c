//! Model builder for assembling a model from its sub-models.

use crate::diagnostics::{DiagnosticSink, StderrSink};
use crate::errors::TsaResult;
use crate::noisemodel::NoiseModel;
use crate::series::Series;
use crate::stressmodels::{Constant, StressModel};
use crate::timeseries::TimeSeries;
use crate::transform::Transform;
use std::sync::Arc;

use super::runtime::Model;
use super::types::ModelSettings;

/// Build a new model for an observed series.
///
/// By default the model gets a constant, with the mean of the observations as
/// initial value, and a noise model. Stress models are added in the order in
/// which they are given, which is also the order of their parameters.
pub struct ModelBuilder {
    oseries: Series,
    name: Option<String>,
    constant: bool,
    noisemodel: bool,
    stressmodels: Vec<StressModel>,
    transform: Option<Transform>,
    settings: ModelSettings,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl ModelBuilder {
    pub fn new(oseries: Series) -> Self {
        Self {
            oseries,
            name: None,
            constant: true,
            noisemodel: true,
            stressmodels: vec![],
            transform: None,
            settings: ModelSettings::default(),
            diagnostics: Arc::new(StderrSink),
        }
    }

    /// Name of the model, defaults to the name of the observed series
    pub fn with_name(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_constant(&mut self, constant: bool) -> &mut Self {
        self.constant = constant;
        self
    }

    pub fn with_noise_model(&mut self, noisemodel: bool) -> &mut Self {
        self.noisemodel = noisemodel;
        self
    }

    pub fn with_settings(&mut self, settings: ModelSettings) -> &mut Self {
        self.settings = settings;
        self
    }

    /// Where soft errors and warnings are reported
    pub fn with_diagnostics(&mut self, diagnostics: Arc<dyn DiagnosticSink>) -> &mut Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_stressmodel(&mut self, stressmodel: impl Into<StressModel>) -> &mut Self {
        self.stressmodels.push(stressmodel.into());
        self
    }

    pub fn with_transform(&mut self, transform: impl Into<Transform>) -> &mut Self {
        self.transform = Some(transform.into());
        self
    }

    /// Builds the model.
    ///
    /// Fails if the observed series is empty or if the stress models cannot
    /// be combined (duplicate names, inconsistent time offsets).
    pub fn build(&self) -> TsaResult<Model> {
        let oseries = TimeSeries::oseries(self.oseries.clone())?;
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| oseries.name().to_string());
        let mut settings = self.settings.clone();
        if !self.noisemodel {
            settings.noise = false;
        }
        let mean = oseries.mean();

        let mut model = Model::empty(&name, oseries, settings, self.diagnostics.clone());
        if self.constant {
            model.add_constant(Constant::model_constant(mean));
        }
        if self.noisemodel {
            model.add_noisemodel(NoiseModel::new());
        }
        for stressmodel in &self.stressmodels {
            model.add_stressmodel(stressmodel.clone(), false)?;
        }
        if let Some(transform) = &self.transform {
            model.add_transform(transform.clone());
        }
        Ok(model)
    }
}
