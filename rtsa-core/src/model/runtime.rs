use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::errors::{TsaError, TsaResult};
use crate::noisemodel::NoiseModel;
use crate::parameters::{Parameter, ParameterLayout, ParameterOwner, ParameterTable};
use crate::series::{FloatValue, Series};
use crate::stressmodels::{Constant, StressModel};
use crate::timeseries::TimeSeries;
use crate::transform::Transform;
use indexmap::IndexMap;
use ndarray::Array1;
use std::borrow::Cow;
use std::cell::RefCell;
use std::sync::Arc;

use super::builder::ModelBuilder;
use super::cache::ModelCache;
use super::types::{FitSummary, ModelDump, ModelSettings};

/// A time series model of an observed series.
///
/// The simulated series is the sum of the contributions of the stress models
/// plus the constant, optionally passed through a transform. The parameters of
/// all sub-models form one flat vector in the order stress models (in the
/// order they were added), constant, transform, noise model.
#[derive(Debug, Clone)]
pub struct Model {
    pub(super) name: String,
    /// The observed series
    pub(super) oseries: TimeSeries,
    pub(super) stressmodels: IndexMap<String, StressModel>,
    pub(super) constant: Option<Constant>,
    pub(super) transform: Option<Transform>,
    /// Parameters of the transform, derived from the observations when it was added
    pub(super) transform_parameters: ParameterTable,
    pub(super) noisemodel: Option<NoiseModel>,
    pub(super) noise_parameters: ParameterTable,
    /// Parameters of all sub-models, the source of truth for calibration
    pub(super) parameters: ParameterTable,
    /// Slices of the flat parameter vector owned by each sub-model
    pub(super) layout: ParameterLayout,
    pub(super) settings: ModelSettings,
    /// Subtract the mean from the residuals, used while the constant is not fitted
    pub(super) normalize_residuals: bool,
    pub(super) fit: Option<FitSummary>,
    /// Bumped on every structural change, invalidates the cache
    pub(super) epoch: u64,
    pub(super) cache: RefCell<ModelCache>,
    pub(super) diagnostics: Arc<dyn DiagnosticSink>,
}

impl Model {
    /// A model with a constant and a noise model and default settings
    pub fn new(oseries: Series) -> TsaResult<Self> {
        ModelBuilder::new(oseries).build()
    }

    pub(super) fn empty(
        name: &str,
        oseries: TimeSeries,
        settings: ModelSettings,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            name: name.to_string(),
            oseries,
            stressmodels: IndexMap::new(),
            constant: None,
            transform: None,
            transform_parameters: ParameterTable::new(),
            noisemodel: None,
            noise_parameters: ParameterTable::new(),
            parameters: ParameterTable::new(),
            layout: ParameterLayout::new(),
            settings,
            normalize_residuals: false,
            fit: None,
            epoch: 0,
            cache: RefCell::new(ModelCache::default()),
            diagnostics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn oseries(&self) -> &TimeSeries {
        &self.oseries
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    pub fn stressmodel(&self, name: &str) -> Option<&StressModel> {
        self.stressmodels.get(name)
    }

    pub fn stressmodel_names(&self) -> Vec<String> {
        self.stressmodels.keys().cloned().collect()
    }

    pub fn constant(&self) -> Option<&Constant> {
        self.constant.as_ref()
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub fn noisemodel(&self) -> Option<&NoiseModel> {
        self.noisemodel.as_ref()
    }

    pub fn fit(&self) -> Option<&FitSummary> {
        self.fit.as_ref()
    }

    pub fn normalize_residuals(&self) -> bool {
        self.normalize_residuals
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(super) fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.report(&diagnostic);
    }

    pub(super) fn invalidate(&mut self) {
        self.epoch += 1;
    }

    /// Add a stress model.
    ///
    /// A stress model with the same name is only replaced if `replace` is set.
    /// The first stress model added to a model without a frequency fixes the
    /// frequency (see [`Model::set_freq`]). The stresses are resampled to the
    /// model frequency. On error the model is left unchanged.
    pub fn add_stressmodel(&mut self, stressmodel: impl Into<StressModel>, replace: bool) -> TsaResult<()> {
        let stressmodel = stressmodel.into();
        let name = stressmodel.name().to_string();
        if self.stressmodels.contains_key(&name) && !replace {
            return Err(TsaError::DuplicateStressModel(name));
        }

        let settings = self.settings.clone();
        let previous = self.stressmodels.insert(name.clone(), stressmodel);
        if let Err(err) = self.conform_stressmodel(&name) {
            match previous {
                Some(previous) => {
                    self.stressmodels.insert(name, previous);
                }
                None => {
                    self.stressmodels.shift_remove(&name);
                }
            }
            self.settings = settings;
            return Err(err);
        }
        log::debug!("Added stress model '{}' to model '{}'", name, self.name);
        self.rebuild_parameters(false);
        Ok(())
    }

    fn conform_stressmodel(&mut self, name: &str) -> TsaResult<()> {
        if self.settings.freq.is_none() {
            return self.set_freq();
        }
        let freq = self.freq();
        if let Some(stressmodel) = self.stressmodels.get_mut(name) {
            stressmodel.update_stress(&freq)?;
        }
        self.settings.time_offset = self.resolve_time_offset()?;
        Ok(())
    }

    /// Remove a stress model, returns whether it was present
    pub fn del_stressmodel(&mut self, name: &str) -> bool {
        if self.stressmodels.shift_remove(name).is_none() {
            self.report(Diagnostic::warning(
                DiagnosticKind::MissingComponent,
                format!("No stress model named '{}' is present in this model", name),
            ));
            return false;
        }
        self.rebuild_parameters(true);
        true
    }

    /// Attach the constant, replacing any existing one
    pub fn add_constant(&mut self, mut constant: Constant) {
        constant.set_owner(ParameterOwner::Constant);
        self.constant = Some(constant);
        self.rebuild_parameters(false);
    }

    pub fn del_constant(&mut self) -> bool {
        if self.constant.take().is_none() {
            self.report(Diagnostic::warning(
                DiagnosticKind::MissingComponent,
                "No constant is present in this model",
            ));
            return false;
        }
        self.rebuild_parameters(true);
        true
    }

    /// Attach a transform, its parameter defaults follow the observations
    pub fn add_transform(&mut self, transform: impl Into<Transform>) {
        let transform = transform.into();
        self.transform_parameters =
            ParameterTable::from_parameters(transform.set_parameters(self.oseries.series()));
        self.transform = Some(transform);
        self.rebuild_parameters(false);
    }

    pub fn del_transform(&mut self) -> bool {
        if self.transform.take().is_none() {
            self.report(Diagnostic::warning(
                DiagnosticKind::MissingComponent,
                "No transform is present in this model",
            ));
            return false;
        }
        self.transform_parameters = ParameterTable::new();
        self.rebuild_parameters(true);
        true
    }

    pub fn add_noisemodel(&mut self, noisemodel: NoiseModel) {
        self.noise_parameters = ParameterTable::from_parameters(noisemodel.set_parameters());
        self.noisemodel = Some(noisemodel);
        self.rebuild_parameters(false);
    }

    pub fn del_noisemodel(&mut self) -> bool {
        if self.noisemodel.take().is_none() {
            self.report(Diagnostic::warning(
                DiagnosticKind::MissingComponent,
                "No noise model is present in this model",
            ));
            return false;
        }
        self.noise_parameters = ParameterTable::new();
        self.rebuild_parameters(true);
        true
    }

    /// Whether the noise model takes part in the simulation and calibration
    pub(super) fn uses_noise(&self) -> bool {
        self.settings.noise && self.noisemodel.is_some()
    }

    /// Rebuild the parameter table and layout from the sub-models.
    ///
    /// With `keep_optimal` the optimal values of the previous table become the
    /// initial values of the parameters that are still present.
    pub(super) fn rebuild_parameters(&mut self, keep_optimal: bool) {
        let mut table = ParameterTable::new();
        let mut layout = ParameterLayout::new();
        for (name, stressmodel) in &self.stressmodels {
            layout.push(ParameterOwner::StressModel(name.clone()), stressmodel.nparam());
            table.extend(stressmodel.parameters().iter().cloned());
        }
        if let Some(constant) = &self.constant {
            layout.push(ParameterOwner::Constant, constant.nparam());
            table.extend(constant.parameters().iter().cloned());
        }
        if self.transform.is_some() {
            layout.push(ParameterOwner::Transform, self.transform_parameters.len());
            table.extend(self.transform_parameters.iter().cloned());
        }
        if self.uses_noise() {
            layout.push(ParameterOwner::NoiseModel, self.noise_parameters.len());
            table.extend(self.noise_parameters.iter().cloned());
        }

        if keep_optimal {
            for parameter in table.iter_mut() {
                if let Some(optimal) = self.parameters.get(&parameter.name).and_then(|p| p.optimal) {
                    parameter.initial = optimal;
                }
            }
        }
        log::debug!(
            "Model '{}' has {} parameters in {} blocks",
            self.name,
            table.len(),
            layout.blocks().len()
        );
        self.parameters = table;
        self.layout = layout;
        self.invalidate();
    }

    /// The parameter vector to simulate with.
    ///
    /// A given vector must hold every parameter. Without one the optimal
    /// values are used, falling back to the initial values of parameters
    /// that have not been optimised.
    pub(super) fn resolve_parameters<'a>(
        &self,
        p: Option<&'a [FloatValue]>,
    ) -> TsaResult<Cow<'a, [FloatValue]>> {
        match p {
            Some(p) if p.len() == self.layout.len() => Ok(Cow::Borrowed(p)),
            Some(p) => Err(TsaError::ParameterCount {
                expected: self.layout.len(),
                got: p.len(),
            }),
            None => {
                if self.parameters.has_unoptimized() {
                    self.report(Diagnostic::info(
                        DiagnosticKind::UnoptimizedParameters,
                        format!(
                            "Model '{}' is not optimised yet, initial parameters are used",
                            self.name
                        ),
                    ));
                }
                Ok(Cow::Owned(self.parameters.optimal_values().to_vec()))
            }
        }
    }

    /// The part of `p` that belongs to `owner`
    pub(super) fn parameter_slice<'a>(
        &self,
        owner: &ParameterOwner,
        p: &'a [FloatValue],
    ) -> TsaResult<&'a [FloatValue]> {
        self.layout
            .slice(owner, p)
            .ok_or_else(|| TsaError::Error(format!("No parameters are registered for '{}'", owner)))
    }

    /// Current values of the parameters, optionally only those of one owner.
    ///
    /// Optimal values are used where available, initial values otherwise.
    pub fn get_parameters(&self, owner: Option<&ParameterOwner>) -> Array1<FloatValue> {
        let values = self.parameters.optimal_values();
        match owner {
            None => values,
            Some(owner) => match self.layout.block(owner) {
                Some(block) => values.slice(ndarray::s![block.range()]).to_owned(),
                None => Array1::zeros(0),
            },
        }
    }

    /// Set the initial value of a parameter.
    ///
    /// With `move_bounds` the bounds are scaled by the same factor as the
    /// initial value. Returns false (and reports a warning) if no parameter
    /// has this name.
    pub fn set_initial(&mut self, name: &str, value: FloatValue, move_bounds: bool) -> bool {
        let current = self.component_parameter(name).map(|p| (p.initial, p.pmin, p.pmax));
        let bounds = match current {
            Some((initial, pmin, pmax)) if move_bounds && initial != 0.0 => {
                let factor = value / initial;
                Some((pmin.map(|v| v * factor), pmax.map(|v| v * factor)))
            }
            _ => None,
        };
        self.update_parameter(name, |table| {
            if let Some((pmin, pmax)) = bounds {
                table.set_pmin(name, pmin);
                table.set_pmax(name, pmax);
            }
            table.set_initial(name, value)
        })
    }

    pub fn set_vary(&mut self, name: &str, value: bool) -> bool {
        self.update_parameter(name, |table| table.set_vary(name, value))
    }

    pub fn set_pmin(&mut self, name: &str, value: Option<FloatValue>) -> bool {
        self.update_parameter(name, |table| table.set_pmin(name, value))
    }

    pub fn set_pmax(&mut self, name: &str, value: Option<FloatValue>) -> bool {
        self.update_parameter(name, |table| table.set_pmax(name, value))
    }

    fn component_parameter(&self, name: &str) -> Option<&Parameter> {
        self.stressmodels
            .values()
            .map(|sm| sm.parameters())
            .chain(self.constant.iter().map(|c| c.parameters()))
            .chain([&self.transform_parameters, &self.noise_parameters])
            .find_map(|table| table.get(name))
    }

    /// Apply `update` to the sub-model owning `name` and to the model table
    fn update_parameter(&mut self, name: &str, update: impl Fn(&mut ParameterTable) -> bool) -> bool {
        let owner = self
            .stressmodels
            .values_mut()
            .map(|sm| sm.parameters_mut())
            .chain(self.constant.iter_mut().map(|c| c.parameters_mut()))
            .chain([&mut self.transform_parameters, &mut self.noise_parameters])
            .find(|table| table.contains(name));
        match owner {
            Some(table) => {
                update(table);
            }
            None => {
                self.report(Diagnostic::warning(
                    DiagnosticKind::UnknownParameter,
                    format!("Parameter '{}' is not present in the model", name),
                ));
                return false;
            }
        }
        if self.parameters.contains(name) {
            update(&mut self.parameters);
        }
        true
    }

    /// Parameters whose optimal value lies within `alpha` of the parameter
    /// range from a bound, as `(name, near pmin, near pmax)`
    pub fn check_parameters_bounds(&self, alpha: f64) -> Vec<(String, bool, bool)> {
        self.parameters.check_bounds(alpha)
    }

    /// Snapshot of the model.
    ///
    /// With `series` the data of every series is included, otherwise only
    /// names and settings.
    pub fn dump(&self, series: bool) -> ModelDump {
        ModelDump {
            name: self.name.clone(),
            oseries: self.oseries.dump(series),
            stressmodels: self
                .stressmodels
                .iter()
                .map(|(name, sm)| (name.clone(), sm.dump(series)))
                .collect(),
            constant: self.constant.is_some(),
            transform: self.transform.clone(),
            noisemodel: self.noisemodel.as_ref().map(|n| n.dump()),
            parameters: self.parameters.clone(),
            settings: self.settings.clone(),
            fit: self.fit.clone(),
        }
    }
}
