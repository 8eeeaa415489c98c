use crate::errors::TsaResult;
use crate::frequency::Frequency;
use crate::parameters::{Parameter, ParameterOwner, ParameterTable};
use crate::series::{date_range, FloatValue, Series, Time};
use ndarray::Array;
use serde::{Deserialize, Serialize};

use super::check_parameter_count;

/// A constant offset.
///
/// Used both as the constant of a model (parameter `constant_d`) and as an
/// ordinary stress model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    name: String,
    parameters: ParameterTable,
}

impl Constant {
    pub fn new(name: &str, value: FloatValue, pmin: Option<FloatValue>, pmax: Option<FloatValue>) -> Self {
        Self::with_owner(
            name,
            value,
            pmin,
            pmax,
            ParameterOwner::StressModel(name.to_string()),
        )
    }

    /// The constant of a model, named `constant`
    pub fn model_constant(value: FloatValue) -> Self {
        Self::with_owner("constant", value, None, None, ParameterOwner::Constant)
    }

    fn with_owner(
        name: &str,
        value: FloatValue,
        pmin: Option<FloatValue>,
        pmax: Option<FloatValue>,
        owner: ParameterOwner,
    ) -> Self {
        let parameters = ParameterTable::from_parameters(vec![Parameter::new(
            &format!("{}_d", name),
            value,
            pmin,
            pmax,
            true,
            owner,
        )]);
        Self {
            name: name.to_string(),
            parameters,
        }
    }

    /// Hand the parameter to a new owner, e.g. when a constant is attached to a model
    pub(crate) fn set_owner(&mut self, owner: ParameterOwner) {
        self.parameters.iter_mut().for_each(|p| p.owner = owner.clone());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_name(&self) -> String {
        format!("{}_d", self.name)
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut ParameterTable {
        &mut self.parameters
    }

    pub fn nparam(&self) -> usize {
        1
    }

    pub fn simulate(
        &self,
        p: &[FloatValue],
        tmin: Time,
        tmax: Time,
        freq: &Frequency,
    ) -> TsaResult<Series> {
        check_parameter_count(p, 1)?;
        let index = date_range(tmin, tmax, freq);
        let values = Array::from_elem(index.len(), p[0]);
        Ok(Series::from_parts(&self.name, index, values))
    }
}
