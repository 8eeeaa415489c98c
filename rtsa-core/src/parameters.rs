//! Parameters of a model and their layout in the flat parameter vector.
//!
//! Every sub-model contributes a contiguous block of parameters. The
//! [`ParameterTable`] aggregates these blocks in registration order and is the
//! single source of truth for what a solver optimises. The matching
//! [`ParameterLayout`] records which slice of the flat vector belongs to which
//! owner.

use crate::series::FloatValue;
use indexmap::IndexMap;
use ndarray::{Array, Array1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// The sub-model a parameter belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterOwner {
    StressModel(String),
    Constant,
    Transform,
    NoiseModel,
}

impl fmt::Display for ParameterOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterOwner::StressModel(name) => write!(f, "{}", name),
            ParameterOwner::Constant => write!(f, "constant"),
            ParameterOwner::Transform => write!(f, "transform"),
            ParameterOwner::NoiseModel => write!(f, "noise"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub initial: FloatValue,
    /// Lower bound, `None` if unbounded
    pub pmin: Option<FloatValue>,
    /// Upper bound, `None` if unbounded
    pub pmax: Option<FloatValue>,
    pub vary: bool,
    pub optimal: Option<FloatValue>,
    pub stderr: Option<FloatValue>,
    pub owner: ParameterOwner,
}

impl Parameter {
    pub fn new(
        name: &str,
        initial: FloatValue,
        pmin: Option<FloatValue>,
        pmax: Option<FloatValue>,
        vary: bool,
        owner: ParameterOwner,
    ) -> Self {
        Self {
            name: name.to_string(),
            initial,
            pmin,
            pmax,
            vary,
            optimal: None,
            stderr: None,
            owner,
        }
    }

    /// A varying parameter with both bounds
    pub fn bounded(
        name: &str,
        initial: FloatValue,
        pmin: FloatValue,
        pmax: FloatValue,
        owner: ParameterOwner,
    ) -> Self {
        Self::new(name, initial, Some(pmin), Some(pmax), true, owner)
    }

    /// Whether `value` lies within the bounds
    pub fn contains(&self, value: FloatValue) -> bool {
        self.pmin.map_or(true, |pmin| value >= pmin) && self.pmax.map_or(true, |pmax| value <= pmax)
    }

    /// Whether the optimal value lies within `alpha * (pmax - pmin)` of a bound.
    ///
    /// Unbounded sides and parameters without an optimal value never hit.
    pub fn hits_bounds(&self, alpha: f64) -> (bool, bool) {
        let optimal = match self.optimal {
            Some(optimal) if self.vary => optimal,
            _ => return (false, false),
        };
        match (self.pmin, self.pmax) {
            (Some(pmin), Some(pmax)) => {
                let margin = alpha * (pmax - pmin);
                (optimal < pmin + margin, optimal > pmax - margin)
            }
            (Some(pmin), None) => (optimal <= pmin, false),
            (None, Some(pmax)) => (false, optimal >= pmax),
            (None, None) => (false, false),
        }
    }
}

/// Insertion-ordered collection of parameters keyed by name.
///
/// Setters are fail soft: an unknown name is logged and ignored, the return
/// value tells the caller whether anything changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    parameters: IndexMap<String, Parameter>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parameters(parameters: impl IntoIterator<Item = Parameter>) -> Self {
        let mut table = Self::new();
        table.extend(parameters);
        table
    }

    /// Add or replace a parameter, keeping its position if it already exists
    pub fn insert(&mut self, parameter: Parameter) {
        self.parameters.insert(parameter.name.clone(), parameter);
    }

    pub fn extend(&mut self, parameters: impl IntoIterator<Item = Parameter>) {
        parameters.into_iter().for_each(|p| self.insert(p));
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.get_mut(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.parameters.get_index_of(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.parameters.values_mut()
    }

    pub fn names(&self) -> Vec<String> {
        self.parameters.keys().cloned().collect()
    }

    /// Parameters owned by `owner`, in table order
    pub fn owned_by(&self, owner: &ParameterOwner) -> Vec<&Parameter> {
        self.iter().filter(|p| &p.owner == owner).collect()
    }

    fn update(&mut self, name: &str, f: impl FnOnce(&mut Parameter)) -> bool {
        match self.parameters.get_mut(name) {
            Some(parameter) => {
                f(parameter);
                true
            }
            None => {
                log::warn!("Parameter '{}' does not exist", name);
                false
            }
        }
    }

    pub fn set_initial(&mut self, name: &str, value: FloatValue) -> bool {
        self.update(name, |p| p.initial = value)
    }

    pub fn set_pmin(&mut self, name: &str, value: Option<FloatValue>) -> bool {
        self.update(name, |p| p.pmin = value)
    }

    pub fn set_pmax(&mut self, name: &str, value: Option<FloatValue>) -> bool {
        self.update(name, |p| p.pmax = value)
    }

    pub fn set_vary(&mut self, name: &str, value: bool) -> bool {
        self.update(name, |p| p.vary = value)
    }

    pub fn initial_values(&self) -> Array1<FloatValue> {
        Array::from_iter(self.iter().map(|p| p.initial))
    }

    /// Optimal values, falling back to the initial value for unfitted parameters
    pub fn optimal_values(&self) -> Array1<FloatValue> {
        Array::from_iter(self.iter().map(|p| p.optimal.unwrap_or(p.initial)))
    }

    /// Whether any parameter has not been written back by a solver
    pub fn has_unoptimized(&self) -> bool {
        self.iter().any(|p| p.optimal.is_none())
    }

    /// Names of fitted parameters whose optimum is within `alpha` of a bound
    pub fn check_bounds(&self, alpha: f64) -> Vec<(String, bool, bool)> {
        self.iter()
            .filter_map(|p| {
                let (lower, upper) = p.hits_bounds(alpha);
                (lower || upper).then(|| (p.name.clone(), lower, upper))
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ParameterTable {
    type Item = &'a Parameter;
    type IntoIter = indexmap::map::Values<'a, String, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.parameters.values()
    }
}

/// A contiguous slice of the flat parameter vector owned by one sub-model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterBlock {
    pub owner: ParameterOwner,
    pub offset: usize,
    pub len: usize,
}

impl ParameterBlock {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Ordered partition of the flat parameter vector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterLayout {
    blocks: Vec<ParameterBlock>,
}

impl ParameterLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block directly after the previous one
    pub fn push(&mut self, owner: ParameterOwner, len: usize) {
        let offset = self.len();
        self.blocks.push(ParameterBlock { owner, offset, len });
    }

    pub fn blocks(&self) -> &[ParameterBlock] {
        &self.blocks
    }

    /// Total number of parameters
    pub fn len(&self) -> usize {
        self.blocks.last().map_or(0, |b| b.offset + b.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn block(&self, owner: &ParameterOwner) -> Option<&ParameterBlock> {
        self.blocks.iter().find(|b| &b.owner == owner)
    }

    /// The part of `p` owned by `owner`
    pub fn slice<'a>(&self, owner: &ParameterOwner, p: &'a [FloatValue]) -> Option<&'a [FloatValue]> {
        self.block(owner).and_then(|b| p.get(b.range()))
    }

    /// Whether the blocks tile `0..len` without gaps and agree with `table`
    pub fn is_consistent_with(&self, table: &ParameterTable) -> bool {
        let mut expected = 0;
        for block in &self.blocks {
            if block.offset != expected {
                return false;
            }
            let owned = table
                .iter()
                .skip(block.offset)
                .take(block.len)
                .all(|p| p.owner == block.owner);
            if !owned {
                return false;
            }
            expected += block.len;
        }
        expected == table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn owner(name: &str) -> ParameterOwner {
        ParameterOwner::StressModel(name.to_string())
    }

    fn table() -> ParameterTable {
        ParameterTable::from_parameters(vec![
            Parameter::bounded("recharge_A", 500.0, 0.0, 5000.0, owner("recharge")),
            Parameter::bounded("recharge_a", 100.0, 1.0, 5000.0, owner("recharge")),
            Parameter::new("constant_d", 2.0, None, None, true, ParameterOwner::Constant),
            Parameter::bounded("noise_alpha", 14.0, 0.0, 5000.0, ParameterOwner::NoiseModel),
        ])
    }

    #[test]
    fn setters_are_fail_soft() {
        let mut table = table();
        assert!(table.set_initial("recharge_A", 250.0));
        assert!(!table.set_initial("recharge_B", 250.0));
        assert!(!table.set_vary("unknown", false));
        assert_eq!(table.get("recharge_A").unwrap().initial, 250.0);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn values_follow_insertion_order() {
        let mut table = table();
        assert_eq!(table.initial_values(), array![500.0, 100.0, 2.0, 14.0]);
        table.get_mut("recharge_a").unwrap().optimal = Some(80.0);
        assert_eq!(table.optimal_values(), array![500.0, 80.0, 2.0, 14.0]);
        assert!(table.has_unoptimized());
        assert_eq!(table.index_of("constant_d"), Some(2));
    }

    #[test]
    fn bounds_checks() {
        let mut table = table();
        table.get_mut("recharge_A").unwrap().optimal = Some(4999.0);
        table.get_mut("recharge_a").unwrap().optimal = Some(2000.0);
        table.get_mut("constant_d").unwrap().optimal = Some(-1e9);
        let hits = table.check_bounds(0.01);
        assert_eq!(hits, vec![("recharge_A".to_string(), false, true)]);
        assert!(!table.get("recharge_A").unwrap().contains(6000.0));
        assert!(table.get("constant_d").unwrap().contains(-1e9));
    }

    #[test]
    fn layout_partitions_the_vector() {
        let mut layout = ParameterLayout::new();
        layout.push(owner("recharge"), 2);
        layout.push(ParameterOwner::Constant, 1);
        layout.push(ParameterOwner::NoiseModel, 1);
        assert_eq!(layout.len(), 4);
        assert!(layout.is_consistent_with(&table()));

        let p = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(layout.slice(&owner("recharge"), &p), Some(&p[0..2]));
        assert_eq!(layout.slice(&ParameterOwner::NoiseModel, &p), Some(&p[3..4]));
        assert_eq!(layout.slice(&ParameterOwner::Transform, &p), None);

        let mut broken = ParameterLayout::new();
        broken.push(owner("recharge"), 3);
        broken.push(ParameterOwner::NoiseModel, 1);
        assert!(!broken.is_consistent_with(&table()));
    }

    #[test]
    fn table_serialises() {
        let json = serde_json::to_string(&table()).unwrap();
        let back: ParameterTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table());
    }
}
