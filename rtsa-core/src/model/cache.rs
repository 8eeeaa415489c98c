//! Lazily filled values that stay valid until the model changes.
//!
//! Every structural change of a model (and every call to `initialize`) bumps
//! the model's epoch. A cell only returns its value if it was stored in the
//! current epoch and for the same key.

use crate::series::{Series, Time};
use ndarray::Array1;

use super::timing::Window;
use super::types::AlignmentPolicy;

#[derive(Debug, Clone)]
pub(crate) struct EpochCell<K, V> {
    entry: Option<(u64, K, V)>,
}

impl<K, V> Default for EpochCell<K, V> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<K: PartialEq, V: Clone> EpochCell<K, V> {
    pub fn get(&self, epoch: u64, key: &K) -> Option<V> {
        match &self.entry {
            Some((e, k, v)) if *e == epoch && k == key => Some(v.clone()),
            _ => None,
        }
    }

    pub fn set(&mut self, epoch: u64, key: K, value: V) {
        self.entry = Some((epoch, key, value));
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ModelCache {
    pub sim_index: EpochCell<Window, Array1<Time>>,
    /// Observations within the calibration window, keyed by `(tmin, tmax)`
    pub oseries_calib: EpochCell<(Time, Time), Series>,
    pub alignment: EpochCell<Window, AlignmentPolicy>,
}
