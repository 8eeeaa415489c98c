//! Nonlinear preprocessors that turn precipitation and evaporation into recharge.
//!
//! The bucket models keep a root zone storage `S` with capacity `srmax`.
//! Actual evaporation is reduced linearly once the storage drops below
//! `lp * srmax`. Storage above capacity leaves the root zone as recharge.

use crate::errors::{TsaError, TsaResult};
use crate::parameters::{Parameter, ParameterOwner};
use crate::series::FloatValue;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RechargeFunction {
    /// `R = P + f * E`
    Linear,
    /// Recharge is a fraction `(S / srmax)^beta` of the precipitation
    Preferential,
    /// Recharge percolates from the root zone at `ks * (S / srmax)^gamma`
    Percolation,
}

impl Default for RechargeFunction {
    fn default() -> Self {
        RechargeFunction::Linear
    }
}

impl RechargeFunction {
    pub fn name(&self) -> &'static str {
        match self {
            RechargeFunction::Linear => "Linear",
            RechargeFunction::Preferential => "Preferential",
            RechargeFunction::Percolation => "Percolation",
        }
    }

    pub fn nparam(&self) -> usize {
        match self {
            RechargeFunction::Linear => 1,
            RechargeFunction::Preferential => 3,
            RechargeFunction::Percolation => 4,
        }
    }

    pub fn set_parameters(&self, name: &str) -> Vec<Parameter> {
        let owner = ParameterOwner::StressModel(name.to_string());
        let param = |suffix: &str, initial: f64, pmin: f64, pmax: f64, vary: bool| {
            Parameter::new(
                &format!("{}_{}", name, suffix),
                initial,
                Some(pmin),
                Some(pmax),
                vary,
                owner.clone(),
            )
        };
        match self {
            RechargeFunction::Linear => vec![param("f", -1.0, -2.0, 0.0, true)],
            RechargeFunction::Preferential => vec![
                param("srmax", 0.25, 1e-5, 10.0, false),
                param("lp", 0.25, 1e-5, 1.0, false),
                param("beta", 2.0, 0.0, 20.0, true),
            ],
            RechargeFunction::Percolation => vec![
                param("srmax", 0.25, 1e-5, 10.0, false),
                param("lp", 0.25, 1e-5, 1.0, false),
                param("ks", 0.05, 1e-5, 10.0, true),
                param("gamma", 4.0, 0.0, 50.0, true),
            ],
        }
    }

    /// Recharge for every time step of the aligned `prec` and `evap` arrays.
    ///
    /// `dt` is the length of a time step in days.
    pub fn simulate(
        &self,
        prec: ArrayView1<FloatValue>,
        evap: ArrayView1<FloatValue>,
        p: &[FloatValue],
        dt: f64,
    ) -> TsaResult<Array1<FloatValue>> {
        if p.len() != self.nparam() {
            return Err(TsaError::ParameterCount {
                expected: self.nparam(),
                got: p.len(),
            });
        }
        if prec.len() != evap.len() {
            return Err(TsaError::Error(format!(
                "precipitation ({}) and evaporation ({}) differ in length",
                prec.len(),
                evap.len()
            )));
        }
        match self {
            RechargeFunction::Linear => Ok(&prec + &(&evap * p[0])),
            RechargeFunction::Preferential => {
                let (srmax, lp, beta) = (p[0], p[1], p[2]);
                self.check_bucket(srmax, lp)?;
                Ok(bucket(prec, evap, srmax, lp, dt, |s, pe| {
                    pe * (s / srmax).powf(beta)
                }))
            }
            RechargeFunction::Percolation => {
                let (srmax, lp, ks, gamma) = (p[0], p[1], p[2], p[3]);
                self.check_bucket(srmax, lp)?;
                Ok(bucket(prec, evap, srmax, lp, dt, |s, _| {
                    ks * (s / srmax).powf(gamma)
                }))
            }
        }
    }

    fn check_bucket(&self, srmax: f64, lp: f64) -> TsaResult<()> {
        if srmax > 0.0 && lp > 0.0 && srmax.is_finite() && lp.is_finite() {
            Ok(())
        } else {
            Err(TsaError::degenerate(
                self.name(),
                format!("srmax ({}) and lp ({}) must be positive", srmax, lp),
            ))
        }
    }
}

/// Explicit daily water balance of the root zone, starting half full.
///
/// `flux(S, P)` is the recharge rate given the storage and precipitation.
fn bucket(
    prec: ArrayView1<FloatValue>,
    evap: ArrayView1<FloatValue>,
    srmax: f64,
    lp: f64,
    dt: f64,
    flux: impl Fn(f64, f64) -> f64,
) -> Array1<FloatValue> {
    let mut storage = 0.5 * srmax;
    let mut recharge = Array1::zeros(prec.len());
    for (i, (pe, ep)) in prec.iter().zip(evap.iter()).enumerate() {
        let r = flux(storage, *pe).max(0.0);
        let ea = ep.max(0.0) * (storage / (lp * srmax)).min(1.0);
        storage += dt * (pe - r - ea);
        let mut total = r;
        if storage > srmax {
            total += (storage - srmax) / dt;
            storage = srmax;
        }
        storage = storage.max(0.0);
        recharge[i] = total;
    }
    recharge
}
