//! Tests for the model module.
//!
//! These cover building and changing a model, the simulation window, the
//! simulation pipeline and calibration with a stand-in solver.

#[cfg(test)]
mod basic;

use crate::diagnostics::CollectingSink;
use crate::model::{Model, ModelBuilder};
use crate::recharge::RechargeFunction;
use crate::rfunc::ResponseFunction;
use crate::series::{Series, Time};
use crate::stressmodels::RechargeModel;
use crate::timeseries::{SeriesKind, TimeSeries};
use std::sync::Arc;

fn daily(name: &str, start: Time, values: Vec<f64>) -> Series {
    let index = (0..values.len()).map(|i| start + i as f64).collect();
    Series::from_vec(name, index, values).unwrap()
}

fn prec(start: Time, n: usize) -> TimeSeries {
    let values = (0..n).map(|i| ((i * 7) % 5) as f64 * 0.002).collect();
    TimeSeries::with_kind(daily("prec", start, values), SeriesKind::Prec).unwrap()
}

fn evap(start: Time, n: usize) -> TimeSeries {
    let values = (0..n).map(|i| 0.001 + ((i * 3) % 4) as f64 * 0.0005).collect();
    TimeSeries::with_kind(daily("evap", start, values), SeriesKind::Evap).unwrap()
}

fn head(start: Time, n: usize) -> Series {
    let values = (0..n)
        .map(|i| 10.0 + (i as f64 / 30.0).sin() * 0.5)
        .collect();
    daily("head", start, values)
}

fn recharge_model(name: &str) -> RechargeModel {
    RechargeModel::new(
        prec(0.0, 800),
        evap(0.0, 800),
        ResponseFunction::exponential(),
        RechargeFunction::Linear,
        name,
    )
    .unwrap()
}

/// Observations from day 400 through 799 with a recharge model on days 0 through 799
fn recharge_setup() -> (Model, CollectingSink) {
    let sink = CollectingSink::new();
    let model = ModelBuilder::new(head(400.0, 400))
        .with_diagnostics(Arc::new(sink.clone()))
        .with_stressmodel(recharge_model("recharge"))
        .build()
        .unwrap();
    (model, sink)
}
