//! Calibration of a recharge model on synthetic observations.
//!
//! The observations are simulated from known parameters on top of random
//! precipitation and evaporation, with some noise added. The tests check the
//! properties every calibrated model must have, not the recovered values.

use is_close::is_close;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rtsa_core::diagnostics::LogSink;
use rtsa_core::model::{InitializeOptions, Model, ModelBuilder, SimulationOptions};
use rtsa_core::recharge::RechargeFunction;
use rtsa_core::rfunc::ResponseFunction;
use rtsa_core::series::Series;
use rtsa_core::stressmodels::RechargeModel;
use rtsa_core::timeseries::{SeriesKind, TimeSeries};
use rtsa_solvers::LeastSquares;
use std::sync::Arc;

const NSTRESS: usize = 4650;
const FIRST_OBSERVATION: f64 = 3650.0;
const NOBS: usize = 1000;

fn daily(name: &str, start: f64, values: Vec<f64>) -> Series {
    let index = (0..values.len()).map(|i| start + i as f64).collect();
    Series::from_vec(name, index, values).unwrap()
}

fn stresses(seed: u64) -> (TimeSeries, TimeSeries) {
    let mut rng = StdRng::seed_from_u64(seed);
    let prec = (0..NSTRESS)
        .map(|_| if rng.gen_bool(0.3) { rng.gen_range(0.0..0.02) } else { 0.0 })
        .collect();
    let evap = (0..NSTRESS)
        .map(|i| 0.0015 + 0.001 * (2.0 * std::f64::consts::PI * i as f64 / 365.25).sin())
        .collect();
    (
        TimeSeries::with_kind(daily("prec", 0.0, prec), SeriesKind::Prec).unwrap(),
        TimeSeries::with_kind(daily("evap", 0.0, evap), SeriesKind::Evap).unwrap(),
    )
}

fn recharge_model() -> RechargeModel {
    let (prec, evap) = stresses(42);
    RechargeModel::new(
        prec,
        evap,
        ResponseFunction::exponential(),
        RechargeFunction::Linear,
        "recharge",
    )
    .unwrap()
}

/// Heads simulated with `A = 400`, `a = 60`, `f = -1.2` and `d = 5` plus noise
fn observations() -> Series {
    let placeholder = daily("head", FIRST_OBSERVATION, vec![0.0; NOBS]);
    let truth = ModelBuilder::new(placeholder)
        .with_noise_model(false)
        .with_diagnostics(Arc::new(LogSink))
        .with_stressmodel(recharge_model())
        .build()
        .unwrap();
    let tmax = FIRST_OBSERVATION + (NOBS - 1) as f64;
    let sim = truth
        .simulate(
            Some(&[400.0, 60.0, -1.2, 5.0]),
            &SimulationOptions::between(FIRST_OBSERVATION, tmax),
        )
        .unwrap();
    assert_eq!(sim.len(), NOBS);

    let mut rng = StdRng::seed_from_u64(7);
    let values = sim.values().iter().map(|h| h + rng.gen_range(-0.02..0.02)).collect();
    Series::from_vec("head", sim.index().to_vec(), values).unwrap()
}

fn calibrated_model() -> Model {
    let mut model = ModelBuilder::new(observations())
        .with_diagnostics(Arc::new(LogSink))
        .with_stressmodel(recharge_model())
        .build()
        .unwrap();
    model
        .solve(&mut LeastSquares::new(), &InitializeOptions::default())
        .unwrap();
    model
}

fn sum_of_squares(series: &Series) -> f64 {
    series.values().iter().map(|v| v * v).sum()
}

#[test]
fn solve_then_simulate() {
    let model = calibrated_model();
    let fit = model.fit().unwrap();
    assert_eq!(fit.solver, "LeastSquares");
    assert!(fit.nfev > 0);

    let (tmin, tmax) = (model.settings().tmin.unwrap(), model.settings().tmax.unwrap());
    assert_eq!(tmin, FIRST_OBSERVATION);
    assert_eq!(tmax, FIRST_OBSERVATION + (NOBS - 1) as f64);

    let sim = model.simulate(None, &SimulationOptions::default()).unwrap();
    assert!(!sim.is_empty());
    assert_eq!(sim.count_non_finite(), 0);
    assert_eq!(sim.tmin(), Some(tmin));
    assert_eq!(sim.tmax(), Some(tmax));

    for parameter in model.parameters().iter() {
        let optimal = parameter.optimal.unwrap();
        assert!(parameter.contains(optimal), "{} = {}", parameter.name, optimal);
    }
}

#[test]
fn calibration_does_not_increase_the_objective() {
    let model = calibrated_model();
    let options = SimulationOptions::default();
    let initial = model.parameters().initial_values().to_vec();
    let before = sum_of_squares(&model.noise(Some(&initial), &options).unwrap());
    let after = sum_of_squares(&model.noise(None, &options).unwrap());
    assert!(after <= before);

    let residuals = model.residuals(None, &options).unwrap();
    assert_eq!(residuals.len(), NOBS);
    assert!(is_close!(residuals.mean(), 0.0, abs_tol = 0.5));
}

#[test]
fn calibration_is_deterministic() {
    let a = calibrated_model();
    let b = calibrated_model();
    assert_eq!(a.get_parameters(None), b.get_parameters(None));
    let options = SimulationOptions::default();
    let sim_a = a.simulate(None, &options).unwrap();
    let sim_b = b.simulate(None, &options).unwrap();
    assert_eq!(sim_a.index(), sim_b.index());
    assert_eq!(sim_a.values(), sim_b.values());
}

#[test]
fn optimal_parameters_simulate_identically() {
    let model = calibrated_model();
    let options = SimulationOptions::default();
    let optimal = model.get_parameters(None).to_vec();

    let first = model.simulate(Some(&optimal), &options).unwrap();
    let second = model.simulate(Some(&optimal), &options).unwrap();
    assert_eq!(first.index(), second.index());
    assert_eq!(first.values(), second.values());
    assert_eq!(model.simulate(None, &options).unwrap().values(), first.values());

    let residuals = model.residuals(Some(&optimal), &options).unwrap();
    assert_eq!(model.residuals(Some(&optimal), &options).unwrap().values(), residuals.values());

    let mut shifted = optimal.clone();
    shifted[0] *= 1.1;
    assert_ne!(model.simulate(Some(&shifted), &options).unwrap().values(), first.values());
    assert_ne!(model.residuals(Some(&shifted), &options).unwrap().values(), residuals.values());
    assert_eq!(model.simulate(Some(&optimal), &options).unwrap().values(), first.values());
}

#[test]
fn dump_after_calibration() {
    let model = calibrated_model();
    let json = serde_json::to_value(model.dump(false)).unwrap();
    assert_eq!(json["fit"]["solver"], "LeastSquares");
    assert_eq!(json["settings"]["solver"], "LeastSquares");
    assert_eq!(json["stressmodels"]["recharge"]["stressmodel"], "RechargeModel");
}
