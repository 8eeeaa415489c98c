use super::*;
use crate::errors::TsaError;
use crate::recharge::RechargeFunction;
use crate::timeseries::SeriesKind;
use ndarray::{array, Array};

fn daily_series(name: &str, start: Time, values: Vec<f64>) -> Series {
    let index = (0..values.len()).map(|i| start + i as f64).collect();
    Series::from_vec(name, index, values).unwrap()
}

fn prec(start: Time, n: usize) -> TimeSeries {
    let values = (0..n).map(|i| ((i * 7) % 5) as f64 * 0.001).collect();
    TimeSeries::with_kind(daily_series("prec", start, values), SeriesKind::Prec).unwrap()
}

fn evap(start: Time, n: usize) -> TimeSeries {
    let values = (0..n).map(|i| 0.002 + ((i * 3) % 4) as f64 * 0.0005).collect();
    TimeSeries::with_kind(daily_series("evap", start, values), SeriesKind::Evap).unwrap()
}

#[test]
fn unit_impulse_reproduces_the_block_response() {
    let mut values = vec![0.0; 600];
    values[0] = 1.0;
    let stress = TimeSeries::with_kind(daily_series("pulse", 0.0, values), SeriesKind::Well).unwrap();
    let rfunc = ResponseFunction::gamma();
    let p = [500.0, 1.0, 100.0];
    let sm = StressModel::from(SingleStressModel::new(stress, rfunc, "pulse"));
    let h = sm.simulate(&p, 0.0, 599.0, &Frequency::daily()).unwrap();
    let block = rfunc.block(&p, 1.0, None).unwrap();
    assert_eq!(h.len(), 600);
    for (i, b) in block.iter().enumerate() {
        assert!((h.values()[i] - b).abs() < 1e-9);
    }
    assert!(h.values().iter().skip(block.len()).all(|v| v.abs() < 1e-9));
}

#[test]
fn dual_stress_with_identical_stresses_cancels() {
    let sm = DualStressModel::new(prec(0.0, 200), prec(0.0, 200), ResponseFunction::gamma(), "dual")
        .unwrap();
    assert_eq!(sm.nparam(), 4);
    let sm = StressModel::from(sm);
    let h = sm
        .simulate(&[500.0, 1.0, 100.0, -1.0], -50.0, 199.0, &Frequency::daily())
        .unwrap();
    assert!(h.values().iter().all(|v| *v == 0.0));
    assert_eq!(sm.parameters().names().last().unwrap(), "dual_f");
}

#[test]
fn recharge_model_matches_linear_combination() {
    let rm = RechargeModel::new(
        prec(0.0, 300),
        evap(0.0, 300),
        ResponseFunction::exponential(),
        RechargeFunction::Linear,
        "recharge",
    )
    .unwrap();
    let dual = DualStressModel::new(prec(0.0, 300), evap(0.0, 300), ResponseFunction::exponential(), "recharge")
        .unwrap();
    let p = [300.0, 20.0, -0.8];
    let freq = Frequency::daily();
    let a = StressModel::from(rm).simulate(&p, 0.0, 299.0, &freq).unwrap();
    let b = StressModel::from(dual).simulate(&p, 0.0, 299.0, &freq).unwrap();
    for (x, y) in a.values().iter().zip(b.values().iter()) {
        assert!((x - y).abs() < 1e-12);
    }
}

#[test]
fn recharge_without_overlap_is_an_error() {
    let err = RechargeModel::new(
        prec(0.0, 10),
        evap(100.0, 10),
        ResponseFunction::gamma(),
        RechargeFunction::Linear,
        "recharge",
    )
    .unwrap_err();
    assert!(matches!(err, TsaError::EmptyIntersection { .. }));

    let err = DualStressModel::new(prec(0.0, 10), evap(100.0, 10), ResponseFunction::gamma(), "dual")
        .unwrap_err();
    assert!(matches!(err, TsaError::EmptyIntersection { .. }));
}

#[test]
fn warmup_uses_the_fill_before_value() {
    let sm = StressModel::from(SingleStressModel::new(prec(100.0, 50), ResponseFunction::exponential(), "prec"));
    let p = [1.0, 10.0];
    let freq = Frequency::daily();
    let stress = &sm.get_stress(&p, 0.0, 149.0, &freq).unwrap()[0];
    assert_eq!(stress.len(), 150);
    let mean = sm.stresses()[0].mean();
    assert!((stress.values()[0] - mean).abs() < 1e-15);
    let h = sm.simulate(&p, 0.0, 149.0, &freq).unwrap();
    assert_eq!(h.index()[0], 0.0);
    assert!(h.values().iter().all(|v| v.is_finite()));
}

#[test]
fn well_model_sums_the_wells() {
    let freq = Frequency::daily();
    let pumping = |start| {
        TimeSeries::with_kind(daily_series("well", start, vec![100.0; 50]), SeriesKind::Well).unwrap()
    };
    let rfunc = ResponseFunction::theis().with_up(false);
    let both = WellModel::new(vec![pumping(0.0), pumping(20.0)], rfunc, "wells", vec![50.0, 200.0]).unwrap();
    let first = WellModel::new(vec![pumping(0.0)], rfunc, "wells", vec![50.0]).unwrap();
    let second = WellModel::new(vec![pumping(20.0)], rfunc, "wells", vec![200.0]).unwrap();
    let p = [0.5, 100.0];
    let h = both.simulate(&p, 0.0, 99.0, &freq).unwrap();
    let h1 = first.simulate(&p, 0.0, 99.0, &freq).unwrap();
    let h2 = second.simulate(&p, 0.0, 99.0, &freq).unwrap();
    for i in 0..100 {
        assert!((h.values()[i] - h1.values()[i] - h2.values()[i]).abs() < 1e-12);
    }
    assert!(h.values()[60] < 0.0);
    let sm = StressModel::from(both);
    assert_eq!(sm.tmin(), Some(0.0));
    assert_eq!(sm.tmax(), Some(69.0));
}

#[test]
fn well_model_validation() {
    let well = || TimeSeries::with_kind(daily_series("well", 0.0, vec![1.0; 5]), SeriesKind::Well).unwrap();
    let late = TimeSeries::with_kind(daily_series("well", 50.0, vec![1.0; 5]), SeriesKind::Well).unwrap();
    let err = WellModel::new(vec![well(), well()], ResponseFunction::theis(), "w", vec![1.0]).unwrap_err();
    assert!(matches!(err, TsaError::Settings(_)));
    let err = WellModel::new(vec![well(), late], ResponseFunction::theis(), "w", vec![1.0, 2.0]).unwrap_err();
    assert!(matches!(err, TsaError::EmptyIntersection { .. }));
}

#[test]
fn step_model_starts_after_tstart() {
    let sm = StressModel::from(StepModel::new(100.0, "step", None));
    assert_eq!(sm.nparam(), 2);
    assert_eq!(sm.tmin(), None);
    let tstart = sm.parameters().get("step_tstart").unwrap();
    assert!(!tstart.vary);
    let h = sm.simulate(&[2.0, 100.0], 98.0, 103.0, &Frequency::daily()).unwrap();
    assert_eq!(h.values(), &array![0.0, 0.0, 0.0, 2.0, 2.0, 2.0]);
}

#[test]
fn direct_model_with_unit_response_reproduces_a_level_series() {
    let stress = daily_series("level", 10.0, vec![2.0, 2.0, 5.0, 5.0]);
    let stress = TimeSeries::with_kind(stress, SeriesKind::Level).unwrap();
    let sm = StressModel::from(DirectResponseModel::new(stress, ResponseFunction::one(), "level"));
    let h = sm.simulate(&[1.0], 8.0, 13.0, &Frequency::daily()).unwrap();
    assert_eq!(h.values(), &array![0.0, 0.0, 2.0, 2.0, 5.0, 5.0]);
}

#[test]
fn constant_contribution() {
    let sm = StressModel::from(Constant::new("offset", 3.0, None, None));
    let h = sm.simulate(&[4.5], 0.0, 2.0, &Frequency::daily()).unwrap();
    assert_eq!(h.values(), &Array::from_elem(3, 4.5));
    assert_eq!(sm.parameters().names(), vec!["offset_d".to_string()]);
}

#[test]
fn wrong_parameter_count() {
    let sm = StressModel::from(SingleStressModel::new(prec(0.0, 10), ResponseFunction::gamma(), "prec"));
    let err = sm.simulate(&[1.0, 2.0], 0.0, 9.0, &Frequency::daily()).unwrap_err();
    assert_eq!(err, TsaError::ParameterCount { expected: 3, got: 2 });
}

#[test]
fn setters_are_fail_soft() {
    let mut sm = StressModel::from(SingleStressModel::new(prec(0.0, 10), ResponseFunction::gamma(), "prec"));
    assert!(sm.set_initial("prec_A", 10.0));
    assert!(sm.set_vary("prec_n", false));
    assert!(!sm.set_pmax("prec_B", Some(1.0)));
    assert_eq!(sm.parameters().get("prec_A").unwrap().initial, 10.0);
    assert!(!sm.parameters().get("prec_n").unwrap().vary);
}

#[test]
fn update_stress_resamples() {
    let mut sm = StressModel::from(SingleStressModel::new(prec(0.0, 70), ResponseFunction::gamma(), "prec"));
    assert_eq!(sm.frequencies(), vec![Frequency::daily()]);
    sm.update_stress(&"7D".parse().unwrap()).unwrap();
    assert_eq!(sm.stresses()[0].series().len(), 11);
    assert_eq!(sm.frequencies()[0].to_string(), "7D");
}

#[test]
fn dump_describes_the_model() {
    let sm = StressModel::from(
        WellModel::new(
            vec![TimeSeries::with_kind(daily_series("well", 0.0, vec![1.0; 5]), SeriesKind::Well).unwrap()],
            ResponseFunction::hantush().with_up(false),
            "wells",
            vec![25.0],
        )
        .unwrap(),
    );
    let dump = sm.dump(false);
    assert_eq!(dump.stressmodel, "WellModel");
    assert_eq!(dump.rfunc.as_deref(), Some("Hantush"));
    assert_eq!(dump.up, Some(false));
    assert_eq!(dump.distances, Some(vec![25.0]));
    assert_eq!(dump.stress.len(), 1);
    assert!(dump.stress[0].series.is_none());
    let json = serde_json::to_value(&dump).unwrap();
    assert_eq!(json["name"], "wells");
}
