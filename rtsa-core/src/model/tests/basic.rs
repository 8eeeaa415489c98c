//! Building a model and changing its structure.

use super::*;
use crate::diagnostics::DiagnosticKind;
use crate::errors::TsaError;
use crate::frequency::Frequency;
use crate::model::{ModelSettings, TimeBound};
use crate::noisemodel::NoiseModel;
use crate::parameters::ParameterOwner;
use crate::stressmodels::{Constant, SingleStressModel, StepModel};
use crate::transform::ThresholdTransform;
use is_close::is_close;

fn expected_rows(model: &Model) -> usize {
    let stressmodels: usize = model
        .stressmodel_names()
        .iter()
        .map(|name| model.stressmodel(name).unwrap().nparam())
        .sum();
    let constant = model.constant().map_or(0, |c| c.nparam());
    let transform = model.transform().map_or(0, |t| t.nparam());
    let noise = model.noisemodel().map_or(0, |n| n.nparam());
    stressmodels + constant + transform + noise
}

#[test]
fn default_model() {
    let oseries = head(0.0, 100);
    let mean = oseries.mean();
    let model = Model::new(oseries).unwrap();

    assert_eq!(model.name(), "head");
    assert_eq!(
        model.parameters().names(),
        vec!["constant_d".to_string(), "noise_alpha".to_string()]
    );
    let constant = model.parameters().get("constant_d").unwrap();
    assert!(is_close!(constant.initial, mean));
    assert_eq!(constant.owner, ParameterOwner::Constant);
    assert!(model.layout().is_consistent_with(model.parameters()));
    assert!(model.settings().freq.is_none());
    assert!(model.fit().is_none());
}

#[test]
fn stress_model_parameters_come_first() {
    let (model, _) = recharge_setup();
    assert_eq!(
        model.parameters().names(),
        vec!["recharge_A", "recharge_a", "recharge_f", "constant_d", "noise_alpha"]
    );
    let blocks = model.layout().blocks();
    assert_eq!(blocks[0].owner, ParameterOwner::StressModel("recharge".to_string()));
    assert_eq!(blocks[0].range(), 0..3);
    assert_eq!(blocks[1].owner, ParameterOwner::Constant);
    assert_eq!(blocks[2].range(), 4..5);
    assert_eq!(model.settings().freq, Some(Frequency::daily()));
}

#[test]
fn duplicate_stress_model_names() {
    let (mut model, _) = recharge_setup();
    let err = model.add_stressmodel(recharge_model("recharge"), false).unwrap_err();
    assert_eq!(err, TsaError::DuplicateStressModel("recharge".to_string()));
    assert!(err.is_configuration());

    model.add_stressmodel(recharge_model("recharge"), true).unwrap();
    assert_eq!(model.stressmodel_names(), vec!["recharge".to_string()]);
    assert_eq!(model.parameters().len(), 5);
}

#[test]
fn row_count_follows_the_structure() {
    let (mut model, sink) = recharge_setup();
    assert_eq!(model.parameters().len(), expected_rows(&model));

    let well = TimeSeries::with_kind(daily("well", 0.0, vec![100.0; 800]), SeriesKind::Well).unwrap();
    model
        .add_stressmodel(SingleStressModel::new(well, ResponseFunction::gamma(), "well"), false)
        .unwrap();
    assert_eq!(model.parameters().len(), expected_rows(&model));
    assert_eq!(model.parameters().len(), 8);

    model.add_stressmodel(StepModel::new(600.0, "step", None), false).unwrap();
    model.add_transform(ThresholdTransform::default());
    assert_eq!(model.parameters().len(), expected_rows(&model));

    assert!(model.del_stressmodel("recharge"));
    assert_eq!(model.parameters().len(), expected_rows(&model));
    assert!(model.del_constant());
    assert!(model.del_noisemodel());
    assert!(model.del_transform());
    assert_eq!(model.parameters().len(), expected_rows(&model));
    assert_eq!(model.parameters().names(), vec!["well_A", "well_n", "well_a", "step_d", "step_tstart"]);
    assert!(model.layout().is_consistent_with(model.parameters()));

    model.add_noisemodel(NoiseModel::new());
    assert_eq!(model.parameters().len(), expected_rows(&model));
    assert_eq!(sink.count(DiagnosticKind::MissingComponent), 0);
}

#[test]
fn deleting_absent_components_is_reported() {
    let sink = CollectingSink::new();
    let mut model = ModelBuilder::new(head(0.0, 50))
        .with_constant(false)
        .with_noise_model(false)
        .with_diagnostics(Arc::new(sink.clone()))
        .build()
        .unwrap();
    let epoch = model.epoch();

    assert!(!model.del_stressmodel("recharge"));
    assert!(!model.del_constant());
    assert!(!model.del_transform());
    assert!(!model.del_noisemodel());
    assert_eq!(sink.count(DiagnosticKind::MissingComponent), 4);
    assert_eq!(model.epoch(), epoch);
    assert!(model.parameters().is_empty());
}

#[test]
fn structural_changes_bump_the_epoch() {
    let (mut model, _) = recharge_setup();
    let epoch = model.epoch();
    model.add_constant(Constant::model_constant(1.0));
    assert!(model.epoch() > epoch);
    let epoch = model.epoch();
    model.del_stressmodel("recharge");
    assert!(model.epoch() > epoch);
}

#[test]
fn frequency_from_the_stresses() {
    // Irregular observations leave the choice to the stresses
    let oseries = Series::from_vec("head", vec![0.0, 3.0, 4.5, 20.0, 41.0], vec![1.0; 5]).unwrap();
    let weekly = |name: &str| {
        let values = vec![0.01; 20];
        let index = (0..20).map(|i| i as f64 * 7.0).collect();
        TimeSeries::with_kind(Series::from_vec(name, index, values).unwrap(), SeriesKind::Prec).unwrap()
    };
    let model = ModelBuilder::new(oseries.clone())
        .with_stressmodel(SingleStressModel::new(weekly("prec"), ResponseFunction::exponential(), "prec"))
        .build()
        .unwrap();
    assert_eq!(model.freq().dt(), 7.0);

    let daily_prec = prec(0.0, 140);
    let model = ModelBuilder::new(oseries)
        .with_stressmodel(SingleStressModel::new(weekly("prec"), ResponseFunction::exponential(), "prec"))
        .with_stressmodel(SingleStressModel::new(daily_prec, ResponseFunction::exponential(), "daily"))
        .build()
        .unwrap();
    // The weekly stress fixed the frequency when it was added
    assert_eq!(model.freq().dt(), 7.0);
}

#[test]
fn frequency_defaults_to_daily() {
    let sink = CollectingSink::new();
    let oseries = Series::from_vec("head", vec![0.0, 3.0, 4.5, 20.0], vec![1.0; 4]).unwrap();
    let model = ModelBuilder::new(oseries)
        .with_diagnostics(Arc::new(sink.clone()))
        .with_stressmodel(StepModel::new(10.0, "step", None))
        .build()
        .unwrap();
    assert_eq!(model.freq(), Frequency::daily());
    assert_eq!(sink.count(DiagnosticKind::FrequencyDefaulted), 1);
}

#[test]
fn inconsistent_time_offsets_are_rejected() {
    let (mut model, _) = recharge_setup();
    let shifted = TimeSeries::with_kind(daily("river", 0.5, vec![1.0; 100]), SeriesKind::Level).unwrap();
    let err = model
        .add_stressmodel(SingleStressModel::new(shifted, ResponseFunction::exponential(), "river"), false)
        .unwrap_err();
    assert!(matches!(err, TsaError::InconsistentTimeOffset(_)));
    assert_eq!(model.stressmodel_names(), vec!["recharge".to_string()]);
    assert_eq!(model.settings().time_offset, 0.0);
}

#[test]
fn time_offset_of_the_stresses_moves_the_window() {
    let oseries = daily("head", 0.25, vec![1.0; 50]);
    let stress = TimeSeries::with_kind(daily("well", 0.25, vec![1.0; 60]), SeriesKind::Well).unwrap();
    let model = ModelBuilder::new(oseries)
        .with_stressmodel(SingleStressModel::new(stress, ResponseFunction::exponential(), "well"))
        .build()
        .unwrap();
    assert!(is_close!(model.settings().time_offset, 0.25));
    let (tmin, tmax) = model.get_tmin_tmax(None, None, None, TimeBound::Oseries).unwrap();
    assert!(is_close!(tmin, 0.25));
    assert!(is_close!(tmax, 49.25));
}

#[test]
fn calibration_window_checks() {
    let (model, _) = recharge_setup();
    let (tmin, tmax) = model.get_tmin_tmax(None, None, None, TimeBound::Oseries).unwrap();
    assert_eq!((tmin, tmax), (400.0, 799.0));
    let (tmin, tmax) = model.get_tmin_tmax(None, None, None, TimeBound::Stresses).unwrap();
    assert_eq!((tmin, tmax), (0.0, 799.0));
    let (tmin, _) = model
        .get_tmin_tmax(Some(100.0), None, None, TimeBound::Oseries)
        .unwrap();
    assert_eq!(tmin, 400.0);

    let err = model
        .get_tmin_tmax(Some(500.0), Some(450.0), None, TimeBound::Oseries)
        .unwrap_err();
    assert!(matches!(err, TsaError::InvalidTimeRange { .. }));
    // Valid for a simulation, but it ends before the first observation
    assert!(model
        .get_tmin_tmax(Some(0.0), Some(300.0), None, TimeBound::Stresses)
        .is_ok());
    let err = model
        .get_tmin_tmax(Some(0.0), Some(300.0), None, TimeBound::Oseries)
        .unwrap_err();
    assert!(matches!(err, TsaError::InvalidTimeRange { .. }));

    let gappy = Series::from_vec("head", vec![0.0, 1.0, 50.0, 51.0], vec![1.0; 4]).unwrap();
    let model = ModelBuilder::new(gappy)
        .with_settings(ModelSettings {
            freq: Some(Frequency::daily()),
            ..ModelSettings::default()
        })
        .build()
        .unwrap();
    let err = model
        .get_tmin_tmax(Some(10.0), Some(20.0), None, TimeBound::Oseries)
        .unwrap_err();
    assert_eq!(err, TsaError::NoObservations { tmin: 10.0, tmax: 20.0 });
}

#[test]
fn settings_from_toml() {
    let settings = ModelSettings::from_toml_str(
        r#"
        freq = "7D"
        warmup = 1825.0
        noise = false
        "#,
    )
    .unwrap();
    assert_eq!(settings.freq.unwrap().to_string(), "7D");
    assert_eq!(settings.warmup, 1825.0);
    assert!(!settings.noise);
    assert!(settings.fit_constant);
    assert!(settings.tmin.is_none());

    let err = ModelSettings::from_toml_str("freq = \"3Q\"").unwrap_err();
    assert!(matches!(err, TsaError::Settings(_)));
}

#[test]
fn settings_without_noise_leave_out_the_noise_parameter() {
    let model = ModelBuilder::new(head(0.0, 50))
        .with_settings(ModelSettings::from_toml_str("noise = false").unwrap())
        .build()
        .unwrap();
    assert!(model.noisemodel().is_some());
    assert_eq!(model.parameters().names(), vec!["constant_d".to_string()]);
}

#[test]
fn dump_snapshot() {
    let (mut model, _) = recharge_setup();
    model.add_transform(ThresholdTransform::default());
    let dump = model.dump(false);
    assert_eq!(dump.name, "head");
    assert!(dump.constant);
    assert_eq!(dump.stressmodels["recharge"].stressmodel, "RechargeModel");
    assert_eq!(dump.stressmodels["recharge"].recharge.as_deref(), Some("Linear"));
    assert_eq!(dump.parameters.len(), 7);
    assert!(dump.oseries.series.is_none());

    let json = serde_json::to_value(&dump).unwrap();
    assert_eq!(json["noisemodel"]["name"], "noise");
    assert_eq!(json["settings"]["freq"], "D");
    assert_eq!(json["settings"]["warmup"], 3650.0);
    assert!(model.dump(true).oseries.series.is_some());
}
