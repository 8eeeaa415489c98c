//! Core of the rtsa time series analysis engine.
//!
//! Observed series are explained by impulse-response models: every stress
//! (precipitation, evaporation, pumping, river levels) is convolved with a
//! parametric response function and the contributions are summed. The
//! [`model::Model`] ties the stress models together, and a
//! [`solver::Solver`] calibrates their parameters.

pub mod diagnostics;
pub mod errors;
pub mod frequency;
pub mod model;
pub mod noisemodel;
pub mod parameters;
pub mod recharge;
pub mod rfunc;
pub mod series;
pub mod solver;
pub mod stressmodels;
pub mod timeseries;
pub mod transform;
pub mod utils;
