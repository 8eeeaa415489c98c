//! A model explains an observed series as the sum of the contributions of its stress models.
//!
//! The model owns the observed series, the stress models, an optional
//! constant, transform and noise model, and the parameters of all of them.
//! It resolves the simulation frequency and window, simulates every stress
//! model on a shared grid (including a warmup period), and compares the
//! result with the observations to produce residuals and, through the noise
//! model, innovations. These form the objective that a [`Solver`](crate::solver::Solver)
//! minimises.
//!
//! Values that only depend on the structure of the model (the simulation
//! grid, the observations in the calibration window and whether the
//! simulation must be interpolated) are computed lazily and kept until the
//! model changes.

mod builder;
mod cache;
mod calibration;
mod runtime;
mod simulation;
mod timing;
mod types;

#[cfg(test)]
mod tests;

pub use builder::ModelBuilder;
pub use calibration::ModelObjective;
pub use runtime::Model;
pub use types::{
    AlignmentPolicy, FitSummary, InitializeOptions, ModelDump, ModelSettings, SimulationOptions,
    TimeBound,
};
