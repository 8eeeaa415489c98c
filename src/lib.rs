//! Impulse-response time series models.
//!
//! An observed series, such as a groundwater head, is explained as the sum of
//! the contributions of its stresses, each convolved with a parametric
//! response function. This crate re-exports the simulation engine from
//! `rtsa-core` and the solvers from `rtsa-solvers`.
//!
//! ```ignore
//! use rtsa::model::{InitializeOptions, ModelBuilder, SimulationOptions};
//! use rtsa::LeastSquares;
//!
//! let mut model = ModelBuilder::new(head).with_stressmodel(recharge).build()?;
//! model.solve(&mut LeastSquares::new(), &InitializeOptions::default())?;
//! let simulation = model.simulate(None, &SimulationOptions::default())?;
//! ```

pub use rtsa_core::{
    diagnostics, errors, frequency, model, noisemodel, parameters, recharge, rfunc, series, solver,
    stressmodels, timeseries, transform, utils,
};
pub use rtsa_solvers::{LeastSquares, LeastSquaresOptions};
