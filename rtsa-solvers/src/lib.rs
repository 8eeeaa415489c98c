//! Solvers for calibrating rtsa models.
//!
//! Every solver implements [`rtsa_core::solver::Solver`] and can be passed to
//! [`rtsa_core::model::Model::solve`].

mod bounds;
mod least_squares;

pub use least_squares::{LeastSquares, LeastSquaresOptions};
