//! Interface between a model and the optimiser that calibrates it.
//!
//! The model exposes its objective as a [`CalibrationProblem`]: a table of
//! parameters (initial values, bounds and which of them vary) plus a function
//! returning the vector of residuals (or innovations) for a full parameter
//! vector. A [`Solver`] minimises the sum of squares of that vector.

use crate::errors::TsaResult;
use crate::parameters::ParameterTable;
use crate::series::FloatValue;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Objective surface of a model
pub trait CalibrationProblem {
    /// Parameters in the order of the flat parameter vector
    fn parameters(&self) -> &ParameterTable;

    /// Residual vector whose sum of squares is minimised.
    ///
    /// `p` always holds every parameter, including those that do not vary.
    fn objective(&self, p: &[FloatValue]) -> TsaResult<Array1<FloatValue>>;
}

/// Result of an optimisation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Optimal value of every parameter, fixed parameters keep their initial value
    pub optimal_params: Array1<FloatValue>,
    /// Standard error of every parameter, `None` where it could not be estimated
    pub stderr: Vec<Option<FloatValue>>,
    /// Number of objective evaluations
    pub nfev: usize,
}

pub trait Solver {
    fn name(&self) -> &str;

    fn solve(&mut self, problem: &dyn CalibrationProblem) -> TsaResult<FitResult>;
}
