//! Bounded nonlinear least squares on top of argmin.
//!
//! Only the parameters with `vary` set are optimised. Bounds are removed by a
//! change of variables (see [`crate::bounds`]), after which L-BFGS minimises
//! half the sum of squared residuals. The gradient `Jᵀr` uses a central
//! difference Jacobian from `finitediff`. The standard errors follow from the
//! linearised covariance
//!
//! $$ \mathrm{cov} = (J^T J)^{-1} \frac{\mathrm{SSR}}{m - k} $$
//!
//! with `m` residuals and `k` varying parameters.

use crate::bounds::Bound;
use argmin::core::{ArgminError, CostFunction, Error, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use argmin_math::ArgminL2Norm;
use finitediff::FiniteDiff;
use indexmap::IndexMap;
use nalgebra::DMatrix;
use ndarray::Array1;
use rtsa_core::errors::{TsaError, TsaResult};
use rtsa_core::parameters::ParameterTable;
use rtsa_core::solver::{CalibrationProblem, FitResult, Solver};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};

/// Tuning of the [`LeastSquares`] solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeastSquaresOptions {
    /// Maximum number of objective evaluations
    pub max_nfev: usize,
    /// Maximum number of L-BFGS iterations
    pub max_iters: u64,
    /// Stop when the cost changes less than this between iterations
    pub ftol: f64,
    /// Stop when the norm of the gradient is below this value
    pub gtol: f64,
    /// Number of past updates L-BFGS keeps
    pub memory: usize,
}

impl Default for LeastSquaresOptions {
    fn default() -> Self {
        Self {
            max_nfev: 2000,
            max_iters: 500,
            ftol: 1e-12,
            gtol: 1e-8,
            memory: 7,
        }
    }
}

/// Bounded least squares solver.
///
/// # Examples
///
/// ```ignore
/// let mut solver = LeastSquares::new();
/// solver.with_bounds("recharge_A", Some(0.0), Some(1000.0));
/// model.solve(&mut solver, &InitializeOptions::default())?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct LeastSquares {
    options: LeastSquaresOptions,
    bounds: IndexMap<String, (Option<f64>, Option<f64>)>,
}

impl LeastSquares {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(&mut self, options: LeastSquaresOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Override the bounds of a parameter for this solver only
    pub fn with_bounds(&mut self, name: &str, pmin: Option<f64>, pmax: Option<f64>) -> &mut Self {
        self.bounds.insert(name.to_string(), (pmin, pmax));
        self
    }

    pub fn options(&self) -> &LeastSquaresOptions {
        &self.options
    }

    /// Lower and upper bound of every parameter, overrides applied
    fn resolve_bounds(&self, table: &ParameterTable) -> TsaResult<Vec<(f64, f64)>> {
        if let Some(name) = self.bounds.keys().find(|name| !table.contains(name)) {
            return Err(TsaError::UnknownParameter(name.clone()));
        }
        let bounds = table
            .iter()
            .map(|p| {
                let (pmin, pmax) = self.bounds.get(&p.name).copied().unwrap_or((p.pmin, p.pmax));
                (pmin.unwrap_or(f64::NEG_INFINITY), pmax.unwrap_or(f64::INFINITY))
            })
            .collect::<Vec<_>>();
        if let Some(p) = table.iter().zip(&bounds).find(|(_, (lo, hi))| lo > hi) {
            return Err(TsaError::Settings(format!(
                "lower bound of '{}' is above its upper bound",
                p.0.name
            )));
        }
        Ok(bounds)
    }
}

fn half_ssr(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

/// Objective restricted to the varying parameters.
///
/// Counts evaluations against the budget and remembers the best point seen,
/// so that an interrupted optimisation still has a result.
struct Reduced<'a> {
    problem: &'a dyn CalibrationProblem,
    full: Vec<f64>,
    free: Vec<usize>,
    bounds: Vec<Bound>,
    max_nfev: usize,
    nfev: Cell<usize>,
    exhausted: Cell<bool>,
    best: RefCell<Option<(f64, Vec<f64>)>>,
}

impl Reduced<'_> {
    fn external(&self, u: &[f64]) -> Vec<f64> {
        u.iter().zip(&self.bounds).map(|(u, b)| b.to_external(*u)).collect()
    }

    fn expand(&self, x: &[f64]) -> Vec<f64> {
        let mut full = self.full.clone();
        for (&i, &v) in self.free.iter().zip(x) {
            full[i] = v;
        }
        full
    }

    /// Residuals at the varying parameter values `x`, outside the budget
    fn objective(&self, x: &[f64]) -> TsaResult<Vec<f64>> {
        self.nfev.set(self.nfev.get() + 1);
        Ok(self.problem.objective(&self.expand(x))?.to_vec())
    }

    /// Residuals at the free variables `u`
    fn residuals(&self, u: &[f64]) -> TsaResult<Vec<f64>> {
        if self.nfev.get() >= self.max_nfev {
            self.exhausted.set(true);
            return Err(TsaError::Solver(format!(
                "evaluation budget of {} exhausted",
                self.max_nfev
            )));
        }
        let x = self.external(u);
        let r = self.objective(&x)?;
        let cost = half_ssr(&r);
        let mut best = self.best.borrow_mut();
        if best.as_ref().map_or(cost.is_finite(), |(c, _)| cost < *c) {
            *best = Some((cost, x));
        }
        Ok(r)
    }

    /// Central difference Jacobian in the free variables, one `Vec` per variable
    fn jacobian(&self, u: &Vec<f64>, m: usize) -> TsaResult<Vec<Vec<f64>>> {
        let failure = RefCell::new(None);
        let jac = u.central_jacobian(&|v: &Vec<f64>| match self.residuals(v) {
            Ok(r) => r,
            Err(err) => {
                failure.borrow_mut().get_or_insert(err);
                vec![f64::NAN; m]
            }
        });
        match failure.into_inner() {
            Some(err) => Err(err),
            None => Ok(jac),
        }
    }

    /// Forward difference Jacobian at the varying parameter values `x`
    fn external_jacobian(&self, x: &Vec<f64>, m: usize) -> TsaResult<Vec<Vec<f64>>> {
        let failure = RefCell::new(None);
        let jac = x.forward_jacobian(&|v: &Vec<f64>| match self.objective(v) {
            Ok(r) => r,
            Err(err) => {
                failure.borrow_mut().get_or_insert(err);
                vec![f64::NAN; m]
            }
        });
        match failure.into_inner() {
            Some(err) => Err(err),
            None => Ok(jac),
        }
    }
}

/// Exposes a [`Reduced`] objective to argmin
struct ArgminAdapter<'a, 'b> {
    reduced: &'a Reduced<'b>,
}

impl CostFunction for ArgminAdapter<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, u: &Self::Param) -> Result<Self::Output, Error> {
        let cost = half_ssr(&self.reduced.residuals(u)?);
        if !cost.is_finite() {
            return Err(ArgminError::ConditionViolated {
                text: format!("non-finite cost {cost}"),
            }
            .into());
        }
        Ok(cost)
    }
}

impl Gradient for ArgminAdapter<'_, '_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, u: &Self::Param) -> Result<Self::Gradient, Error> {
        let r = self.reduced.residuals(u)?;
        let jac = self.reduced.jacobian(u, r.len())?;
        Ok(jac
            .iter()
            .map(|column| column.iter().zip(&r).map(|(j, r)| j * r).sum())
            .collect())
    }
}

/// Standard errors from the linearised covariance, `None` where undefined
fn standard_errors(jac: &DMatrix<f64>, ssr: f64) -> Vec<Option<f64>> {
    let (m, k) = jac.shape();
    if m <= k {
        return vec![None; k];
    }
    let jtj = jac.transpose() * jac;
    match jtj.try_inverse() {
        Some(inverse) => {
            let scale = ssr / (m - k) as f64;
            (0..k)
                .map(|j| {
                    let variance = inverse[(j, j)] * scale;
                    (variance.is_finite() && variance >= 0.0).then(|| variance.sqrt())
                })
                .collect()
        }
        None => vec![None; k],
    }
}

impl Solver for LeastSquares {
    fn name(&self) -> &str {
        "LeastSquares"
    }

    fn solve(&mut self, problem: &dyn CalibrationProblem) -> TsaResult<FitResult> {
        let table = problem.parameters();
        let bounds = self.resolve_bounds(table)?;
        let free: Vec<usize> = table
            .iter()
            .enumerate()
            .filter(|(_, p)| p.vary)
            .map(|(i, _)| i)
            .collect();
        let options = self.options.clone();

        let initial = table.initial_values();
        let reduced = Reduced {
            problem,
            full: initial.to_vec(),
            bounds: free.iter().map(|&i| Bound::new(bounds[i].0, bounds[i].1)).collect(),
            free,
            max_nfev: options.max_nfev,
            nfev: Cell::new(0),
            exhausted: Cell::new(false),
            best: RefCell::new(None),
        };
        let u0: Vec<f64> = reduced
            .free
            .iter()
            .zip(&reduced.bounds)
            .map(|(&i, b)| b.to_internal(initial[i]))
            .collect();

        let r0 = reduced.residuals(&u0)?;
        if !half_ssr(&r0).is_finite() {
            return Err(TsaError::Solver(
                "the objective is not finite at the initial parameters".to_string(),
            ));
        }
        let m = r0.len();
        log::debug!(
            "Least squares with {} of {} parameters varying and {} residuals",
            reduced.free.len(),
            table.len(),
            m
        );
        if reduced.free.is_empty() {
            return Ok(FitResult {
                optimal_params: initial,
                stderr: vec![None; table.len()],
                nfev: reduced.nfev.get(),
            });
        }

        let solver = LBFGS::new(MoreThuenteLineSearch::new(), options.memory)
            .with_tolerance_grad(options.gtol)
            .and_then(|solver| solver.with_tolerance_cost(options.ftol))
            .map_err(|err| TsaError::Settings(err.to_string()))?;
        let outcome = Executor::new(ArgminAdapter { reduced: &reduced }, solver)
            .configure(|state| state.param(u0).max_iters(options.max_iters))
            .run();
        match outcome {
            Ok(result) => {
                let state = result.state();
                log::debug!(
                    "L-BFGS stopped after {} iterations ({:?}), gradient norm {:?}",
                    state.get_iter(),
                    state.get_termination_status(),
                    state.get_gradient().map(|g| g.l2_norm())
                );
            }
            Err(_) if reduced.exhausted.get() => {
                log::warn!(
                    "Least squares stopped after {} evaluations without converging",
                    reduced.nfev.get()
                );
            }
            Err(err) => match err.downcast::<TsaError>() {
                Ok(err) => return Err(err),
                Err(err) => log::warn!("Least squares stopped early: {err}"),
            },
        }

        let (cost, x) = reduced
            .best
            .borrow_mut()
            .take()
            .ok_or_else(|| TsaError::Solver("no finite objective was evaluated".to_string()))?;
        let jac = reduced.external_jacobian(&x, m)?;
        let jac = DMatrix::from_fn(m, x.len(), |i, j| jac[j][i]);
        let free_stderr = standard_errors(&jac, 2.0 * cost);
        let mut stderr = vec![None; table.len()];
        for (k, &i) in reduced.free.iter().enumerate() {
            stderr[i] = free_stderr[k];
        }
        log::info!(
            "Least squares finished with cost {:.6e} after {} evaluations",
            cost,
            reduced.nfev.get()
        );
        Ok(FitResult {
            optimal_params: Array1::from_vec(reduced.expand(&x)),
            stderr,
            nfev: reduced.nfev.get(),
        })
    }
}
