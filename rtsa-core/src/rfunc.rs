//! Response functions
//!
//! A response function maps a small parameter vector onto the response of the
//! system to a unit stress. The step response is the accumulated response to a
//! stress that switches on at `t = 0`; the block response is its discrete
//! difference and is the kernel that stresses are convolved with.
//!
//! The step response is sampled at `t = dt, 2 dt, ...` up to a truncation
//! horizon `tmax`, which is derived from the `cutoff` quantile of the
//! underlying kernel.
//!
//! The radial-flow functions ([`ResponseFunction::Hantush`] and
//! [`ResponseFunction::Theis`]) take the distance between the stress and the
//! observation as an additional input.

use crate::errors::{TsaError, TsaResult};
use crate::parameters::{Parameter, ParameterOwner};
use crate::series::{FloatValue, Time};
use crate::utils::special::{bessel_k0, exp1};
use ndarray::{array, Array, Array1};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Gamma};
use statrs::function::gamma::gamma_lr;
use std::f64::consts::PI;

/// Truncation horizon (days) of the radial-flow response functions.
///
/// There is no closed form for their cutoff quantile so a long fixed horizon is
/// used instead.
pub const RADIAL_TMAX: Time = 10_000.0;

/// Sign convention and truncation of a response function
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSettings {
    /// `true` if a positive stress raises the simulated series
    pub up: bool,
    /// Fraction of the total response retained before truncation, in (0, 1)
    pub cutoff: f64,
}

impl Default for ResponseSettings {
    fn default() -> Self {
        Self {
            up: true,
            cutoff: 0.99,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseFunction {
    /// `A * P(n, t / a)` with `P` the regularised lower incomplete gamma function
    Gamma(ResponseSettings),
    /// `A * (1 - exp(-t / a))`
    Exponential(ResponseSettings),
    /// Hantush well function for a leaky aquifer, parameters `S`, `T` and `c`
    Hantush(ResponseSettings),
    /// Theis well function for a confined aquifer, parameters `S` and `T`
    Theis(ResponseSettings),
    /// Instantaneous response with gain `d`
    One(ResponseSettings),
}

impl ResponseFunction {
    pub fn gamma() -> Self {
        ResponseFunction::Gamma(ResponseSettings::default())
    }

    pub fn exponential() -> Self {
        ResponseFunction::Exponential(ResponseSettings::default())
    }

    pub fn hantush() -> Self {
        ResponseFunction::Hantush(ResponseSettings::default())
    }

    pub fn theis() -> Self {
        ResponseFunction::Theis(ResponseSettings::default())
    }

    pub fn one() -> Self {
        ResponseFunction::One(ResponseSettings::default())
    }

    fn settings(&self) -> &ResponseSettings {
        match self {
            ResponseFunction::Gamma(s)
            | ResponseFunction::Exponential(s)
            | ResponseFunction::Hantush(s)
            | ResponseFunction::Theis(s)
            | ResponseFunction::One(s) => s,
        }
    }

    fn settings_mut(&mut self) -> &mut ResponseSettings {
        match self {
            ResponseFunction::Gamma(s)
            | ResponseFunction::Exponential(s)
            | ResponseFunction::Hantush(s)
            | ResponseFunction::Theis(s)
            | ResponseFunction::One(s) => s,
        }
    }

    pub fn with_up(mut self, up: bool) -> Self {
        self.settings_mut().up = up;
        self
    }

    /// Set the cutoff. Values outside (0, 1) are rejected.
    pub fn with_cutoff(mut self, cutoff: f64) -> TsaResult<Self> {
        if !(cutoff > 0.0 && cutoff < 1.0) {
            return Err(TsaError::Error(format!(
                "cutoff must lie in (0, 1), got {}",
                cutoff
            )));
        }
        self.settings_mut().cutoff = cutoff;
        Ok(self)
    }

    pub fn up(&self) -> bool {
        self.settings().up
    }

    pub fn cutoff(&self) -> f64 {
        self.settings().cutoff
    }

    fn sign(&self) -> f64 {
        if self.up() {
            1.0
        } else {
            -1.0
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResponseFunction::Gamma(_) => "Gamma",
            ResponseFunction::Exponential(_) => "Exponential",
            ResponseFunction::Hantush(_) => "Hantush",
            ResponseFunction::Theis(_) => "Theis",
            ResponseFunction::One(_) => "One",
        }
    }

    pub fn nparam(&self) -> usize {
        match self {
            ResponseFunction::Gamma(_) | ResponseFunction::Hantush(_) => 3,
            ResponseFunction::Exponential(_) | ResponseFunction::Theis(_) => 2,
            ResponseFunction::One(_) => 1,
        }
    }

    /// Whether the response depends on the distance to the stress
    pub fn is_radial(&self) -> bool {
        matches!(
            self,
            ResponseFunction::Hantush(_) | ResponseFunction::Theis(_)
        )
    }

    /// Parameter template, one row per physical parameter, prefixed with `name`
    pub fn set_parameters(&self, name: &str) -> Vec<Parameter> {
        let owner = ParameterOwner::StressModel(name.to_string());
        let gain = |suffix: &str, initial: f64, limit: f64| {
            let param = format!("{}_{}", name, suffix);
            if self.up() {
                Parameter::bounded(&param, initial, 0.0, limit, owner.clone())
            } else {
                Parameter::bounded(&param, -initial, -limit, 0.0, owner.clone())
            }
        };
        let bounded = |suffix: &str, initial: f64, pmin: f64, pmax: f64| {
            Parameter::bounded(&format!("{}_{}", name, suffix), initial, pmin, pmax, owner.clone())
        };
        match self {
            ResponseFunction::Gamma(_) => vec![
                gain("A", 500.0, 5000.0),
                bounded("n", 1.0, 0.01, 5.0),
                bounded("a", 100.0, 1.0, 5000.0),
            ],
            ResponseFunction::Exponential(_) => vec![
                gain("A", 500.0, 5000.0),
                bounded("a", 100.0, 1.0, 5000.0),
            ],
            ResponseFunction::Hantush(_) => vec![
                bounded("S", 0.01, 1e-3, 1.0),
                bounded("T", 100.0, 10.0, 5000.0),
                bounded("c", 2000.0, 1000.0, 5000.0),
            ],
            ResponseFunction::Theis(_) => vec![
                bounded("S", 0.5, 0.3, 1.0),
                bounded("T", 100.0, 10.0, 5000.0),
            ],
            ResponseFunction::One(_) => vec![Parameter::new(
                &format!("{}_d", name),
                self.sign(),
                None,
                None,
                true,
                owner.clone(),
            )],
        }
    }

    fn check(&self, p: &[FloatValue], r: Option<f64>) -> TsaResult<()> {
        if p.len() != self.nparam() {
            return Err(TsaError::ParameterCount {
                expected: self.nparam(),
                got: p.len(),
            });
        }
        let positive = |value: f64, label: &str| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(TsaError::degenerate(
                    self.name(),
                    format!("{} must be positive and finite, got {}", label, value),
                ))
            }
        };
        match self {
            ResponseFunction::Gamma(_) => {
                positive(p[1], "n")?;
                positive(p[2], "a")
            }
            ResponseFunction::Exponential(_) => positive(p[1], "a"),
            ResponseFunction::Hantush(_) => {
                positive(p[0], "S")?;
                positive(p[1], "T")?;
                positive(p[2], "c")?;
                positive(self.distance(r)?, "r")
            }
            ResponseFunction::Theis(_) => {
                positive(p[0], "S")?;
                positive(p[1], "T")?;
                positive(self.distance(r)?, "r")
            }
            ResponseFunction::One(_) => Ok(()),
        }
    }

    fn distance(&self, r: Option<f64>) -> TsaResult<f64> {
        r.ok_or_else(|| TsaError::degenerate(self.name(), "a distance is required"))
    }

    /// Truncation horizon in days
    pub fn tmax(&self, p: &[FloatValue], r: Option<f64>) -> TsaResult<Time> {
        self.check(p, r)?;
        let cutoff = self.cutoff();
        if !(cutoff > 0.0 && cutoff < 1.0) {
            return Err(TsaError::degenerate(
                self.name(),
                format!("cutoff must lie in (0, 1), got {}", cutoff),
            ));
        }
        let tmax = match self {
            ResponseFunction::Gamma(s) => {
                let gamma = Gamma::new(p[1], 1.0)
                    .map_err(|e| TsaError::degenerate(self.name(), e.to_string()))?;
                gamma.inverse_cdf(s.cutoff) * p[2]
            }
            ResponseFunction::Exponential(s) => -p[1] * (1.0 - s.cutoff).ln(),
            ResponseFunction::Hantush(_) | ResponseFunction::Theis(_) => RADIAL_TMAX,
            ResponseFunction::One(_) => 0.0,
        };
        if !tmax.is_finite() {
            return Err(TsaError::degenerate(
                self.name(),
                format!("truncation horizon is not finite for parameters {:?}", p),
            ));
        }
        Ok(tmax)
    }

    /// Step response at the elapsed times `t` (days), zero for `t <= 0`
    pub fn step_at(
        &self,
        p: &[FloatValue],
        t: &Array1<Time>,
        r: Option<f64>,
    ) -> TsaResult<Array1<FloatValue>> {
        self.check(p, r)?;
        let sign = self.sign();
        let response = match self {
            ResponseFunction::Gamma(_) => {
                let (amplitude, n, a) = (p[0], p[1], p[2]);
                t.mapv(|t| {
                    if t > 0.0 {
                        amplitude * gamma_lr(n, t / a)
                    } else {
                        0.0
                    }
                })
            }
            ResponseFunction::Exponential(_) => {
                let (amplitude, a) = (p[0], p[1]);
                t.mapv(|t| {
                    if t > 0.0 {
                        amplitude * (1.0 - (-t / a).exp())
                    } else {
                        0.0
                    }
                })
            }
            ResponseFunction::Hantush(_) => {
                let (s, transmissivity, c) = (p[0], p[1], p[2]);
                let rho = self.distance(r)? / (transmissivity * c).sqrt();
                let h_inf = bessel_k0(rho);
                let e1_rho = exp1(rho);
                let w = (e1_rho - h_inf) / (e1_rho - exp1(rho / 2.0));
                let scale = sign / (4.0 * PI * transmissivity);
                t.mapv(|t| {
                    if t <= 0.0 {
                        return 0.0;
                    }
                    let tau = (2.0 / rho * t / (c * s)).ln();
                    let i = h_inf - w * exp1(rho / 2.0 * tau.abs().exp())
                        + (w - 1.0) * exp1(rho * tau.cosh());
                    scale * (h_inf + tau.signum() * i)
                })
            }
            ResponseFunction::Theis(_) => {
                let (s, transmissivity) = (p[0], p[1]);
                let r = self.distance(r)?;
                let scale = sign / (4.0 * PI * transmissivity);
                t.mapv(|t| {
                    if t > 0.0 {
                        scale * exp1(r * r * s / (4.0 * transmissivity * t))
                    } else {
                        0.0
                    }
                })
            }
            ResponseFunction::One(_) => t.mapv(|t| if t > 0.0 { p[0] } else { 0.0 }),
        };
        if response.iter().any(|v| !v.is_finite()) {
            return Err(TsaError::degenerate(
                self.name(),
                format!("step response is not finite for parameters {:?}", p),
            ));
        }
        Ok(response)
    }

    /// Step response sampled at `t = k * dt` for `k = 1..=max(ceil(tmax / dt), 2)`.
    ///
    /// [`ResponseFunction::One`] is sampled at `t = 0` and `t = dt` instead,
    /// giving `[0, d]`.
    pub fn step(&self, p: &[FloatValue], dt: f64, r: Option<f64>) -> TsaResult<Array1<FloatValue>> {
        if let ResponseFunction::One(_) = self {
            self.check(p, r)?;
            return Ok(array![0.0, p[0]]);
        }
        let tmax = self.tmax(p, r)?;
        let nsteps = ((tmax / dt).ceil() as usize).max(2);
        let t = Array::from_iter((1..=nsteps).map(|k| k as f64 * dt));
        self.step_at(p, &t, r)
    }

    /// Block response, the difference of consecutive step response samples
    pub fn block(&self, p: &[FloatValue], dt: f64, r: Option<f64>) -> TsaResult<Array1<FloatValue>> {
        let step = self.step(p, dt, r)?;
        Ok(&step.slice(ndarray::s![1..]) - &step.slice(ndarray::s![..-1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    fn cases() -> Vec<(ResponseFunction, Vec<f64>, Option<f64>)> {
        vec![
            (ResponseFunction::gamma(), vec![500.0, 1.5, 50.0], None),
            (ResponseFunction::exponential(), vec![200.0, 30.0], None),
            (ResponseFunction::hantush(), vec![0.01, 100.0, 2000.0], Some(500.0)),
            (ResponseFunction::theis(), vec![0.5, 100.0], Some(50.0)),
            (ResponseFunction::one(), vec![2.5], None),
        ]
    }

    #[test]
    fn block_is_diff_of_step() {
        for (rfunc, p, r) in cases() {
            let step = rfunc.step(&p, 1.0, r).unwrap();
            let block = rfunc.block(&p, 1.0, r).unwrap();
            assert_eq!(block.len(), step.len() - 1, "{}", rfunc.name());
            for i in 0..block.len() {
                assert_eq!(block[i], step[i + 1] - step[i]);
            }
        }
    }

    #[test]
    fn gamma_cutoff_contract() {
        let rfunc = ResponseFunction::gamma();
        let step = rfunc.step(&[500.0, 1.0, 100.0], 1.0, None).unwrap();
        let last = step[step.len() - 1];
        assert!((500.0 - last) / 500.0 < 0.01);
        assert_eq!(step.len(), 461);
    }

    #[test]
    fn exponential_horizon() {
        let rfunc = ResponseFunction::exponential();
        let tmax = rfunc.tmax(&[1.0, 100.0], None).unwrap();
        assert!(is_close!(tmax, -100.0 * 0.01f64.ln()));
        let step = rfunc.step(&[1.0, 100.0], 1.0, None).unwrap();
        assert!(is_close!(step[0], 1.0 - (-0.01f64).exp()));
    }

    #[test]
    fn coarser_time_step_samples_fewer_points() {
        let rfunc = ResponseFunction::gamma();
        let p = [500.0, 1.0, 100.0];
        let daily = rfunc.step(&p, 1.0, None).unwrap();
        let weekly = rfunc.step(&p, 7.0, None).unwrap();
        assert_eq!(weekly.len(), 66);
        assert!(is_close!(weekly[0], daily[6]));
    }

    #[test]
    fn step_is_at_least_two_samples() {
        let rfunc = ResponseFunction::exponential();
        let step = rfunc.step(&[1.0, 0.1], 1.0, None).unwrap();
        assert_eq!(step.len(), 2);
    }

    #[test]
    fn one_is_an_instantaneous_response() {
        let rfunc = ResponseFunction::one();
        assert_eq!(rfunc.step(&[3.0], 1.0, None).unwrap(), array![0.0, 3.0]);
        assert_eq!(rfunc.block(&[3.0], 1.0, None).unwrap(), array![3.0]);
    }

    #[test]
    fn hantush_approaches_steady_state() {
        let rfunc = ResponseFunction::hantush();
        let (s, t, c, r) = (0.01, 100.0, 2000.0, 500.0);
        let step = rfunc.step(&[s, t, c], 1.0, Some(r)).unwrap();
        assert_eq!(step.len(), RADIAL_TMAX as usize);
        let steady = 2.0 * bessel_k0(r / (t * c as f64).sqrt()) / (4.0 * PI * t);
        let last = step[step.len() - 1];
        assert!(((last - steady) / steady).abs() < 0.01);
        let block = rfunc.block(&[s, t, c], 1.0, Some(r)).unwrap();
        assert!(block.iter().all(|b| *b >= -1e-12));
    }

    #[test]
    fn down_flips_the_sign() {
        let up = ResponseFunction::theis();
        let down = ResponseFunction::theis().with_up(false);
        let p = [0.5, 100.0];
        let s_up = up.step(&p, 1.0, Some(50.0)).unwrap();
        let s_down = down.step(&p, 1.0, Some(50.0)).unwrap();
        assert!(s_up.iter().zip(s_down.iter()).all(|(a, b)| *a == -*b));
        assert!(s_up[s_up.len() - 1] > 0.0);
    }

    #[test]
    fn step_at_is_zero_before_the_stress() {
        let rfunc = ResponseFunction::gamma();
        let values = rfunc
            .step_at(&[10.0, 1.0, 5.0], &array![-3.0, 0.0, 5.0], None)
            .unwrap();
        assert_eq!(values[0], 0.0);
        assert_eq!(values[1], 0.0);
        assert!(is_close!(values[2], 10.0 * (1.0 - (-1.0f64).exp())));
    }

    #[test]
    fn degenerate_parameters_are_reported() {
        let err = ResponseFunction::gamma()
            .step(&[500.0, 0.0, 100.0], 1.0, None)
            .unwrap_err();
        assert!(matches!(err, TsaError::DegenerateResponse { .. }));

        let err = ResponseFunction::exponential()
            .block(&[500.0, f64::NAN], 1.0, None)
            .unwrap_err();
        assert!(matches!(err, TsaError::DegenerateResponse { .. }));

        let err = ResponseFunction::hantush()
            .step(&[0.01, 100.0, 2000.0], 1.0, None)
            .unwrap_err();
        assert!(matches!(err, TsaError::DegenerateResponse { .. }));

        let err = ResponseFunction::gamma()
            .step(&[500.0, 1.0], 1.0, None)
            .unwrap_err();
        assert_eq!(
            err,
            TsaError::ParameterCount {
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn parameter_templates() {
        let params = ResponseFunction::gamma().set_parameters("recharge");
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["recharge_A", "recharge_n", "recharge_a"]);
        assert_eq!(params[0].pmax, Some(5000.0));

        let params = ResponseFunction::exponential()
            .with_up(false)
            .set_parameters("well");
        assert_eq!(params[0].initial, -500.0);
        assert_eq!(params[0].pmin, Some(-5000.0));
        assert_eq!(params[0].pmax, Some(0.0));

        let params = ResponseFunction::one().set_parameters("step");
        assert_eq!(params[0].name, "step_d");
        assert_eq!(params[0].pmin, None);
        assert!(params
            .iter()
            .all(|p| p.owner == ParameterOwner::StressModel("step".to_string())));
    }

    #[test]
    fn invalid_cutoff() {
        assert!(ResponseFunction::gamma().with_cutoff(1.0).is_err());
        assert!(ResponseFunction::gamma().with_cutoff(0.95).is_ok());
    }
}
