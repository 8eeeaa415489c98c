//! Special functions used by the radial-flow response functions.

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const EPS: f64 = 1e-15;
const FPMIN: f64 = 1e-300;
const MAX_ITER: usize = 200;

/// Exponential integral `E1(x) = ∫_x^∞ e^{-t}/t dt` for `x > 0`.
///
/// Uses the power series for `x <= 1` and a continued fraction (modified Lentz)
/// otherwise. Returns infinity at zero and NaN for negative arguments.
pub fn exp1(x: f64) -> f64 {
    if x.is_nan() || x < 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return f64::INFINITY;
    }
    if x > 740.0 {
        return 0.0;
    }
    if x <= 1.0 {
        let mut sum = 0.0;
        let mut term = 1.0;
        for k in 1..MAX_ITER {
            let k = k as f64;
            term *= -x / k;
            let contribution = term / k;
            sum += contribution;
            if contribution.abs() < EPS * sum.abs() {
                break;
            }
        }
        -EULER_GAMMA - x.ln() - sum
    } else {
        let mut b = x + 1.0;
        let mut c = 1.0 / FPMIN;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..MAX_ITER {
            let an = -((i * i) as f64);
            b += 2.0;
            d = 1.0 / (an * d + b);
            c = b + an / c;
            let delta = c * d;
            h *= delta;
            if (delta - 1.0).abs() < EPS {
                break;
            }
        }
        h * (-x).exp()
    }
}

/// Modified Bessel function of the first kind, order zero, for `|x| <= 3.75`
fn bessel_i0_small(x: f64) -> f64 {
    let t = (x / 3.75).powi(2);
    1.0 + t
        * (3.515_622_9
            + t * (3.089_942_4
                + t * (1.206_749_2 + t * (0.265_973_2 + t * (0.036_076_8 + t * 0.004_581_3)))))
}

/// Modified Bessel function of the second kind, order zero, for `x > 0`.
///
/// Polynomial approximations of Abramowitz & Stegun 9.8.5 and 9.8.6,
/// absolute error below 1e-7.
pub fn bessel_k0(x: f64) -> f64 {
    if x.is_nan() || x < 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return f64::INFINITY;
    }
    if x <= 2.0 {
        let y = x * x / 4.0;
        -(x / 2.0).ln() * bessel_i0_small(x)
            + (-0.577_215_66
                + y * (0.422_784_20
                    + y * (0.230_697_56
                        + y * (0.034_885_90
                            + y * (0.002_626_98 + y * (0.000_107_50 + y * 0.000_007_40))))))
    } else {
        let z = 2.0 / x;
        (-x).exp() / x.sqrt()
            * (1.253_314_14
                + z * (-0.078_323_58
                    + z * (0.021_895_68
                        + z * (-0.010_624_46
                            + z * (0.005_878_72 + z * (-0.002_515_40 + z * 0.000_532_08))))))
    }
}
