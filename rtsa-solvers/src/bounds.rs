//! Change of variables that lets an unconstrained optimiser respect bounds.
//!
//! Every bounded parameter `x` is written as a smooth function of a free
//! variable `u`:
//!
//! $$ x = l + \frac{\sin u + 1}{2} (h - l) $$
//!
//! for a box `[l, h]`, and `x = l - 1 + \sqrt{u^2 + 1}` (or its mirror) when
//! only one side is bounded.

/// Distance kept from the edges when a value is mapped to its free variable.
///
/// At an edge the derivative of the mapping vanishes and the optimiser would
/// never leave it.
const EDGE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Bound {
    Free,
    Lower(f64),
    Upper(f64),
    Both(f64, f64),
}

impl Bound {
    pub(crate) fn new(lower: f64, upper: f64) -> Self {
        match (lower.is_finite(), upper.is_finite()) {
            (false, false) => Bound::Free,
            (true, false) => Bound::Lower(lower),
            (false, true) => Bound::Upper(upper),
            (true, true) => Bound::Both(lower, upper),
        }
    }

    /// Free variable for a value, after clipping the value into the bounds
    pub(crate) fn to_internal(&self, x: f64) -> f64 {
        match *self {
            Bound::Free => x,
            Bound::Lower(lo) => ((x.max(lo) - lo + 1.0).powi(2) - 1.0).sqrt().max(EDGE.sqrt()),
            Bound::Upper(hi) => ((hi - x.min(hi) + 1.0).powi(2) - 1.0).sqrt().max(EDGE.sqrt()),
            Bound::Both(lo, hi) if hi > lo => {
                let scaled = 2.0 * (x.clamp(lo, hi) - lo) / (hi - lo) - 1.0;
                scaled.clamp(EDGE - 1.0, 1.0 - EDGE).asin()
            }
            Bound::Both(..) => 0.0,
        }
    }

    pub(crate) fn to_external(&self, u: f64) -> f64 {
        match *self {
            Bound::Free => u,
            Bound::Lower(lo) => lo - 1.0 + (u * u + 1.0).sqrt(),
            Bound::Upper(hi) => hi + 1.0 - (u * u + 1.0).sqrt(),
            Bound::Both(lo, hi) => (lo + 0.5 * (u.sin() + 1.0) * (hi - lo)).clamp(lo, hi),
        }
    }
}
