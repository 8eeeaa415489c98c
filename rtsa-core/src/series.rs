//! Time-indexed arrays of values.
//!
//! Times are stored as fractional days since 1970-01-01 so that the whole engine
//! can work with plain floating point arithmetic.
//! Sub-daily observations use fractional parts (`0.5` is midday).

use crate::errors::{TsaError, TsaResult};
use crate::frequency::Frequency;
use ndarray::{Array, Array1};
use serde::{Deserialize, Serialize};

pub type Time = f64;
pub type FloatValue = f64;

/// Two times closer than this (in days, about 0.09 seconds) are considered equal
pub const TIME_TOLERANCE: Time = 1e-6;

/// Days since 1970-01-01 for a proleptic Gregorian calendar date
pub fn days_from_ymd(year: i32, month: u32, day: u32) -> Time {
    let y = (if month <= 2 { year - 1 } else { year }) as i64;
    let era = (if y >= 0 { y } else { y - 399 }) / 400;
    let yoe = y - era * 400;
    let m = month as i64;
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    (era * 146097 + doe - 719468) as Time
}

/// Regular grid from `start` through `end` (inclusive) at the given frequency.
///
/// Values are computed as `start + k * dt` so that grids built from the same
/// start are bit-for-bit identical.
pub fn date_range(start: Time, end: Time, freq: &Frequency) -> Array1<Time> {
    let dt = freq.dt();
    if end < start - TIME_TOLERANCE {
        return Array1::zeros(0);
    }
    let n = ((end - start) / dt + TIME_TOLERANCE).floor() as usize + 1;
    Array::from_iter((0..n).map(|k| start + k as f64 * dt))
}

/// Index of the first element of a sorted index that is not smaller than `t`
/// (allowing for [`TIME_TOLERANCE`]).
pub(crate) fn search_sorted(index: &Array1<Time>, t: Time) -> usize {
    let (mut lo, mut hi) = (0, index.len());
    while lo < hi {
        let mid = (lo + hi) / 2;
        if index[mid] < t - TIME_TOLERANCE {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// A named series of values on a strictly increasing time index.
///
/// Values may be NaN (missing), the index may not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct Series {
    name: String,
    index: Array1<Time>,
    values: Array1<FloatValue>,
}

/// Deserialised form of a [`Series`], checked by [`Series::new`]
#[derive(Deserialize)]
struct RawSeries {
    name: String,
    index: Array1<Time>,
    values: Array1<FloatValue>,
}

impl TryFrom<RawSeries> for Series {
    type Error = TsaError;

    fn try_from(raw: RawSeries) -> TsaResult<Self> {
        Series::new(&raw.name, raw.index, raw.values)
    }
}

impl Series {
    pub fn new(name: &str, index: Array1<Time>, values: Array1<FloatValue>) -> TsaResult<Self> {
        if index.len() != values.len() {
            return Err(TsaError::invalid_series(
                name,
                format!(
                    "index has {} entries but there are {} values",
                    index.len(),
                    values.len()
                ),
            ));
        }
        if index.iter().any(|t| !t.is_finite()) {
            return Err(TsaError::invalid_series(name, "index contains non-finite times"));
        }
        if index.windows(2).into_iter().any(|w| w[1] <= w[0]) {
            return Err(TsaError::invalid_series(
                name,
                "index must be strictly increasing",
            ));
        }
        Ok(Self {
            name: name.to_string(),
            index,
            values,
        })
    }

    pub fn from_vec(name: &str, index: Vec<Time>, values: Vec<FloatValue>) -> TsaResult<Self> {
        Self::new(name, Array::from_vec(index), Array::from_vec(values))
    }

    /// A series with a constant value on every time of `index`
    pub fn constant(name: &str, index: Array1<Time>, value: FloatValue) -> TsaResult<Self> {
        let values = Array::from_elem(index.len(), value);
        Self::new(name, index, values)
    }

    /// Construct without validation. The caller guarantees a valid index.
    pub(crate) fn from_parts(name: &str, index: Array1<Time>, values: Array1<FloatValue>) -> Self {
        debug_assert_eq!(index.len(), values.len());
        Self {
            name: name.to_string(),
            index,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn index(&self) -> &Array1<Time> {
        &self.index
    }

    pub fn values(&self) -> &Array1<FloatValue> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Array1<FloatValue> {
        &mut self.values
    }

    pub fn into_values(self) -> Array1<FloatValue> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn tmin(&self) -> Option<Time> {
        self.index.first().copied()
    }

    pub fn tmax(&self) -> Option<Time> {
        self.index.last().copied()
    }

    /// Constant time step of the index, if there is one
    pub fn constant_step(&self) -> Option<Time> {
        if self.len() < 2 {
            return None;
        }
        let step = self.index[1] - self.index[0];
        let regular = self
            .index
            .windows(2)
            .into_iter()
            .all(|w| ((w[1] - w[0]) - step).abs() < TIME_TOLERANCE);
        regular.then_some(step)
    }

    /// Elapsed time since the previous entry, the first entry is NaN
    pub fn time_steps(&self) -> Array1<Time> {
        Array::from_iter(
            (0..self.len()).map(|i| {
                if i == 0 {
                    f64::NAN
                } else {
                    self.index[i] - self.index[i - 1]
                }
            }),
        )
    }

    /// Entries with `tmin <= t <= tmax`
    pub fn between(&self, tmin: Time, tmax: Time) -> Series {
        self.filter(|t, _| t >= tmin - TIME_TOLERANCE && t <= tmax + TIME_TOLERANCE)
    }

    /// Entries with a finite value
    pub fn dropna(&self) -> Series {
        self.filter(|_, v| v.is_finite())
    }

    fn filter(&self, keep: impl Fn(Time, FloatValue) -> bool) -> Series {
        let (index, values): (Vec<Time>, Vec<FloatValue>) = self
            .index
            .iter()
            .zip(self.values.iter())
            .filter(|(t, v)| keep(**t, **v))
            .map(|(t, v)| (*t, *v))
            .unzip();
        Series::from_parts(&self.name, Array::from_vec(index), Array::from_vec(values))
    }

    /// Mean of the finite values (NaN when there are none)
    pub fn mean(&self) -> FloatValue {
        let (sum, count) = self
            .values
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    }

    pub fn min(&self) -> FloatValue {
        self.values
            .iter()
            .filter(|v| v.is_finite())
            .copied()
            .fold(f64::NAN, f64::min)
    }

    pub fn max(&self) -> FloatValue {
        self.values
            .iter()
            .filter(|v| v.is_finite())
            .copied()
            .fold(f64::NAN, f64::max)
    }

    pub fn count_non_finite(&self) -> usize {
        self.values.iter().filter(|v| !v.is_finite()).count()
    }

    /// Position of `t` in the index
    pub fn position(&self, t: Time) -> Option<usize> {
        let i = search_sorted(&self.index, t);
        (i < self.len() && (self.index[i] - t).abs() <= TIME_TOLERANCE).then_some(i)
    }

    /// Value at exactly `t`
    pub fn get(&self, t: Time) -> Option<FloatValue> {
        self.position(t).map(|i| self.values[i])
    }

    /// Linear interpolation of the values onto `times`.
    ///
    /// Times outside the index take the first or last value.
    pub fn interpolate_at(&self, times: &Array1<Time>) -> Array1<FloatValue> {
        let n = self.len();
        times.mapv(|t| {
            if n == 0 {
                return f64::NAN;
            }
            if t <= self.index[0] {
                return self.values[0];
            }
            if t >= self.index[n - 1] {
                return self.values[n - 1];
            }
            let j = search_sorted(&self.index, t);
            if (self.index[j] - t).abs() <= TIME_TOLERANCE {
                return self.values[j];
            }
            let (t0, t1) = (self.index[j - 1], self.index[j]);
            let (v0, v1) = (self.values[j - 1], self.values[j]);
            v0 + (v1 - v0) * (t - t0) / (t1 - t0)
        })
    }

    /// Conform the series to a new index, using `fill` where a time is absent
    pub fn reindex(&self, index: &Array1<Time>, fill: FloatValue) -> Series {
        let values = index.mapv(|t| self.get(t).unwrap_or(fill));
        Series::from_parts(&self.name, index.clone(), values)
    }

    /// Entries whose time appears in `times`, times that are absent are skipped
    pub fn select(&self, times: &Array1<Time>) -> Series {
        let (index, values): (Vec<Time>, Vec<FloatValue>) = times
            .iter()
            .filter_map(|t| self.position(*t).map(|i| (self.index[i], self.values[i])))
            .unzip();
        Series::from_parts(&self.name, Array::from_vec(index), Array::from_vec(values))
    }

    /// Apply `f` to every value
    pub fn map_values(&self, f: impl Fn(FloatValue) -> FloatValue) -> Series {
        Series::from_parts(&self.name, self.index.clone(), self.values.mapv(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::array;

    fn series() -> Series {
        Series::from_vec(
            "head",
            vec![0.0, 1.0, 2.0, 4.0],
            vec![1.0, f64::NAN, 3.0, 5.0],
        )
        .unwrap()
    }

    #[test]
    fn epoch_dates() {
        assert_eq!(days_from_ymd(1970, 1, 1), 0.0);
        assert_eq!(days_from_ymd(1970, 1, 2), 1.0);
        assert_eq!(days_from_ymd(2000, 3, 1), 11017.0);
        assert_eq!(days_from_ymd(1969, 12, 31), -1.0);
        assert_eq!(days_from_ymd(2024, 1, 1) - days_from_ymd(2023, 1, 1), 365.0);
    }

    #[test]
    fn date_range_is_inclusive() {
        let grid = date_range(10.0, 13.0, &Frequency::daily());
        assert_eq!(grid, array![10.0, 11.0, 12.0, 13.0]);
        assert!(date_range(5.0, 4.0, &Frequency::daily()).is_empty());
        assert_eq!(date_range(0.0, 1.0, &"H".parse().unwrap()).len(), 25);
    }

    #[test]
    fn validation() {
        assert!(Series::from_vec("x", vec![0.0, 0.0], vec![1.0, 2.0]).is_err());
        assert!(Series::from_vec("x", vec![1.0, 0.0], vec![1.0, 2.0]).is_err());
        assert!(Series::from_vec("x", vec![0.0, f64::NAN], vec![1.0, 2.0]).is_err());
        assert!(Series::from_vec("x", vec![0.0], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn statistics_skip_missing() {
        let s = series();
        assert!(is_close!(s.mean(), 3.0));
        assert_eq!(s.min(), 1.0);
        assert_eq!(s.max(), 5.0);
        assert_eq!(s.count_non_finite(), 1);
        assert_eq!(s.dropna().len(), 3);
    }

    #[test]
    fn lookup_and_between() {
        let s = series();
        assert_eq!(s.position(2.0), Some(2));
        assert_eq!(s.position(2.0 + 1e-9), Some(2));
        assert_eq!(s.position(3.0), None);
        assert_eq!(s.between(1.0, 2.0).index(), &array![1.0, 2.0]);
        assert_eq!(s.constant_step(), None);
    }

    #[test]
    fn interpolation_clamps_at_the_ends() {
        let s = series().dropna();
        let values = s.interpolate_at(&array![-1.0, 0.5, 3.0, 10.0]);
        assert_eq!(values, array![1.0, 1.5, 4.0, 5.0]);
    }

    #[test]
    fn deserialising_checks_the_index() {
        let s = series().dropna();
        let json = serde_json::to_value(&s).unwrap();
        let back: Series = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, s);

        let mut unsorted = json.clone();
        unsorted["index"]["data"] = serde_json::json!([0.0, 4.0, 2.0]);
        let err = serde_json::from_value::<Series>(unsorted).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"), "{err}");

        let mut short = json;
        short["values"]["data"] = serde_json::json!([1.0, 3.0]);
        short["values"]["dim"] = serde_json::json!([2]);
        assert!(serde_json::from_value::<Series>(short).is_err());
    }

    #[test]
    fn reindex_and_select() {
        let s = series();
        let r = s.reindex(&array![0.0, 3.0, 4.0], 0.0);
        assert_eq!(r.values(), &array![1.0, 0.0, 5.0]);
        let sel = s.select(&array![3.0, 4.0]);
        assert_eq!(sel.index(), &array![4.0]);
    }
}
