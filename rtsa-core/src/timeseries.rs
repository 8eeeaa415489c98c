//! Observed and stress series prepared for simulation.
//!
//! A [`TimeSeries`] keeps the series exactly as it was supplied together with a
//! validated and (for stresses) regularly sampled version derived from it using
//! the rules in [`SeriesSettings`].
//! Every kind of series has a preset for these rules, e.g. precipitation is
//! averaged when down-sampling and back-filled when up-sampling.

use crate::errors::{TsaError, TsaResult};
use crate::frequency::Frequency;
use crate::series::{date_range, search_sorted, FloatValue, Series, Time, TIME_TOLERANCE};
use ndarray::{Array, Array1};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Oseries,
    Prec,
    Evap,
    Well,
    Waterlevel,
    Level,
    Flux,
    Quantity,
}

/// How values are spread over a finer grid
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleUp {
    /// Divide a value evenly over the new steps it covers
    Divide,
    Bfill,
    Ffill,
    Interpolate,
}

/// How values are aggregated onto a coarser grid
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleDown {
    Sum,
    Mean,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillNan {
    Drop,
    Mean,
    Interpolate,
    Value(FloatValue),
}

/// Value used to extend a series beyond its own span
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillValue {
    Mean,
    Value(FloatValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSettings {
    pub kind: Option<SeriesKind>,
    pub freq: Option<Frequency>,
    pub sample_up: Option<SampleUp>,
    pub sample_down: Option<SampleDown>,
    pub fill_nan: FillNan,
    pub fill_before: Option<FillValue>,
    pub fill_after: Option<FillValue>,
}

impl Default for SeriesSettings {
    fn default() -> Self {
        Self {
            kind: None,
            freq: None,
            sample_up: None,
            sample_down: None,
            fill_nan: FillNan::Interpolate,
            fill_before: None,
            fill_after: None,
        }
    }
}

impl SeriesSettings {
    /// Preset rules for a kind of series
    pub fn for_kind(kind: SeriesKind) -> Self {
        let zero = Some(FillValue::Value(0.0));
        let (sample_up, sample_down, fill_nan, fill_before, fill_after) = match kind {
            SeriesKind::Oseries => (None, None, FillNan::Drop, None, None),
            SeriesKind::Prec => (
                Some(SampleUp::Bfill),
                Some(SampleDown::Mean),
                FillNan::Value(0.0),
                Some(FillValue::Mean),
                Some(FillValue::Mean),
            ),
            SeriesKind::Evap => (
                Some(SampleUp::Bfill),
                Some(SampleDown::Mean),
                FillNan::Interpolate,
                Some(FillValue::Mean),
                Some(FillValue::Mean),
            ),
            SeriesKind::Well | SeriesKind::Flux => (
                Some(SampleUp::Bfill),
                Some(SampleDown::Mean),
                FillNan::Value(0.0),
                zero,
                zero,
            ),
            SeriesKind::Waterlevel | SeriesKind::Level => (
                Some(SampleUp::Interpolate),
                Some(SampleDown::Mean),
                FillNan::Interpolate,
                Some(FillValue::Mean),
                Some(FillValue::Mean),
            ),
            SeriesKind::Quantity => (
                Some(SampleUp::Divide),
                Some(SampleDown::Sum),
                FillNan::Value(0.0),
                zero,
                zero,
            ),
        };
        Self {
            kind: Some(kind),
            freq: None,
            sample_up,
            sample_down,
            fill_nan,
            fill_before,
            fill_after,
        }
    }

    pub fn with_freq(mut self, freq: Frequency) -> Self {
        self.freq = Some(freq);
        self
    }
}

/// A series plus the regular version used in simulations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    series_original: Series,
    series: Series,
    settings: SeriesSettings,
    freq_original: Option<Frequency>,
}

impl TimeSeries {
    pub fn new(series: Series, settings: SeriesSettings) -> TsaResult<Self> {
        if series.is_empty() {
            return Err(TsaError::invalid_series(series.name(), "series is empty"));
        }
        let freq_original = series.constant_step().and_then(Frequency::infer);
        let mut ts = Self {
            series: series.clone(),
            series_original: series,
            settings,
            freq_original,
        };
        if ts.settings.freq.is_none() {
            ts.settings.freq = ts.freq_original.clone();
        }
        ts.update_series(None)?;
        Ok(ts)
    }

    /// A series using the preset rules of `kind`
    pub fn with_kind(series: Series, kind: SeriesKind) -> TsaResult<Self> {
        Self::new(series, SeriesSettings::for_kind(kind))
    }

    pub fn oseries(series: Series) -> TsaResult<Self> {
        Self::with_kind(series, SeriesKind::Oseries)
    }

    pub fn name(&self) -> &str {
        self.series_original.name()
    }

    /// The validated, regularly sampled series
    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn series_original(&self) -> &Series {
        &self.series_original
    }

    pub fn settings(&self) -> &SeriesSettings {
        &self.settings
    }

    pub fn kind(&self) -> Option<SeriesKind> {
        self.settings.kind
    }

    pub fn freq(&self) -> Option<&Frequency> {
        self.settings.freq.as_ref()
    }

    pub fn freq_original(&self) -> Option<&Frequency> {
        self.freq_original.as_ref()
    }

    pub fn tmin(&self) -> Time {
        self.series.tmin().unwrap_or(f64::NAN)
    }

    pub fn tmax(&self) -> Time {
        self.series.tmax().unwrap_or(f64::NAN)
    }

    pub fn mean(&self) -> FloatValue {
        self.series.mean()
    }

    /// Position of the first original timestamp within a step of `freq`
    pub fn time_offset(&self, freq: &Frequency) -> Time {
        self.series_original
            .tmin()
            .map(|t| freq.offset(t))
            .unwrap_or(0.0)
    }

    /// Re-derive the regular series from the original.
    ///
    /// If `freq` is given it replaces the configured frequency first.
    pub fn update_series(&mut self, freq: Option<&Frequency>) -> TsaResult<()> {
        if let Some(freq) = freq {
            self.settings.freq = Some(freq.clone());
        }
        let filled = self.fill_nan(&self.series_original);
        let series = match self.settings.freq.as_ref() {
            Some(freq) => self.resample(&filled, freq),
            None => filled,
        };
        let series = self.fill_nan(&series);
        if series.is_empty() {
            return Err(TsaError::invalid_series(
                self.name(),
                "no values left after filling missing values",
            ));
        }
        log::debug!(
            "Updated series '{}' to {} values (freq={:?})",
            self.name(),
            series.len(),
            self.settings.freq.as_ref().map(|f| f.to_string())
        );
        self.series = series;
        Ok(())
    }

    fn fill_nan(&self, series: &Series) -> Series {
        if series.count_non_finite() == 0 {
            return series.clone();
        }
        match self.settings.fill_nan {
            FillNan::Drop => series.dropna(),
            FillNan::Mean => {
                let mean = series.mean();
                series.map_values(|v| if v.is_finite() { v } else { mean })
            }
            FillNan::Value(value) => series.map_values(|v| if v.is_finite() { v } else { value }),
            FillNan::Interpolate => {
                let finite = series.dropna();
                let interpolated = finite.interpolate_at(series.index());
                let values = Array::from_iter(
                    series
                        .values()
                        .iter()
                        .zip(interpolated.iter())
                        .map(|(v, i)| if v.is_finite() { *v } else { *i }),
                );
                Series::from_parts(series.name(), series.index().clone(), values)
            }
        }
    }

    /// Nominal step of the original series in days
    fn original_step(&self, series: &Series) -> Option<Time> {
        if let Some(freq) = self.freq_original.as_ref() {
            return Some(freq.dt());
        }
        let n = series.len();
        match (series.tmin(), series.tmax()) {
            (Some(t0), Some(tn)) if n > 1 => Some((tn - t0) / (n - 1) as f64),
            _ => None,
        }
    }

    fn resample(&self, series: &Series, freq: &Frequency) -> Series {
        let dt = freq.dt();
        let step = match self.original_step(series) {
            Some(step) => step,
            None => return series.clone(),
        };
        if (step - dt).abs() < TIME_TOLERANCE && self.freq_original.is_some() {
            return series.clone();
        }
        if step < dt {
            match self.settings.sample_down {
                Some(rule) => downsample(series, dt, rule),
                None => series.clone(),
            }
        } else {
            match self.settings.sample_up {
                Some(rule) => upsample(series, freq, step, rule),
                None => series.clone(),
            }
        }
    }

    fn fill_value(&self, fill: Option<FillValue>) -> FloatValue {
        match fill {
            Some(FillValue::Mean) => self.series.mean(),
            Some(FillValue::Value(value)) => value,
            None => f64::NAN,
        }
    }

    /// The regular series on the grid from `tmin` through `tmax`.
    ///
    /// Times before or after the series take the `fill_before`/`fill_after`
    /// value (NaN when unset) and times inside the span that are not on the
    /// series' own grid are interpolated.
    pub fn between(&self, tmin: Time, tmax: Time, freq: &Frequency) -> Series {
        let index = date_range(tmin, tmax, freq);
        let before = self.fill_value(self.settings.fill_before);
        let after = self.fill_value(self.settings.fill_after);
        let (first, last) = (self.tmin(), self.tmax());
        let values = index.mapv(|t| {
            if t < first - TIME_TOLERANCE {
                before
            } else if t > last + TIME_TOLERANCE {
                after
            } else {
                self.series
                    .get(t)
                    .unwrap_or_else(|| self.series.interpolate_at(&Array::from_elem(1, t))[0])
            }
        });
        Series::from_parts(self.name(), index, values)
    }

    /// Restrict two series to the timestamps they have in common.
    ///
    /// `name` identifies the owner of the pair in the error message.
    pub fn intersect(a: &TimeSeries, b: &TimeSeries, name: &str) -> TsaResult<(TimeSeries, TimeSeries)> {
        let common: Vec<Time> = a
            .series
            .index()
            .iter()
            .filter(|t| b.series.position(**t).is_some())
            .copied()
            .collect();
        if common.is_empty() {
            return Err(TsaError::EmptyIntersection {
                name: name.to_string(),
            });
        }
        let common = Array::from_vec(common);
        let restrict = |ts: &TimeSeries| -> TsaResult<TimeSeries> {
            let mut restricted = TimeSeries::new(ts.series.select(&common), ts.settings.clone())?;
            restricted.series_original = ts.series_original.between(common[0], common[common.len() - 1]);
            Ok(restricted)
        };
        Ok((restrict(a)?, restrict(b)?))
    }

    /// Snapshot of the series and its settings
    pub fn dump(&self, series: bool) -> TimeSeriesDump {
        TimeSeriesDump {
            name: self.name().to_string(),
            settings: self.settings.clone(),
            series: series.then(|| self.series_original.clone()),
        }
    }
}

/// Aggregate into right-closed bins `(g - dt, g]` labelled by their right edge,
/// starting at the first timestamp.
fn downsample(series: &Series, dt: Time, rule: SampleDown) -> Series {
    let (t0, tn) = match (series.tmin(), series.tmax()) {
        (Some(t0), Some(tn)) => (t0, tn),
        _ => return series.clone(),
    };
    let nbins = ((tn - t0) / dt - TIME_TOLERANCE).ceil().max(0.0) as usize + 1;
    let mut sums = vec![0.0; nbins];
    let mut counts = vec![0usize; nbins];
    for (t, v) in series.index().iter().zip(series.values().iter()) {
        if !v.is_finite() {
            continue;
        }
        let k = (((t - t0) / dt) - TIME_TOLERANCE).ceil().max(0.0) as usize;
        let k = k.min(nbins - 1);
        sums[k] += v;
        counts[k] += 1;
    }
    let index = Array::from_iter((0..nbins).map(|k| t0 + k as f64 * dt));
    let values = Array::from_iter(sums.iter().zip(counts.iter()).map(|(s, c)| match rule {
        SampleDown::Sum => *s,
        SampleDown::Mean if *c > 0 => s / *c as f64,
        SampleDown::Mean => f64::NAN,
    }));
    Series::from_parts(series.name(), index, values)
}

fn upsample(series: &Series, freq: &Frequency, step: Time, rule: SampleUp) -> Series {
    let (t0, tn) = match (series.tmin(), series.tmax()) {
        (Some(t0), Some(tn)) => (t0, tn),
        _ => return series.clone(),
    };
    let dt = freq.dt();
    let index = date_range(t0, tn, freq);
    let original = series.index();
    let n = original.len();
    let values: Array1<FloatValue> = match rule {
        SampleUp::Interpolate => series.interpolate_at(&index),
        SampleUp::Bfill | SampleUp::Divide => index.mapv(|g| {
            let j = search_sorted(original, g).min(n - 1);
            let v = series.values()[j];
            if rule == SampleUp::Divide {
                let covered = if j == 0 { step } else { original[j] - original[j - 1] };
                v * dt / covered
            } else {
                v
            }
        }),
        SampleUp::Ffill => index.mapv(|g| {
            let j = match series.position(g) {
                Some(j) => j,
                None => search_sorted(original, g).saturating_sub(1),
            };
            series.values()[j]
        }),
    };
    Series::from_parts(series.name(), index, values)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesDump {
    pub name: String,
    pub settings: SeriesSettings,
    pub series: Option<Series>,
}
