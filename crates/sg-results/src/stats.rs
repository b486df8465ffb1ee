//! Descriptive statistics over a step window and Monte Carlo confidence
//! bands.

use serde::Serialize;

use crate::load::Series;

/// Highest selectable step; matches the `_timeSteps_` ceiling.
pub const MAX_STEP: i64 = 10_000;

/// Two-tailed 95% Student t critical values for df 1..=30.
const T95_SMALL: [f64; 30] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179, 2.160,
    2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064, 2.060, 2.056,
    2.052, 2.048, 2.045, 2.042,
];

/// Buckets above 30, each used for every df at or above it up to the next.
const T95_LARGE: [(usize, f64); 5] = [
    (40, 2.021),
    (60, 2.000),
    (80, 1.990),
    (100, 1.984),
    (1000, 1.962),
];

const T95_ASYMPTOTIC: f64 = 1.960;

/// Critical t value for `df` degrees of freedom; `None` for df 0.
pub fn t95(df: usize) -> Option<f64> {
    match df {
        0 => None,
        1..=30 => Some(T95_SMALL[df - 1]),
        _ if df > 1000 => Some(T95_ASYMPTOTIC),
        _ => Some(
            T95_LARGE
                .iter()
                .rev()
                .find(|(bucket, _)| *bucket <= df)
                .map_or(T95_SMALL[29], |(_, t)| *t),
        ),
    }
}

/// `value +- t95(runs - 1) * se`, or `None` with fewer than two runs.
pub fn confidence_band(value: f64, se: f64, runs: usize) -> Option<(f64, f64)> {
    let t = t95(runs.saturating_sub(1))?;
    let half = t * se;
    Some((value - half, value + half))
}

/// Half-open window `[first, last)` of 0-based row indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRange {
    pub first: usize,
    pub last: usize,
}

impl StepRange {
    /// Resolve a user-entered 1-based inclusive window against `steps` rows.
    ///
    /// `begin` is clamped to `1..=MAX_STEP` and `end` to `begin..=MAX_STEP`;
    /// the window always holds at least one step. Missing bounds select from
    /// the first and up to the last step.
    pub fn resolve(begin: Option<i64>, end: Option<i64>, steps: usize) -> Self {
        let begin = begin.unwrap_or(1).clamp(1, MAX_STEP);
        let end = end.unwrap_or(MAX_STEP).clamp(begin, MAX_STEP);
        let first = (begin - 1) as usize;
        let last = (end as usize).min(steps).max(first + 1);
        Self { first, last }
    }

    pub fn all(steps: usize) -> Self {
        Self::resolve(None, None, steps)
    }

    pub fn len(&self) -> usize {
        self.last - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 1-based step numbers in the window.
    pub fn steps(&self) -> impl Iterator<Item = usize> {
        self.first + 1..=self.last
    }

    pub fn indices(&self) -> std::ops::Range<usize> {
        self.first..self.last
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    pub name: String,
    pub obs: usize,
    pub mean: Option<f64>,
    pub sd: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Average standard error across the window, when an SE series exists.
    pub se: Option<f64>,
}

/// Statistics of `series` over `range`; rows past the end of the series
/// count as missing.
pub fn describe(series: &Series, range: StepRange) -> SeriesStats {
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut sqsum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for x in range
        .indices()
        .filter_map(|i| series.values.get(i).copied().flatten())
    {
        n += 1;
        sum += x;
        sqsum += x * x;
        min = min.min(x);
        max = max.max(x);
    }

    let se = series.se.as_ref().and_then(|se| {
        let present: Vec<f64> = range
            .indices()
            .filter_map(|i| se.get(i).copied().flatten())
            .collect();
        (!present.is_empty()).then(|| present.iter().sum::<f64>() / present.len() as f64)
    });

    if n == 0 {
        return SeriesStats {
            name: series.name.clone(),
            obs: 0,
            mean: None,
            sd: None,
            min: None,
            max: None,
            se,
        };
    }

    let count = n as f64;
    let mean = sum / count;
    SeriesStats {
        name: series.name.clone(),
        obs: n,
        mean: Some(mean),
        sd: Some((sqsum / count - mean * mean).max(0.0).sqrt()),
        min: Some(min),
        max: Some(max),
        se,
    }
}
