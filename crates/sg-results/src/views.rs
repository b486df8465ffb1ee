//! Statistics, table and plot views over a loaded series set.

use serde::Serialize;
use sg_core::format_g;

use crate::load::{Series, SeriesSet};
use crate::stats::{confidence_band, describe, SeriesStats, StepRange};
use crate::{ResultsError, ResultsResult, MAX_SELECTED_SERIES};

const TABLE_DIGITS: usize = 5;
const PLOT_DIGITS: usize = 4;
const MISSING: &str = "N/A";

/// Resolve a selection of series names to indices into `set`.
///
/// Names not present in the set are skipped. An empty selection selects
/// every series when `allow_empty`, and is an error otherwise, as is one
/// that names no known series.
pub fn select_series(
    set: &SeriesSet,
    requested: &[String],
    allow_empty: bool,
) -> ResultsResult<Vec<usize>> {
    if requested.len() > MAX_SELECTED_SERIES {
        return Err(ResultsError::TooManySeriesSelected {
            count: requested.len(),
        });
    }
    if requested.is_empty() {
        return if allow_empty {
            Ok((0..set.series.len()).collect())
        } else {
            Err(ResultsError::NoSeriesSelected)
        };
    }

    let selected: Vec<usize> = requested
        .iter()
        .filter_map(|name| set.series.iter().position(|s| &s.name == name))
        .collect();
    if selected.is_empty() && !allow_empty {
        return Err(ResultsError::NoSeriesSelected);
    }
    Ok(selected)
}

pub fn statistics_view(
    set: &SeriesSet,
    requested: &[String],
    range: StepRange,
) -> ResultsResult<Vec<SeriesStats>> {
    let selected = select_series(set, requested, true)?;
    Ok(selected
        .into_iter()
        .map(|i| describe(&set.series[i], range))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub step: usize,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
    pub log: bool,
}

pub fn table_view(
    set: &SeriesSet,
    requested: &[String],
    range: StepRange,
) -> ResultsResult<TableView> {
    let selected = select_series(set, requested, false)?;
    let chosen: Vec<&Series> = selected.iter().map(|&i| &set.series[i]).collect();

    let rows = range
        .indices()
        .map(|i| TableRow {
            step: i + 1,
            values: chosen
                .iter()
                .map(|s| match s.values.get(i).copied().flatten() {
                    Some(x) => format_g(x, TABLE_DIGITS),
                    None => MISSING.to_string(),
                })
                .collect(),
        })
        .collect();

    Ok(TableView {
        columns: chosen.iter().map(|s| s.name.clone()).collect(),
        rows,
        log: set.log,
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotOptions {
    /// Add 95% confidence band datasets (Monte Carlo runs only).
    pub confidence: bool,
    /// Add min/max envelope datasets (Monte Carlo runs only).
    pub min_max: bool,
    /// Fixed y-axis limits; `None` scales automatically.
    pub limits: Option<(f64, f64)>,
}

type Datasets = Vec<Vec<Option<String>>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotView {
    pub labels: Vec<String>,
    pub steps: Vec<usize>,
    pub datasets: Datasets,
    pub lo: Datasets,
    pub hi: Datasets,
    pub min: Datasets,
    pub max: Datasets,
    pub log: bool,
    pub limits: Option<(f64, f64)>,
}

fn plot_label(x: Option<f64>) -> Option<String> {
    x.map(|v| format_g(v, PLOT_DIGITS))
}

fn to_display(x: f64, log: bool) -> Option<f64> {
    if !log {
        Some(x)
    } else if x > 0.0 {
        Some(x.ln())
    } else {
        None
    }
}

/// Lower and upper band at row `i`, computed in linear space and then
/// transformed.
fn band_at(series: &Series, i: usize, runs: usize, log: bool) -> (Option<f64>, Option<f64>) {
    let value = series.linear.get(i).copied().flatten();
    let se = series
        .se
        .as_ref()
        .and_then(|se| se.get(i).copied().flatten());
    let band = value
        .zip(se)
        .and_then(|(v, se)| confidence_band(v, se, runs))
        .and_then(|(lo, hi)| to_display(lo, log).zip(to_display(hi, log)));
    match band {
        Some((lo, hi)) => (Some(lo), Some(hi)),
        None => (None, None),
    }
}

fn envelope_at(series: &Series, i: usize) -> (Option<f64>, Option<f64>) {
    let at = |v: &Option<Vec<Option<f64>>>| v.as_ref().and_then(|v| v.get(i).copied().flatten());
    match (at(&series.min), at(&series.max)) {
        (Some(lo), Some(hi)) => (Some(lo), Some(hi)),
        _ => (None, None),
    }
}

pub fn plot_view(
    set: &SeriesSet,
    requested: &[String],
    range: StepRange,
    options: &PlotOptions,
) -> ResultsResult<PlotView> {
    let selected = select_series(set, requested, false)?;
    let chosen: Vec<&Series> = selected.iter().map(|&i| &set.series[i]).collect();
    let monte_carlo = set.runs > 1;
    let with_band = options.confidence && monte_carlo;
    let with_envelope = options.min_max && monte_carlo;

    let mut view = PlotView {
        labels: chosen.iter().map(|s| s.name.clone()).collect(),
        steps: range.steps().collect(),
        datasets: Vec::with_capacity(chosen.len()),
        lo: Vec::new(),
        hi: Vec::new(),
        min: Vec::new(),
        max: Vec::new(),
        log: set.log,
        limits: options.limits,
    };

    for series in chosen {
        view.datasets.push(
            range
                .indices()
                .map(|i| plot_label(series.values.get(i).copied().flatten()))
                .collect(),
        );

        if with_band {
            let (lo, hi): (Vec<_>, Vec<_>) = range
                .indices()
                .map(|i| {
                    let (lo, hi) = band_at(series, i, set.runs, set.log);
                    (plot_label(lo), plot_label(hi))
                })
                .unzip();
            view.lo.push(lo);
            view.hi.push(hi);
        }

        if with_envelope {
            let (min, max): (Vec<_>, Vec<_>) = range
                .indices()
                .map(|i| {
                    let (lo, hi) = envelope_at(series, i);
                    (plot_label(lo), plot_label(hi))
                })
                .unzip();
            view.min.push(min);
            view.max.push(max);
        }
    }

    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> SeriesSet {
        let a = vec![Some(1.0), Some(2.0)];
        let b = vec![None, Some(3.0)];
        SeriesSet {
            series: vec![
                Series {
                    name: "A".to_string(),
                    values: a.clone(),
                    linear: a,
                    se: None,
                    min: None,
                    max: None,
                },
                Series {
                    name: "B".to_string(),
                    values: b.clone(),
                    linear: b,
                    se: None,
                    min: None,
                    max: None,
                },
            ],
            steps: 2,
            runs: 1,
            log: false,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn selection_bounds() {
        let set = set();
        assert!(matches!(
            select_series(&set, &[], false),
            Err(ResultsError::NoSeriesSelected)
        ));
        assert_eq!(select_series(&set, &[], true).unwrap(), [0, 1]);
        let many: Vec<String> = (0..16).map(|i| format!("S{i}")).collect();
        assert!(matches!(
            select_series(&set, &many, true),
            Err(ResultsError::TooManySeriesSelected { count: 16 })
        ));
        assert_eq!(select_series(&set, &names(&["B", "Z"]), false).unwrap(), [1]);
        assert!(matches!(
            select_series(&set, &names(&["Y", "Z"]), false),
            Err(ResultsError::NoSeriesSelected)
        ));
    }

    #[test]
    fn statistics_default_to_every_series() {
        let stats = statistics_view(&set(), &[], StepRange::all(2)).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[1].obs, 1);
    }

    #[test]
    fn table_marks_missing() {
        let table = table_view(&set(), &names(&["B", "A"]), StepRange::all(2)).unwrap();
        assert_eq!(table.columns, ["B", "A"]);
        assert_eq!(table.rows[0].step, 1);
        assert_eq!(table.rows[0].values, ["N/A", "1"]);
        assert_eq!(table.rows[1].values, ["3", "2"]);
    }

    #[test]
    fn single_run_plot_has_no_bands() {
        let options = PlotOptions {
            confidence: true,
            min_max: true,
            limits: None,
        };
        let plot = plot_view(&set(), &names(&["A"]), StepRange::all(2), &options).unwrap();
        assert_eq!(plot.steps, [1, 2]);
        assert_eq!(plot.datasets, vec![vec![Some("1".to_string()), Some("2".to_string())]]);
        assert!(plot.lo.is_empty() && plot.min.is_empty());
    }

    #[test]
    fn monte_carlo_band_in_log_space() {
        let mean = vec![Some(10.0)];
        let mut set = SeriesSet {
            series: vec![Series {
                name: "A".to_string(),
                values: vec![Some(10.0_f64.ln())],
                linear: mean,
                se: Some(vec![Some(0.2)]),
                min: Some(vec![Some(8.0_f64.ln())]),
                max: Some(vec![Some(12.0_f64.ln())]),
            }],
            steps: 1,
            runs: 5,
            log: true,
        };
        let options = PlotOptions {
            confidence: true,
            min_max: true,
            limits: Some((0.0, 5.0)),
        };

        let plot = plot_view(&set, &names(&["A"]), StepRange::all(1), &options).unwrap();
        assert_eq!(plot.lo[0][0], Some(format_g(9.4448_f64.ln(), 4)));
        assert_eq!(plot.hi[0][0], Some(format_g(10.5552_f64.ln(), 4)));
        assert_eq!(plot.min[0][0], Some(format_g(8.0_f64.ln(), 4)));

        // A band reaching below zero has no log image.
        set.series[0].se = Some(vec![Some(5.0)]);
        let plot = plot_view(&set, &names(&["A"]), StepRange::all(1), &options).unwrap();
        assert_eq!(plot.lo[0][0], None);
        assert_eq!(plot.hi[0][0], None);
    }
}
