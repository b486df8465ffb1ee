//! Loading result CSV files into named series.

use std::path::Path;

use crate::files::ResultFiles;
use crate::{ResultsError, ResultsResult};

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Natural log of every value; non-positive values become missing.
    pub log: bool,
    /// Literal marking a missing sample.
    pub missing_marker: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            log: false,
            missing_marker: "NA".to_string(),
        }
    }
}

/// One output variable.
///
/// `values`, `min` and `max` are in display space (log when the set was
/// loaded with `log`); `linear` and `se` always stay linear so confidence
/// bands can be built before the transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
    pub linear: Vec<Option<f64>>,
    pub se: Option<Vec<Option<f64>>>,
    pub min: Option<Vec<Option<f64>>>,
    pub max: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSet {
    pub series: Vec<Series>,
    /// Rows per series.
    pub steps: usize,
    /// Executed runs behind the series (1 without aggregates).
    pub runs: usize,
    pub log: bool,
}

impl SeriesSet {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }
}

/// Raw columns of a single results file.
#[derive(Debug, Clone, PartialEq)]
struct Columns {
    header: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
    rows: usize,
}

fn read_columns(path: &Path, missing_marker: &str) -> ResultsResult<Columns> {
    let file = path.display().to_string();
    let invalid = |line: Option<usize>, column: Option<usize>| ResultsError::InvalidResultsFile {
        file: file.clone(),
        line,
        column,
    };
    // Unreadable or undecodable content is a malformed file too.
    let malformed = |err: csv::Error| {
        let line = err.position().and_then(|p| usize::try_from(p.line()).ok());
        invalid(line, None)
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(malformed)?;

    let mut records = rdr.records();
    let header: Vec<String> = match records.next() {
        Some(row) => row.map_err(malformed)?.iter().map(str::to_string).collect(),
        None => return Err(invalid(None, None)),
    };
    if header.first().is_none_or(|h| h.is_empty()) {
        return Err(invalid(None, None));
    }

    let mut columns = vec![Vec::new(); header.len()];
    let mut rows = 0usize;
    for record in records {
        let record = record.map_err(malformed)?;
        // Blank lines are ignored.
        if record.get(0).is_none_or(str::is_empty) {
            continue;
        }
        let line = rows + 2;
        if record.len() < header.len() {
            return Err(invalid(Some(line), None));
        }
        for (i, column) in columns.iter_mut().enumerate() {
            let cell = record.get(i).unwrap_or_default();
            let value = if cell == missing_marker {
                None
            } else {
                let v: f64 = cell
                    .parse()
                    .map_err(|_| invalid(Some(line), Some(i + 1)))?;
                v.is_finite().then_some(v)
            };
            column.push(value);
        }
        rows += 1;
    }

    Ok(Columns {
        header,
        columns,
        rows,
    })
}

fn log_transform(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|x| x.filter(|v| *v > 0.0).map(f64::ln))
        .collect()
}

/// Load the session's series.
///
/// Reads the primary file (mean across runs, or the single run) and, when
/// present, its SE/min/max companions. Companions must share the primary
/// file's header and row count.
pub fn load(files: &ResultFiles, options: &LoadOptions) -> ResultsResult<SeriesSet> {
    let primary = files.primary().ok_or(ResultsError::NoResults)?;
    let main = read_columns(primary, &options.missing_marker)?;

    let companion = |path: Option<&Path>, what: &str| -> ResultsResult<Option<Columns>> {
        let Some(path) = path else {
            return Ok(None);
        };
        let cols = read_columns(path, &options.missing_marker)?;
        if cols.header != main.header {
            return Err(ResultsError::InconsistentResults {
                reason: format!("{what} header differs from the mean"),
            });
        }
        if cols.rows != main.rows {
            return Err(ResultsError::InconsistentResults {
                reason: format!("{what} has {} rows, mean has {}", cols.rows, main.rows),
            });
        }
        Ok(Some(cols))
    };

    let aggregated = files.has_aggregates();
    let (se, min, max) = if aggregated {
        (
            companion(files.se.as_deref(), "SE")?,
            companion(files.min.as_deref(), "minimum")?,
            companion(files.max.as_deref(), "maximum")?,
        )
    } else {
        (None, None, None)
    };

    let display = |values: Vec<Option<f64>>| {
        if options.log {
            log_transform(&values)
        } else {
            values
        }
    };
    let column = |cols: &Option<Columns>, i: usize| cols.as_ref().map(|c| c.columns[i].clone());

    let series = main
        .header
        .iter()
        .enumerate()
        .map(|(i, name)| Series {
            name: name.clone(),
            values: display(main.columns[i].clone()),
            linear: main.columns[i].clone(),
            se: column(&se, i),
            min: column(&min, i).map(display),
            max: column(&max, i).map(display),
        })
        .collect();

    Ok(SeriesSet {
        series,
        steps: main.rows,
        runs: if aggregated { files.run_count().max(1) } else { 1 },
        log: options.log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn single(dir: &Path, content: &str) -> ResultFiles {
        let path = dir.join("run-abc123_1.csv");
        fs::write(&path, content).unwrap();
        ResultFiles {
            runs: vec![path],
            ..ResultFiles::default()
        }
    }

    #[test]
    fn missing_marker_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let files = single(dir.path(), "A,B\n1,NA\n\n2,3\n");
        let set = load(&files, &LoadOptions::default()).unwrap();

        assert_eq!(set.steps, 2);
        assert_eq!(set.runs, 1);
        assert_eq!(set.get("A").unwrap().values, vec![Some(1.0), Some(2.0)]);
        assert_eq!(set.get("B").unwrap().values, vec![None, Some(3.0)]);
    }

    #[test]
    fn log_maps_non_positive_to_missing() {
        let dir = tempfile::tempdir().unwrap();
        let files = single(dir.path(), "A\n0\n-2\n1\n");
        let options = LoadOptions {
            log: true,
            ..LoadOptions::default()
        };
        let set = load(&files, &options).unwrap();

        let a = set.get("A").unwrap();
        assert_eq!(a.values, vec![None, None, Some(0.0)]);
        assert_eq!(a.linear, vec![Some(0.0), Some(-2.0), Some(1.0)]);
    }

    #[test]
    fn reports_line_and_column() {
        let dir = tempfile::tempdir().unwrap();
        let files = single(dir.path(), "A,B\n1,2\n3,x\n");
        match load(&files, &LoadOptions::default()).unwrap_err() {
            ResultsError::InvalidResultsFile { line, column, .. } => {
                assert_eq!((line, column), (Some(3), Some(2)));
            }
            other => panic!("unexpected error: {other}"),
        }

        let files = single(dir.path(), "A,B\n1\n");
        match load(&files, &LoadOptions::default()).unwrap_err() {
            ResultsError::InvalidResultsFile { line, column, .. } => {
                assert_eq!((line, column), (Some(2), None));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn undecodable_content_is_an_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run-abc123_1.csv");
        fs::write(&path, b"A,B\n1,\xff\xfe\n").unwrap();
        let files = ResultFiles {
            runs: vec![path],
            ..ResultFiles::default()
        };
        match load(&files, &LoadOptions::default()).unwrap_err() {
            ResultsError::InvalidResultsFile { line, column, .. } => {
                assert_eq!((line, column), (Some(2), None));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn vanished_file_is_an_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = ResultFiles {
            runs: vec![dir.path().join("run-abc123_1.csv")],
            ..ResultFiles::default()
        };
        let err = load(&files, &LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ResultsError::InvalidResultsFile { line: None, column: None, .. }
        ));
    }

    #[test]
    fn no_files_is_no_results() {
        let err = load(&ResultFiles::default(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ResultsError::NoResults));
    }

    #[test]
    fn companions_must_match_mean() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, content: &str| -> PathBuf {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        };
        let files = ResultFiles {
            runs: vec![write("run-abc123_1.csv", "A\n1\n"), write("run-abc123_2.csv", "A\n1\n")],
            mean: Some(write("run-abc123_mean.csv", "A\n1\n2\n")),
            se: Some(write("run-abc123_se.csv", "A\n0.1\n")),
            ..ResultFiles::default()
        };

        let err = load(&files, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ResultsError::InconsistentResults { .. }));
    }
}
