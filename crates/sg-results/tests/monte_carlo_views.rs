use std::fs;
use std::path::Path;

use sg_core::SessionId;
use sg_results::*;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Five runs with their aggregate quartet, as the stats tool leaves them.
fn monte_carlo_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for n in 1..=5 {
        write(dir.path(), &format!("run-abc123_{n}.csv"), "GDP,U\n9,0.1\n10,0.2\n");
    }
    write(dir.path(), "run-abc123_mean.csv", "GDP,U\n10,0.1\n11,NA\n");
    write(dir.path(), "run-abc123_se.csv", "GDP,U\n0.2,0.01\n0.4,NA\n");
    write(dir.path(), "run-abc123_min.csv", "GDP,U\n9,0.05\n10,NA\n");
    write(dir.path(), "run-abc123_max.csv", "GDP,U\n11,0.15\n12,NA\n");
    dir
}

#[test]
fn statistics_over_mean_series() {
    let dir = monte_carlo_dir();
    let session = SessionId::parse("abc123").unwrap();
    let files = ResultFiles::discover(dir.path(), &session).unwrap();
    assert_eq!(files.run_count(), 5);

    let set = load(&files, &LoadOptions::default()).unwrap();
    assert_eq!(set.runs, 5);
    assert_eq!(set.steps, 2);

    let stats = statistics_view(&set, &[], StepRange::resolve(Some(1), Some(2), set.steps)).unwrap();
    let gdp = &stats[0];
    assert_eq!(gdp.name, "GDP");
    assert_eq!(gdp.obs, 2);
    assert_eq!(gdp.mean, Some(10.5));
    assert!((gdp.se.unwrap() - 0.3).abs() < 1e-12);

    let u = &stats[1];
    assert_eq!(u.obs, 1);
    assert_eq!(u.max, Some(0.1));
}

#[test]
fn plot_with_band_and_envelope() {
    let dir = monte_carlo_dir();
    let session = SessionId::parse("abc123").unwrap();
    let files = ResultFiles::discover(dir.path(), &session).unwrap();
    let set = load(&files, &LoadOptions::default()).unwrap();

    let options = PlotOptions {
        confidence: true,
        min_max: true,
        limits: None,
    };
    let plot = plot_view(&set, &names(&["GDP"]), StepRange::all(set.steps), &options).unwrap();

    assert_eq!(plot.labels, ["GDP"]);
    assert_eq!(plot.lo[0][0].as_deref(), Some("9.445"));
    assert_eq!(plot.hi[0][0].as_deref(), Some("10.56"));
    assert_eq!(plot.min[0], [Some("9".to_string()), Some("10".to_string())]);
    assert_eq!(plot.max[0][1].as_deref(), Some("12"));
}

#[test]
fn table_in_log_space() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "run-abc123_1.csv", "X\n1\n0\nNA\n");
    let session = SessionId::parse("abc123").unwrap();
    let files = ResultFiles::discover(dir.path(), &session).unwrap();
    let options = LoadOptions {
        log: true,
        ..LoadOptions::default()
    };
    let set = load(&files, &options).unwrap();

    let table = table_view(&set, &names(&["X"]), StepRange::all(set.steps)).unwrap();
    assert!(table.log);
    let cells: Vec<&str> = table.rows.iter().map(|r| r.values[0].as_str()).collect();
    assert_eq!(cells, ["0", "N/A", "N/A"]);
}

#[test]
fn result_summary_counts_every_file() {
    let dir = monte_carlo_dir();
    let session = SessionId::parse("abc123").unwrap();
    let files = ResultFiles::discover(dir.path(), &session).unwrap();
    assert!(size_summary(files.all()).ends_with("[9 file(s)]"));
}
