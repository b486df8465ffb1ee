use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use sg_app::{
    query, run_service, session_service, AppResult, CancelToken, RunProgressEvent, RunRequest,
    RunStage, ViewRequest,
};
use sg_config::{write_record, CleanConfig, ServerSettings};
use sg_core::{format_g, SessionId};
use sg_results::PlotOptions;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sg-cli")]
#[command(about = "simgate CLI - supervised runs of an external simulation engine", long_about = None)]
struct Cli {
    /// Server settings YAML file (defaults apply when omitted)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Client session token
    #[arg(long, global = true)]
    session: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh session token
    Token,
    /// List the configurable parameters
    Catalog,
    /// Sanitize NAME=VALUE pairs and print the resulting configuration
    Submit {
        pairs: Vec<String>,
        /// Also store it as the session's saved configuration
        #[arg(long)]
        save: bool,
    },
    /// Validate an uploaded Name,Value file and print the sanitized result
    Upload { file: PathBuf },
    /// Store a Name,Value file as the session's saved configuration
    Save { config: PathBuf },
    /// Run the simulation for a Name,Value configuration file
    Run { config: PathBuf },
    /// Request abort of the session's running simulation
    Abort,
    /// Show whether a simulation is running and its completion percentage
    Progress,
    /// Print the engine log of the session's last run
    Log,
    /// List the result files of the session's last run
    Results,
    /// List the output variables available in the results
    Series,
    /// Descriptive statistics of the selected series
    Stats(ViewArgs),
    /// Values of the selected series per step
    Table(ViewArgs),
    /// Plot data of the selected series as JSON
    Plot {
        #[command(flatten)]
        view: ViewArgs,
        /// Add 95% confidence bands (Monte Carlo runs)
        #[arg(long)]
        ci: bool,
        /// Add min/max envelopes (Monte Carlo runs)
        #[arg(long)]
        min_max: bool,
        /// Fixed y-axis lower limit
        #[arg(long, requires = "ymax")]
        ymin: Option<f64>,
        /// Fixed y-axis upper limit
        #[arg(long, requires = "ymin")]
        ymax: Option<f64>,
    },
    /// Abort any running simulation and delete the session's files
    Reset,
}

#[derive(Args)]
struct ViewArgs {
    /// Series to include (repeatable)
    #[arg(short, long = "series")]
    series: Vec<String>,
    /// First step (1-based)
    #[arg(long)]
    begin: Option<i64>,
    /// Last step (inclusive)
    #[arg(long)]
    end: Option<i64>,
    /// Natural log of the values
    #[arg(long)]
    log: bool,
}

impl From<ViewArgs> for ViewRequest {
    fn from(args: ViewArgs) -> Self {
        ViewRequest {
            series: args.series,
            begin: args.begin,
            end: args.end,
            log: args.log,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            clear_progress_line();
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}", e.status_line());
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> AppResult<()> {
    if let Commands::Token = cli.command {
        println!("{}", session_service::new_session_token());
        return Ok(());
    }

    let settings = session_service::load_settings(cli.settings.as_deref())?;
    let session = SessionId::from_token(cli.session.as_deref());

    match cli.command {
        Commands::Token => Ok(()),
        Commands::Catalog => cmd_catalog(&settings),
        Commands::Submit { pairs, save } => cmd_submit(&settings, &session, &pairs, save),
        Commands::Upload { file } => cmd_upload(&settings, &file),
        Commands::Save { config } => cmd_save(&settings, &session, &config),
        Commands::Run { config } => cmd_run(&settings, &session, &config),
        Commands::Abort => cmd_abort(&settings, &session),
        Commands::Progress => cmd_progress(&settings, &session),
        Commands::Log => {
            for line in session_service::fetch_log(&settings, &session)? {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Results => cmd_results(&settings, &session),
        Commands::Series => {
            for name in query::list_series(&settings, &session)? {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Stats(view) => cmd_stats(&settings, &session, &view.into()),
        Commands::Table(view) => cmd_table(&settings, &session, &view.into()),
        Commands::Plot {
            view,
            ci,
            min_max,
            ymin,
            ymax,
        } => {
            let options = PlotOptions {
                confidence: ci,
                min_max,
                limits: ymin.zip(ymax),
            };
            cmd_plot(&settings, &session, &view.into(), &options)
        }
        Commands::Reset => {
            let removed = session_service::reset_session(&settings, &session)?;
            println!("Session {session} reset, {removed} file(s) removed");
            Ok(())
        }
    }
}

fn read_config(settings: &ServerSettings, path: &Path) -> AppResult<CleanConfig> {
    let catalog = session_service::load_catalog(settings)?;
    let raw = sg_config::read_record_file(path)?;
    Ok(session_service::submit_configuration(&raw, &catalog))
}

fn print_config(config: &CleanConfig) -> AppResult<()> {
    write_record(io::stdout().lock(), config)?;
    Ok(())
}

fn cmd_catalog(settings: &ServerSettings) -> AppResult<()> {
    let catalog = session_service::load_catalog(settings)?;
    if catalog.is_empty() {
        println!("No parameters in catalog");
        return Ok(());
    }
    for spec in catalog.iter() {
        println!(
            "  {:<24} {:<8} [{} .. {}]  {}",
            spec.name,
            format!("{:?}", spec.format).to_lowercase(),
            spec.min,
            spec.max,
            spec.description
        );
    }
    Ok(())
}

fn cmd_submit(
    settings: &ServerSettings,
    session: &SessionId,
    pairs: &[String],
    save: bool,
) -> AppResult<()> {
    let catalog = session_service::load_catalog(settings)?;
    let raw = pairs
        .iter()
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()));
    let config = session_service::submit_configuration(raw, &catalog);
    print_config(&config)?;
    if save {
        let path = session_service::save_configuration(settings, session, &config)?;
        println!("✓ Saved: {}", path.display());
    }
    Ok(())
}

fn cmd_upload(settings: &ServerSettings, file: &Path) -> AppResult<()> {
    let catalog = session_service::load_catalog(settings)?;
    let content = std::fs::read(file)?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let config = session_service::upload_configuration(&name, &content, &catalog)?;
    print_config(&config)
}

fn cmd_save(settings: &ServerSettings, session: &SessionId, config: &Path) -> AppResult<()> {
    let config = read_config(settings, config)?;
    let path = session_service::save_configuration(settings, session, &config)?;
    println!("✓ Saved: {}", path.display());
    Ok(())
}

fn cmd_run(settings: &ServerSettings, session: &SessionId, config: &Path) -> AppResult<()> {
    let config = read_config(settings, config)?;
    println!(
        "Running simulation for session {session}: {} step(s), {} run(s)",
        config.time_steps(),
        config.runs()
    );

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!(error = %e, "cannot install interrupt handler");
    }

    let request = RunRequest {
        session,
        config: &config,
        settings,
        cancel: Some(&cancel),
    };

    let mut last_emit = Instant::now();
    let mut last_stage = None;
    let response = run_service::start_run_with_progress(
        &request,
        Some(&mut |event| {
            let emit_now = last_stage != Some(event.stage) || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = Some(event.stage);
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    println!("✓ Simulation completed in {:.1}s", response.record.elapsed_secs);
    println!("  Runs:  {}", response.summary.runs);
    println!("  Files: {}", response.summary.size);
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    match (event.stage, event.percent) {
        (RunStage::Running, Some(percent)) => {
            let width = 28usize;
            let filled = (percent as usize * width / 100).min(width);
            print!(
                "\r[{}{}] {:>3}%  elapsed={:.1}s",
                "#".repeat(filled),
                "-".repeat(width - filled),
                percent,
                event.elapsed_wall_s
            );
        }
        _ => {
            let spinner = ['|', '/', '-', '\\'];
            let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
            let mut line = format!(
                "\r{} {}  elapsed={:.2}s",
                spinner[spin_idx],
                event.stage.label(),
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {msg}"));
            }
            print!("{line}");
        }
    }
    let _ = io::stdout().flush();
}

fn cmd_abort(settings: &ServerSettings, session: &SessionId) -> AppResult<()> {
    if session_service::request_abort(settings, session)? {
        println!("Abort requested for session {session}");
    } else {
        println!("No simulation running for session {session}");
    }
    Ok(())
}

fn cmd_progress(settings: &ServerSettings, session: &SessionId) -> AppResult<()> {
    let running = session_service::is_running(settings, session)?;
    let percent = session_service::poll_progress(settings, session)?;
    let state = if running { "running" } else { "idle" };
    println!("{state} {percent}%");
    Ok(())
}

fn cmd_results(settings: &ServerSettings, session: &SessionId) -> AppResult<()> {
    let summary = query::fetch_results(settings, session)?;
    if let Some(manifest) = query::last_run(settings, session)? {
        println!(
            "Last run: {}  ({} run(s), seed {}, {} step(s), {:.1}s)",
            manifest.timestamp,
            manifest.runs,
            manifest.seed,
            manifest.time_steps,
            manifest.elapsed_secs
        );
        println!("  Configuration digest: {}", manifest.config_digest);
    }
    println!("Results ({}):", summary.size);
    for file in &summary.files {
        println!("  {file}");
    }
    Ok(())
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format_g(v, 5))
}

fn cmd_stats(settings: &ServerSettings, session: &SessionId, view: &ViewRequest) -> AppResult<()> {
    let stats = query::fetch_statistics(settings, session, view)?;
    println!(
        "{:<24} {:>6} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "Series", "Obs", "Mean", "SD", "Min", "Max", "SE"
    );
    for s in stats {
        println!(
            "{:<24} {:>6} {:>12} {:>12} {:>12} {:>12} {:>12}",
            s.name,
            s.obs,
            cell(s.mean),
            cell(s.sd),
            cell(s.min),
            cell(s.max),
            cell(s.se)
        );
    }
    Ok(())
}

fn cmd_table(settings: &ServerSettings, session: &SessionId, view: &ViewRequest) -> AppResult<()> {
    let table = query::fetch_table(settings, session, view)?;
    if table.log {
        println!("(natural log)");
    }
    println!("Step,{}", table.columns.join(","));
    for row in table.rows {
        println!("{},{}", row.step, row.values.join(","));
    }
    Ok(())
}

fn cmd_plot(
    settings: &ServerSettings,
    session: &SessionId,
    view: &ViewRequest,
    options: &PlotOptions,
) -> AppResult<()> {
    let plot = query::fetch_plot_data(settings, session, view, options)?;
    let json = serde_json::to_string_pretty(&plot)
        .map_err(|e| sg_app::AppError::Results(e.to_string()))?;
    println!("{json}");
    Ok(())
}
