//! Supervised execution of one simulation run.
//!
//! A run goes `Idle -> Launching -> Running` and ends `Completed`,
//! `Aborted`, `TimedOut` or `Failed`. The call blocks on the caller's
//! thread until the run ends; nothing about it is kept in memory afterwards,
//! the flag and abort markers on disk are the only shared state.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use sg_config::{CleanConfig, ServerSettings};
use sg_core::SessionId;
use sg_results::{
    config_digest, size_summary, ManifestStore, ResultFiles, ResultSummary, RunManifest,
};

use crate::admission::AdmissionControl;
use crate::aggregate::aggregate;
use crate::error::{AppError, AppResult};
use crate::markers;
use crate::materialize::materialize;
use crate::paths::SessionPaths;
use crate::process_tree::{exit_code, isolate, terminate_process_tree};
use crate::progress::{read_log_percentage, RunProgressEvent, RunStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Launching,
    Running,
    Completed,
    Aborted,
    TimedOut,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Aborted | RunState::TimedOut | RunState::Failed
        )
    }
}

/// Cancellation shared with the caller; a set token is handled like an
/// abort marker. Front ends set it when their client goes away.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One engine invocation of a session.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub session: SessionId,
    pub state: RunState,
    pub started_at: Option<DateTime<Local>>,
    pub elapsed_secs: f64,
    pub exit_code: Option<i32>,
    pub outputs: Vec<PathBuf>,
}

impl RunRecord {
    fn new(session: SessionId) -> Self {
        Self {
            session,
            state: RunState::Idle,
            started_at: None,
            elapsed_secs: 0.0,
            exit_code: None,
            outputs: Vec::new(),
        }
    }

    fn transition(&mut self, to: RunState) {
        tracing::debug!(session = %self.session, from = ?self.state, to = ?to, "run state");
        self.state = to;
    }
}

/// Request to execute a run.
#[derive(Clone, Copy)]
pub struct RunRequest<'a> {
    pub session: &'a SessionId,
    pub config: &'a CleanConfig,
    pub settings: &'a ServerSettings,
    pub cancel: Option<&'a CancelToken>,
}

/// Response from a completed run.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub record: RunRecord,
    pub manifest: RunManifest,
    pub summary: ResultSummary,
}

type ProgressCallback<'a> = Option<&'a mut dyn FnMut(RunProgressEvent)>;

fn emit_progress(
    progress_cb: &mut ProgressCallback<'_>,
    stage: RunStage,
    started: Instant,
    message: Option<String>,
    percent: Option<u32>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent {
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            message,
            percent,
        });
    }
}

/// Removed when the run ends, however it ends.
struct ScratchFile(PathBuf);

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = markers::remove_if_exists(&self.0) {
            tracing::warn!(file = %self.0.display(), error = %e, "failed to remove engine configuration");
        }
    }
}

enum Outcome {
    Exited(ExitStatus),
    Aborted,
    TimedOut,
}

/// Execute a run to its end.
pub fn start_run(request: &RunRequest) -> AppResult<RunResponse> {
    start_run_with_progress(request, None)
}

/// Execute a run to its end and stream progress events.
pub fn start_run_with_progress(
    request: &RunRequest,
    mut progress_cb: ProgressCallback<'_>,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    let RunRequest {
        session,
        config,
        settings,
        cancel,
    } = *request;

    if config.is_empty() {
        return Err(AppError::NoConfiguration);
    }

    let paths = SessionPaths::new(settings, session);
    paths.ensure_dirs()?;
    let mut record = RunRecord::new(session.clone());

    emit_progress(&mut progress_cb, RunStage::Admitting, started, None, None);
    let flag = AdmissionControl::from_settings(settings).try_admit(session)?;

    emit_progress(
        &mut progress_cb,
        RunStage::Materializing,
        started,
        Some("Writing engine configuration".to_string()),
        None,
    );
    let native = materialize(config, settings, &paths)?;
    let _native = ScratchFile(native.clone());

    if abort_requested(&paths, cancel) {
        tracing::info!(session = %session, "abort requested before launch");
        consume_abort_marker(&paths);
        record.transition(RunState::Aborted);
        if let Err(e) = flag.release() {
            tracing::warn!(session = %session, error = %e, "failed to remove occupancy flag");
        }
        return Err(AppError::Aborted);
    }
    record.transition(RunState::Launching);

    let engine = &settings.tools.engine;
    if !engine.exists() {
        return Err(AppError::EngineUnavailable {
            path: engine.clone(),
        });
    }
    if !native.exists() {
        return Err(AppError::EngineUnavailable { path: native });
    }

    clear_previous_outputs(&paths)?;

    emit_progress(&mut progress_cb, RunStage::Launching, started, None, None);
    let mut child = launch(settings, &paths, &native)?;
    let launched = Instant::now();
    record.started_at = Some(Local::now());
    record.transition(RunState::Running);
    tracing::info!(session = %session, pid = child.id(), "simulation engine launched");

    let outcome = supervise(
        &mut child,
        settings,
        &paths,
        cancel,
        launched,
        started,
        &mut progress_cb,
    );

    record.elapsed_secs = launched.elapsed().as_secs_f64();
    if let Err(e) = flag.release() {
        tracing::warn!(session = %session, error = %e, "failed to remove occupancy flag");
    }

    match outcome? {
        Outcome::Aborted => {
            record.transition(RunState::Aborted);
            tracing::info!(session = %session, elapsed = record.elapsed_secs, "run aborted");
            return Err(AppError::Aborted);
        }
        Outcome::TimedOut => {
            record.transition(RunState::TimedOut);
            tracing::warn!(session = %session, elapsed = record.elapsed_secs, "run timed out");
            return Err(AppError::TimedOut);
        }
        Outcome::Exited(status) if !status.success() => {
            let code = exit_code(status);
            record.exit_code = Some(code);
            record.transition(RunState::Failed);
            tracing::warn!(session = %session, code, "simulation engine failed");
            return Err(AppError::EngineExit { code });
        }
        Outcome::Exited(_) => {
            record.exit_code = Some(0);
            record.transition(RunState::Completed);
            tracing::info!(session = %session, elapsed = record.elapsed_secs, "run completed");
        }
    }

    let seed = config.seed();
    markers::remove_if_exists(&paths.grand_total(seed))?;

    let mut files = ResultFiles::discover(&paths.output_dir, session)?;
    if files.run_count() > 1 {
        emit_progress(
            &mut progress_cb,
            RunStage::Aggregating,
            started,
            Some(format!("Aggregating {} runs", files.run_count())),
            None,
        );
        aggregate(&settings.tools.mc_stats, &paths.results_base(), &files.runs)?;
        files = ResultFiles::discover(&paths.output_dir, session)?;
    }

    emit_progress(&mut progress_cb, RunStage::SavingManifest, started, None, None);
    record.outputs = files.all().map(Path::to_path_buf).collect();
    let manifest = RunManifest {
        session: session.to_string(),
        config_digest: config_digest(config),
        timestamp: Local::now().to_rfc3339(),
        runs: config.runs(),
        seed,
        time_steps: config.time_steps(),
        elapsed_secs: record.elapsed_secs,
        result_files: files
            .all()
            .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
            .collect(),
    };
    ManifestStore::new(paths.output_dir.clone())?.save(&manifest)?;

    let summary = ResultSummary {
        files: manifest.result_files.clone(),
        size: size_summary(files.all()),
        runs: files.run_count(),
    };

    emit_progress(&mut progress_cb, RunStage::Completed, started, None, Some(100));
    Ok(RunResponse {
        record,
        manifest,
        summary,
    })
}

fn abort_requested(paths: &SessionPaths, cancel: Option<&CancelToken>) -> bool {
    paths.abort_marker().exists() || cancel.is_some_and(CancelToken::is_cancelled)
}

fn consume_abort_marker(paths: &SessionPaths) {
    if let Err(e) = markers::remove_if_exists(&paths.abort_marker()) {
        tracing::warn!(session = %paths.session, error = %e, "failed to consume abort marker");
    }
}

/// Remove result files, log and manifest left by the session's previous run.
fn clear_previous_outputs(paths: &SessionPaths) -> AppResult<()> {
    for path in ResultFiles::discover(&paths.output_dir, &paths.session)?.all() {
        markers::remove_if_exists(path)?;
    }
    markers::remove_if_exists(&paths.log())?;
    ManifestStore::new(paths.output_dir.clone())?.delete(&paths.session)?;
    Ok(())
}

fn engine_command(settings: &ServerSettings) -> Command {
    let engine = &settings.tools.engine;
    match settings.nice_level {
        Some(level) if cfg!(unix) => {
            let mut cmd = Command::new("nice");
            cmd.arg("-n").arg(level.to_string()).arg(engine);
            cmd
        }
        _ => Command::new(engine),
    }
}

fn launch(settings: &ServerSettings, paths: &SessionPaths, native: &Path) -> AppResult<Child> {
    let mut cmd = engine_command(settings);
    if settings.reads_record_config {
        cmd.arg(native).arg(&paths.output_dir);
    } else {
        let limits = &settings.limits;
        cmd.args(["-t", "-z", "-p", "-b", "-c"])
            .arg(format!(
                "{}:{}",
                limits.max_threads_per_run, limits.max_parallel_runs
            ))
            .arg("-f")
            .arg(native)
            .arg("-o")
            .arg(&paths.output_dir);
    }

    let log_path = paths.log();
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|source| AppError::WriteFailure {
            path: log_path.clone(),
            source,
        })?;
    let log_err = log.try_clone()?;
    cmd.stdin(Stdio::null()).stdout(log).stderr(log_err);
    isolate(&mut cmd);

    cmd.spawn().map_err(|source| {
        tracing::error!(engine = %settings.tools.engine.display(), error = %source, "cannot launch simulation engine");
        AppError::LaunchFailure { source }
    })
}

#[allow(clippy::too_many_arguments)]
fn supervise(
    child: &mut Child,
    settings: &ServerSettings,
    paths: &SessionPaths,
    cancel: Option<&CancelToken>,
    launched: Instant,
    started: Instant,
    progress_cb: &mut ProgressCallback<'_>,
) -> AppResult<Outcome> {
    let poll = settings.poll_interval();
    let max_time = settings.max_time();
    let grace = settings.kill_grace();
    let log = paths.log();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Outcome::Exited(status)),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(session = %paths.session, error = %e, "lost track of simulation engine");
                let _ = terminate_process_tree(child, false, grace);
                return Err(e.into());
            }
        }

        if abort_requested(paths, cancel) {
            emit_progress(
                progress_cb,
                RunStage::Terminating,
                started,
                Some("Abort requested".to_string()),
                None,
            );
            tracing::info!(session = %paths.session, "abort requested, terminating process tree");
            terminate_process_tree(child, true, grace)?;
            consume_abort_marker(paths);
            return Ok(Outcome::Aborted);
        }

        if launched.elapsed() > max_time {
            emit_progress(
                progress_cb,
                RunStage::Terminating,
                started,
                Some("Time limit exceeded".to_string()),
                None,
            );
            tracing::warn!(session = %paths.session, limit_secs = max_time.as_secs_f64(), "time limit exceeded, terminating process tree");
            terminate_process_tree(child, true, grace)?;
            return Ok(Outcome::TimedOut);
        }

        let percent = read_log_percentage(&log).ok();
        emit_progress(progress_cb, RunStage::Running, started, None, percent);
        std::thread::sleep(poll);
    }
}
