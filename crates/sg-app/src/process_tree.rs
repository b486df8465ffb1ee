//! Launch isolation and whole-tree termination of the engine process.
//!
//! On unix the engine leads its own process group; termination signals the
//! group and every descendant found under `/proc` (children that moved to
//! another group included). On Windows `taskkill /T` walks the tree.

use std::io;
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};

const WAIT_STEP: Duration = Duration::from_millis(20);

/// Prepare `cmd` so the spawned process can be terminated with its tree.
pub fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }
}

/// Exit code of a finished process; `128 + signal` for a signal death.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Terminate `child` and all of its descendants and reap it.
///
/// With `graceful`, a termination request goes out first and the tree gets
/// `grace` to exit; whatever is left is then killed.
pub fn terminate_process_tree(
    child: &mut Child,
    graceful: bool,
    grace: Duration,
) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        unix::terminate(child, graceful, grace)
    }
    #[cfg(windows)]
    {
        windows::terminate(child, graceful, grace)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (graceful, grace);
        let _ = child.kill();
        child.wait()
    }
}

/// Whether `pid` names a live (not zombie) process.
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        unix::is_alive(pid as i32)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

fn wait_until(deadline: Instant, mut done: impl FnMut() -> bool) -> bool {
    loop {
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(WAIT_STEP);
    }
}

#[cfg(unix)]
mod unix {
    use super::*;

    pub(super) fn terminate(
        child: &mut Child,
        graceful: bool,
        grace: Duration,
    ) -> io::Result<ExitStatus> {
        let pid = child.id() as i32;
        let mut tree = descendants(pid);

        if graceful {
            signal_tree(pid, &tree, libc::SIGTERM);
            let deadline = Instant::now() + grace;
            let exited = wait_until(deadline, || {
                let leader_done = !matches!(child.try_wait(), Ok(None));
                leader_done && tree.iter().all(|&p| !is_alive(p))
            });
            if exited {
                tracing::debug!(pid, "process tree exited after SIGTERM");
                return child.wait();
            }
            tracing::info!(pid, grace_secs = grace.as_secs_f64(), "process tree ignored SIGTERM, killing");
        }

        for p in descendants(pid) {
            if !tree.contains(&p) {
                tree.push(p);
            }
        }
        signal_tree(pid, &tree, libc::SIGKILL);
        let status = child.wait()?;
        wait_until(Instant::now() + Duration::from_secs(1), || {
            tree.iter().all(|&p| !is_alive(p))
        });
        Ok(status)
    }

    fn signal_tree(pgid: i32, tree: &[i32], signal: libc::c_int) {
        // SAFETY: kill(2) takes plain integers and has no memory effects.
        unsafe {
            libc::kill(-pgid, signal);
            for &p in tree {
                libc::kill(p, signal);
            }
        }
    }

    pub(super) fn is_alive(pid: i32) -> bool {
        if pid <= 0 {
            return false;
        }
        if let Some(alive) = proc_alive(pid) {
            return alive;
        }
        // SAFETY: signal 0 only checks for existence.
        let rc = unsafe { libc::kill(pid, 0) };
        rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    /// Zombies count as dead; `None` when `/proc` has no answer.
    #[cfg(target_os = "linux")]
    fn proc_alive(pid: i32) -> Option<bool> {
        read_stat(pid).map(|stat| !matches!(stat.state, 'Z' | 'X'))
    }

    #[cfg(not(target_os = "linux"))]
    fn proc_alive(_pid: i32) -> Option<bool> {
        None
    }

    #[cfg(target_os = "linux")]
    struct Stat {
        state: char,
        ppid: i32,
    }

    /// Fields of `/proc/<pid>/stat` after the parenthesised command name.
    #[cfg(target_os = "linux")]
    fn read_stat(pid: i32) -> Option<Stat> {
        let text = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        let rest = &text[text.rfind(')')? + 1..];
        let mut fields = rest.split_whitespace();
        let state = fields.next()?.chars().next()?;
        let ppid = fields.next()?.parse().ok()?;
        Some(Stat { state, ppid })
    }

    /// All live descendants of `root`.
    #[cfg(target_os = "linux")]
    fn descendants(root: i32) -> Vec<i32> {
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return Vec::new();
        };
        let parents: Vec<(i32, i32)> = entries
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().to_str()?.parse::<i32>().ok())
            .filter_map(|pid| read_stat(pid).map(|s| (pid, s.ppid)))
            .collect();

        let mut found = vec![root];
        let mut i = 0;
        while i < found.len() {
            let parent = found[i];
            for &(pid, ppid) in &parents {
                if ppid == parent && !found.contains(&pid) {
                    found.push(pid);
                }
            }
            i += 1;
        }
        found.remove(0);
        found
    }

    #[cfg(not(target_os = "linux"))]
    fn descendants(_root: i32) -> Vec<i32> {
        Vec::new()
    }
}

#[cfg(windows)]
mod windows {
    use super::*;
    use std::process::Stdio;

    fn taskkill(pid: u32, force: bool) {
        let mut cmd = Command::new("taskkill");
        if force {
            cmd.arg("/F");
        }
        let result = cmd
            .args(["/T", "/PID", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = result {
            tracing::warn!(pid, error = %e, "taskkill failed");
        }
    }

    pub(super) fn terminate(
        child: &mut Child,
        graceful: bool,
        grace: Duration,
    ) -> io::Result<ExitStatus> {
        let pid = child.id();
        if graceful {
            taskkill(pid, false);
            let exited = wait_until(Instant::now() + grace, || {
                !matches!(child.try_wait(), Ok(None))
            });
            if exited {
                return child.wait();
            }
        }
        taskkill(pid, true);
        let _ = child.kill();
        child.wait()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;

    #[test]
    fn terminates_cooperative_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30").stdout(Stdio::null());
        isolate(&mut cmd);
        let mut child = cmd.spawn().unwrap();
        let pid = child.id();

        let status = terminate_process_tree(&mut child, true, Duration::from_secs(2)).unwrap();
        assert_eq!(exit_code(status), 128 + libc::SIGTERM);
        assert!(!is_process_alive(pid));
    }

    #[test]
    fn forceful_only_kills_immediately() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        isolate(&mut cmd);
        let mut child = cmd.spawn().unwrap();

        let started = Instant::now();
        let status = terminate_process_tree(&mut child, false, Duration::from_secs(10)).unwrap();
        assert_eq!(exit_code(status), 128 + libc::SIGKILL);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
