//! Bounded subprocess stages
//!
//! One stage = one external command with piped stdio, a wall-clock budget,
//! and forced termination of the child and its descendants on overrun. The
//! child runs as the leader of its own process group so a single group
//! signal reaches everything it spawned.

use crate::config::types::{ExecError, Result};
use crate::exec::output::{OutputCollector, OutputLimits};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(unix)]
use nix::sys::signal::{kill, killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Poll interval while waiting on a child
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Grace period between SIGTERM and SIGKILL on the group
const TERM_GRACE: Duration = Duration::from_millis(200);

/// Result of one bounded stage
#[derive(Debug)]
pub struct StageResult {
    /// Captured stdout, lossily decoded
    pub stdout: String,
    /// Captured stderr, lossily decoded
    pub stderr: String,
    /// Stdout hit its byte cap and was cut short
    pub stdout_truncated: bool,
    /// Stderr hit its byte cap and was cut short
    pub stderr_truncated: bool,
    /// Exit code; `None` when the child was signaled or timed out
    pub exit_code: Option<i32>,
    /// The stage exceeded its budget and the group was terminated
    pub timed_out: bool,
    /// Wall-clock time spent in the stage
    pub duration: Duration,
    /// PID the child ran under
    pub pid: u32,
}

impl StageResult {
    /// Exit 0 and no timeout
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Record of a group termination attempt
#[derive(Debug, Default)]
pub struct KillReport {
    pub term_sent: bool,
    pub kill_sent: bool,
    pub waited_ms: u64,
}

/// Run one external command bounded by `budget`.
///
/// `stdin_data` is written to the child on a feeder thread and the pipe is
/// closed afterwards; `None` wires the child to the null device. Both output
/// streams are drained concurrently under the byte caps in `limits`.
pub fn run_stage(
    argv: &[String],
    cwd: &Path,
    stdin_data: Option<&str>,
    budget: Duration,
    limits: &OutputLimits,
) -> Result<StageResult> {
    if argv.is_empty() {
        return Err(ExecError::Process("empty command".to_string()));
    }

    let mut cmd = Command::new(&argv[0]);
    if argv.len() > 1 {
        cmd.args(&argv[1..]);
    }
    cmd.current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // The child leads its own process group; group signals then reach
        // every descendant it forks.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setpgid(0, 0) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    let started = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|e| ExecError::Process(format!("spawn '{}': {}", argv[0], e)))?;
    let child_pid = child.id();

    if let (Some(data), Some(mut stdin)) = (stdin_data, child.stdin.take()) {
        let data = data.to_owned();
        thread::spawn(move || {
            use std::io::Write;
            let _ = stdin.write_all(data.as_bytes());
        });
    }

    let collector = OutputCollector::spawn(child.stdout.take(), child.stderr.take(), limits);

    let mut timed_out = false;
    loop {
        match poll_child_exit(&mut child) {
            Ok(true) => break,
            Ok(false) => {
                if started.elapsed() > budget {
                    timed_out = true;
                    let report = terminate_child_group(&mut child);
                    log::info!(
                        "stage '{}' exceeded {:?} budget (pid {}, term_sent={}, kill_sent={})",
                        argv[0],
                        budget,
                        child_pid,
                        report.term_sent,
                        report.kill_sent
                    );
                    break;
                }
                thread::sleep(WAIT_POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }
    }

    // A forked descendant left in the group would keep the pipes open past
    // the request; sweep the group before the leader is reaped below, while
    // its group id is still pinned and cannot have been recycled.
    #[cfg(unix)]
    if !timed_out {
        let _ = killpg(Pid::from_raw(child_pid as i32), Signal::SIGKILL);
    }

    let wait_status = child.wait();
    let exit_code = if timed_out {
        None
    } else {
        wait_status.ok().and_then(|status| status.code())
    };

    let (stdout, stderr) = collector.join();

    Ok(StageResult {
        stdout: String::from_utf8_lossy(&stdout.data).to_string(),
        stderr: String::from_utf8_lossy(&stderr.data).to_string(),
        stdout_truncated: stdout.truncated,
        stderr_truncated: stderr.truncated,
        exit_code,
        timed_out,
        duration: started.elapsed(),
        pid: child_pid,
    })
}

/// Check the leader for exit without reaping it. The unreaped child pins
/// its pid and process group id until the post-exit sweep has run.
#[cfg(target_os = "linux")]
fn poll_child_exit(child: &mut std::process::Child) -> Result<bool> {
    use nix::errno::Errno;
    use nix::sys::wait::{waitid, Id, WaitPidFlag, WaitStatus};

    let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG | WaitPidFlag::WNOWAIT;
    match waitid(Id::Pid(Pid::from_raw(child.id() as i32)), flags) {
        Ok(WaitStatus::StillAlive) => Ok(false),
        Ok(_) => Ok(true),
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(ExecError::Process(format!("wait on child: {}", e))),
    }
}

/// Exit check for platforms without `waitid`; reaps on detection, and the
/// later `wait` call returns the cached status.
#[cfg(not(target_os = "linux"))]
fn poll_child_exit(child: &mut std::process::Child) -> Result<bool> {
    match child.try_wait() {
        Ok(status) => Ok(status.is_some()),
        Err(e) => Err(ExecError::Process(format!("wait on child: {}", e))),
    }
}

#[cfg(unix)]
fn terminate_child_group(child: &mut std::process::Child) -> KillReport {
    terminate_group(Pid::from_raw(child.id() as i32))
}

#[cfg(not(unix))]
fn terminate_child_group(child: &mut std::process::Child) -> KillReport {
    let _ = child.kill();
    KillReport {
        term_sent: false,
        kill_sent: true,
        waited_ms: 0,
    }
}

/// SIGTERM the group, grant a short grace, then SIGKILL. Falls back to the
/// direct pid when the group signal fails.
#[cfg(unix)]
pub fn terminate_group(pgid: Pid) -> KillReport {
    let mut report = KillReport::default();
    let start = Instant::now();

    if killpg(pgid, Signal::SIGTERM).is_ok() {
        report.term_sent = true;
    } else {
        let _ = kill(pgid, Signal::SIGTERM);
        report.term_sent = true;
    }

    thread::sleep(TERM_GRACE);

    if killpg(pgid, Signal::SIGKILL).is_ok() {
        report.kill_sent = true;
    } else {
        let _ = kill(pgid, Signal::SIGKILL);
        report.kill_sent = true;
    }

    report.waited_ms = start.elapsed().as_millis() as u64;
    report
}

/// Check whether a process is still alive (signal 0).
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_stage_captures_stdout() {
        let result = run_stage(
            &argv(&["/bin/echo", "hi"]),
            Path::new("/tmp"),
            None,
            Duration::from_secs(5),
            &OutputLimits::default(),
        )
        .unwrap();
        assert_eq!(result.stdout.trim(), "hi");
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.timed_out);
        assert!(result.succeeded());
    }

    #[test]
    fn test_stage_captures_stderr_and_exit_code() {
        let result = run_stage(
            &argv(&["/bin/sh", "-c", "echo oops >&2; exit 3"]),
            Path::new("/tmp"),
            None,
            Duration::from_secs(5),
            &OutputLimits::default(),
        )
        .unwrap();
        assert_eq!(result.stderr.trim(), "oops");
        assert_eq!(result.exit_code, Some(3));
        assert!(!result.succeeded());
    }

    #[test]
    fn test_stage_feeds_stdin() {
        let result = run_stage(
            &argv(&["/bin/cat"]),
            Path::new("/tmp"),
            Some("piped through"),
            Duration::from_secs(5),
            &OutputLimits::default(),
        )
        .unwrap();
        assert_eq!(result.stdout, "piped through");
    }

    #[test]
    fn test_stage_times_out_and_kills() {
        let result = run_stage(
            &argv(&["/bin/sh", "-c", "sleep 30"]),
            Path::new("/tmp"),
            None,
            Duration::from_millis(100),
            &OutputLimits::default(),
        )
        .unwrap();
        assert!(result.timed_out);
        assert!(result.exit_code.is_none());
        assert!(result.duration < Duration::from_secs(5));
        assert!(!process_alive(result.pid));
    }

    #[test]
    fn test_stage_kills_descendants() {
        // The inner sleep would hold stdout open long past the budget if
        // group termination missed it.
        let result = run_stage(
            &argv(&["/bin/sh", "-c", "sleep 30 & wait"]),
            Path::new("/tmp"),
            None,
            Duration::from_millis(100),
            &OutputLimits::default(),
        )
        .unwrap();
        assert!(result.timed_out);
        assert!(result.duration < Duration::from_secs(5));
    }

    #[test]
    fn test_stage_sweeps_descendants_after_exit() {
        // The orphaned sleep inherits the stdout pipe; without the post-exit
        // group sweep the collector join would block for its full duration.
        let started = Instant::now();
        let result = run_stage(
            &argv(&["/bin/sh", "-c", "sleep 30 & echo started"]),
            Path::new("/tmp"),
            None,
            Duration::from_secs(10),
            &OutputLimits::default(),
        )
        .unwrap();
        assert_eq!(result.stdout.trim(), "started");
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.timed_out);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_capped_stream_reports_truncation() {
        let limits = OutputLimits {
            stdout_limit: 512,
            stderr_limit: 512,
        };
        let result = run_stage(
            &argv(&[
                "/bin/sh",
                "-c",
                "i=0; while [ $i -lt 200 ]; do echo 0123456789abcdef; i=$((i+1)); done",
            ]),
            Path::new("/tmp"),
            None,
            Duration::from_secs(5),
            &limits,
        )
        .unwrap();
        assert_eq!(result.stdout.len(), 512);
        assert!(result.stdout_truncated);
        assert!(!result.stderr_truncated);
        assert!(result.succeeded());
    }

    #[test]
    fn test_missing_tool_is_an_error() {
        let err = run_stage(
            &argv(&["/no/such/tool-anywhere"]),
            Path::new("/tmp"),
            None,
            Duration::from_secs(1),
            &OutputLimits::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawn"));
    }

    #[test]
    fn test_empty_command_rejected() {
        let err = run_stage(
            &[],
            Path::new("/tmp"),
            None,
            Duration::from_secs(1),
            &OutputLimits::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("empty command"));
    }
}
