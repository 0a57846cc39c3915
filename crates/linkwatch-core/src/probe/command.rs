//! Shared command runner with a hard deadline.
//!
//! Spawns the command with piped stdout, drains stdout on a helper thread
//! (so a chatty command can never deadlock on a full pipe), and polls
//! `try_wait` against the deadline. A command still running at the deadline
//! is killed and reported as a timeout.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ProbeError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured output of a finished command.
#[derive(Debug)]
pub struct CmdOutput {
    pub stdout: String,
    /// Exit code, `-1` when terminated by a signal.
    pub code: i32,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run `cmd args…` to completion within `timeout`.
///
/// Errors cover spawn failures (not-found, permission) and the timeout; a
/// nonzero exit is *not* an error here — some utilities (ping under packet
/// loss) exit nonzero while still printing a usable report, so each probe
/// decides what a nonzero exit means for its source.
pub fn run_command(
    probe: &'static str,
    cmd: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CmdOutput, ProbeError> {
    let child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match child {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProbeError::NotFound { probe });
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ProbeError::PermissionDenied { probe, source: e });
        }
        Err(e) => return Err(ProbeError::Io { probe, source: e }),
    };

    // Drain stdout off-thread; try_wait polling below never touches the pipe.
    let mut stdout_pipe = child.stdout.take();
    let reader = thread::spawn(move || {
        let mut text = String::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut text);
        }
        text
    });

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = reader.join().unwrap_or_default();
                return Ok(CmdOutput {
                    stdout,
                    code: status.code().unwrap_or(-1),
                });
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = reader.join();
                    return Err(ProbeError::Timeout {
                        probe,
                        seconds: timeout.as_secs_f64(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = reader.join();
                return Err(ProbeError::Io { probe, source: e });
            }
        }
    }
}

/// Require a zero exit, converting anything else into [`ProbeError::NonZeroExit`].
pub fn require_success(probe: &'static str, out: CmdOutput) -> Result<String, ProbeError> {
    if out.success() {
        Ok(out.stdout)
    } else {
        Err(ProbeError::NonZeroExit {
            probe,
            code: out.code,
        })
    }
}
