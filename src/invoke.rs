//! Spawning and supervising the external tools.
//!
//! Every backend funnels through [`ToolCommand`]: argv vectors only (never a
//! shell string), captured stdout/stderr, an optional wall-clock deadline,
//! and uniform translation of "binary not there" into
//! [`Error::ToolMissing`].
//!
//! ## Why polling instead of `wait()`
//!
//! `std::process::Child::wait` has no timeout. Rather than pulling in an
//! async runtime for what is a blocking library, the supervisor drains the
//! pipes on two reader threads and polls `try_wait` every few milliseconds
//! until the deadline passes, then kills the child. The reader threads keep
//! the pipes from filling up and deadlocking a chatty tool.

use crate::error::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// One external-tool invocation, ready to run.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Option<Duration>,
}

/// Captured result of a finished invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ToolCommand {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for a in args {
            self.args.push(a.as_ref().to_os_string());
        }
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The display name used in errors and logs: the program's file stem.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Run to completion, capturing output. A failed spawn with
    /// `NotFound` maps to [`Error::ToolMissing`]; a non-zero exit is NOT an
    /// error at this layer — see [`ToolCommand::run_ok`].
    pub fn run(&self) -> Result<ToolOutput> {
        let tool = self.tool_name();
        tracing::debug!(
            tool = %tool,
            args = ?self.args,
            timeout = ?self.timeout,
            "spawning external tool"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::ToolMissing { tool: tool.clone() }
                } else {
                    Error::io(&self.program, e)
                }
            })?;

        let stdout_handle = drain(child.stdout.take());
        let stderr_handle = drain(child.stderr.take());

        let status = match self.timeout {
            None => child.wait().map_err(|e| Error::io(&self.program, e))?,
            Some(timeout) => match wait_with_deadline(&mut child, timeout)? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Let the readers observe EOF before returning.
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Err(Error::Timeout { tool, timeout });
                }
            },
        };

        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();
        let code = status.code();
        tracing::debug!(tool = %tool, code = ?code, "external tool finished");

        Ok(ToolOutput {
            code,
            stdout,
            stderr,
        })
    }

    /// Run and require a zero exit. Non-zero exits become
    /// [`Error::ExecutionFailed`], or [`Error::ToolMissing`] when the failure
    /// pattern-matches a missing binary (exit 127, or a "not found" /
    /// "not recognized" notice on stderr).
    pub fn run_ok(&self) -> Result<ToolOutput> {
        let output = self.run()?;
        if output.success() {
            return Ok(output);
        }
        let tool = self.tool_name();
        if looks_like_missing_tool(output.code, &output.stderr) {
            return Err(Error::ToolMissing { tool });
        }
        Err(Error::ExecutionFailed {
            tool,
            code: output.code,
            stderr: output.stderr,
        })
    }
}

/// Drain a child pipe on a background thread so the child never blocks on a
/// full pipe buffer.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

/// Poll `try_wait` until the child exits or the deadline passes.
/// Returns `None` on deadline expiry (child still running).
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| Error::io(Path::new("<child>"), e))?
        {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Heuristic for "the tool itself is absent" rather than "the tool ran and
/// failed". Shells report exit 127 for an unresolvable command; Windows'
/// `cmd` prints "is not recognized".
fn looks_like_missing_tool(code: Option<i32>, stderr: &str) -> bool {
    if code == Some(127) {
        return true;
    }
    let lower = stderr.to_lowercase();
    lower.contains("not found") || lower.contains("not recognized")
}
