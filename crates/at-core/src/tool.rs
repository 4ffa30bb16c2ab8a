//! External tool invocation.
//!
//! Prep, Core, the report generator and the spreadsheet exporter are opaque
//! programs. They sit behind [`ExternalTool`] so the scheduler can be driven
//! by in-process fakes; [`SubprocessTool`] runs the real binaries with a
//! time budget.

use at_common::ToolStage;
use at_config::AutotuneConfig;
use serde::Serialize;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::Read;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Bytes of stderr kept for error messages.
const STDERR_TAIL_BYTES: usize = 2048;

/// Poll interval while waiting on a child.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exceeded {timeout_ms} ms budget")]
    Timeout { program: String, timeout_ms: u64 },

    #[error("io error around {program}: {message}")]
    Io { program: String, message: String },
}

/// One call of an external tool.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub stage: ToolStage,
    pub args: Vec<OsString>,
    /// Capture standard output into this file.
    pub stdout_to: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(stage: ToolStage) -> Self {
        Self {
            stage,
            args: Vec::new(),
            stdout_to: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_to = Some(path.into());
        self
    }
}

/// Outcome of a tool that ran to completion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolRun {
    pub exit_code: Option<i32>,
    pub success: bool,
    /// Size of the captured stdout file, when one was requested.
    pub stdout_bytes: u64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr_tail: String,
}

pub trait ExternalTool: Send + Sync {
    fn name(&self) -> &str;
    fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolRun, ToolError>;
}

/// Runs a program found on `PATH` (or by absolute path).
#[derive(Debug, Clone)]
pub struct SubprocessTool {
    program: String,
    timeout: Duration,
}

impl SubprocessTool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn io_error(&self, message: impl Into<String>) -> ToolError {
        ToolError::Io {
            program: self.program.clone(),
            message: message.into(),
        }
    }
}

impl ExternalTool for SubprocessTool {
    fn name(&self) -> &str {
        &self.program
    }

    fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolRun, ToolError> {
        let started = Instant::now();
        let stdout = match &invocation.stdout_to {
            Some(path) => {
                let file = File::create(path)
                    .map_err(|e| self.io_error(format!("{}: {e}", path.display())))?;
                Stdio::from(file)
            }
            None => Stdio::inherit(),
        };

        debug!(
            stage = %invocation.stage,
            program = %self.program,
            args = ?invocation.args,
            "spawning tool"
        );
        let mut command = Command::new(&self.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped());
        // Own group, so a timeout also reaches anything the tool forked.
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn().map_err(|source| ToolError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if started.elapsed() > self.timeout {
                        kill_group(&mut child);
                        let _ = child.wait();
                        warn!(
                            stage = %invocation.stage,
                            program = %self.program,
                            "tool killed after timeout"
                        );
                        return Err(ToolError::Timeout {
                            program: self.program.clone(),
                            timeout_ms: self.timeout.as_millis() as u64,
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    kill_group(&mut child);
                    return Err(self.io_error(e.to_string()));
                }
            }
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let stdout_bytes = invocation
            .stdout_to
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(ToolRun {
            exit_code: status.code(),
            success: status.success(),
            stdout_bytes,
            duration_ms: started.elapsed().as_millis() as u64,
            stderr_tail: tail(&stderr),
        })
    }
}

/// SIGKILL the child's whole process group, then the child itself.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pid) = i32::try_from(child.id()) {
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
}

fn tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

/// The four programs one invocation may call.
pub struct Toolbox {
    pub prep: Box<dyn ExternalTool>,
    pub core: Box<dyn ExternalTool>,
    pub report: Box<dyn ExternalTool>,
    pub export: Box<dyn ExternalTool>,
}

impl Toolbox {
    pub fn from_config(config: &AutotuneConfig) -> Self {
        let timeout = config.tool_timeout();
        let tool = |program: &str| -> Box<dyn ExternalTool> {
            Box::new(SubprocessTool::new(program, timeout))
        };
        Self {
            prep: tool(&config.tools.prep),
            core: tool(&config.tools.core),
            report: tool(&config.tools.report),
            export: tool(&config.tools.export),
        }
    }
}
