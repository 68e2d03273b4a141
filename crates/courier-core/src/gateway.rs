//! Bounded execution of external commands.
//!
//! [`CommandGateway`] is the only place the process talks to other
//! programs. It never fails past its boundary: spawn errors, non-zero exit
//! codes, error output and timeouts all become a [`GatewayError`].

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::constants::{clamp_timeout, DEFAULT_COMMAND_TIMEOUT};
use crate::error::GatewayError;

/// Normalized result of an external operation: trimmed output or an error.
pub type Outcome<T = String> = Result<T, GatewayError>;

/// A program and its ordered argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Executes an [`Invocation`] and reports a normalized [`Outcome`].
#[async_trait]
pub trait CommandGateway: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> Outcome;
}

/// Gateway backed by real child processes.
#[derive(Debug, Clone)]
pub struct ProcessGateway {
    timeout: Duration,
    strict_stderr: bool,
}

impl Default for ProcessGateway {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
            strict_stderr: true,
        }
    }
}

impl ProcessGateway {
    /// Create a gateway with the given per-command budget, clamped to the
    /// supported window.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: clamp_timeout(timeout),
            ..Self::default()
        }
    }

    /// Whether a zero exit status with non-empty error output counts as a
    /// failure. Enabled by default.
    pub fn with_strict_stderr(mut self, strict: bool) -> Self {
        self.strict_stderr = strict;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CommandGateway for ProcessGateway {
    async fn execute(&self, invocation: &Invocation) -> Outcome {
        // Arguments can hold key material; never log them.
        debug!(program = %invocation.program, argc = invocation.args.len(), "executing");

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %invocation.program, "spawn failed: {e}");
                return Err(GatewayError::Spawn {
                    program: invocation.program.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(GatewayError::Spawn {
                    program: invocation.program.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(program = %invocation.program, "timed out after {:?}", self.timeout);
                return Err(GatewayError::Timeout(self.timeout));
            }
        };

        let outcome = normalize(
            output.status.code(),
            &output.stdout,
            &output.stderr,
            self.strict_stderr,
        );
        if let Err(e) = &outcome {
            debug!(program = %invocation.program, "command failed: {e}");
        }
        outcome
    }
}

/// Turn captured process output into an [`Outcome`].
///
/// `code` is `None` when the process was terminated by a signal.
pub fn normalize(code: Option<i32>, stdout: &[u8], stderr: &[u8], strict_stderr: bool) -> Outcome {
    let err_text = String::from_utf8_lossy(stderr).trim().to_string();
    if code != Some(0) {
        return Err(GatewayError::NonZeroExit {
            code,
            stderr: err_text,
        });
    }
    if strict_stderr && !err_text.is_empty() {
        return Err(GatewayError::Stderr(err_text));
    }
    if !err_text.is_empty() {
        warn!("ignoring error output on clean exit: {err_text}");
    }
    Ok(String::from_utf8_lossy(stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_success_trims_output() {
        let out = normalize(Some(0), b"  abc123\n", b"", true).unwrap();
        assert_eq!(out, "abc123");
    }

    #[test]
    fn normalize_non_zero_exit() {
        let err = normalize(Some(26), b"", b"insufficient fee\n", true).unwrap_err();
        assert_eq!(
            err,
            GatewayError::NonZeroExit {
                code: Some(26),
                stderr: "insufficient fee".into()
            }
        );
    }

    #[test]
    fn normalize_signal_termination() {
        let err = normalize(None, b"partial", b"", true).unwrap_err();
        assert!(matches!(err, GatewayError::NonZeroExit { code: None, .. }));
    }

    #[test]
    fn normalize_stderr_on_clean_exit() {
        let err = normalize(Some(0), b"ok", b"warning: foo", true).unwrap_err();
        assert_eq!(err, GatewayError::Stderr("warning: foo".into()));

        let relaxed = normalize(Some(0), b"ok", b"warning: foo", false).unwrap();
        assert_eq!(relaxed, "ok");
    }

    #[test]
    fn new_clamps_timeout() {
        let g = ProcessGateway::new(Duration::from_secs(5));
        assert_eq!(g.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn invocation_display() {
        let inv = Invocation::new("rgb").args(["-d", "/w"]).arg("invoice");
        assert_eq!(inv.to_string(), "rgb -d /w invoice");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_captures_stdout() {
        let g = ProcessGateway::default();
        let out = g
            .execute(&Invocation::new("sh").args(["-c", "echo hello"]))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_reports_exit_status() {
        let g = ProcessGateway::default();
        let err = g
            .execute(&Invocation::new("sh").args(["-c", "echo nope >&2; exit 3"]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::NonZeroExit {
                code: Some(3),
                stderr: "nope".into()
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_times_out() {
        let g = ProcessGateway {
            timeout: Duration::from_millis(200),
            strict_stderr: true,
        };
        let err = g
            .execute(&Invocation::new("sh").args(["-c", "sleep 5"]))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn execute_missing_program_is_spawn_error() {
        let g = ProcessGateway::default();
        let err = g
            .execute(&Invocation::new("courier-definitely-not-a-program"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Spawn { .. }));
    }
}
