//! Host callbacks for embedding the extractor.
//!
//! The extractor never reads environment variables or spawns processes on its
//! own. An embedding host that wants to observe a run hands in a
//! [`HostCallbacks`] implementation; the CLI uses [`TracingHost`].

use anyhow::Result;
use tracing::{debug, error, info, trace, warn};

/// Severity of a message forwarded to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Services provided by the embedding host.
pub trait HostCallbacks {
    /// Receive a message about the run.
    fn log(&self, level: LogLevel, message: &str);

    /// Run an external command and return its stdout.
    ///
    /// Extraction itself never calls this; it is exposed for hosts that chain
    /// the type graph into a code-emission step.
    fn run_command(&self, program: &str, args: &[String]) -> Result<String>;
}

/// Discards every message and refuses to run commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

impl HostCallbacks for NoopHost {
    fn log(&self, _level: LogLevel, _message: &str) {}

    fn run_command(&self, program: &str, _args: &[String]) -> Result<String> {
        anyhow::bail!("host does not run commands (requested `{}`)", program)
    }
}

/// Forwards messages to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHost;

impl HostCallbacks for TracingHost {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => trace!(target: "typegraph::host", "{}", message),
            LogLevel::Debug => debug!(target: "typegraph::host", "{}", message),
            LogLevel::Info => info!(target: "typegraph::host", "{}", message),
            LogLevel::Warn => warn!(target: "typegraph::host", "{}", message),
            LogLevel::Error => error!(target: "typegraph::host", "{}", message),
        }
    }

    fn run_command(&self, program: &str, _args: &[String]) -> Result<String> {
        anyhow::bail!("host does not run commands (requested `{}`)", program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_host_refuses_commands() {
        let err = NoopHost.run_command("rustfmt", &[]).unwrap_err();
        assert!(err.to_string().contains("rustfmt"));
    }

    #[test]
    fn test_log_level_names() {
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogLevel::Info.as_str(), "info");
    }
}
