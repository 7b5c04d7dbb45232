//! External process invocation.
//!
//! Both the market-data script and the node CLI go through a
//! [`CommandRunner`] so fetchers can be exercised with scripted fakes.
//! [`TokioCommandRunner`] spawns children with `kill_on_drop`, so dropping an
//! in-flight `run` future (cancellation, deadline) terminates the child.

use std::process::Stdio;

use async_trait::async_trait;
use log::debug;

/// Maximum number of stderr characters kept in error messages.
const STDERR_EXCERPT_CHARS: usize = 200;

/// A fully specified process invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables (credentials are injected here, never in argv).
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq)]
pub struct CmdOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Short description of a failed run for error messages.
    pub fn failure_message(&self) -> String {
        let stderr: String = self.stderr.trim().chars().take(STDERR_EXCERPT_CHARS).collect();
        if stderr.is_empty() {
            format!("exit status {}", self.status)
        } else {
            format!("exit status {}: {}", self.status, stderr)
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<CmdOutput>;
}

pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<CmdOutput> {
        debug!("Spawning '{}' with {} args", spec.program, spec.args.len());
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let out = cmd.output().await?;
        Ok(CmdOutput {
            status: out.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        })
    }
}
