// ABOUTME: External tool invocation: command description, result, and invoker trait.
// ABOUTME: Stages talk to terraform, kubectl, helm, docker only through ToolInvoker.

mod error;
mod process;

pub use error::ExternalToolError;
pub use process::{ProcessInvoker, spawn_background};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A single external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// Exit codes treated as success. Defaults to `[0]`.
    pub expected_exit_codes: Vec<i32>,
    pub env: BTreeMap<String, String>,
    /// Written to the process stdin, then stdin is closed.
    pub stdin: Option<String>,
    /// Substrings masked when the invocation is displayed.
    pub secrets: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
            expected_exit_codes: vec![0],
            env: BTreeMap::new(),
            stdin: None,
            secrets: Vec::new(),
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

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn expect_exit_codes(mut self, codes: impl Into<Vec<i32>>) -> Self {
        self.expected_exit_codes = codes.into();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Mask `value` wherever it appears in the displayed command line.
    pub fn secret(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.secrets.push(value);
        }
        self
    }

    pub fn accepts(&self, code: Option<i32>) -> bool {
        code.is_some_and(|c| self.expected_exit_codes.contains(&c))
    }
}

/// Renders the command line for logs. Stdin contents are never shown.
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            let arg = self
                .secrets
                .iter()
                .fold(arg.clone(), |shown, secret| shown.replace(secret.as_str(), "***"));
            if arg.contains(' ') {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Outcome of a finished invocation whose exit code was accepted.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl InvocationResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external tools. Implemented by [`ProcessInvoker`] and by test fakes.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run the invocation to completion.
    ///
    /// Returns `ExternalToolError::NonZeroExit` when the exit code is not in
    /// `expected_exit_codes`, and `ExternalToolError::Timeout` after killing
    /// a process that outlived its timeout.
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationResult, ExternalToolError>;
}
