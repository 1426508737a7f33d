// ABOUTME: Scripted ToolInvoker that records every invocation.
// ABOUTME: Responses are matched by substring of the unmasked command line.

use async_trait::async_trait;
use parking_lot::Mutex;
use rollout::invoke::{ExternalToolError, Invocation, InvocationResult, ToolInvoker};
use std::sync::Arc;
use std::time::Duration;

pub const TERRAFORM_OUTPUTS: &str = r#"{
  "cluster_name": {"sensitive": false, "type": "string", "value": "demo-eks"},
  "region": {"sensitive": false, "type": "string", "value": "eu-west-1"},
  "ecr_repository_url": {"sensitive": false, "type": "string", "value": "123456789012.dkr.ecr.eu-west-1.amazonaws.com/demo-app"}
}"#;

pub const HELM_HISTORY_DEPLOYED: &str = r#"[
  {"revision": 1, "status": "superseded", "chart": "demo-app-0.1.0", "app_version": "1.0.0", "updated": "", "description": "Install complete"},
  {"revision": 2, "status": "deployed", "chart": "demo-app-0.1.1", "app_version": "1.1.0", "updated": "", "description": "Upgrade complete"}
]"#;

#[derive(Debug, Clone)]
pub enum Response {
    Stdout(String),
    Exit(i32, String),
    Timeout,
    NotFound,
}

struct Rule {
    pattern: String,
    response: Response,
    /// How many more times the rule applies; `None` means forever.
    remaining: Option<usize>,
}

#[derive(Default)]
pub struct FakeInvoker {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeInvoker {
    /// Every command succeeds with empty output.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Provisioning outputs and release history that let the full catalogue pass.
    pub fn healthy() -> Arc<Self> {
        let fake = Self::new();
        fake.respond("terraform output -json", TERRAFORM_OUTPUTS);
        fake.respond("helm history", HELM_HISTORY_DEPLOYED);
        fake
    }

    fn push(&self, pattern: &str, response: Response, remaining: Option<usize>) {
        // Later rules take precedence over earlier ones.
        self.rules.lock().insert(
            0,
            Rule {
                pattern: pattern.to_string(),
                response,
                remaining,
            },
        );
    }

    pub fn respond(&self, pattern: &str, stdout: &str) {
        self.push(pattern, Response::Stdout(stdout.to_string()), None);
    }

    pub fn exit(&self, pattern: &str, code: i32, stderr: &str) {
        self.push(pattern, Response::Exit(code, stderr.to_string()), None);
    }

    /// Apply `response` to the next `times` matching calls only.
    pub fn script(&self, pattern: &str, response: Response, times: usize) {
        self.push(pattern, response, Some(times));
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    /// Unmasked command lines, in call order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(command_line).collect()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.contains(pattern))
            .count()
    }

    pub fn called(&self, pattern: &str) -> bool {
        self.count(pattern) > 0
    }

    fn response_for(&self, line: &str) -> Response {
        let mut rules = self.rules.lock();
        let Some(index) = rules.iter().position(|rule| {
            line.contains(rule.pattern.as_str()) && rule.remaining.is_none_or(|n| n > 0)
        }) else {
            return Response::Stdout(String::new());
        };
        let rule = &mut rules[index];
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }
        rule.response.clone()
    }
}

pub fn command_line(invocation: &Invocation) -> String {
    let mut parts = vec![invocation.program.clone()];
    parts.extend(invocation.args.iter().cloned());
    parts.join(" ")
}

#[async_trait]
impl ToolInvoker for FakeInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationResult, ExternalToolError> {
        let line = command_line(invocation);
        self.calls.lock().push(invocation.clone());
        let program = invocation.program.clone();

        let (code, stdout, stderr) = match self.response_for(&line) {
            Response::Stdout(stdout) => (0, stdout, String::new()),
            Response::Exit(code, stderr) => (code, String::new(), stderr),
            Response::Timeout => {
                return Err(ExternalToolError::Timeout {
                    program,
                    after: invocation.timeout.unwrap_or(Duration::from_secs(1)),
                });
            }
            Response::NotFound => return Err(ExternalToolError::ProcessNotFound { program }),
        };

        if !invocation.accepts(Some(code)) {
            return Err(ExternalToolError::NonZeroExit {
                program,
                code: Some(code),
                stderr,
            });
        }
        Ok(InvocationResult {
            exit_code: Some(code),
            stdout,
            stderr,
            duration: Duration::from_millis(1),
        })
    }
}
