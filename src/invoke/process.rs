// ABOUTME: Tool invoker backed by real child processes.
// ABOUTME: Captures stdout/stderr concurrently and kills processes that time out.

use super::{ExternalToolError, Invocation, InvocationResult, ToolInvoker};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

/// Spawns each invocation as a local child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInvoker;

impl ProcessInvoker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolInvoker for ProcessInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationResult, ExternalToolError> {
        tracing::debug!("Invoking: {}", invocation);
        let started = Instant::now();

        let mut command = build_command(invocation);
        command
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = spawn(&mut command, &invocation.program)?;

        // Readers start before stdin is written so a chatty child cannot
        // fill its pipes and stall the write.
        let mut stdout_task = tokio::spawn(read_all(child.stdout.take()));
        let mut stderr_task = tokio::spawn(read_all(child.stderr.take()));
        let stdin = child.stdin.take();

        // Everything up to collected output shares one deadline. A descendant
        // that keeps stdout open must not outlive the timeout.
        let exchange = async {
            if let (Some(input), Some(mut stdin)) = (&invocation.stdin, stdin) {
                // A process that exits without reading stdin is not an error
                // here; its exit status tells the story.
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    tracing::debug!("{} closed stdin early: {}", invocation.program, e);
                }
                drop(stdin);
            }
            let status = child.wait().await?;
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, stdout, stderr))
        };

        let finished = match invocation.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange).await.ok(),
            None => Some(exchange.await),
        };
        let Some(finished) = finished else {
            terminate(&mut child, &invocation.program).await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(ExternalToolError::Timeout {
                program: invocation.program.clone(),
                after: invocation.timeout.unwrap_or_default(),
            });
        };
        let (status, stdout, stderr) = finished.map_err(|source| ExternalToolError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();
        let duration = started.elapsed();

        tracing::debug!(
            "{} finished with {:?} in {:.1}s",
            invocation.program,
            status.code(),
            duration.as_secs_f64()
        );

        if !invocation.accepts(status.code()) {
            return Err(ExternalToolError::NonZeroExit {
                program: invocation.program.clone(),
                code: status.code(),
                stderr,
            });
        }

        Ok(InvocationResult {
            exit_code: status.code(),
            stdout,
            stderr,
            duration,
        })
    }
}

/// Spawn an invocation as a long-running background process.
///
/// Output is discarded and the process is killed if its handle is dropped.
pub fn spawn_background(invocation: &Invocation) -> Result<Child, ExternalToolError> {
    tracing::debug!("Starting background process: {}", invocation);
    let mut command = build_command(invocation);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    spawn(&mut command, &invocation.program)
}

fn build_command(invocation: &Invocation) -> Command {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .envs(&invocation.env)
        .kill_on_drop(true);
    if let Some(dir) = &invocation.cwd {
        command.current_dir(dir);
    }
    command
}

fn spawn(command: &mut Command, program: &str) -> Result<Child, ExternalToolError> {
    command.spawn().map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ExternalToolError::ProcessNotFound {
                program: program.to_string(),
            }
        } else {
            ExternalToolError::Spawn {
                program: program.to_string(),
                source,
            }
        }
    })
}

/// Kill a child and reap it so no zombie outlives the invocation.
async fn terminate(child: &mut Child, program: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill timed out {}: {}", program, e);
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader
        && let Err(e) = reader.read_to_end(&mut buf).await
    {
        tracing::debug!("Output stream read error: {}", e);
    }
    buf
}
