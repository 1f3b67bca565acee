//! Subprocess execution with independent cancellation (spec §4.13, §5, §9
//! "model as two contexts — the command's own deadline and a watcher on the
//! caller's context — explicitly, never reuse the caller's context as the
//! exec context").

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

fn d_shell_interpreter() -> String {
    "/bin/sh".to_string()
}

/// Resolved shape of a single command invocation, built by
/// [`crate::handler::CommandHandler`] from a `CommandConfig` plus the
/// caller's tool arguments.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub executable: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<String>,
    pub stdin: Option<String>,
    pub timeout: Duration,
    pub kill_grace_period: Duration,
    pub capture_stdout: bool,
    pub capture_stderr: bool,
    pub use_shell: bool,
    pub shell_interpreter: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            executable: String::new(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            stdin: None,
            timeout: Duration::from_secs(30),
            kill_grace_period: Duration::from_secs(5),
            capture_stdout: true,
            capture_stderr: true,
            use_shell: false,
            shell_interpreter: d_shell_interpreter(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub timed_out: bool,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
}

/// Runs `cfg` to completion. `caller_cancel` represents the caller's own
/// request context: its cancellation kills the process (graceful, then hard
/// after `kill_grace_period`) but — per spec §5 — does NOT race against a
/// caller *timeout*, only hard cancellation. The command's own `timeout`
/// deadline is independent of whatever deadline the caller context carries.
pub async fn execute(cfg: &ExecutionConfig, caller_cancel: CancellationToken) -> std::io::Result<ExecutionResult> {
    let start = Instant::now();

    let mut command = if cfg.use_shell {
        let shell = if cfg.shell_interpreter.is_empty() { "/bin/sh" } else { cfg.shell_interpreter.as_str() };
        let mut joined = cfg.executable.clone();
        for arg in &cfg.args {
            joined.push(' ');
            joined.push_str(arg);
        }
        let mut c = Command::new(shell);
        c.arg("-c").arg(joined);
        c
    } else {
        let mut c = Command::new(&cfg.executable);
        c.args(&cfg.args);
        c
    };

    if let Some(cwd) = &cfg.cwd {
        command.current_dir(cwd);
    }
    for (k, v) in &cfg.env {
        command.env(k, v);
    }
    command.stdin(std::process::Stdio::piped());
    command.stdout(if cfg.capture_stdout { std::process::Stdio::piped() } else { std::process::Stdio::null() });
    command.stderr(if cfg.capture_stderr { std::process::Stdio::piped() } else { std::process::Stdio::null() });

    let mut child = command.spawn()?;

    match (child.stdin.take(), &cfg.stdin) {
        (Some(mut stdin), Some(input)) => {
            let input = input.clone();
            tokio::spawn(async move {
                let _ = stdin.write_all(input.as_bytes()).await;
                let _ = stdin.shutdown().await;
            });
        }
        (Some(stdin), None) => drop(stdin),
        (None, _) => {}
    }

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut s) = stdout_pipe {
            let _ = s.read_to_string(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut s) = stderr_pipe {
            let _ = s.read_to_string(&mut buf).await;
        }
        buf
    });

    let timeout_sleep = tokio::time::sleep(cfg.timeout);
    tokio::pin!(timeout_sleep);

    enum Outcome {
        Exited(std::io::Result<std::process::ExitStatus>),
        TimedOut,
        CallerCancelled,
    }

    let outcome = tokio::select! {
        result = child.wait() => Outcome::Exited(result),
        _ = &mut timeout_sleep => Outcome::TimedOut,
        _ = caller_cancel.cancelled() => Outcome::CallerCancelled,
    };

    let was_timeout = matches!(outcome, Outcome::TimedOut);
    let was_cancelled = matches!(outcome, Outcome::CallerCancelled);

    let (exit_status, timed_out, cancel_message) = match outcome {
        Outcome::Exited(result) => (result.ok(), false, None),
        Outcome::TimedOut | Outcome::CallerCancelled => {
            let cancel_message = was_cancelled.then(|| "command cancelled by caller".to_string());
            let _ = child.start_kill();
            let grace = tokio::time::sleep(cfg.kill_grace_period);
            tokio::pin!(grace);
            let status = tokio::select! {
                result = child.wait() => result.ok(),
                _ = &mut grace => {
                    let _ = child.kill().await;
                    child.wait().await.ok()
                }
            };
            (status, was_timeout, cancel_message)
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    let exit_code = if timed_out { -1 } else { exit_status.and_then(|s| s.code()).unwrap_or(-1) };
    let error = if timed_out {
        Some(format!("command timed out after {} seconds", cfg.timeout.as_secs()))
    } else {
        cancel_message
    };

    Ok(ExecutionResult { exit_code, timed_out, duration: start.elapsed(), stdout, stderr, error })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(executable: &str, args: &[&str]) -> ExecutionConfig {
        ExecutionConfig {
            executable: executable.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn runs_to_completion_and_captures_stdout() {
        let result = execute(&cfg("echo", &["hello"]), CancellationToken::new()).await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(!result.timed_out);
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn nonzero_exit_code_is_reported() {
        let result = execute(&cfg("sh", &["-c", "exit 7"]), CancellationToken::new()).await.unwrap();
        assert_eq!(result.exit_code, 7);
    }

    #[tokio::test]
    async fn timeout_kills_process_and_sets_exit_code_minus_one() {
        let mut c = cfg("sleep", &["5"]);
        c.timeout = Duration::from_millis(50);
        c.kill_grace_period = Duration::from_millis(50);
        let result = execute(&c, CancellationToken::new()).await.unwrap();
        assert!(result.timed_out);
        assert_eq!(result.exit_code, -1);
        assert!(result.error.as_deref().unwrap().contains("timed out after"));
    }

    #[tokio::test]
    async fn caller_cancellation_kills_process_independent_of_timeout() {
        let mut c = cfg("sleep", &["5"]);
        c.timeout = Duration::from_secs(30);
        c.kill_grace_period = Duration::from_millis(50);
        let token = CancellationToken::new();
        let token2 = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token2.cancel();
        });
        let result = execute(&c, token).await.unwrap();
        assert!(!result.timed_out);
        assert!(result.error.as_deref().unwrap().contains("cancelled by caller"));
    }

    #[tokio::test]
    async fn stdin_is_delivered_to_child() {
        let c = cfg("cat", &[]);
        let mut c = c;
        c.stdin = Some("piped input".to_string());
        let result = execute(&c, CancellationToken::new()).await.unwrap();
        assert_eq!(result.stdout.trim(), "piped input");
    }

    #[tokio::test]
    async fn use_shell_invokes_shell_interpreter() {
        let mut c = ExecutionConfig { executable: "echo hi && echo bye".to_string(), use_shell: true, ..Default::default() };
        c.shell_interpreter = "/bin/sh".to_string();
        let result = execute(&c, CancellationToken::new()).await.unwrap();
        assert!(result.stdout.contains("hi"));
        assert!(result.stdout.contains("bye"));
    }
}
