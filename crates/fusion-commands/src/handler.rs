//! Maps a `CommandConfig`'s declared parameters into an `ExecutionConfig`
//! and renders the subprocess result into the tool response text (spec
//! §4.13). Mirrors how `fusion-http::handler` drives `fusion-mapper`
//! against an `EndpointConfig`, but targets `ParamLocation::{Control,
//! Argument, Arglist, Environment, Stdin}` instead of the HTTP locations.

use std::time::Duration;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use fusion_domain::config::{CommandConfig, ParamLocation, ParameterConfig};
use fusion_domain::error::{Error, Result};
use fusion_mapper::{param_names, validate_parameters};

use crate::execution::{execute, ExecutionConfig, ExecutionResult};

/// Builds the `ExecutionConfig` for one invocation of `cmd` from its static
/// defaults plus the caller-filled argument map (already validated and
/// keyed by internal parameter name, as returned by `validate_parameters`).
pub fn build_execution_config(cmd: &CommandConfig, filled: &Map<String, Value>) -> Result<ExecutionConfig> {
    let mut cfg = ExecutionConfig {
        executable: cmd.executable.clone(),
        args: cmd.base_args.clone(),
        timeout: Duration::from_secs(cmd.timeout_secs),
        kill_grace_period: Duration::from_secs(cmd.kill_grace_period_secs),
        capture_stdout: cmd.capture_stdout,
        capture_stderr: cmd.capture_stderr,
        use_shell: cmd.use_shell,
        shell_interpreter: cmd.shell_interpreter.clone(),
        cwd: cmd.cwd.clone(),
        ..Default::default()
    };

    for param in &cmd.parameters {
        let value = match &param.static_value {
            Some(v) => v.clone(),
            None => match filled.get(&param.name) {
                Some(v) => v.clone(),
                None => continue,
            },
        };

        match param.location {
            ParamLocation::Control => apply_control(&mut cfg, &param.name, &value)?,
            ParamLocation::Argument => {
                if let Some(rendered) = render_argument(param, &value) {
                    cfg.args.push(rendered);
                }
            }
            ParamLocation::Arglist => {
                if let Value::Array(items) = &value {
                    for item in items {
                        cfg.args.push(scalar_to_string(item));
                    }
                } else {
                    cfg.args.push(scalar_to_string(&value));
                }
            }
            ParamLocation::Environment => cfg.env.push((param.name.clone(), scalar_to_string(&value))),
            ParamLocation::Stdin => cfg.stdin = Some(scalar_to_string(&value)),
            ParamLocation::Path | ParamLocation::Query | ParamLocation::Body | ParamLocation::Header | ParamLocation::Cookie => {}
        }
    }

    Ok(cfg)
}

/// `Control` parameters name a specific `ExecutionConfig` field rather than
/// an argument/env slot; unrecognized names are a configuration error caught
/// at tool-registration time, not silently ignored at call time.
fn apply_control(cfg: &mut ExecutionConfig, name: &str, value: &Value) -> Result<()> {
    match name {
        "cwd" => cfg.cwd = value.as_str().map(|s| s.to_string()),
        "timeout" | "timeout_secs" => {
            if let Some(secs) = value.as_u64() {
                cfg.timeout = Duration::from_secs(secs);
            }
        }
        "kill_grace_period" | "kill_grace_period_secs" => {
            if let Some(secs) = value.as_u64() {
                cfg.kill_grace_period = Duration::from_secs(secs);
            }
        }
        "use_shell" => cfg.use_shell = value.as_bool().unwrap_or(cfg.use_shell),
        "shell_interpreter" => {
            if let Some(s) = value.as_str() {
                cfg.shell_interpreter = s.to_string();
            }
        }
        "capture_stdout" => cfg.capture_stdout = value.as_bool().unwrap_or(cfg.capture_stdout),
        "capture_stderr" => cfg.capture_stderr = value.as_bool().unwrap_or(cfg.capture_stderr),
        other => {
            return Err(Error::config("parameter.name", other, "unrecognized control parameter for command executor"));
        }
    }
    Ok(())
}

/// Boolean `argument` parameters are flag-shaped: present (and true) emits
/// the flag, false or absent emits nothing. Everything else concatenates
/// `prefix` (if any) with the stringified value.
fn render_argument(param: &ParameterConfig, value: &Value) -> Option<String> {
    if let Value::Bool(flag) = value {
        if !*flag {
            return None;
        }
        return Some(param.prefix.clone().unwrap_or_else(|| format!("--{}", param.name)));
    }
    let rendered = scalar_to_string(value);
    match &param.prefix {
        Some(prefix) => Some(format!("{prefix}{rendered}")),
        None => Some(rendered),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Renders an `ExecutionResult` into the tool response text: exit code,
/// duration, status, and the stdout/stderr blocks the spec requires
/// (§4.13 — "(none)" when a stream captured nothing).
pub fn format_response(result: &ExecutionResult) -> String {
    let status = if result.timed_out {
        "timed_out"
    } else if let Some(err) = &result.error {
        let _ = err;
        "cancelled"
    } else if result.exit_code == 0 {
        "success"
    } else {
        "failed"
    };

    let stdout = if result.stdout.trim().is_empty() { "(none)" } else { result.stdout.trim_end() };
    let stderr = if result.stderr.trim().is_empty() { "(none)" } else { result.stderr.trim_end() };

    let mut out = format!(
        "exit_code: {}\nduration: {:.3}s\nstatus: {}\n",
        result.exit_code,
        result.duration.as_secs_f64(),
        status,
    );
    if let Some(err) = &result.error {
        out.push_str(&format!("error: {err}\n"));
    }
    out.push_str(&format!("stdout:\n{stdout}\nstderr:\n{stderr}\n"));
    out
}

/// Entry point invoked by the gateway's tool dispatch for `{group}_{command}`
/// tools: validates caller arguments against `cmd.parameters`, builds the
/// `ExecutionConfig`, runs it, and returns the formatted response text.
pub struct CommandHandler;

impl CommandHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn invoke(&self, cmd: &CommandConfig, args: Map<String, Value>, caller_cancel: CancellationToken) -> Result<String> {
        let internal_args = param_names::unalias(&cmd.parameters, &args)?;
        let filled = validate_parameters(&cmd.parameters, &internal_args)?;
        let exec_cfg = build_execution_config(cmd, &filled)?;
        let result = execute(&exec_cfg, caller_cancel).await.map_err(Error::from)?;
        Ok(format_response(&result))
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}
