use serde::{Deserialize, Serialize};

use super::parameter::ParameterConfig;
use crate::error::{Error, Result};

fn d_true() -> bool {
    true
}
fn d_timeout_secs() -> u64 {
    30
}
fn d_kill_grace_secs() -> u64 {
    5
}
fn d_shell_interpreter() -> String {
    "/bin/sh".to_string()
}

/// A single subprocess-backed tool, structurally the command-execution
/// analogue of `EndpointConfig`: static shape + declarative parameters that
/// get mapped by `location` into an `ExecutionConfig` at call time
/// (spec §4.13).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub executable: String,
    #[serde(default)]
    pub base_args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "d_kill_grace_secs")]
    pub kill_grace_period_secs: u64,
    #[serde(default = "d_true")]
    pub capture_stdout: bool,
    #[serde(default = "d_true")]
    pub capture_stderr: bool,
    #[serde(default)]
    pub use_shell: bool,
    #[serde(default = "d_shell_interpreter")]
    pub shell_interpreter: String,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
}

impl CommandConfig {
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::config("command.id", "", "command id must not be empty"));
        }
        if self.executable.is_empty() {
            return Err(Error::config(
                "command.executable",
                &self.id,
                "command executable must not be empty",
            ));
        }
        for p in &self.parameters {
            p.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandGroupConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
}

impl CommandGroupConfig {
    pub fn validate(&self, group_id: &str) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config("command_group.name", group_id, "command group name must not be empty"));
        }
        if self.commands.is_empty() {
            return Err(Error::config(
                "command_group.commands",
                group_id,
                "command group must declare at least one command",
            ));
        }
        for c in &self.commands {
            c.validate()?;
        }
        Ok(())
    }
}
