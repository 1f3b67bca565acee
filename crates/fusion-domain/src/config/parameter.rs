use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// Where a parameter value gets placed when building a request (HTTP
/// locations) or an `ExecutionConfig` (command locations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    Path,
    Query,
    Body,
    Header,
    Cookie,
    /// Named execution setting for the command executor (e.g. `cwd`, `timeout`).
    Control,
    /// Positional CLI argument.
    Argument,
    /// Spread into multiple positional CLI arguments (parameter value is an array).
    Arglist,
    /// Environment variable assignment for the spawned process.
    Environment,
    /// Subprocess stdin content.
    Stdin,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "enum")]
    pub enum_values: Option<Vec<Value>>,
}

/// `targetName` may contain dots (`start.dateTime`) to deposit the
/// transformed value into a nested object; `expression` is `.` (identity)
/// or a composition of `slice(a,b)` / `concat(...)` / literal / dot-ref
/// primitives evaluated by `fusion-mapper`'s expression evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    pub target_name: String,
    #[serde(default = "default_expression")]
    pub expression: String,
}

fn default_expression() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub location: ParamLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformConfig>,
    /// Prefix applied ahead of the value (API-key header prefix, CLI flag
    /// prefix for `argument`-location parameters).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// A fixed value that is always sent for this parameter, bypassing
    /// caller-supplied arguments entirely.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "static")]
    pub static_value: Option<Value>,
}

/// Characters a tool-call parameter name grammar forbids as a leading or
/// interior character. `$` is the one the source APIs (Microsoft Graph's
/// `$select`, `$top`, …) actually emit.
const RESERVED_PREFIX_CHARS: &[char] = &['$', '@', '.', '-'];

impl ParameterConfig {
    /// `true` if `name` contains a character the tool-call grammar forbids,
    /// meaning `alias` is mandatory (spec §4.2, invariant 8).
    pub fn needs_alias(&self) -> bool {
        self.name.chars().any(|c| RESERVED_PREFIX_CHARS.contains(&c))
    }

    /// The externally exposed tool parameter name: the alias if present,
    /// otherwise the bare name.
    pub fn exposed_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config("parameter.name", "", "parameter name must not be empty"));
        }
        if self.needs_alias() {
            match &self.alias {
                None => {
                    return Err(Error::config(
                        "parameter.alias",
                        &self.name,
                        "parameter name contains a reserved character and requires an alias",
                    ))
                }
                Some(alias) => {
                    if !is_valid_tool_identifier(alias) {
                        return Err(Error::config(
                            "parameter.alias",
                            alias,
                            "alias must start with a letter and contain only alphanumerics/underscore",
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Tool-call parameter name grammar: leading letter, then alphanumerics or
/// underscore.
pub fn is_valid_tool_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
