mod auth;
mod command;
mod env;
mod parameter;
mod service;

pub use auth::{config_str, AuthConfig, AuthType, TokenInvalidationConfig};
pub use command::{CommandConfig, CommandGroupConfig};
pub use env::{expand, required_environment_variables};
pub use parameter::{
    is_valid_tool_identifier, ParamLocation, ParamType, ParameterConfig, TransformConfig,
    ValidationConfig,
};
pub use service::{
    CachingConfig, CircuitBreakerConfig, EndpointConfig, HttpMethod, PaginationConfig,
    ResponseConfig, ResponseType, RetryConfig, RetryStrategy, ServiceConfig,
};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The root configuration: a mapping from service ID to `ServiceConfig`,
/// plus an optional mapping from command-group ID to `CommandGroupConfig`.
/// Immutable once loaded (spec §3 "Lifecycles").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
    #[serde(default)]
    pub commands: HashMap<String, CommandGroupConfig>,
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        // source_path is provenance, not config content.
        serde_json::to_value(self).ok() == serde_json::to_value(other).ok()
    }
}

impl Config {
    /// Expand `${VAR}`/`${VAR:default}` over the raw bytes, then parse.
    /// Unknown top-level fields are ignored (spec §6: "the production
    /// default is ignore").
    pub fn load_from_json(bytes: &[u8], source_path: Option<PathBuf>) -> Result<Self> {
        let raw = std::str::from_utf8(bytes)
            .map_err(|e| Error::config("source", "<bytes>", format!("config is not valid UTF-8: {e}")))?;
        let expanded = env::expand(raw);
        let mut config: Config = serde_json::from_str(&expanded)?;
        config.source_path = source_path;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Self::load_from_json(&bytes, Some(path.to_path_buf()))
    }

    /// Every `${NAME}` reference (no default) in the original file that is
    /// currently unset in the environment.
    pub fn required_environment_variables(raw_source: &str) -> Vec<String> {
        env::required_environment_variables(raw_source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() && self.commands.is_empty() {
            return Err(Error::config(
                "config",
                "",
                "config must declare at least one service or command group",
            ));
        }
        for (id, svc) in &self.services {
            svc.validate(id)?;
        }
        for (id, group) in &self.commands {
            group.validate(id)?;
        }
        Ok(())
    }

    /// Deep copy. Derived `Clone` already does this since every field owns
    /// its data (no shared interior mutability anywhere in the config tree).
    pub fn deep_clone(&self) -> Self {
        self.clone()
    }

    /// Merge `other` into a copy of `self`. Fails if any service or command
    /// group ID collides between the two configs.
    pub fn merge_config(&self, other: &Config) -> Result<Config> {
        let mut merged = self.clone();
        for (id, svc) in &other.services {
            if merged.services.contains_key(id) {
                return Err(Error::config("services", id, "duplicate service id on merge"));
            }
            merged.services.insert(id.clone(), svc.clone());
        }
        for (id, group) in &other.commands {
            if merged.commands.contains_key(id) {
                return Err(Error::config("commands", id, "duplicate command group id on merge"));
            }
            merged.commands.insert(id.clone(), group.clone());
        }
        merged.validate()?;
        Ok(merged)
    }

    /// Every tool name this config would register:
    /// `{serviceID}_{endpointID}` and `{commandGroupID}_{commandID}`.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .iter()
            .flat_map(|(sid, svc)| svc.endpoints.iter().map(move |ep| format!("{sid}_{}", ep.id)))
            .collect();
        names.extend(
            self.commands
                .iter()
                .flat_map(|(gid, grp)| grp.commands.iter().map(move |c| format!("{gid}_{}", c.id))),
        );
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "services": {
                "x": {
                    "name": "X",
                    "base_url": "https://api.example.com",
                    "auth": {"type": "bearer", "config": {"token": "T"}},
                    "endpoints": [
                        {"id": "get", "name": "Get", "method": "GET", "path": "/ping"}
                    ]
                }
            }
        }"#
    }

    #[test]
    fn loads_minimal_valid_config() {
        let cfg = Config::load_from_json(minimal_json().as_bytes(), None).unwrap();
        assert_eq!(cfg.services.len(), 1);
        assert_eq!(cfg.tool_names(), vec!["x_get".to_string()]);
    }

    #[test]
    fn rejects_config_with_no_services_or_commands() {
        let err = Config::load_from_json(b"{}", None).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn rejects_service_with_no_endpoints() {
        let json = r#"{"services": {"x": {"name": "X", "base_url": "https://a", "endpoints": []}}}"#;
        let err = Config::load_from_json(json.as_bytes(), None).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn round_trips_through_serialize_clone() {
        let cfg = Config::load_from_json(minimal_json().as_bytes(), None).unwrap();
        let cloned = cfg.deep_clone();
        let reserialized = serde_json::to_vec(&cloned).unwrap();
        let reloaded = Config::load_from_json(&reserialized, None).unwrap();
        assert_eq!(cfg, reloaded);
    }

    #[test]
    fn env_var_expansion_runs_before_parsing() {
        std::env::set_var("FUSION_TEST_TOKEN", "secret-token");
        let json = r#"{"services": {"x": {"name": "X", "base_url": "https://a",
            "auth": {"type": "bearer", "config": {"token": "${FUSION_TEST_TOKEN}"}},
            "endpoints": [{"id": "get", "name": "Get", "method": "GET", "path": "/p"}]}}}"#;
        let cfg = Config::load_from_json(json.as_bytes(), None).unwrap();
        let svc = &cfg.services["x"];
        assert_eq!(svc.auth.config["token"], "secret-token");
        std::env::remove_var("FUSION_TEST_TOKEN");
    }

    #[test]
    fn merge_rejects_colliding_service_ids() {
        let a = Config::load_from_json(minimal_json().as_bytes(), None).unwrap();
        let b = Config::load_from_json(minimal_json().as_bytes(), None).unwrap();
        assert!(a.merge_config(&b).is_err());
    }

    #[test]
    fn merge_combines_distinct_service_ids() {
        let a = Config::load_from_json(minimal_json().as_bytes(), None).unwrap();
        let json_b = r#"{"services": {"y": {"name": "Y", "base_url": "https://b",
            "endpoints": [{"id": "get", "name": "Get", "method": "GET", "path": "/p"}]}}}"#;
        let b = Config::load_from_json(json_b.as_bytes(), None).unwrap();
        let merged = a.merge_config(&b).unwrap();
        assert_eq!(merged.services.len(), 2);
    }

    #[test]
    fn paginated_endpoint_without_pagination_config_is_rejected() {
        let json = r#"{"services": {"x": {"name": "X", "base_url": "https://a",
            "endpoints": [{"id": "get", "name": "Get", "method": "GET", "path": "/p",
                "response": {"paginated": true}}]}}}"#;
        let err = Config::load_from_json(json.as_bytes(), None).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn parameter_with_reserved_char_requires_alias() {
        let json = r#"{"services": {"x": {"name": "X", "base_url": "https://a",
            "endpoints": [{"id": "get", "name": "Get", "method": "GET", "path": "/p",
                "parameters": [{"name": "$select", "type": "string", "location": "query"}]}]}}}"#;
        let err = Config::load_from_json(json.as_bytes(), None).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
