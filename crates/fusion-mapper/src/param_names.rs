//! Bidirectional alias ↔ reserved-name mapping (spec §4.2, §5).
//!
//! `ParameterConfig::exposed_name`/`needs_alias` (in `fusion-domain`) decide
//! *whether* a parameter needs an alias; this module does the actual
//! argument-map translation at request time: external callers always supply
//! the exposed (aliased) name, the HTTP/command layers always want the
//! original `name`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use fusion_domain::config::ParameterConfig;
use fusion_domain::error::{Error, Result};

/// Restores original parameter names from a caller-supplied argument map
/// keyed by exposed (possibly aliased) names. Bijective with the reverse
/// direction since `exposed_name()` is unique per endpoint (validated at
/// config-load time) — spec §4.2 step 3 "round-trip is bijective".
pub fn unalias(params: &[ParameterConfig], args: &Map<String, Value>) -> Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for param in params {
        let exposed = param.exposed_name();
        if let Some(value) = args.get(exposed) {
            out.insert(param.name.clone(), value.clone());
        }
    }
    Ok(out)
}

/// The inverse: builds the externally-exposed argument map from original
/// parameter names, validating that every reserved-prefixed name has an
/// alias (spec §4.2 step 1, fails with `ConfigurationError` otherwise).
pub fn alias(params: &[ParameterConfig], internal: &BTreeMap<String, Value>) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for param in params {
        if param.needs_alias() && param.alias.is_none() {
            return Err(Error::config(
                "parameter.alias",
                &param.name,
                "parameter name contains a reserved character and requires an alias",
            ));
        }
        if let Some(value) = internal.get(&param.name) {
            out.insert(param.exposed_name().to_string(), value.clone());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_domain::config::{ParamLocation, ParamType};
    use serde_json::json;

    fn param(name: &str, alias: Option<&str>) -> ParameterConfig {
        ParameterConfig {
            name: name.to_string(),
            alias: alias.map(str::to_string),
            description: String::new(),
            param_type: ParamType::String,
            required: false,
            default: None,
            location: ParamLocation::Query,
            validation: None,
            transform: None,
            prefix: None,
            static_value: None,
        }
    }

    #[test]
    fn unalias_restores_reserved_name_from_alias() {
        let params = vec![param("$select", Some("select"))];
        let mut args = Map::new();
        args.insert("select".to_string(), json!("id,name"));
        let restored = unalias(&params, &args).unwrap();
        assert_eq!(restored.get("$select"), Some(&json!("id,name")));
    }

    #[test]
    fn unalias_passes_through_unaliased_names() {
        let params = vec![param("subject", None)];
        let mut args = Map::new();
        args.insert("subject".to_string(), json!("hi"));
        let restored = unalias(&params, &args).unwrap();
        assert_eq!(restored.get("subject"), Some(&json!("hi")));
    }

    #[test]
    fn round_trip_is_bijective() {
        let params = vec![param("$select", Some("select")), param("subject", None)];
        let mut external = Map::new();
        external.insert("select".to_string(), json!("id"));
        external.insert("subject".to_string(), json!("hi"));

        let internal = unalias(&params, &external).unwrap();
        let back = alias(&params, &internal).unwrap();
        assert_eq!(back, external);
    }
}
