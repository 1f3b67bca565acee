//! Runtime argument validation and endpoint structural validation (spec §4.5).

use regex::Regex;
use serde_json::{Map, Value};

use fusion_domain::config::{EndpointConfig, ParamType, ParameterConfig};
use fusion_domain::error::{Error, Result};

/// Fills defaults for missing optional parameters, checks required
/// presence, type coercion, and `validation` rules. Returns the filled
/// argument map, keyed by the parameter's internal `name` (not alias).
pub fn validate_parameters(params: &[ParameterConfig], args: &std::collections::BTreeMap<String, Value>) -> Result<Map<String, Value>> {
    let mut filled = Map::new();

    for param in params {
        let value = match args.get(&param.name) {
            Some(v) => v.clone(),
            None => match &param.default {
                Some(default) => default.clone(),
                None => {
                    if param.required {
                        return Err(Error::validation(&param.name, "", "required", "required parameter is missing"));
                    }
                    continue;
                }
            },
        };

        check_type(param, &value)?;
        if let Some(validation) = &param.validation {
            check_validation_rules(param, &value, validation)?;
        }
        filled.insert(param.name.clone(), value);
    }

    Ok(filled)
}

fn check_type(param: &ParameterConfig, value: &Value) -> Result<()> {
    let matches = match param.param_type {
        ParamType::String => value.is_string(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Array => value.is_array(),
        ParamType::Object => value.is_object(),
    };
    if !matches {
        return Err(Error::validation(
            &param.name,
            value.to_string(),
            "type",
            format!("expected {:?}, got {}", param.param_type, type_name(value)),
        ));
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_validation_rules(
    param: &ParameterConfig,
    value: &Value,
    validation: &fusion_domain::config::ValidationConfig,
) -> Result<()> {
    if let Some(pattern) = &validation.pattern {
        let re = compile(pattern)?;
        if let Some(s) = value.as_str() {
            if !re.is_match(s) {
                return Err(Error::validation(&param.name, s, "pattern", format!("value does not match pattern {pattern}")));
            }
        }
    }
    if let Some(min_length) = validation.min_length {
        if let Some(s) = value.as_str() {
            if s.chars().count() < min_length {
                return Err(Error::validation(&param.name, s, "min_length", format!("value shorter than {min_length}")));
            }
        }
    }
    if let Some(max_length) = validation.max_length {
        if let Some(s) = value.as_str() {
            if s.chars().count() > max_length {
                return Err(Error::validation(&param.name, s, "max_length", format!("value longer than {max_length}")));
            }
        }
    }
    if let Some(min) = validation.min {
        if let Some(n) = value.as_f64() {
            if n < min {
                return Err(Error::validation(&param.name, value.to_string(), "min", format!("value below minimum {min}")));
            }
        }
    }
    if let Some(max) = validation.max {
        if let Some(n) = value.as_f64() {
            if n > max {
                return Err(Error::validation(&param.name, value.to_string(), "max", format!("value above maximum {max}")));
            }
        }
    }
    if let Some(enum_values) = &validation.enum_values {
        if !enum_values.contains(value) {
            return Err(Error::validation(&param.name, value.to_string(), "enum", "value is not one of the allowed enum values"));
        }
    }
    Ok(())
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::validation("<pattern>", pattern, "pattern", format!("invalid regex: {e}")))
}

/// Structural validation of an endpoint's own configuration, distinct from
/// runtime argument validation (spec §4.5). Delegates to
/// `EndpointConfig::validate`, which already enforces every §3 invariant;
/// kept as a thin entry point here so callers in this crate don't need to
/// reach into `fusion-domain` directly.
pub fn validate_endpoint(endpoint: &EndpointConfig) -> Result<()> {
    endpoint.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_domain::config::{ParamLocation, ValidationConfig};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn param(name: &str, param_type: ParamType, required: bool) -> ParameterConfig {
        ParameterConfig {
            name: name.to_string(),
            alias: None,
            description: String::new(),
            param_type,
            required,
            default: None,
            location: ParamLocation::Query,
            validation: None,
            transform: None,
            prefix: None,
            static_value: None,
        }
    }

    #[test]
    fn required_parameter_missing_errors() {
        let params = vec![param("q", ParamType::String, true)];
        let err = validate_parameters(&params, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::Validation { rule, .. } if rule == "required"));
    }

    #[test]
    fn missing_optional_fills_default() {
        let mut p = param("limit", ParamType::Number, false);
        p.default = Some(json!(10));
        let filled = validate_parameters(&[p], &BTreeMap::new()).unwrap();
        assert_eq!(filled.get("limit"), Some(&json!(10)));
    }

    #[test]
    fn missing_optional_without_default_is_omitted() {
        let params = vec![param("q", ParamType::String, false)];
        let filled = validate_parameters(&params, &BTreeMap::new()).unwrap();
        assert!(!filled.contains_key("q"));
    }

    #[test]
    fn type_mismatch_errors() {
        let params = vec![param("q", ParamType::Number, true)];
        let mut args = BTreeMap::new();
        args.insert("q".to_string(), json!("not-a-number"));
        assert!(validate_parameters(&params, &args).is_err());
    }

    #[test]
    fn pattern_validation_rejects_non_matching_value() {
        let mut p = param("email", ParamType::String, true);
        p.validation = Some(ValidationConfig { pattern: Some(r"^\S+@\S+$".into()), ..Default::default() });
        let mut args = BTreeMap::new();
        args.insert("email".to_string(), json!("not-an-email"));
        assert!(validate_parameters(&[p], &args).is_err());
    }

    #[test]
    fn enum_validation_accepts_listed_value() {
        let mut p = param("status", ParamType::String, true);
        p.validation = Some(ValidationConfig { enum_values: Some(vec![json!("open"), json!("closed")]), ..Default::default() });
        let mut args = BTreeMap::new();
        args.insert("status".to_string(), json!("open"));
        assert!(validate_parameters(&[p], &args).is_ok());
    }

    #[test]
    fn min_max_length_enforced() {
        let mut p = param("code", ParamType::String, true);
        p.validation = Some(ValidationConfig { min_length: Some(3), max_length: Some(5), ..Default::default() });
        let mut args = BTreeMap::new();
        args.insert("code".to_string(), json!("ab"));
        assert!(validate_parameters(&[p], &args).is_err());
    }
}
