//! URL/query/header/body construction and response pagination extraction
//! (spec §4.4).

use serde_json::{Map, Value};

use fusion_domain::config::{ParamLocation, ParameterConfig, PaginationConfig};
use fusion_domain::error::{Error, Result};
use fusion_domain::request::OutboundRequest;

use crate::expr;
use crate::time_tokens;

/// Trims exactly one trailing slash from `base_url`, ensures `path` has
/// exactly one leading slash, substitutes `{name}` path params (URL-escaped),
/// and appends any path-located params that never appeared in `path` as-is
/// (spec §4.4 `BuildURL`).
pub fn build_url(base_url: &str, path: &str, params: &[ParameterConfig], args: &Map<String, Value>) -> Result<String> {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    let rel = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };

    let mut resolved = rel;
    for param in params.iter().filter(|p| p.location == ParamLocation::Path) {
        let placeholder = format!("{{{}}}", param.name);
        let value = value_for(param, args)?;
        if resolved.contains(&placeholder) {
            let escaped = url_escape(&string_value(&value));
            resolved = resolved.replace(&placeholder, &escaped);
        } else if param.required {
            return Err(Error::validation(&param.name, "", "required", "required path parameter missing from endpoint path"));
        }
    }

    Ok(format!("{base}{resolved}"))
}

/// Path params embedded in `path` as `{name}` must not also be emitted as
/// query params (spec §4.4 edge case).
fn path_param_names(path: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        if let Some(close) = rest[open..].find('}') {
            names.push(&rest[open + 1..open + close]);
            rest = &rest[open + close + 1..];
        } else {
            break;
        }
    }
    names
}

/// Writes each `location=query` param onto `req.query`, running time tokens
/// first; array-typed values emit repeated keys (spec §4.4).
pub fn apply_query_params(req: &mut OutboundRequest, path: &str, params: &[ParameterConfig], args: &Map<String, Value>) -> Result<()> {
    let embedded = path_param_names(path);
    for param in params.iter().filter(|p| p.location == ParamLocation::Query) {
        if embedded.contains(&param.name.as_str()) {
            continue;
        }
        let Some(value) = args.get(&param.name).cloned().or_else(|| param.static_value.clone()) else {
            continue;
        };
        emit_repeated(&value, |v| req.set_query(param.name.clone(), apply_time_token(v)));
    }
    Ok(())
}

/// Writes each `location=header` param onto `req.headers`, time tokens
/// processed first (spec §4.4).
pub fn apply_headers(req: &mut OutboundRequest, params: &[ParameterConfig], args: &Map<String, Value>) -> Result<()> {
    for param in params.iter().filter(|p| p.location == ParamLocation::Header) {
        let Some(value) = args.get(&param.name).cloned().or_else(|| param.static_value.clone()) else {
            continue;
        };
        let rendered = apply_time_token(&value);
        let rendered = match &param.prefix {
            Some(prefix) => format!("{prefix}{rendered}"),
            None => rendered,
        };
        req.set_header(param.name.clone(), rendered);
    }
    Ok(())
}

/// Builds the nested request body object: a parameter with a `transform`
/// deposits the transformed value at `targetName` (dot-notation, creating
/// intermediate maps, overwriting non-map existing values); parameters
/// without a transform deposit at their bare name (spec §4.4, §3).
pub fn build_request_body(params: &[ParameterConfig], args: &Map<String, Value>) -> Result<Value> {
    let mut body = Value::Object(Map::new());
    for param in params.iter().filter(|p| p.location == ParamLocation::Body) {
        let Some(raw) = args.get(&param.name).cloned().or_else(|| param.static_value.clone()) else {
            continue;
        };
        let raw = apply_time_token_value(&raw);

        match &param.transform {
            Some(transform) => {
                let transformed = expr::evaluate(&transform.expression, &raw)?;
                set_nested_value(&mut body, &transform.target_name, transformed);
            }
            None => {
                set_nested_value(&mut body, &param.name, raw);
            }
        }
    }
    Ok(body)
}

/// Deposits `value` at dotted `path` inside `root`, creating intermediate
/// objects and overwriting any non-object value already present there
/// (spec §4.4 `BuildRequestBody`, §3 `setNestedValue`).
pub fn set_nested_value(root: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = root;
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = current.as_object_mut().expect("just ensured object");
        if i == segments.len() - 1 {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map.entry(segment.to_string()).or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Minimal expression evaluator entry point (spec §4.4 `TransformResponse`).
pub fn transform_response(data: &Value, expression: &str) -> Result<Value> {
    expr::evaluate(expression, data)
}

/// Reads `config.data_path` for page items (missing → empty array) and
/// `config.next_page_token_path` for the next-page token/URL; empty token
/// terminates pagination (spec §4.4 `ExtractPaginationInfo`).
pub fn extract_pagination_info(data: &Value, config: &PaginationConfig) -> (Option<String>, Vec<Value>) {
    let items = dot_get(data, &config.data_path)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let next_token = config
        .next_page_token_path
        .as_deref()
        .and_then(|path| dot_get(data, path))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    (next_token, items)
}

/// Dotted-path traversal (`"a.b.c"`) through nested JSON objects. Shared by
/// pagination's `next_page_token_path` and any auth strategy that extracts a
/// field from a nested response body.
pub fn dot_get<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn value_for(param: &ParameterConfig, args: &Map<String, Value>) -> Result<Value> {
    if let Some(v) = args.get(&param.name) {
        return Ok(v.clone());
    }
    if let Some(v) = &param.static_value {
        return Ok(v.clone());
    }
    if param.required {
        return Err(Error::validation(&param.name, "", "required", "required parameter is missing"));
    }
    Ok(Value::Null)
}

fn string_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn url_escape(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

fn apply_time_token(value: &Value) -> String {
    match value {
        Value::String(s) => time_tokens::process(s),
        other => string_value(other),
    }
}

fn apply_time_token_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(time_tokens::process(s)),
        other => other.clone(),
    }
}

fn emit_repeated(value: &Value, mut emit: impl FnMut(&Value)) {
    match value {
        Value::Array(items) => {
            for item in items {
                emit(item);
            }
        }
        other => emit(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_domain::config::ParamType;
    use serde_json::json;

    fn param(name: &str, location: ParamLocation, required: bool) -> ParameterConfig {
        ParameterConfig {
            name: name.to_string(),
            alias: None,
            description: String::new(),
            param_type: ParamType::String,
            required,
            default: None,
            location,
            validation: None,
            transform: None,
            prefix: None,
            static_value: None,
        }
    }

    #[test]
    fn build_url_trims_one_trailing_slash_and_ensures_leading_slash() {
        let url = build_url("https://api.example.com/", "ping", &[], &Map::new()).unwrap();
        assert_eq!(url, "https://api.example.com/ping");
    }

    #[test]
    fn build_url_substitutes_path_param_url_escaped() {
        let params = vec![param("id", ParamLocation::Path, true)];
        let mut args = Map::new();
        args.insert("id".to_string(), json!("a b"));
        let url = build_url("https://api.example.com", "/items/{id}", &params, &args).unwrap();
        assert_eq!(url, "https://api.example.com/items/a+b");
    }

    #[test]
    fn build_url_errors_on_missing_required_path_param() {
        let params = vec![param("id", ParamLocation::Path, true)];
        assert!(build_url("https://api.example.com", "/items/{id}", &params, &Map::new()).is_err());
    }

    #[test]
    fn query_param_embedded_in_path_is_not_duplicated() {
        let params = vec![param("id", ParamLocation::Query, false)];
        let mut args = Map::new();
        args.insert("id".to_string(), json!("5"));
        let mut req = OutboundRequest::new("GET", "https://api.example.com/items/{id}");
        apply_query_params(&mut req, "/items/{id}", &params, &args).unwrap();
        assert!(req.query.is_empty());
    }

    #[test]
    fn array_typed_query_param_emits_repeated_keys() {
        let params = vec![param("tag", ParamLocation::Query, false)];
        let mut args = Map::new();
        args.insert("tag".to_string(), json!(["a", "b"]));
        let mut req = OutboundRequest::new("GET", "https://api.example.com");
        apply_query_params(&mut req, "/items", &params, &args).unwrap();
        assert_eq!(req.query, vec![("tag".to_string(), "a".to_string()), ("tag".to_string(), "b".to_string())]);
    }

    #[test]
    fn set_nested_value_creates_intermediate_objects() {
        let mut root = Value::Object(Map::new());
        set_nested_value(&mut root, "start.dateTime", json!("2025-07-01T10:00:00Z"));
        set_nested_value(&mut root, "start.timeZone", json!("America/New_York"));
        assert_eq!(root, json!({"start": {"dateTime": "2025-07-01T10:00:00Z", "timeZone": "America/New_York"}}));
    }

    #[test]
    fn set_nested_value_overwrites_non_map_existing_value() {
        let mut root = json!({"start": "not-an-object"});
        set_nested_value(&mut root, "start.dateTime", json!("x"));
        assert_eq!(root, json!({"start": {"dateTime": "x"}}));
    }

    #[test]
    fn build_request_body_matches_dot_notation_scenario() {
        let mut start_dt = param("startDateTime", ParamLocation::Body, false);
        start_dt.transform = Some(fusion_domain::config::TransformConfig { target_name: "start.dateTime".into(), expression: ".".into() });
        let mut start_tz = param("startTimeZone", ParamLocation::Body, false);
        start_tz.transform = Some(fusion_domain::config::TransformConfig { target_name: "start.timeZone".into(), expression: ".".into() });
        let subject = param("subject", ParamLocation::Body, false);

        let mut args = Map::new();
        args.insert("startDateTime".to_string(), json!("2025-07-01T10:00:00Z"));
        args.insert("startTimeZone".to_string(), json!("America/New_York"));
        args.insert("subject".to_string(), json!("M"));

        let body = build_request_body(&[start_dt, start_tz, subject], &args).unwrap();
        assert_eq!(
            body,
            json!({"subject": "M", "start": {"dateTime": "2025-07-01T10:00:00Z", "timeZone": "America/New_York"}})
        );
    }

    #[test]
    fn extract_pagination_info_reads_items_and_next_token() {
        let config = PaginationConfig {
            data_path: "value".into(),
            next_page_token_path: Some("@odata.nextLink".into()),
            next_page_token_param: None,
        };
        let page = json!({"value": [1, 2], "@odata.nextLink": "https://api.example.com/page2"});
        let (next, items) = extract_pagination_info(&page, &config);
        assert_eq!(items, vec![json!(1), json!(2)]);
        assert_eq!(next, Some("https://api.example.com/page2".to_string()));
    }

    #[test]
    fn extract_pagination_info_empty_token_terminates() {
        let config = PaginationConfig { data_path: "value".into(), next_page_token_path: Some("next".into()), next_page_token_param: None };
        let page = json!({"value": [1], "next": ""});
        let (next, items) = extract_pagination_info(&page, &config);
        assert_eq!(items.len(), 1);
        assert_eq!(next, None);
    }

    #[test]
    fn extract_pagination_info_missing_data_path_yields_empty_items() {
        let config = PaginationConfig { data_path: "missing".into(), next_page_token_path: None, next_page_token_param: None };
        let (next, items) = extract_pagination_info(&json!({}), &config);
        assert!(items.is_empty());
        assert_eq!(next, None);
    }
}
