//! Minimal transform-expression evaluator (spec §4.4, §9 redesign flag:
//! deliberately NOT a general-purpose expression engine — just identity,
//! dot-reference, `slice(a,b)`, and `concat(...)` over a single input value).

use serde_json::Value;

use fusion_domain::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Identity,
    DotRef(String),
    Slice(Box<Expr>, i64, i64),
    Concat(Vec<Expr>),
    Literal(String),
}

/// Evaluates `expression` against `data` (spec §4.4 `TransformResponse`,
/// and `TransformConfig.expression` for request-body shaping).
pub fn evaluate(expression: &str, data: &Value) -> Result<Value> {
    let trimmed = expression.trim();
    if trimmed.is_empty() || trimmed == "." {
        return Ok(data.clone());
    }
    let expr = parse(trimmed)?;
    eval(&expr, data)
}

fn parse(src: &str) -> Result<Expr> {
    if src.starts_with('"') && src.ends_with('"') && src.len() >= 2 {
        return Ok(Expr::Literal(src[1..src.len() - 1].to_string()));
    }
    if let Some(inner) = strip_call(src, "slice") {
        let args = split_args(inner)?;
        if args.len() != 3 {
            return Err(expr_error(src, "slice(expr, start, end) requires exactly 3 arguments"));
        }
        let inner_expr = parse(&args[0])?;
        let start: i64 = args[1].trim().parse().map_err(|_| expr_error(src, "slice start must be an integer"))?;
        let end: i64 = args[2].trim().parse().map_err(|_| expr_error(src, "slice end must be an integer"))?;
        return Ok(Expr::Slice(Box::new(inner_expr), start, end));
    }
    if let Some(inner) = strip_call(src, "concat") {
        let args = split_args(inner)?;
        let parsed: Result<Vec<Expr>> = args.iter().map(|a| parse(a.trim())).collect();
        return Ok(Expr::Concat(parsed?));
    }
    if src == "." {
        return Ok(Expr::Identity);
    }
    if is_dot_path(src) {
        return Ok(Expr::DotRef(src.to_string()));
    }
    Err(expr_error(src, "unrecognized expression"))
}

fn strip_call<'a>(src: &'a str, name: &str) -> Option<&'a str> {
    let prefix = format!("{name}(");
    if src.starts_with(&prefix) && src.ends_with(')') {
        Some(&src[prefix.len()..src.len() - 1])
    } else {
        None
    }
}

fn split_args(src: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut in_quotes = false;
    for c in src.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '(' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_quotes => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 && !in_quotes => {
                args.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    Ok(args)
}

fn is_dot_path(src: &str) -> bool {
    !src.is_empty()
        && src
            .split('.')
            .all(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

fn eval(expr: &Expr, data: &Value) -> Result<Value> {
    match expr {
        Expr::Identity => Ok(data.clone()),
        Expr::Literal(s) => Ok(Value::String(s.clone())),
        Expr::DotRef(path) => Ok(dot_get(data, path).cloned().unwrap_or(Value::Null)),
        Expr::Slice(inner, start, end) => {
            let value = eval(inner, data)?;
            slice_value(&value, *start, *end)
        }
        Expr::Concat(parts) => {
            let mut out = String::new();
            for part in parts {
                let value = eval(part, data)?;
                out.push_str(&value_to_concat_str(&value));
            }
            Ok(Value::String(out))
        }
    }
}

fn value_to_concat_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn slice_value(value: &Value, start: i64, end: i64) -> Result<Value> {
    match value {
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (s0, e0) = clamp_range(chars.len(), start, end);
            Ok(Value::String(chars[s0..e0].iter().collect()))
        }
        Value::Array(items) => {
            let (s0, e0) = clamp_range(items.len(), start, end);
            Ok(Value::Array(items[s0..e0].to_vec()))
        }
        _ => Err(Error::config("transform.expression", "slice", "slice() requires a string or array operand")),
    }
}

fn clamp_range(len: usize, start: i64, end: i64) -> (usize, usize) {
    let resolve = |idx: i64| -> usize {
        let idx = if idx < 0 { (len as i64 + idx).max(0) } else { idx };
        (idx as usize).min(len)
    };
    let s0 = resolve(start);
    let e0 = resolve(end).max(s0);
    (s0, e0)
}

fn dot_get<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn expr_error(expr: &str, message: &str) -> Error {
    Error::config("transform.expression", expr, message)
}
