//! `${VAR}` / `${VAR:default}` expansion over raw config bytes, run before
//! the JSON parser ever sees them (spec §4.1).

use regex::Regex;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:([^}]*))?\}").expect("static regex")
    })
}

/// Expand every `${NAME}` / `${NAME:default}` reference in `raw` using the
/// process environment. A reference with no default whose variable is
/// unset is left untouched — it is not an error at this stage, only later
/// reported by [`required_environment_variables`].
pub fn expand(raw: &str) -> String {
    pattern()
        .replace_all(raw, |caps: &regex::Captures| {
            let name = &caps[1];
            let default = caps.get(3).map(|m| m.as_str());
            match std::env::var(name) {
                Ok(value) => value,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => caps[0].to_string(),
                },
            }
        })
        .into_owned()
}

/// Scan `raw` (the *original*, pre-expansion text) for `${NAME}` references
/// with no default whose environment variable is currently unset.
/// Deduplicated and sorted for stable output.
pub fn required_environment_variables(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = pattern()
        .captures_iter(raw)
        .filter(|caps| caps.get(2).is_none())
        .map(|caps| caps[1].to_string())
        .filter(|name| std::env::var(name).is_err())
        .collect();
    names.sort();
    names.dedup();
    names
}
