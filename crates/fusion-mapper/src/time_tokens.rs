//! Relative time-token substitution in string values (spec §4.3).

use chrono::{NaiveTime, Utc};
use regex::{Captures, Regex};
use std::sync::OnceLock;

const MAX_DAYS: i64 = 365;
const MAX_HOURS: i64 = 8760;
const MAX_MINS: i64 = 525_600;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(DAYS|HOURS|MINS)([+-])(\d+)").expect("static time-token regex"))
}

/// Substitutes every `#DAYS±N` / `#HOURS±N` / `#MINS±N` occurrence in `input`
/// with an RFC3339 UTC timestamp. Out-of-range or unparseable `N` leaves the
/// token unchanged and logs a warning (spec §4.3).
pub fn process(input: &str) -> String {
    pattern()
        .replace_all(input, |caps: &Captures| substitute(caps).unwrap_or_else(|| caps[0].to_string()))
        .into_owned()
}

fn substitute(caps: &Captures) -> Option<String> {
    let unit = &caps[1];
    let sign = &caps[2];
    let n: i64 = caps[3].parse().ok()?;

    let max = match unit {
        "DAYS" => MAX_DAYS,
        "HOURS" => MAX_HOURS,
        "MINS" => MAX_MINS,
        _ => return None,
    };
    if n > max {
        tracing::warn!(token = &caps[0], n, max, "time token out of range, left unchanged");
        return None;
    }
    let signed_n = if sign == "-" { -n } else { n };

    let now = Utc::now();
    let ts = match unit {
        "DAYS" => {
            let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
            midnight + chrono::Duration::days(signed_n)
        }
        "HOURS" => now + chrono::Duration::hours(signed_n),
        "MINS" => now + chrono::Duration::minutes(signed_n),
        _ => return None,
    };
    Some(ts.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_minus_zero_is_today_at_midnight() {
        let out = process("#DAYS-0");
        assert!(out.ends_with("T00:00:00Z"));
        assert_eq!(&out[0..10], &Utc::now().format("%Y-%m-%d").to_string()[..]);
    }

    #[test]
    fn days_plus_offset_shifts_the_date() {
        let out = process("#DAYS+1");
        let expected = (Utc::now() + chrono::Duration::days(1)).format("%Y-%m-%d").to_string();
        assert_eq!(&out[0..10], expected);
    }

    #[test]
    fn hours_token_substitutes_to_an_rfc3339_timestamp() {
        let out = process("#HOURS+1");
        assert!(!out.contains('#'));
        assert_eq!(out.len(), "2025-01-01T00:00:00Z".len());
    }

    #[test]
    fn out_of_range_is_left_unchanged() {
        assert_eq!(process("#DAYS-400"), "#DAYS-400");
        assert_eq!(process("#MINS+9999999"), "#MINS+9999999");
    }

    #[test]
    fn non_token_text_is_untouched() {
        assert_eq!(process("hello world"), "hello world");
    }

    #[test]
    fn substitutes_inside_a_larger_string() {
        let out = process("start=#DAYS-1&end=#DAYS+0");
        assert!(!out.contains('#'));
        assert!(out.starts_with("start="));
    }

    #[test]
    fn multiple_tokens_in_one_string_all_substitute() {
        let out = process("#DAYS-1 and #DAYS+1");
        assert_eq!(out.matches("T00:00:00Z").count(), 2);
    }
}
