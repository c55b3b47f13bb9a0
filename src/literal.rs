//! Quoted literal handling and typed interpretation of literal values.

use crate::error::QueryError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use std::fmt;

/// Backslash-escapes quotes and backslashes. Inverse of [`unescape`].
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn unescape(raw: &str) -> String {
    let mut value = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                value.push(next);
            }
        } else {
            value.push(c);
        }
    }
    value
}

/// Renders `value` as a quoted literal that the lexer reads back unchanged.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", escape(value))
}

pub fn parse_int(value: &str) -> Result<i64, QueryError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| QueryError::validation(format!("Invalid number: {}", value)))
}

pub fn contains_ignore_case(text: &str, value: &str) -> bool {
    text.to_lowercase().contains(&value.to_lowercase())
}

/// `true` (any case) is true, everything else is false.
pub fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// A date literal together with the instant it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateLiteral {
    pub text: String,
    pub date: DateTime<Utc>,
}

impl DateLiteral {
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        Self::parse_at(text, Utc::now())
    }

    /// Relative forms (`today`, `3 days ago`) resolve against `now`.
    pub fn parse_at(text: &str, now: DateTime<Utc>) -> Result<Self, QueryError> {
        let date = parse_date(text, now)
            .ok_or_else(|| QueryError::validation(format!("Unrecognized date: {}", text)))?;
        Ok(Self {
            text: text.to_string(),
            date,
        })
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]`, `today`, `yesterday` and
/// `N hour(s)|day(s)|week(s) ago`. Amounts reaching outside the representable
/// range yield `None`.
pub fn parse_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    let today = start_of_day(now.date_naive());
    match text {
        "today" => return Some(today),
        "yesterday" => return today.checked_sub_signed(TimeDelta::try_days(1)?),
        _ => {}
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(start_of_day(date));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&datetime));
        }
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if let [amount, unit, "ago"] = words.as_slice() {
        let amount: i64 = amount.parse().ok()?;
        let (base, delta) = match unit.trim_end_matches('s') {
            "hour" => (now, TimeDelta::try_hours(amount)?),
            "day" => (today, TimeDelta::try_days(amount)?),
            "week" => (today, TimeDelta::try_weeks(amount)?),
            _ => return None,
        };
        return base.checked_sub_signed(delta);
    }
    None
}

/// A reference to a numbered entity, written `#12`, `12` or `project#12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityReference {
    pub project: Option<String>,
    pub number: i64,
}

impl EntityReference {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (project, number) = match text.rsplit_once('#') {
            Some((project, number)) => {
                let project = (!project.is_empty()).then(|| project.to_string());
                (project, number)
            }
            None => (None, text),
        };
        let number = number.parse::<i64>().ok()?;
        Some(Self { project, number })
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{}#{}", project, self.number),
            None => write!(f, "#{}", self.number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_is_inverse_of_unescape() {
        for value in ["plain", r#"say "hi""#, r"C:\temp", r#"\""#, ""] {
            assert_eq!(unescape(&escape(value)), value);
        }
        assert_eq!(quote(r#"a"b"#), r#""a\"b""#);
    }

    #[test]
    fn test_unescape_drops_dangling_backslash() {
        assert_eq!(unescape(r"abc\"), "abc");
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(" 42 ").unwrap(), 42);
        assert_eq!(
            parse_int("many").unwrap_err().to_string(),
            "Invalid number: many"
        );
    }

    #[test]
    fn test_parse_bool_defaults_to_false() {
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("yes"));
    }

    #[test]
    fn test_absolute_dates() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap();
        assert_eq!(
            parse_date("2024-01-02", now),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date("2024-01-02 08:15", now),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 8, 15, 0).unwrap())
        );
        assert_eq!(parse_date("next tuesday", now), None);
    }

    #[test]
    fn test_relative_dates() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap();
        assert_eq!(
            parse_date("today", now),
            Some(Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date("yesterday", now),
            Some(Utc.with_ymd_and_hms(2024, 5, 9, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date("2 weeks ago", now),
            Some(Utc.with_ymd_and_hms(2024, 4, 26, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date("3 hours ago", now),
            Some(Utc.with_ymd_and_hms(2024, 5, 10, 12, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_relative_date_out_of_range() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap();
        assert_eq!(parse_date("100000000 days ago", now), None);
        assert_eq!(parse_date("9223372036854775807 weeks ago", now), None);
        assert_eq!(parse_date("-9223372036854775807 hours ago", now), None);
        assert_eq!(
            DateLiteral::parse_at("100000000 days ago", now).unwrap_err(),
            QueryError::validation("Unrecognized date: 100000000 days ago")
        );
    }

    #[test]
    fn test_entity_reference() {
        assert_eq!(
            EntityReference::parse("#12"),
            Some(EntityReference { project: None, number: 12 })
        );
        assert_eq!(
            EntityReference::parse("onedev#7").unwrap().to_string(),
            "onedev#7"
        );
        assert_eq!(EntityReference::parse("12").unwrap().number, 12);
        assert_eq!(EntityReference::parse("#abc"), None);
    }
}
