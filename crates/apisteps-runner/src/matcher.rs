//! Validation expressions produced from response schemas
//!
//! A [`Matcher`] is the validation-mode counterpart of a generated value: it
//! accepts every value its schema allows. Format and pattern checks are
//! delegated to `jsonschema`.

use std::fmt;

use apisteps_core::DataDictionary;
use apisteps_core::dictionary::child_path;
use serde_json::{Value, json};

/// Longest rendering of an actual value in a mismatch line.
const MAX_ACTUAL_LEN: usize = 80;

/// Numeric bounds as declared by `minimum` / `maximum`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
}

impl Bounds {
    #[must_use]
    pub fn contains(&self, n: f64) -> bool {
        let above = self.minimum.is_none_or(|min| {
            if self.exclusive_minimum { n > min } else { n >= min }
        });
        let below = self.maximum.is_none_or(|max| {
            if self.exclusive_maximum { n < max } else { n <= max }
        });
        above && below
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.minimum.is_none() && self.maximum.is_none()
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.minimum, self.maximum) {
            (Some(min), Some(max)) => {
                let open = if self.exclusive_minimum { '(' } else { '[' };
                let close = if self.exclusive_maximum { ')' } else { ']' };
                write!(f, "{open}{min}, {max}{close}")
            }
            (Some(min), None) => {
                let op = if self.exclusive_minimum { ">" } else { ">=" };
                write!(f, "{op} {min}")
            }
            (None, Some(max)) => {
                let op = if self.exclusive_maximum { "<" } else { "<=" };
                write!(f, "{op} {max}")
            }
            (None, None) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Accepts anything, including absence.
    Ignore,
    /// Exact value (data dictionary entries).
    Literal(Value),
    AnyString,
    Integer(Bounds),
    Number(Bounds),
    AnyBoolean,
    /// Enum membership
    OneOf(Vec<Value>),
    Pattern(String),
    Format(String),
    /// Every listed member must be present (unless `Ignore`); extra members are allowed.
    Object(Vec<(String, Matcher)>),
    /// Every element must match.
    Array(Box<Matcher>),
    AnyOf(Vec<Matcher>),
    AllOf(Vec<Matcher>),
}

/// One failed expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Dotted path (`body.owner.name`), `status` or `header X-Rate-Limit`
    pub location: String,
    pub expected: String,
    pub actual: String,
}

impl Mismatch {
    pub fn new(
        location: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.location, self.expected, self.actual
        )
    }
}

impl Matcher {
    /// Check `actual`, appending one [`Mismatch`] per failed expectation.
    pub fn check(&self, actual: &Value, location: &str, out: &mut Vec<Mismatch>) {
        let ok = match self {
            Self::Ignore => true,
            Self::Literal(expected) => same_value(expected, actual),
            Self::AnyString => actual.is_string(),
            Self::Integer(bounds) => as_integer(actual).is_some_and(|n| bounds.contains(n)),
            Self::Number(bounds) => actual.as_f64().is_some_and(|n| bounds.contains(n)),
            Self::AnyBoolean => actual.is_boolean(),
            Self::OneOf(values) => values.iter().any(|v| same_value(v, actual)),
            Self::Pattern(pattern) => {
                actual.is_string() && schema_accepts(&json!({"pattern": pattern}), actual)
            }
            Self::Format(format) => {
                actual.is_string() && schema_accepts(&json!({"format": format}), actual)
            }
            Self::Object(members) => {
                let Some(map) = actual.as_object() else {
                    out.push(Mismatch::new(location, self.to_string(), describe(actual)));
                    return;
                };
                for (name, matcher) in members {
                    let member_location = child_path(location, name);
                    match map.get(name) {
                        Some(value) => matcher.check(value, &member_location, out),
                        None if *matcher == Self::Ignore => {}
                        None => out.push(Mismatch::new(member_location, matcher.to_string(), "nothing")),
                    }
                }
                return;
            }
            Self::Array(item) => {
                let Some(items) = actual.as_array() else {
                    out.push(Mismatch::new(location, self.to_string(), describe(actual)));
                    return;
                };
                for (i, value) in items.iter().enumerate() {
                    item.check(value, &format!("{location}[{i}]"), out);
                }
                return;
            }
            Self::AnyOf(variants) => variants.iter().any(|m| m.matches(actual)),
            Self::AllOf(parts) => {
                for part in parts {
                    part.check(actual, location, out);
                }
                return;
            }
        };
        if !ok {
            out.push(Mismatch::new(location, self.to_string(), describe(actual)));
        }
    }

    #[must_use]
    pub fn matches(&self, actual: &Value) -> bool {
        let mut mismatches = Vec::new();
        self.check(actual, "", &mut mismatches);
        mismatches.is_empty()
    }

    /// Check a header value. The text is tried as a string first, then as a
    /// JSON scalar, so `X-Rate-Limit: 100` satisfies an integer matcher.
    pub fn check_text(&self, text: &str, location: &str, out: &mut Vec<Mismatch>) {
        let as_string = Value::String(text.to_string());
        if self.matches(&as_string) {
            return;
        }
        if let Ok(scalar) = serde_json::from_str::<Value>(text.trim()) {
            if !scalar.is_object() && !scalar.is_array() && self.matches(&scalar) {
                return;
            }
        }
        out.push(Mismatch::new(location, self.to_string(), describe(&as_string)));
    }

    /// Replace members addressed by `dictionary` with exact literals.
    ///
    /// Returns the number of replacements.
    pub fn apply_dictionary(&mut self, dictionary: &DataDictionary) -> usize {
        if dictionary.is_empty() {
            return 0;
        }
        let replaced = self.apply_at(dictionary, "");
        tracing::debug!(replaced, "applied inbound dictionary");
        replaced
    }

    fn apply_at(&mut self, dictionary: &DataDictionary, path: &str) -> usize {
        match self {
            Self::Object(members) => members
                .iter_mut()
                .map(|(name, matcher)| {
                    let member_path = child_path(path, name);
                    match dictionary.get(&member_path) {
                        Some(fixed) => {
                            *matcher = Self::Literal(fixed.clone());
                            1
                        }
                        None => matcher.apply_at(dictionary, &member_path),
                    }
                })
                .sum(),
            Self::Array(item) => item.apply_at(dictionary, path),
            Self::AnyOf(parts) | Self::AllOf(parts) => parts
                .iter_mut()
                .map(|m| m.apply_at(dictionary, path))
                .sum(),
            _ => 0,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignore => f.write_str("@ignore@"),
            Self::Literal(v) => write!(f, "{v}"),
            Self::AnyString => f.write_str("any string"),
            Self::Integer(b) if b.is_unbounded() => f.write_str("any integer"),
            Self::Integer(b) => write!(f, "integer {b}"),
            Self::Number(b) if b.is_unbounded() => f.write_str("any number"),
            Self::Number(b) => write!(f, "number {b}"),
            Self::AnyBoolean => f.write_str("any boolean"),
            Self::OneOf(values) => {
                let values: Vec<String> = values.iter().map(Value::to_string).collect();
                write!(f, "one of [{}]", values.join(", "))
            }
            Self::Pattern(p) => write!(f, "matches '{p}'"),
            Self::Format(fmt_name) => write!(f, "string in format '{fmt_name}'"),
            Self::Object(members) => {
                let members: Vec<String> =
                    members.iter().map(|(n, m)| format!("{n}: {m}")).collect();
                write!(f, "{{{}}}", members.join(", "))
            }
            Self::Array(item) => write!(f, "[{item}]"),
            Self::AnyOf(variants) => {
                let variants: Vec<String> = variants.iter().map(ToString::to_string).collect();
                write!(f, "any of ({})", variants.join(" | "))
            }
            Self::AllOf(parts) => {
                let parts: Vec<String> = parts.iter().map(ToString::to_string).collect();
                write!(f, "all of ({})", parts.join(" & "))
            }
        }
    }
}

/// Integers, including floats with no fractional part (`3.0`).
fn as_integer(value: &Value) -> Option<f64> {
    let n = value.as_number()?;
    if n.is_i64() || n.is_u64() {
        return n.as_f64();
    }
    n.as_f64().filter(|f| f.fract() == 0.0)
}

/// Equality with numbers compared by value (`1` == `1.0`).
fn same_value(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => expected == actual,
    }
}

fn schema_accepts(schema: &Value, value: &Value) -> bool {
    match jsonschema::options().should_validate_formats(true).build(schema) {
        Ok(validator) => validator.is_valid(value),
        Err(e) => {
            tracing::warn!(error = %e, "cannot compile check, treating as mismatch");
            false
        }
    }
}

fn describe(value: &Value) -> String {
    let text = value.to_string();
    if text.len() <= MAX_ACTUAL_LEN {
        return text;
    }
    let mut end = MAX_ACTUAL_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(matcher: &Matcher, actual: Value) -> Vec<Mismatch> {
        let mut out = Vec::new();
        matcher.check(&actual, "body", &mut out);
        out
    }

    fn pet() -> Matcher {
        Matcher::Object(vec![
            ("id".into(), Matcher::Integer(Bounds::default())),
            ("name".into(), Matcher::AnyString),
            ("tags".into(), Matcher::Array(Box::new(Matcher::AnyString))),
            ("parent".into(), Matcher::Ignore),
        ])
    }

    #[test]
    fn display_forms() {
        insta::assert_snapshot!(pet().to_string(), @"{id: any integer, name: any string, tags: [any string], parent: @ignore@}");
        insta::assert_snapshot!(
            Matcher::OneOf(vec![json!("available"), json!("sold")]).to_string(),
            @r#"one of ["available", "sold"]"#
        );
        insta::assert_snapshot!(
            Matcher::AnyOf(vec![Matcher::AnyString, Matcher::AnyBoolean]).to_string(),
            @"any of (any string | any boolean)"
        );
        let bounds = Bounds {
            minimum: Some(1.0),
            maximum: Some(10.0),
            exclusive_minimum: false,
            exclusive_maximum: true,
        };
        insta::assert_snapshot!(Matcher::Integer(bounds).to_string(), @"integer [1, 10)");
        insta::assert_snapshot!(Matcher::Format("uuid".into()).to_string(), @"string in format 'uuid'");
    }

    #[test]
    fn object_accepts_extra_members_and_missing_ignored_ones() {
        let mismatches = check(
            &pet(),
            json!({"id": 1, "name": "Rex", "tags": ["a"], "extra": true}),
        );
        assert!(mismatches.is_empty(), "{mismatches:?}");
    }

    #[test]
    fn object_reports_each_failed_member() {
        let mismatches = check(&pet(), json!({"id": "one", "tags": ["a", 2]}));
        let locations: Vec<_> = mismatches.iter().map(|m| m.location.as_str()).collect();
        assert_eq!(locations, ["body.id", "body.name", "body.tags[1]"]);
        assert_eq!(
            mismatches[0].to_string(),
            "body.id: expected any integer, got \"one\""
        );
    }

    #[test]
    fn integer_accepts_whole_floats_only() {
        let any = Matcher::Integer(Bounds::default());
        assert!(any.matches(&json!(3)));
        assert!(any.matches(&json!(3.0)));
        assert!(!any.matches(&json!(3.5)));
    }

    #[test]
    fn bounds_respect_exclusivity() {
        let bounds = Bounds {
            minimum: Some(0.0),
            maximum: Some(1.0),
            exclusive_minimum: true,
            exclusive_maximum: false,
        };
        let number = Matcher::Number(bounds);
        assert!(!number.matches(&json!(0.0)));
        assert!(number.matches(&json!(0.5)));
        assert!(number.matches(&json!(1)));
        assert!(!number.matches(&json!(1.01)));
    }

    #[test]
    fn enum_membership_is_exact() {
        let status = Matcher::OneOf(vec![json!("available"), json!("sold")]);
        assert!(status.matches(&json!("sold")));
        assert!(!status.matches(&json!("pending")));
        assert!(!status.matches(&json!(null)));
    }

    #[test]
    fn pattern_and_format_via_jsonschema() {
        let code = Matcher::Pattern("^[A-Z]{3}$".into());
        assert!(code.matches(&json!("ABC")));
        assert!(!code.matches(&json!("abcd")));
        assert!(!code.matches(&json!(123)));

        let uuid = Matcher::Format("uuid".into());
        assert!(uuid.matches(&json!("123e4567-e89b-12d3-a456-426614174000")));
        assert!(!uuid.matches(&json!("not-a-uuid")));

        let date = Matcher::Format("date".into());
        assert!(date.matches(&json!("2024-01-15")));
        assert!(!date.matches(&json!("15/01/2024")));
    }

    #[test]
    fn any_of_and_all_of() {
        let either = Matcher::AnyOf(vec![Matcher::AnyString, Matcher::AnyBoolean]);
        assert!(either.matches(&json!(true)));
        assert!(!either.matches(&json!(1)));

        let both = Matcher::AllOf(vec![
            Matcher::Object(vec![("a".into(), Matcher::AnyString)]),
            Matcher::Object(vec![("b".into(), Matcher::AnyBoolean)]),
        ]);
        assert!(both.matches(&json!({"a": "x", "b": false})));
        assert_eq!(check(&both, json!({"a": "x"})).len(), 1);
    }

    #[test]
    fn header_text_checked_as_string_then_scalar() {
        let mut out = Vec::new();
        Matcher::Integer(Bounds::default()).check_text("100", "header X-Rate-Limit", &mut out);
        Matcher::AnyString.check_text("100", "header X-Id", &mut out);
        Matcher::AnyBoolean.check_text("true", "header X-Flag", &mut out);
        assert!(out.is_empty(), "{out:?}");

        Matcher::Integer(Bounds::default()).check_text("lots", "header X-Rate-Limit", &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].location, "header X-Rate-Limit");
    }

    #[test]
    fn dictionary_turns_members_into_literals() {
        let mut matcher = pet();
        let dictionary: DataDictionary = [("name", json!("Rex")), ("tags", json!(["a"]))]
            .into_iter()
            .collect();
        assert_eq!(matcher.apply_dictionary(&dictionary), 2);
        assert!(matcher.matches(&json!({"id": 1, "name": "Rex", "tags": ["a"]})));
        assert!(!matcher.matches(&json!({"id": 1, "name": "Max", "tags": ["a"]})));
    }

    #[test]
    fn literal_numbers_compare_by_value() {
        assert!(Matcher::Literal(json!(1)).matches(&json!(1.0)));
        assert!(!Matcher::Literal(json!("1")).matches(&json!(1)));
    }

    #[test]
    fn long_actual_values_are_shortened() {
        let out = check(&Matcher::AnyBoolean, json!("x".repeat(200)));
        assert!(out[0].actual.ends_with("..."));
        assert!(out[0].actual.len() <= MAX_ACTUAL_LEN + 3);
    }
}
