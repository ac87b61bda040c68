//! Field validation for step submissions.
//!
//! Rules are declared per field and can be written in the pipe syntax used by
//! most server frameworks (`"required|string|max:255"`). A field that is absent
//! or blank only fails when it carries [`Rule::Required`]; every other rule is
//! skipped for it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Field name to the ordered rules applied to it
pub type RuleSet = BTreeMap<String, Vec<Rule>>;

/// Custom messages keyed by `field.rule` or by `rule`
pub type Messages = HashMap<String, String>;

/// A single validation rule
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    Nullable,
    Numeric,
    Integer,
    String,
    Boolean,
    Accepted,
    Email,
    Min(f64),
    Max(f64),
    In(Vec<String>),
}

/// Errors raised while parsing a rule declaration
#[derive(Debug, Error, PartialEq)]
pub enum RuleParseError {
    #[error("unknown validation rule: {0}")]
    Unknown(String),
    #[error("rule '{rule}' needs a numeric parameter, got '{param}'")]
    BadParameter { rule: String, param: String },
    #[error("rule '{0}' needs a parameter")]
    MissingParameter(String),
}

impl Rule {
    /// Rule name used for message lookup
    pub fn key(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Nullable => "nullable",
            Rule::Numeric => "numeric",
            Rule::Integer => "integer",
            Rule::String => "string",
            Rule::Boolean => "boolean",
            Rule::Accepted => "accepted",
            Rule::Email => "email",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::In(_) => "in",
        }
    }

    /// Allow-list rule built from integers, e.g. the reachable step numbers
    pub fn in_range(range: std::ops::RangeInclusive<u32>) -> Self {
        Rule::In(range.map(|n| n.to_string()).collect())
    }

    fn passes(&self, value: &Value, numeric_field: bool) -> bool {
        match self {
            Rule::Required => !is_blank(value),
            Rule::Nullable => true,
            Rule::Numeric => as_number(value).is_some(),
            Rule::Integer => match value {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                Value::String(s) => s.trim().parse::<i64>().is_ok(),
                _ => false,
            },
            Rule::String => value.is_string(),
            Rule::Boolean => {
                value.is_boolean() || matches!(scalar_string(value).as_deref(), Some("0" | "1"))
            }
            Rule::Accepted => is_truthy(value),
            Rule::Email => value
                .as_str()
                .map(|s| EMAIL_RE.is_match(s))
                .unwrap_or(false),
            Rule::Min(min) => size_of(value, numeric_field).is_some_and(|size| size >= *min),
            Rule::Max(max) => size_of(value, numeric_field).is_some_and(|size| size <= *max),
            Rule::In(allowed) => scalar_string(value)
                .map(|s| allowed.iter().any(|a| *a == s))
                .unwrap_or(false),
        }
    }

    fn default_message(&self, attribute: &str, numeric_field: bool) -> String {
        match self {
            Rule::Required => format!("The {attribute} field is required."),
            Rule::Nullable => String::new(),
            Rule::Numeric => format!("The {attribute} field must be a number."),
            Rule::Integer => format!("The {attribute} field must be an integer."),
            Rule::String => format!("The {attribute} field must be a string."),
            Rule::Boolean => format!("The {attribute} field must be true or false."),
            Rule::Accepted => format!("The {attribute} field must be accepted."),
            Rule::Email => format!("The {attribute} field must be a valid email address."),
            Rule::Min(min) if numeric_field => {
                format!("The {attribute} field must be at least {min}.")
            }
            Rule::Min(min) => format!("The {attribute} field must be at least {min} characters."),
            Rule::Max(max) if numeric_field => {
                format!("The {attribute} field must not be greater than {max}.")
            }
            Rule::Max(max) => {
                format!("The {attribute} field must not be greater than {max} characters.")
            }
            Rule::In(_) => format!("The selected {attribute} is invalid."),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Min(n) | Rule::Max(n) => write!(f, "{}:{}", self.key(), n),
            Rule::In(values) => write!(f, "in:{}", values.join(",")),
            _ => f.write_str(self.key()),
        }
    }
}

impl FromStr for Rule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, param) = match s.split_once(':') {
            Some((name, param)) => (name.trim(), Some(param.trim())),
            None => (s.trim(), None),
        };

        let numeric_param = |rule: &str| -> Result<f64, RuleParseError> {
            let param = param.ok_or_else(|| RuleParseError::MissingParameter(rule.to_string()))?;
            param.parse().map_err(|_| RuleParseError::BadParameter {
                rule: rule.to_string(),
                param: param.to_string(),
            })
        };

        match name {
            "required" => Ok(Rule::Required),
            "nullable" => Ok(Rule::Nullable),
            "numeric" => Ok(Rule::Numeric),
            "integer" => Ok(Rule::Integer),
            "string" => Ok(Rule::String),
            "boolean" => Ok(Rule::Boolean),
            "accepted" => Ok(Rule::Accepted),
            "email" => Ok(Rule::Email),
            "min" => numeric_param("min").map(Rule::Min),
            "max" => numeric_param("max").map(Rule::Max),
            "in" => {
                let param = param.ok_or_else(|| RuleParseError::MissingParameter("in".into()))?;
                Ok(Rule::In(
                    param.split(',').map(|v| v.trim().to_string()).collect(),
                ))
            }
            other => Err(RuleParseError::Unknown(other.to_string())),
        }
    }
}

/// Parse a pipe-separated rule list such as `"required|max:255"`
pub fn parse_rules(pattern: &str) -> Result<Vec<Rule>, RuleParseError> {
    pattern.split('|')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Field-keyed validation failures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field).first().map(String::as_str)
    }

    /// Fields that failed, in sorted order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// First message plus a count of the remaining ones
    pub fn summary(&self) -> String {
        let Some(first) = self.errors.values().flatten().next() else {
            return "The given data was invalid.".to_string();
        };
        match self.len() - 1 {
            0 => first.clone(),
            1 => format!("{first} (and 1 more error)"),
            n => format!("{first} (and {n} more errors)"),
        }
    }

    /// Body of a 422 response
    pub fn to_json(&self) -> Value {
        json!({
            "message": self.summary(),
            "errors": self.errors,
        })
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate `input` against `rules`, returning the validated subset.
///
/// Only fields named in `rules` and present in `input` are returned.
pub fn validate(
    input: &Map<String, Value>,
    rules: &RuleSet,
    messages: &Messages,
) -> Result<Map<String, Value>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut validated = Map::new();

    for (field, field_rules) in rules {
        let value = input.get(field);
        let numeric_field = field_rules
            .iter()
            .any(|r| matches!(r, Rule::Numeric | Rule::Integer));
        let attribute = field.replace('_', " ");

        let value = match value {
            Some(value) if !is_blank(value) => value,
            blank => {
                // Required and accepted fail on absent input; other rules are skipped
                let implicit = field_rules
                    .iter()
                    .find(|r| matches!(r, Rule::Required | Rule::Accepted));
                if let Some(rule) = implicit {
                    errors.add(
                        field.clone(),
                        message_for(messages, field, rule, &attribute, numeric_field),
                    );
                } else if let Some(value) = blank {
                    validated.insert(field.clone(), value.clone());
                }
                continue;
            }
        };

        let mut field_ok = true;
        for rule in field_rules {
            if !rule.passes(value, numeric_field) {
                field_ok = false;
                errors.add(
                    field.clone(),
                    message_for(messages, field, rule, &attribute, numeric_field),
                );
            }
        }
        if field_ok {
            validated.insert(field.clone(), value.clone());
        }
    }

    if errors.is_empty() {
        Ok(validated)
    } else {
        Err(errors)
    }
}

fn message_for(
    messages: &Messages,
    field: &str,
    rule: &Rule,
    attribute: &str,
    numeric_field: bool,
) -> String {
    messages
        .get(&format!("{field}.{}", rule.key()))
        .or_else(|| messages.get(rule.key()))
        .map(|custom| custom.replace(":attribute", attribute))
        .unwrap_or_else(|| rule.default_message(attribute, numeric_field))
}

/// Null, whitespace-only strings and empty collections count as blank
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Truthiness of a submitted flag (`1`, `true`, `on`, `yes`)
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 1.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        _ => false,
    }
}

/// Numeric view of a value, accepting numeric strings
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some("0".to_string()),
        _ => None,
    }
}

fn size_of(value: &Value, numeric_field: bool) -> Option<f64> {
    if numeric_field {
        return as_number(value);
    }
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(a) => Some(a.len() as f64),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
