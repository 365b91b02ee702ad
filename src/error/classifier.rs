//! Ordered rule-based classifier for raw wallet and ledger failures.
//!
//! Raw failures arrive in many shapes: provider errors carrying a numeric
//! code, JSON objects from a wallet bridge, bare strings, or Rust error
//! values. [`RawFailure`] flattens all of them into an optional code plus an
//! optional free-text message, and [`Classifier::normalize`] walks an ordered
//! list of [`ClassificationRule`]s where the first match wins.
//!
//! Rule order is behaviour: moving a rule changes which code ambiguous
//! messages receive (a message containing both "Transaction failed" and
//! "timeout" is a `NETWORK_ERROR` because the network rule comes first).

use std::any::Any;
use std::fmt;

use regex::Regex;
use serde_json::Value;

use super::{ErrorCode, Locale, NormalizedError, Severity};

/// Technical message used when a failure carries no text at all.
pub const UNKNOWN_FAILURE_MESSAGE: &str = "Unknown error occurred";

/// Error code attached to a raw failure, as reported by its source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureCode {
    Numeric(i64),
    Text(String),
}

impl FailureCode {
    /// Numeric value of the code, parsing textual codes such as `"4001"`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// An unclassified failure: whatever a unit of work failed with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawFailure {
    code: Option<FailureCode>,
    message: Option<String>,
}

impl RawFailure {
    /// A failure with neither code nor message.
    pub fn new() -> Self {
        Self::default()
    }

    /// A failure carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: Some(message.into()),
        }
    }

    /// Attaches a numeric provider code.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(FailureCode::Numeric(code));
        self
    }

    /// Attaches a textual provider code.
    pub fn with_text_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(FailureCode::Text(code.into()));
        self
    }

    /// Builds a failure from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let text = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::message(format!("operation panicked: {}", text))
    }

    pub fn code(&self) -> Option<&FailureCode> {
        self.code.as_ref()
    }

    pub fn message_text(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Message for diagnostics, falling back to a fixed placeholder.
    pub fn technical_message(&self) -> &str {
        match self.message.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => UNKNOWN_FAILURE_MESSAGE,
        }
    }
}

impl fmt::Display for RawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.technical_message()),
            None => f.write_str(self.technical_message()),
        }
    }
}

impl std::error::Error for RawFailure {}

impl From<&str> for RawFailure {
    fn from(message: &str) -> Self {
        Self::message(message)
    }
}

impl From<String> for RawFailure {
    fn from(message: String) -> Self {
        Self::message(message)
    }
}

impl From<std::io::Error> for RawFailure {
    fn from(error: std::io::Error) -> Self {
        Self::message(error.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for RawFailure {
    fn from(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::message(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for RawFailure {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::message("request timeout: deadline has elapsed")
    }
}

impl From<Value> for RawFailure {
    /// Reads `code` and `message` fields from JSON objects. A JSON string is
    /// taken as the message; any other value carries neither.
    fn from(value: Value) -> Self {
        match value {
            Value::String(message) => Self::message(message),
            Value::Object(map) => {
                let code = match map.get("code") {
                    Some(Value::Number(n)) => integral_code(n).map(FailureCode::Numeric),
                    Some(Value::String(s)) => Some(FailureCode::Text(s.clone())),
                    _ => None,
                };
                let message = match map.get("message") {
                    Some(Value::String(s)) => Some(s.clone()),
                    _ => None,
                };
                Self { code, message }
            }
            _ => Self::new(),
        }
    }
}

/// Integer value of a JSON number, including floats such as `4001.0`.
fn integral_code(n: &serde_json::Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(f))
            .map(|f| f as i64)
    })
}

/// One entry in the ordered classification table.
///
/// A rule matches when the failure's code is one of `codes`, or its message
/// contains one of `phrases` (case-sensitive) or matches one of `patterns`.
#[derive(Clone, Debug)]
pub struct ClassificationRule {
    code: ErrorCode,
    codes: Vec<i64>,
    phrases: Vec<String>,
    patterns: Vec<Regex>,
    severity: Option<Severity>,
    description: String,
}

impl ClassificationRule {
    /// Creates a rule that assigns `code` and matches nothing until codes,
    /// phrases or patterns are added.
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            codes: Vec::new(),
            phrases: Vec::new(),
            patterns: Vec::new(),
            severity: None,
            description: description.into(),
        }
    }

    /// Adds provider codes that trigger this rule.
    pub fn with_codes(mut self, codes: &[i64]) -> Self {
        self.codes.extend_from_slice(codes);
        self
    }

    /// Adds a literal substring that triggers this rule.
    pub fn with_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrases.push(phrase.into());
        self
    }

    /// Adds a regex that triggers this rule.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Overrides the taxonomy severity for errors produced by this rule.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// True when the failure carries one of this rule's provider codes.
    pub fn matches_code(&self, raw: &RawFailure) -> bool {
        raw.code()
            .and_then(FailureCode::as_i64)
            .is_some_and(|code| self.codes.contains(&code))
    }

    /// True when the failure's message contains a phrase or matches a pattern.
    pub fn matches_message(&self, raw: &RawFailure) -> bool {
        let Some(message) = raw.message_text() else {
            return false;
        };
        self.phrases.iter().any(|p| message.contains(p.as_str()))
            || self.patterns.iter().any(|r| r.is_match(message))
    }

    pub fn matches(&self, raw: &RawFailure) -> bool {
        self.matches_code(raw) || self.matches_message(raw)
    }
}

/// Maps raw failures to [`NormalizedError`]s.
#[derive(Clone, Debug)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
    locale: Locale,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Creates a classifier with the standard wallet rules and English templates.
    pub fn new() -> Self {
        Self {
            rules: Self::default_rules(),
            locale: Locale::En,
        }
    }

    /// Creates a classifier with custom rules. Unmatched failures still fall
    /// back to `UNKNOWN_ERROR`.
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self {
            rules,
            locale: Locale::En,
        }
    }

    /// Selects the template language for user messages.
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// The standard ordered rule table.
    pub fn default_rules() -> Vec<ClassificationRule> {
        vec![
            ClassificationRule::new(ErrorCode::UserRejected, "User rejected the request")
                .with_codes(&[4001])
                .with_phrase("User rejected")
                .with_phrase("user rejected"),
            ClassificationRule::new(ErrorCode::WalletNotFound, "Wallet provider not found")
                .with_codes(&[4100])
                .with_phrase("wallet not found")
                .with_phrase("No provider"),
            ClassificationRule::new(ErrorCode::WalletLocked, "Wallet is locked")
                .with_phrase("wallet is locked")
                .with_phrase("Wallet locked"),
            ClassificationRule::new(ErrorCode::InsufficientFunds, "Insufficient balance")
                .with_phrase("insufficient funds")
                .with_phrase("Insufficient SOL"),
            ClassificationRule::new(ErrorCode::NetworkError, "Network or timeout failure")
                .with_phrase("network")
                .with_phrase("fetch")
                .with_phrase("timeout"),
            ClassificationRule::new(ErrorCode::UnsupportedMethod, "Unsupported wallet method")
                .with_codes(&[4200])
                .with_phrase("Unsupported method")
                .with_phrase("not supported"),
            ClassificationRule::new(ErrorCode::TransactionFailed, "Transaction failure")
                .with_phrase("Transaction failed")
                .with_phrase("simulation failed"),
            ClassificationRule::new(ErrorCode::ConnectionFailed, "Wallet connection failure")
                .with_phrase("Failed to connect")
                .with_phrase("Connection failed"),
        ]
    }

    /// Appends a rule after the existing ones.
    pub fn add_rule(&mut self, rule: ClassificationRule) {
        self.rules.push(rule);
    }

    /// Inserts a rule at `index`, ahead of lower-priority rules. Indexes past
    /// the end append.
    pub fn insert_rule(&mut self, index: usize, rule: ClassificationRule) {
        let index = index.min(self.rules.len());
        self.rules.insert(index, rule);
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Returns the first rule matching the failure, if any.
    pub fn matching_rule(&self, raw: &RawFailure) -> Option<&ClassificationRule> {
        self.rules.iter().find(|rule| rule.matches(raw))
    }

    /// Returns the code the failure would be classified as, without logging.
    pub fn classify_code(&self, raw: &RawFailure) -> ErrorCode {
        self.matching_rule(raw)
            .map(ClassificationRule::code)
            .unwrap_or(ErrorCode::UnknownError)
    }

    /// Classifies a raw failure produced by `operation`.
    ///
    /// Total: every input yields a [`NormalizedError`]. Emits one diagnostic
    /// log entry per call.
    pub fn normalize(&self, raw: &RawFailure, operation: &str) -> NormalizedError {
        let rule = self.matching_rule(raw);
        let code = rule
            .map(ClassificationRule::code)
            .unwrap_or(ErrorCode::UnknownError);

        let mut error = NormalizedError::new(code, raw.technical_message(), self.locale, operation);
        if let Some(severity) = rule.and_then(|r| r.severity) {
            error = error.with_severity(severity);
        }

        let timestamp = error.occurred_at().to_rfc3339();
        if error.severity().is_intrusive() {
            tracing::error!(
                code = %error.code(),
                raw_message = raw.technical_message(),
                operation,
                severity = %error.severity(),
                timestamp = %timestamp,
                "{} failed",
                operation
            );
        } else {
            tracing::warn!(
                code = %error.code(),
                raw_message = raw.technical_message(),
                operation,
                severity = %error.severity(),
                timestamp = %timestamp,
                "{} failed",
                operation
            );
        }

        error
    }
}
