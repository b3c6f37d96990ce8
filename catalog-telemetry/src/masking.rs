//! Pattern-based redaction of sensitive values before they reach logs.
//!
//! A [`Masker`] holds an ordered list of [`SensitivePattern`]s. Each pattern
//! scans the output of the previous one, so order matters: key/value
//! credentials are masked before the generic number and address detectors
//! get a chance to partially reveal them.
//!
//! Detection is best-effort. Anything the patterns miss passes through
//! verbatim; masking never fails and never drops input.

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::{TelemetryError, TelemetryResult};

/// Replacement written in place of a fully redacted value.
pub const MASK: &str = "[MASKED]";

/// Field-name fragments that mark a structured value as sensitive.
pub const SENSITIVE_FIELD_FRAGMENTS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "authorization",
    "credential",
    "email",
    "ssn",
    "credit_card",
    "card_number",
    "cvv",
    "phone",
    "jwt",
];

/// Field-name segments that only count when they stand alone (`client_ip`
/// yes, `description` no).
pub const SENSITIVE_FIELD_SEGMENTS: &[&str] = &["ip"];

/// Header names whose values are never logged.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "x-csrf-token",
    "proxy-authorization",
];

/// A value in quotes runs to the closing quote, escapes included.
const KV_QUOTED: &str = r#"(?P<qsep>"?\s*[:=]\s*")(?P<quoted>(?:[^"\\]|\\.)*)""#;
const KV_BARE: &str = r#"(?P<sep>"?\s*[:=]\s*"?)(?P<value>[^\s,;&"'}]+)"#;

/// Capture groups holding the part of a match to rewrite, in lookup order.
const VALUE_GROUPS: [&str; 2] = ["value", "quoted"];

/// How a detected substring is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskStrategy {
    /// Replace the value with [`MASK`].
    ReplaceValue,
    /// Star every digit except the last `n`; separators survive.
    PartialRevealSuffix(usize),
    /// Keep the first `n` dot-separated segments, star the rest.
    PartialRevealPrefix(usize),
    /// Keep two characters of the local part and the whole domain.
    MaskDomainPreserving,
}

impl MaskStrategy {
    pub fn apply(&self, value: &str) -> String {
        match *self {
            MaskStrategy::ReplaceValue => MASK.to_string(),
            MaskStrategy::PartialRevealSuffix(keep) => reveal_digit_suffix(value, keep),
            MaskStrategy::PartialRevealPrefix(keep) => reveal_segment_prefix(value, keep),
            MaskStrategy::MaskDomainPreserving => mask_email(value),
        }
    }
}

fn reveal_digit_suffix(value: &str, keep: usize) -> String {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    let hidden = digits.saturating_sub(keep);
    let mut seen = 0;

    value
        .chars()
        .map(|c| {
            if c.is_ascii_digit() {
                seen += 1;
                if seen <= hidden {
                    return '*';
                }
            }
            c
        })
        .collect()
}

fn reveal_segment_prefix(value: &str, keep: usize) -> String {
    value
        .split('.')
        .enumerate()
        .map(|(i, segment)| if i < keep { segment } else { "***" })
        .collect::<Vec<_>>()
        .join(".")
}

fn mask_email(value: &str) -> String {
    match value.split_once('@') {
        Some((local, domain)) => {
            let visible: String = local.chars().take(2).collect();
            format!("{visible}***@{domain}")
        }
        None => MASK.to_string(),
    }
}

/// A named detector plus the strategy applied to what it finds.
///
/// When the regex defines a `value` (or `quoted`) capture group only that
/// group is rewritten and the rest of the match (key, separator, quotes) is
/// kept.
#[derive(Debug, Clone)]
pub struct SensitivePattern {
    name: String,
    regex: Regex,
    strategy: MaskStrategy,
}

impl SensitivePattern {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        strategy: MaskStrategy,
    ) -> TelemetryResult<Self> {
        let regex = Regex::new(pattern).map_err(|source| TelemetryError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            name: name.into(),
            regex,
            strategy,
        })
    }

    fn key_value(name: &str, key: &str) -> TelemetryResult<Self> {
        let pattern = format!(r"(?i)\b(?P<key>[\w-]*(?:{key}))(?:{KV_QUOTED}|{KV_BARE})");
        Self::new(name, &pattern, MaskStrategy::ReplaceValue)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> MaskStrategy {
        self.strategy
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn apply(&self, text: &str) -> String {
        self.regex
            .replace_all(text, |caps: &Captures<'_>| self.rewrite(caps))
            .into_owned()
    }

    fn rewrite(&self, caps: &Captures<'_>) -> String {
        let whole = &caps[0];
        let Some(value) = VALUE_GROUPS.iter().find_map(|group| caps.name(group)) else {
            return self.strategy.apply(whole);
        };

        let offset = caps.get(0).map_or(0, |m| m.start());
        let start = value.start() - offset;
        let end = value.end() - offset;

        format!(
            "{}{}{}",
            &whole[..start],
            self.strategy.apply(value.as_str()),
            &whole[end..]
        )
    }
}

/// Built-in detectors in application order.
pub fn default_patterns() -> Vec<SensitivePattern> {
    let built = [
        SensitivePattern::key_value("password", "password|passwd|pwd"),
        SensitivePattern::key_value("token", "token"),
        SensitivePattern::key_value("secret", "secret"),
        SensitivePattern::key_value("api_key", "api[_-]?key"),
        SensitivePattern::new(
            "bearer",
            r"(?i)\b(?P<key>bearer)(?P<sep>\s+)(?P<value>[A-Za-z0-9\-._~+/]+=*)",
            MaskStrategy::ReplaceValue,
        ),
        SensitivePattern::new(
            "jwt",
            r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+",
            MaskStrategy::PartialRevealPrefix(1),
        ),
        SensitivePattern::new(
            "credit_card",
            r"\b(?:\d{4}[- ]?){3}\d{4}\b",
            MaskStrategy::PartialRevealSuffix(4),
        ),
        SensitivePattern::new(
            "ssn",
            r"\b\d{3}-\d{2}-\d{4}\b",
            MaskStrategy::PartialRevealSuffix(4),
        ),
        SensitivePattern::new(
            "phone",
            r"(?:\+\d{1,3}[-. ]?)?(?:\(\d{3}\)\s?|\b\d{3}[-. ])\d{3}[-. ]\d{4}\b",
            MaskStrategy::PartialRevealSuffix(4),
        ),
        SensitivePattern::new(
            "email",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            MaskStrategy::MaskDomainPreserving,
        ),
        SensitivePattern::new(
            "ipv4",
            r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
            MaskStrategy::PartialRevealPrefix(3),
        ),
    ];

    built
        .into_iter()
        .filter_map(|pattern| match pattern {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(error = %e, "Skipping built-in masking pattern");
                None
            }
        })
        .collect()
}

/// Immutable redactor shared across requests.
#[derive(Debug, Clone)]
pub struct Masker {
    patterns: Vec<SensitivePattern>,
}

impl Masker {
    pub fn new(patterns: Vec<SensitivePattern>) -> Self {
        Self { patterns }
    }

    /// Built-in patterns followed by operator-supplied regexes.
    ///
    /// Extra patterns use [`MaskStrategy::ReplaceValue`]; a regex with a
    /// `value` group masks only that group. Invalid regexes are logged and
    /// skipped.
    pub fn with_extra_patterns<S: AsRef<str>>(extra: &[S]) -> Self {
        let mut patterns = default_patterns();

        for (index, raw) in extra.iter().enumerate() {
            let raw = raw.as_ref();
            match SensitivePattern::new(format!("custom_{index}"), raw, MaskStrategy::ReplaceValue) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => warn!(error = %e, "Ignoring invalid custom masking pattern"),
            }
        }

        Self::new(patterns)
    }

    pub fn patterns(&self) -> &[SensitivePattern] {
        &self.patterns
    }

    /// Run every pattern over `input` in order.
    pub fn mask_str(&self, input: &str) -> String {
        self.patterns
            .iter()
            .fold(input.to_string(), |text, pattern| pattern.apply(&text))
    }

    /// Mask the top level of a JSON object.
    ///
    /// Values under sensitive keys are replaced outright; other strings go
    /// through [`Masker::mask_str`]; everything else is copied as is.
    pub fn mask_fields(&self, fields: &Map<String, Value>) -> Map<String, Value> {
        fields
            .iter()
            .map(|(key, value)| {
                let masked = if is_sensitive_field(key) {
                    Value::String(MASK.to_string())
                } else {
                    match value {
                        Value::String(s) => Value::String(self.mask_str(s)),
                        other => other.clone(),
                    }
                };
                (key.clone(), masked)
            })
            .collect()
    }

    /// Render headers for logging. Sensitive headers are masked whole and
    /// the rest go through [`Masker::mask_str`].
    pub fn mask_headers<'a, I>(&self, headers: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        headers
            .into_iter()
            .map(|(name, raw)| {
                let value = if is_sensitive_header(name) {
                    MASK.to_string()
                } else {
                    match std::str::from_utf8(raw) {
                        Ok(text) => self.mask_str(text),
                        Err(_) => "[INVALID UTF-8]".to_string(),
                    }
                };
                (name.to_ascii_lowercase(), value)
            })
            .collect()
    }
}

impl Default for Masker {
    fn default() -> Self {
        Self::new(default_patterns())
    }
}

/// Lowercased words of a field name, split on `_`, `-`, `.` and on
/// lower-to-upper case changes (`remoteIP` -> `remote`, `ip`).
fn field_segments(name: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut after_lower = false;

    for c in name.chars() {
        if matches!(c, '_' | '-' | '.') {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            after_lower = false;
            continue;
        }
        if c.is_uppercase() && after_lower {
            segments.push(std::mem::take(&mut current));
        }
        after_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

pub fn is_sensitive_field(name: &str) -> bool {
    let lower = name.to_lowercase();

    SENSITIVE_FIELD_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment))
        || field_segments(name)
            .iter()
            .any(|segment| SENSITIVE_FIELD_SEGMENTS.contains(&segment.as_str()))
}

pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}
