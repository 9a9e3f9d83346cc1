use std::time::Duration;

use protoframe_sandbox::{execute_with_deadline, Sandbox, ScriptContext};
use regex::Regex;
use serde_json::Value;

use crate::validation::{MatchType, ValidationRule};

/// Result of checking one frame against a pending validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
    /// Not decided by this frame; keep waiting.
    Pending,
}

/// A [`ValidationRule`] prepared for repeated evaluation.
///
/// Regexes are compiled once at registration; an invalid pattern fails the
/// validation on the first frame it sees.
#[derive(Debug, Clone)]
pub enum Matcher {
    AlwaysPass,
    Contains(String),
    Regex(Regex),
    InvalidRegex { pattern: String, error: String },
    Script(String),
}

impl Matcher {
    pub fn compile(rule: &ValidationRule) -> Self {
        match rule {
            ValidationRule::AlwaysPass => Self::AlwaysPass,
            ValidationRule::Pattern {
                match_type: MatchType::Contains,
                pattern,
            } => Self::Contains(pattern.clone()),
            ValidationRule::Pattern {
                match_type: MatchType::Regex,
                pattern,
            } => match Regex::new(pattern) {
                Ok(regex) => Self::Regex(regex),
                Err(err) => Self::InvalidRegex {
                    pattern: pattern.clone(),
                    error: err.to_string(),
                },
            },
            ValidationRule::Script { script } => Self::Script(script.clone()),
        }
    }

    /// Evaluate `raw` (decoded lossily as UTF-8 text).
    ///
    /// Script errors are logged and downgrade to [`Verdict::Pending`] so a
    /// partial frame can be retried with the next one.
    pub async fn evaluate(&self, raw: &[u8], sandbox: Option<&dyn Sandbox>, script_timeout: Duration) -> Verdict {
        match self {
            Self::AlwaysPass => Verdict::Pass,
            Self::Contains(pattern) => {
                if String::from_utf8_lossy(raw).contains(pattern.as_str()) {
                    Verdict::Pass
                } else {
                    Verdict::Pending
                }
            }
            Self::Regex(regex) => {
                if regex.is_match(&String::from_utf8_lossy(raw)) {
                    Verdict::Pass
                } else {
                    Verdict::Pending
                }
            }
            Self::InvalidRegex { pattern, error } => {
                tracing::error!(%pattern, %error, "invalid validation regex");
                Verdict::Fail(format!("invalid regex '{pattern}': {error}"))
            }
            Self::Script(script) => {
                let Some(sandbox) = sandbox else {
                    tracing::warn!("SCRIPT validation without a sandbox; waiting");
                    return Verdict::Pending;
                };
                let context = ScriptContext::new()
                    .bind("data", Value::String(String::from_utf8_lossy(raw).into_owned()))
                    .bind("raw", Value::from(raw.to_vec()));
                match execute_with_deadline(sandbox, script, context, script_timeout).await {
                    Ok(value) => script_verdict(value),
                    Err(err) => {
                        tracing::warn!(error = %err, "validation script failed; waiting");
                        Verdict::Pending
                    }
                }
            }
        }
    }
}

/// Map a validation script's return value: `true` passes, a string is a failure
/// reason, `null`/`false` keeps waiting. Anything else is logged and ignored.
fn script_verdict(value: Value) -> Verdict {
    match value {
        Value::Bool(true) => Verdict::Pass,
        Value::String(reason) => Verdict::Fail(reason),
        Value::Null | Value::Bool(false) => Verdict::Pending,
        other => {
            tracing::warn!(value = %other, "validation script returned an unexpected value; waiting");
            Verdict::Pending
        }
    }
}
