//! Turning a passing response into named variables.

use std::sync::Arc;
use std::time::Duration;

use protoframe_codec::expression::{apply_transform, eval_bool};
use protoframe_codec::ParseResult;
use protoframe_sandbox::{execute_with_deadline, CollectingHost, Sandbox, ScriptContext};
use regex::Regex;
use serde_json::{Map, Value};

use crate::validation::{RegexExtraction, ResponsePattern};

/// Copy decoded structure fields into variables.
///
/// Each pattern's `condition` is evaluated over the numeric fields; patterns whose
/// condition is false or fails to evaluate are skipped. A failing `transform`
/// leaves that variable unset.
pub fn extract_variables(parse_result: &ParseResult, patterns: &[ResponsePattern]) -> Map<String, Value> {
    let numeric: Vec<(&str, f64)> = parse_result
        .fields
        .iter()
        .filter_map(|(name, field)| field.value.as_f64().map(|v| (name.as_str(), v)))
        .collect();

    let mut variables = Map::new();
    for pattern in patterns {
        if let Some(condition) = pattern.condition.as_deref().filter(|c| !c.trim().is_empty()) {
            match eval_bool(condition, numeric.iter().copied()) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    tracing::warn!(%condition, error = %err, "extraction condition failed");
                    continue;
                }
            }
        }

        for extraction in &pattern.extractions {
            let Some(field) = parse_result.fields.get(&extraction.element) else {
                tracing::debug!(element = %extraction.element, "extraction element not in response");
                continue;
            };
            let value = match (extraction.transform.as_deref(), field.value.as_f64()) {
                (Some(transform), Some(number)) if !transform.trim().is_empty() => {
                    match apply_transform(transform, number) {
                        Ok(result) => json_number(result),
                        Err(err) => {
                            tracing::warn!(variable = %extraction.variable_name, error = %err, "extraction transform failed");
                            continue;
                        }
                    }
                }
                _ => field.value.to_json(),
            };
            variables.insert(extraction.variable_name.clone(), value);
        }
    }
    variables
}

/// Copy named capture groups from `text` into variables.
///
/// Invalid patterns are logged and skipped.
pub fn extract_regex(text: &str, extractions: &[RegexExtraction]) -> Map<String, Value> {
    let mut variables = Map::new();
    for extraction in extractions {
        let regex = match Regex::new(&extraction.pattern) {
            Ok(regex) => regex,
            Err(err) => {
                tracing::error!(pattern = %extraction.pattern, error = %err, "invalid extraction regex");
                continue;
            }
        };
        let Some(captures) = regex.captures(text) else {
            continue;
        };

        if extraction.variables.is_empty() {
            for name in regex.capture_names().flatten() {
                if let Some(m) = captures.name(name) {
                    variables.insert(name.to_string(), Value::String(m.as_str().to_string()));
                }
            }
        } else {
            for var in &extraction.variables {
                if let Some(m) = captures.name(&var.group) {
                    variables.insert(var.variable_name.clone(), Value::String(m.as_str().to_string()));
                }
            }
        }
    }
    variables
}

/// Run a transform script with `{params, data, raw}` bound and `setVar`/`log` available.
///
/// Returns the variables the script set. A failing script is logged and yields
/// no variables.
pub async fn run_transform_script(
    sandbox: &dyn Sandbox,
    script: &str,
    params: &Map<String, Value>,
    raw: &[u8],
    deadline: Duration,
) -> Map<String, Value> {
    let host = Arc::new(CollectingHost::new());
    let context = ScriptContext::new()
        .bind("params", Value::Object(params.clone()))
        .bind("data", Value::String(String::from_utf8_lossy(raw).into_owned()))
        .bind("raw", Value::from(raw.to_vec()))
        .with_host(host.clone());

    match execute_with_deadline(sandbox, script, context, deadline).await {
        Ok(_) => host.variables(),
        Err(err) => {
            tracing::warn!(error = %err, "transform script failed; variables not set");
            Map::new()
        }
    }
}

fn json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}
