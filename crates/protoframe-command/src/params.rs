use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CommandError, Result};
use crate::model::{CommandParameter, ParameterType};

static TOKEN: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.-]*)\}"));

// Stand-ins for escaped braces while tokens are replaced.
const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

/// Result of [`substitute_parameters`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubstitutionOutcome {
    pub text: String,
    /// `{token}`s left in the template, in order of appearance.
    pub unresolved: Vec<String>,
}

/// Merge parameter defaults with user values.
///
/// User values win; empty strings and `null` count as absent. Fails on the first
/// required parameter left without a value, and on values that do not fit their
/// declared type. Values for undeclared names are passed through.
pub fn resolve_parameter_values(parameters: &[CommandParameter], user_values: &Map<String, Value>) -> Result<Map<String, Value>> {
    let mut resolved = user_values.clone();
    for param in parameters {
        let value = user_values
            .get(&param.name)
            .filter(|v| !is_empty(v))
            .or_else(|| param.default_value.as_ref().filter(|v| !is_empty(v)));

        match value {
            Some(value) => {
                validate_parameter_value(param, value)?;
                resolved.insert(param.name.clone(), value.clone());
            }
            None if param.required => {
                return Err(CommandError::RequiredParameterMissing {
                    name: param.name.clone(),
                });
            }
            None => {}
        }
    }
    Ok(resolved)
}

/// Check `value` against the parameter's type, range and enum options.
pub fn validate_parameter_value(param: &CommandParameter, value: &Value) -> Result<()> {
    let invalid = |reason: String| CommandError::InvalidParameter {
        name: param.name.clone(),
        reason,
    };

    match param.param_type {
        ParameterType::String => Ok(()),
        ParameterType::Integer | ParameterType::Float => {
            let number = as_number(value).ok_or_else(|| invalid(format!("{value} is not a number")))?;
            if param.param_type == ParameterType::Integer && number.fract() != 0.0 {
                return Err(invalid(format!("{number} is not an integer")));
            }
            if let Some(min) = param.min.filter(|min| number < *min) {
                return Err(invalid(format!("{number} is below minimum {min}")));
            }
            if let Some(max) = param.max.filter(|max| number > *max) {
                return Err(invalid(format!("{number} is above maximum {max}")));
            }
            Ok(())
        }
        ParameterType::Boolean => as_bool(value)
            .map(|_| ())
            .ok_or_else(|| invalid(format!("{value} is not a boolean"))),
        ParameterType::Enum => {
            let raw = raw_string(value);
            if param.options.is_empty() || param.options.iter().any(|o| o.value == raw) {
                Ok(())
            } else {
                Err(invalid(format!("'{raw}' is not one of the allowed options")))
            }
        }
    }
}

/// Render a value the way it is written into a payload template.
pub fn format_parameter_value(param_type: ParameterType, value: &Value) -> String {
    match param_type {
        ParameterType::String | ParameterType::Enum => raw_string(value),
        ParameterType::Integer => match as_number(value) {
            Some(n) => format!("{}", n.trunc() as i64),
            None => raw_string(value),
        },
        ParameterType::Float => match as_number(value) {
            Some(n) => format!("{n}"),
            None => raw_string(value),
        },
        ParameterType::Boolean => match as_bool(value) {
            Some(true) => "1".to_string(),
            Some(false) => "0".to_string(),
            None => raw_string(value),
        },
    }
}

/// Replace `{name}` tokens in `template` with the formatted values of declared parameters.
///
/// Tokens are resolved in one pass over the template, so text coming from a value
/// is never scanned for tokens again. Parameters with no value (or an empty one)
/// are left as tokens. `\{` and `\}` become literal braces and are never treated
/// as tokens. Remaining tokens are reported and logged, not rejected.
pub fn substitute_parameters(
    template: &str,
    values: &Map<String, Value>,
    parameters: &[CommandParameter],
) -> SubstitutionOutcome {
    let masked = template.replace("\\{", &OPEN.to_string()).replace("\\}", &CLOSE.to_string());

    let token = match TOKEN.as_ref() {
        Ok(token) => token,
        Err(err) => {
            tracing::error!(error = %err, "template token pattern failed to compile");
            return SubstitutionOutcome {
                text: unmask(&masked),
                unresolved: Vec::new(),
            };
        }
    };

    let mut unresolved = Vec::new();
    let text = token.replace_all(&masked, |caps: &Captures<'_>| {
        let name = &caps[1];
        let resolved = parameters.iter().find(|p| p.name == name).and_then(|param| {
            values
                .get(&param.name)
                .filter(|v| !is_empty(v))
                .map(|value| format_parameter_value(param.param_type, value))
        });
        resolved.unwrap_or_else(|| {
            unresolved.push(name.to_string());
            caps[0].to_string()
        })
    });
    if !unresolved.is_empty() {
        tracing::warn!(tokens = ?unresolved, "template tokens left unresolved");
    }

    SubstitutionOutcome {
        text: unmask(&text),
        unresolved,
    }
}

fn unmask(text: &str) -> String {
    text.replace(OPEN, "{").replace(CLOSE, "}")
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn raw_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Some(true),
            "false" | "0" | "off" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn values(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn gcode_params() -> Vec<CommandParameter> {
        vec![
            CommandParameter::new("code", ParameterType::Integer).required(),
            CommandParameter::new("x", ParameterType::Float),
        ]
    }

    #[test]
    fn substitutes_declared_parameters() {
        let out = substitute_parameters("G{code} X{x}", &values(json!({ "code": 1, "x": 10 })), &gcode_params());
        assert_eq!(out.text, "G1 X10");
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn formats_by_type() {
        assert_eq!(format_parameter_value(ParameterType::Integer, &json!(12.9)), "12");
        assert_eq!(format_parameter_value(ParameterType::Integer, &json!("-3.7")), "-3");
        assert_eq!(format_parameter_value(ParameterType::Float, &json!(1.5)), "1.5");
        assert_eq!(format_parameter_value(ParameterType::Boolean, &json!(true)), "1");
        assert_eq!(format_parameter_value(ParameterType::Boolean, &json!("off")), "0");
        assert_eq!(format_parameter_value(ParameterType::Enum, &json!("FAST")), "FAST");
        assert_eq!(format_parameter_value(ParameterType::String, &json!("AT+CSQ")), "AT+CSQ");
    }

    #[test]
    fn escaped_braces_and_unresolved_tokens() {
        let params = vec![CommandParameter::new("name", ParameterType::String)];
        let out = substitute_parameters(r#"\{"n":"{name}"\} {other}"#, &values(json!({ "name": "x" })), &params);
        assert_eq!(out.text, r#"{"n":"x"} {other}"#);
        assert_eq!(out.unresolved, vec!["other".to_string()]);

        let out = substitute_parameters(r"\{name\}", &values(json!({ "name": "x" })), &params);
        assert_eq!(out.text, "{name}");
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let params = vec![
            CommandParameter::new("a", ParameterType::String),
            CommandParameter::new("b", ParameterType::String),
        ];
        let out = substitute_parameters("A={a} B={b}", &values(json!({ "a": "{b}", "b": "X" })), &params);
        assert_eq!(out.text, "A={b} B=X");
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn empty_values_stay_as_tokens() {
        let params = vec![CommandParameter::new("a", ParameterType::String)];
        let out = substitute_parameters("X{a}", &values(json!({ "a": "" })), &params);
        assert_eq!(out.text, "X{a}");
        assert_eq!(out.unresolved, vec!["a".to_string()]);
    }

    #[test]
    fn required_parameter_missing() {
        let err = resolve_parameter_values(&gcode_params(), &values(json!({ "x": 1 }))).unwrap_err();
        assert_eq!(err, CommandError::RequiredParameterMissing { name: "code".into() });

        let err = resolve_parameter_values(&gcode_params(), &values(json!({ "code": "" }))).unwrap_err();
        assert_eq!(err, CommandError::RequiredParameterMissing { name: "code".into() });
    }

    #[test]
    fn defaults_fill_in() {
        let params = vec![
            CommandParameter::new("code", ParameterType::Integer).required().with_default(28),
            CommandParameter::new("feed", ParameterType::Float),
        ];
        let resolved = resolve_parameter_values(&params, &values(json!({ "extra": true }))).unwrap();
        assert_eq!(resolved.get("code"), Some(&json!(28)));
        assert!(!resolved.contains_key("feed"));
        assert_eq!(resolved.get("extra"), Some(&json!(true)));
    }

    #[test]
    fn value_shapes_and_ranges() {
        let level = CommandParameter::new("level", ParameterType::Integer).with_range(Some(0.0), Some(10.0));
        assert!(validate_parameter_value(&level, &json!(5)).is_ok());
        assert!(validate_parameter_value(&level, &json!("7")).is_ok());
        assert!(validate_parameter_value(&level, &json!(11)).is_err());
        assert!(validate_parameter_value(&level, &json!(2.5)).is_err());
        assert!(validate_parameter_value(&level, &json!("abc")).is_err());

        let flag = CommandParameter::new("flag", ParameterType::Boolean);
        assert!(validate_parameter_value(&flag, &json!("yes")).is_ok());
        assert!(validate_parameter_value(&flag, &json!("maybe")).is_err());

        let speed = CommandParameter::new("speed", ParameterType::Enum).with_options(["SLOW", "FAST"]);
        assert!(validate_parameter_value(&speed, &json!("FAST")).is_ok());
        assert!(validate_parameter_value(&speed, &json!("WARP")).is_err());
    }
}
