//! Value-transform and condition expressions (`value * 10`, `function == 3`).
//!
//! Expressions are evaluated with `evalexpr` against a flat numeric context.

use evalexpr::{eval_with_context, ContextWithMutableVariables, HashMapContext, Value};

use crate::error::{CodecError, Result};

/// Evaluate a numeric transform with `value` bound to the input.
///
/// `value` is always a float here so `value / 10` does not truncate.
pub fn apply_transform(expression: &str, value: f64) -> Result<f64> {
    let result = evaluate(expression, [("value", Value::Float(value))])?;
    result.as_number().map_err(|err| expression_error(expression, err))
}

/// Evaluate `expression` to a number with the given variables in scope.
pub fn eval_number<'a>(expression: &str, vars: impl IntoIterator<Item = (&'a str, f64)>) -> Result<f64> {
    let result = evaluate(expression, numeric_vars(vars))?;
    result.as_number().map_err(|err| expression_error(expression, err))
}

/// Evaluate `expression` to a boolean with the given variables in scope.
///
/// Numeric results are truthy when non-zero.
pub fn eval_bool<'a>(expression: &str, vars: impl IntoIterator<Item = (&'a str, f64)>) -> Result<bool> {
    match evaluate(expression, numeric_vars(vars))? {
        Value::Boolean(b) => Ok(b),
        Value::Int(i) => Ok(i != 0),
        Value::Float(f) => Ok(f != 0.0),
        other => Err(CodecError::Expression {
            expression: expression.to_string(),
            message: format!("expected a boolean, got {other}"),
        }),
    }
}

/// Integral numbers bind as ints so equality against literals like `3` holds.
fn numeric_vars<'a>(vars: impl IntoIterator<Item = (&'a str, f64)>) -> impl Iterator<Item = (&'a str, Value)> {
    vars.into_iter().map(|(name, value)| {
        let value = if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Value::Int(value as i64)
        } else {
            Value::Float(value)
        };
        (name, value)
    })
}

fn evaluate<'a>(expression: &str, vars: impl IntoIterator<Item = (&'a str, Value)>) -> Result<Value> {
    let mut context = HashMapContext::new();
    for (name, value) in vars {
        context
            .set_value(name.to_string(), value)
            .map_err(|err| expression_error(expression, err))?;
    }
    eval_with_context(expression, &context).map_err(|err| expression_error(expression, err))
}

fn expression_error(expression: &str, err: evalexpr::EvalexprError) -> CodecError {
    CodecError::Expression {
        expression: expression.to_string(),
        message: err.to_string(),
    }
}
