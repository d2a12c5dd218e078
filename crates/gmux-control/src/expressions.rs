//! Object-model expression evaluation.
//!
//! Codes may embed `{…}` expressions in parameter values, and `echo`
//! evaluates its whole argument. The evaluator works against a JSON
//! snapshot of the object model and supports the subset the core needs:
//!
//! - string literals with `""` escapes,
//! - numeric and `true`/`false`/`null` literals,
//! - dotted model paths with array indices (`move.axes[0].max`),
//! - `^` string concatenation between any of the above.
//!
//! Before evaluation the pipeline flushes the firmware so the snapshot is
//! not stale. Failed evaluation surfaces as a handler error.

use crate::ControlError;
use gmux_code::Code;
use serde_json::Value;

/// Evaluates an expression to its JSON value.
///
/// # Errors
///
/// [`ControlError::Handler`] when the expression does not resolve.
pub fn evaluate_value(expr: &str, model: &Value) -> Result<Value, ControlError> {
    let expr = expr.trim();
    let inner = expr
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(expr);

    let terms = split_concat(inner);
    if terms.len() == 1 {
        return evaluate_term(terms[0], model);
    }

    let mut out = String::new();
    for term in terms {
        out.push_str(&render(&evaluate_term(term, model)?));
    }
    Ok(Value::String(out))
}

/// Evaluates an expression and renders it as text.
///
/// # Errors
///
/// [`ControlError::Handler`] when the expression does not resolve.
pub fn evaluate(expr: &str, model: &Value) -> Result<String, ControlError> {
    Ok(render(&evaluate_value(expr, model)?))
}

/// Replaces every `{…}` parameter of `code` with its evaluated value.
///
/// # Errors
///
/// [`ControlError::Handler`] when an expression does not resolve.
pub fn evaluate_code(code: &mut Code, model: &Value) -> Result<(), ControlError> {
    for parameter in &mut code.parameters {
        if parameter.is_expression() {
            let value = evaluate_value(&parameter.value, model)?;
            parameter.quoted = value.is_string();
            parameter.value = render(&value);
        }
    }
    Ok(())
}

/// Splits on `^` outside quotes and brackets.
fn split_concat(expr: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in expr.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' | '{' | '(' if !in_quotes => depth += 1,
            ']' | '}' | ')' if !in_quotes => depth = depth.saturating_sub(1),
            '^' if !in_quotes && depth == 0 => {
                terms.push(&expr[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&expr[start..]);
    terms
}

fn evaluate_term(term: &str, model: &Value) -> Result<Value, ControlError> {
    let term = term.trim();
    if term.is_empty() {
        return Err(ControlError::Handler("empty expression".into()));
    }

    if let Some(rest) = term.strip_prefix('"') {
        let Some(body) = rest.strip_suffix('"') else {
            return Err(ControlError::Handler(format!(
                "unterminated string in expression '{term}'"
            )));
        };
        return Ok(Value::String(body.replace("\"\"", "\"")));
    }

    match term {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" => return Ok(Value::Null),
        _ => {}
    }

    if let Ok(number) = term.parse::<f64>() {
        return Ok(serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null));
    }

    lookup(model, term)
        .cloned()
        .ok_or_else(|| ControlError::Handler(format!("unknown value '{term}'")))
}

/// Resolves a dotted model path with optional `[index]` accessors.
fn lookup<'a>(model: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = model;
    for segment in path.split('.') {
        let (name, indices) = parse_segment(segment)?;
        if !name.is_empty() {
            current = current.get(name)?;
        }
        for index in indices {
            current = current.get(index)?;
        }
    }
    Some(current)
}

/// Splits `axes[0][1]` into `("axes", [0, 1])`.
fn parse_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    let open = match segment.find('[') {
        Some(pos) => pos,
        None => return Some((segment, Vec::new())),
    };
    let name = &segment[..open];
    let mut indices = Vec::new();
    let mut rest = &segment[open..];
    while let Some(tail) = rest.strip_prefix('[') {
        let close = tail.find(']')?;
        indices.push(tail[..close].trim().parse().ok()?);
        rest = &tail[close + 1..];
    }
    rest.is_empty().then_some((name, indices))
}

/// Renders a JSON value the way responses spell it.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(f) = n.as_f64() {
                // Whole floats print without the trailing `.0`.
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{}", f as i64)
                } else {
                    f.to_string()
                }
            } else {
                n.to_string()
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> Value {
        json!({
            "network": { "hostname": "corexy" },
            "job": { "file": { "size": 1234 }, "isPaused": false },
            "move": { "axes": [ { "max": 200.5 }, { "max": 180.0 } ] },
        })
    }

    #[test]
    fn literals() {
        let m = model();
        assert_eq!(evaluate("\"hi\"", &m).unwrap(), "hi");
        assert_eq!(evaluate("\"say \"\"hi\"\"\"", &m).unwrap(), "say \"hi\"");
        assert_eq!(evaluate("42", &m).unwrap(), "42");
        assert_eq!(evaluate("2.5", &m).unwrap(), "2.5");
        assert_eq!(evaluate("true", &m).unwrap(), "true");
        assert_eq!(evaluate("null", &m).unwrap(), "null");
    }

    #[test]
    fn model_paths() {
        let m = model();
        assert_eq!(evaluate("network.hostname", &m).unwrap(), "corexy");
        assert_eq!(evaluate("job.file.size", &m).unwrap(), "1234");
        assert_eq!(evaluate("job.isPaused", &m).unwrap(), "false");
        assert_eq!(evaluate("move.axes[1].max", &m).unwrap(), "180");
        assert_eq!(evaluate("{move.axes[0].max}", &m).unwrap(), "200.5");
    }

    #[test]
    fn concatenation() {
        let m = model();
        assert_eq!(
            evaluate("\"host: \" ^ network.hostname", &m).unwrap(),
            "host: corexy"
        );
        assert_eq!(
            evaluate("network.hostname ^ \"-\" ^ 3", &m).unwrap(),
            "corexy-3"
        );
    }

    #[test]
    fn unknown_path_fails() {
        let m = model();
        assert!(evaluate("job.missing.field", &m).is_err());
        assert!(evaluate("", &m).is_err());
    }

    #[test]
    fn code_parameters_evaluated_in_place() {
        let m = model();
        let mut code = Code::parse("G1 X{move.axes[0].max} Y10").unwrap();
        evaluate_code(&mut code, &m).unwrap();
        assert_eq!(code.parameter('X').unwrap().as_f32().unwrap(), 200.5);
        // Non-expression parameters stay untouched.
        assert_eq!(code.parameter('Y').unwrap().value, "10");
    }

    #[test]
    fn string_expression_becomes_quoted_parameter() {
        let m = model();
        let mut code = Code::parse("M550 P{network.hostname}").unwrap();
        evaluate_code(&mut code, &m).unwrap();
        let p = code.parameter('P').unwrap();
        assert_eq!(p.value, "corexy");
        assert!(p.quoted);
    }
}
