//! Expression evaluation seam.
//!
//! Activation conditions and variable extraction are evaluated through the
//! [`ExpressionEngine`] trait. The built-in [`SimpleExpressionEngine`]
//! supports a deliberately small language: literals, dotted context paths,
//! `=` equality and `{ key: expr, ... }` constructors. Deployments needing a
//! full expression language plug their engine in behind the trait.

use serde_json::{Map, Value};

use conduit_core::{ConnectorError, ConnectorResult};

/// Evaluates an expression against a JSON evaluation context
pub trait ExpressionEngine: Send + Sync {
    fn evaluate(&self, expression: &str, context: &Value) -> ConnectorResult<Value>;
}

/// Built-in evaluator for the supported expression subset
#[derive(Debug, Default)]
pub struct SimpleExpressionEngine;

impl SimpleExpressionEngine {
    pub fn new() -> Self {
        Self
    }

    fn eval(&self, expression: &str, context: &Value) -> ConnectorResult<Value> {
        let expression = expression.trim();
        let expression = expression.strip_prefix('=').unwrap_or(expression).trim();
        if expression.is_empty() {
            return Err(ConnectorError::EvaluationFailure(
                "empty expression".to_string(),
            ));
        }

        if expression.starts_with('{') {
            return self.eval_object(expression, context);
        }

        if let Some((left, right)) = split_top_level_once(expression, '=') {
            let left = self.eval(left, context)?;
            let right = self.eval(right, context)?;
            return Ok(Value::Bool(left == right));
        }

        self.eval_primary(expression, context)
    }

    fn eval_object(&self, expression: &str, context: &Value) -> ConnectorResult<Value> {
        let inner = expression
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| {
                ConnectorError::EvaluationFailure(format!("unbalanced braces in '{}'", expression))
            })?;
        let mut object = Map::new();
        for entry in split_top_level(inner, ',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (key, value_expr) = split_top_level_once(entry, ':').ok_or_else(|| {
                ConnectorError::EvaluationFailure(format!("expected 'key: expression' in '{}'", entry))
            })?;
            let key = key.trim().trim_matches('"').to_string();
            object.insert(key, self.eval(value_expr, context)?);
        }
        Ok(Value::Object(object))
    }

    fn eval_primary(&self, expression: &str, context: &Value) -> ConnectorResult<Value> {
        match expression {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "null" => return Ok(Value::Null),
            _ => {}
        }
        if expression.starts_with('"') && expression.ends_with('"') && expression.len() >= 2 {
            return Ok(Value::String(
                expression[1..expression.len() - 1].to_string(),
            ));
        }
        if let Ok(number) = expression.parse::<i64>() {
            return Ok(Value::Number(number.into()));
        }
        if let Ok(number) = expression.parse::<f64>() {
            return serde_json::Number::from_f64(number)
                .map(Value::Number)
                .ok_or_else(|| {
                    ConnectorError::EvaluationFailure(format!("invalid number '{}'", expression))
                });
        }
        if !expression
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '_' || c == '-')
        {
            return Err(ConnectorError::EvaluationFailure(format!(
                "unsupported expression '{}'",
                expression
            )));
        }
        // Dotted path rooted at the evaluation context; missing segments
        // resolve to null, matching lenient condition semantics.
        let mut current = context;
        for segment in expression.split('.') {
            match current.get(segment) {
                Some(next) => current = next,
                None => return Ok(Value::Null),
            }
        }
        Ok(current.clone())
    }
}

impl ExpressionEngine for SimpleExpressionEngine {
    fn evaluate(&self, expression: &str, context: &Value) -> ConnectorResult<Value> {
        self.eval(expression, context)
    }
}

/// Split on a separator at brace/quote depth zero
fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 && !in_string => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn split_top_level_once(input: &str, separator: char) -> Option<(&str, &str)> {
    let parts = split_top_level(input, separator);
    if parts.len() < 2 {
        return None;
    }
    let first = parts[0];
    let rest = &input[first.len() + separator.len_utf8()..];
    Some((first, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx() -> Value {
        json!({
            "request": {
                "body": { "type": "order.created", "orderId": 42 },
                "headers": { "x-source": "shop" }
            }
        })
    }

    #[test]
    fn evaluates_paths_and_literals() {
        let engine = SimpleExpressionEngine::new();
        assert_eq!(
            engine.evaluate("request.body.orderId", &ctx()).unwrap(),
            json!(42)
        );
        assert_eq!(engine.evaluate("true", &ctx()).unwrap(), json!(true));
        assert_eq!(engine.evaluate("\"abc\"", &ctx()).unwrap(), json!("abc"));
        assert_eq!(engine.evaluate("request.nope.x", &ctx()).unwrap(), json!(null));
    }

    #[test]
    fn evaluates_equality() {
        let engine = SimpleExpressionEngine::new();
        assert_eq!(
            engine
                .evaluate("request.body.type = \"order.created\"", &ctx())
                .unwrap(),
            json!(true)
        );
        assert_eq!(
            engine
                .evaluate("= request.body.type = \"other\"", &ctx())
                .unwrap(),
            json!(false)
        );
    }

    #[test]
    fn evaluates_object_constructors() {
        let engine = SimpleExpressionEngine::new();
        assert_eq!(
            engine
                .evaluate(
                    "{ orderId: request.body.orderId, source: request.headers.x-source }",
                    &ctx()
                )
                .unwrap(),
            json!({ "orderId": 42, "source": "shop" })
        );
    }

    #[test]
    fn rejects_garbage() {
        let engine = SimpleExpressionEngine::new();
        assert!(engine.evaluate("a + b", &ctx()).is_err());
        assert!(engine.evaluate("{ broken", &ctx()).is_err());
    }
}
