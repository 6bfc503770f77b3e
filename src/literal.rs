//! Best-effort literal parsing and literal equality.
//!
//! Rendered snapshot text, example right-hand sides, and synthesizer
//! results all compare through this one primitive: parse both sides as
//! literals when possible, fall back to trimmed text comparison otherwise.

use crate::engine::Value;
use crate::lang::ast::{Expr, UnaryOp};
use crate::lang::parse_expression;

/// Parse a literal value from text, best-effort.
///
/// Numbers, strings, booleans, `None`, lists and dicts parse to values;
/// anything else yields `None` and stays raw text.
pub fn parse_literal(text: &str) -> Option<Value> {
    let expr = parse_expression(text.trim()).ok()?;
    const_value(&expr)
}

fn const_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Int(n) => Some(Value::Int(*n)),
        Expr::Float(f) => Some(Value::Float(*f)),
        Expr::Str(s) => Some(Value::Str(s.clone())),
        Expr::Bool(b) => Some(Value::Bool(*b)),
        Expr::None => Some(Value::None),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match const_value(operand)? {
            Value::Int(n) => Some(Value::Int(-n)),
            Value::Float(f) => Some(Value::Float(-f)),
            _ => None,
        },
        Expr::List(items) => {
            let values = items.iter().map(const_value).collect::<Option<Vec<_>>>()?;
            Some(Value::List(values))
        }
        Expr::Dict(pairs) => {
            let values = pairs
                .iter()
                .map(|(k, v)| match const_value(k)? {
                    Value::Str(key) => Some((key, const_value(v)?)),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            Some(Value::Dict(values))
        }
        _ => None,
    }
}

/// Literal equality of two rendered texts.
pub fn literal_eq(a: &str, b: &str) -> bool {
    match (parse_literal(a), parse_literal(b)) {
        (Some(x), Some(y)) => x.py_eq(&y),
        _ => a.trim() == b.trim(),
    }
}

/// Literal equality of a rendered text against a live value.
pub fn literal_eq_value(text: &str, value: &Value) -> bool {
    match parse_literal(text) {
        Some(parsed) => parsed.py_eq(value),
        None => text.trim() == value.repr(),
    }
}
