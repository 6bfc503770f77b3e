//! Expression evaluation.

use crate::errors::RuntimeFault;
use crate::lang::ast::{BinOp, Expr, UnaryOp};

use super::frame::FrameData;
use super::values::{Builtin, Value};
use super::Run;

/// Materialized range ceiling. Keeps a runaway `range()` from exhausting
/// memory; the traced programs this crate targets never come close.
const MAX_RANGE_ITEMS: i64 = 1_000_000;

impl<'p, 'o> Run<'p, 'o> {
    pub(crate) fn eval(
        &mut self,
        expr: &Expr,
        frame: &mut FrameData,
        globals: Option<&FrameData>,
    ) -> Result<Value, RuntimeFault> {
        let line = frame.current_line;
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::None => Ok(Value::None),
            Expr::Name(name) => frame
                .bindings
                .get(name)
                .cloned()
                .or_else(|| globals.and_then(|g| g.bindings.get(name).cloned()))
                .or_else(|| Builtin::lookup(name).map(Value::Builtin))
                .ok_or_else(|| {
                    RuntimeFault::new(
                        "NameError",
                        format!("name '{name}' is not defined"),
                        line,
                    )
                }),
            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|e| self.eval(e, frame, globals))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(values))
            }
            Expr::Dict(pairs) => {
                let mut out = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let key = match self.eval(k, frame, globals)? {
                        Value::Str(s) => s,
                        other => {
                            return Err(RuntimeFault::new(
                                "TypeError",
                                format!("dict keys must be strings, not '{}'", other.type_name()),
                                line,
                            ))
                        }
                    };
                    let value = self.eval(v, frame, globals)?;
                    out.push((key, value));
                }
                Ok(Value::Dict(out))
            }
            Expr::Unary { op, operand } => {
                let v = self.eval(operand, frame, globals)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
                    UnaryOp::Neg => match v {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        other => Err(RuntimeFault::new(
                            "TypeError",
                            format!("bad operand type for unary -: '{}'", other.type_name()),
                            line,
                        )),
                    },
                }
            }
            Expr::Binary { op, left, right } => match op {
                BinOp::And => {
                    let l = self.eval(left, frame, globals)?;
                    if !l.is_truthy() {
                        Ok(l)
                    } else {
                        self.eval(right, frame, globals)
                    }
                }
                BinOp::Or => {
                    let l = self.eval(left, frame, globals)?;
                    if l.is_truthy() {
                        Ok(l)
                    } else {
                        self.eval(right, frame, globals)
                    }
                }
                _ => {
                    let l = self.eval(left, frame, globals)?;
                    let r = self.eval(right, frame, globals)?;
                    binary_op(*op, l, r, line)
                }
            },
            Expr::Call { func, args } => {
                if let Expr::Attribute { base, name } = &**func {
                    return self.call_method(base, name, args, frame, globals);
                }
                let f = self.eval(func, frame, globals)?;
                let argv = args
                    .iter()
                    .map(|a| self.eval(a, frame, globals))
                    .collect::<Result<Vec<_>, _>>()?;
                match f {
                    Value::Function(def) => {
                        let callee_globals: &FrameData = match globals {
                            Some(g) => g,
                            None => &*frame,
                        };
                        self.call_function(&def, argv, callee_globals, line)
                    }
                    Value::Builtin(b) => call_builtin(b, argv, line),
                    other => Err(RuntimeFault::new(
                        "TypeError",
                        format!("'{}' object is not callable", other.type_name()),
                        line,
                    )),
                }
            }
            Expr::Attribute { name, .. } => Err(RuntimeFault::new(
                "AttributeError",
                format!("attribute '{name}' is only supported in calls"),
                line,
            )),
            Expr::Index { base, index } => {
                let b = self.eval(base, frame, globals)?;
                let i = self.eval(index, frame, globals)?;
                get_item(&b, &i, line)
            }
        }
    }

    fn call_method(
        &mut self,
        base: &Expr,
        name: &str,
        args: &[Expr],
        frame: &mut FrameData,
        globals: Option<&FrameData>,
    ) -> Result<Value, RuntimeFault> {
        let line = frame.current_line;
        let mut argv = args
            .iter()
            .map(|a| self.eval(a, frame, globals))
            .collect::<Result<Vec<_>, _>>()?;

        if name == "append" {
            if argv.len() != 1 {
                return Err(RuntimeFault::new(
                    "TypeError",
                    format!("append() takes exactly one argument ({} given)", argv.len()),
                    line,
                ));
            }
            let item = argv.pop().unwrap_or(Value::None);
            let (root, path) = self.collect_path(base, frame, globals)?;
            let mut slot = frame.bindings.get_mut(&root).ok_or_else(|| {
                RuntimeFault::new("NameError", format!("name '{root}' is not defined"), line)
            })?;
            for step in &path {
                slot = index_mut(slot, step, line)?;
            }
            return match slot {
                Value::List(items) => {
                    items.push(item);
                    Ok(Value::None)
                }
                other => Err(RuntimeFault::new(
                    "AttributeError",
                    format!("'{}' object has no attribute 'append'", other.type_name()),
                    line,
                )),
            };
        }

        let recv = self.eval(base, frame, globals)?;
        str_method(&recv, name, argv, line)
    }
}

fn str_method(
    recv: &Value,
    name: &str,
    argv: Vec<Value>,
    line: usize,
) -> Result<Value, RuntimeFault> {
    let s = match recv {
        Value::Str(s) => s,
        other => {
            return Err(RuntimeFault::new(
                "AttributeError",
                format!("'{}' object has no attribute '{name}'", other.type_name()),
                line,
            ))
        }
    };
    match (name, argv.as_slice()) {
        ("split", []) => Ok(Value::List(
            s.split_whitespace()
                .map(|p| Value::Str(p.to_string()))
                .collect(),
        )),
        ("split", [Value::Str(sep)]) => {
            if sep.is_empty() {
                return Err(RuntimeFault::new("ValueError", "empty separator", line));
            }
            Ok(Value::List(
                s.split(sep.as_str())
                    .map(|p| Value::Str(p.to_string()))
                    .collect(),
            ))
        }
        ("strip", []) => Ok(Value::Str(s.trim().to_string())),
        ("upper", []) => Ok(Value::Str(s.to_uppercase())),
        ("lower", []) => Ok(Value::Str(s.to_lowercase())),
        ("join", [Value::List(items)]) => {
            let parts = items
                .iter()
                .map(|v| match v {
                    Value::Str(p) => Ok(p.clone()),
                    other => Err(RuntimeFault::new(
                        "TypeError",
                        format!("sequence item: expected str, {} found", other.type_name()),
                        line,
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Str(parts.join(s)))
        }
        _ => Err(RuntimeFault::new(
            "AttributeError",
            format!("'str' object has no attribute '{name}' with these arguments"),
            line,
        )),
    }
}

fn call_builtin(b: Builtin, argv: Vec<Value>, line: usize) -> Result<Value, RuntimeFault> {
    match b {
        Builtin::Range => {
            let nums = argv
                .iter()
                .map(|v| match v {
                    Value::Int(n) => Ok(*n),
                    other => Err(RuntimeFault::new(
                        "TypeError",
                        format!(
                            "range() argument must be int, not '{}'",
                            other.type_name()
                        ),
                        line,
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let (start, stop, step) = match nums.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => {
                    return Err(RuntimeFault::new(
                        "TypeError",
                        format!("range expected 1 to 3 arguments, got {}", nums.len()),
                        line,
                    ))
                }
            };
            if step == 0 {
                return Err(RuntimeFault::new(
                    "ValueError",
                    "range() arg 3 must not be zero",
                    line,
                ));
            }
            let mut items = Vec::new();
            let mut v = start;
            while (step > 0 && v < stop) || (step < 0 && v > stop) {
                items.push(Value::Int(v));
                if items.len() as i64 > MAX_RANGE_ITEMS {
                    return Err(RuntimeFault::new("MemoryError", "range too large", line));
                }
                v += step;
            }
            Ok(Value::List(items))
        }
        Builtin::Len => match argv.as_slice() {
            [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
            [Value::List(items)] => Ok(Value::Int(items.len() as i64)),
            [Value::Dict(pairs)] => Ok(Value::Int(pairs.len() as i64)),
            [other] => Err(RuntimeFault::new(
                "TypeError",
                format!("object of type '{}' has no len()", other.type_name()),
                line,
            )),
            _ => Err(RuntimeFault::new(
                "TypeError",
                "len() takes exactly one argument",
                line,
            )),
        },
        Builtin::Abs => match argv.as_slice() {
            [Value::Int(n)] => Ok(Value::Int(n.abs())),
            [Value::Float(f)] => Ok(Value::Float(f.abs())),
            _ => Err(RuntimeFault::new(
                "TypeError",
                "bad operand type for abs()",
                line,
            )),
        },
        Builtin::Str => match argv.as_slice() {
            [v] => Ok(Value::Str(v.py_str())),
            _ => Err(RuntimeFault::new(
                "TypeError",
                "str() takes exactly one argument",
                line,
            )),
        },
        Builtin::Int => match argv.as_slice() {
            [Value::Int(n)] => Ok(Value::Int(*n)),
            [Value::Bool(b)] => Ok(Value::Int(i64::from(*b))),
            [Value::Float(f)] => Ok(Value::Int(*f as i64)),
            [Value::Str(s)] => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                RuntimeFault::new(
                    "ValueError",
                    format!("invalid literal for int(): {s:?}"),
                    line,
                )
            }),
            _ => Err(RuntimeFault::new(
                "TypeError",
                "int() takes exactly one argument",
                line,
            )),
        },
        Builtin::Print => {
            let parts: Vec<String> = argv.iter().map(Value::py_str).collect();
            println!("{}", parts.join(" "));
            Ok(Value::None)
        }
    }
}

fn binary_op(op: BinOp, l: Value, r: Value, line: usize) -> Result<Value, RuntimeFault> {
    use BinOp::*;
    let type_err = |sym: &str, l: &Value, r: &Value| {
        RuntimeFault::new(
            "TypeError",
            format!(
                "unsupported operand type(s) for {sym}: '{}' and '{}'",
                l.type_name(),
                r.type_name()
            ),
            line,
        )
    };
    match op {
        Add => match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeFault::new("OverflowError", "integer overflow", line)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                let mut out = a.clone();
                out.extend(b.iter().cloned());
                Ok(Value::List(out))
            }
            _ => numeric_op(&l, &r, |a, b| a + b).ok_or_else(|| type_err("+", &l, &r)),
        },
        Sub => match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_sub(*b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeFault::new("OverflowError", "integer overflow", line)),
            _ => numeric_op(&l, &r, |a, b| a - b).ok_or_else(|| type_err("-", &l, &r)),
        },
        Mul => match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_mul(*b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeFault::new("OverflowError", "integer overflow", line)),
            _ => numeric_op(&l, &r, |a, b| a * b).ok_or_else(|| type_err("*", &l, &r)),
        },
        Div => {
            let (a, b) = both_numbers(&l, &r).ok_or_else(|| type_err("/", &l, &r))?;
            if b == 0.0 {
                return Err(RuntimeFault::new("ZeroDivisionError", "division by zero", line));
            }
            Ok(Value::Float(a / b))
        }
        FloorDiv => match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(RuntimeFault::new(
                        "ZeroDivisionError",
                        "integer division or modulo by zero",
                        line,
                    ));
                }
                let mut q = a / b;
                if a % b != 0 && (*a < 0) != (*b < 0) {
                    q -= 1;
                }
                Ok(Value::Int(q))
            }
            _ => {
                let (a, b) = both_numbers(&l, &r).ok_or_else(|| type_err("//", &l, &r))?;
                if b == 0.0 {
                    return Err(RuntimeFault::new(
                        "ZeroDivisionError",
                        "float floor division by zero",
                        line,
                    ));
                }
                Ok(Value::Float((a / b).floor()))
            }
        },
        Mod => match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(RuntimeFault::new(
                        "ZeroDivisionError",
                        "integer division or modulo by zero",
                        line,
                    ));
                }
                let mut m = a % b;
                if m != 0 && (m < 0) != (*b < 0) {
                    m += b;
                }
                Ok(Value::Int(m))
            }
            _ => {
                let (a, b) = both_numbers(&l, &r).ok_or_else(|| type_err("%", &l, &r))?;
                if b == 0.0 {
                    return Err(RuntimeFault::new("ZeroDivisionError", "float modulo", line));
                }
                Ok(Value::Float(a - b * (a / b).floor()))
            }
        },
        Eq => Ok(Value::Bool(l.py_eq(&r))),
        Ne => Ok(Value::Bool(!l.py_eq(&r))),
        Lt | Le | Gt | Ge => {
            let ord = compare(&l, &r).ok_or_else(|| {
                RuntimeFault::new(
                    "TypeError",
                    format!(
                        "'{}' not supported between instances of '{}' and '{}'",
                        op_symbol(op),
                        l.type_name(),
                        r.type_name()
                    ),
                    line,
                )
            })?;
            let pass = match op {
                Lt => ord == std::cmp::Ordering::Less,
                Le => ord != std::cmp::Ordering::Greater,
                Gt => ord == std::cmp::Ordering::Greater,
                Ge => ord != std::cmp::Ordering::Less,
                _ => unreachable!(),
            };
            Ok(Value::Bool(pass))
        }
        And | Or => unreachable!("short-circuit operators are handled in eval"),
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        _ => "?",
    }
}

fn both_numbers(l: &Value, r: &Value) -> Option<(f64, f64)> {
    Some((l.as_number()?, r.as_number()?))
}

fn numeric_op(l: &Value, r: &Value, f: fn(f64, f64) -> f64) -> Option<Value> {
    let (a, b) = both_numbers(l, r)?;
    Some(Value::Float(f(a, b)))
}

/// Ordering for `< <= > >=`: numbers, strings, lists elementwise.
fn compare(l: &Value, r: &Value) -> Option<std::cmp::Ordering> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                match compare(x, y)? {
                    std::cmp::Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => {
            let (a, b) = both_numbers(l, r)?;
            a.partial_cmp(&b)
        }
    }
}

/// Values produced by iterating a `for` loop's iterable.
pub(crate) fn iterate(v: Value, line: usize) -> Result<Vec<Value>, RuntimeFault> {
    match v {
        Value::List(items) => Ok(items),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Dict(pairs) => Ok(pairs.into_iter().map(|(k, _)| Value::Str(k)).collect()),
        other => Err(RuntimeFault::new(
            "TypeError",
            format!("'{}' object is not iterable", other.type_name()),
            line,
        )),
    }
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let idx = if i < 0 { i + len as i64 } else { i };
    if idx >= 0 && (idx as usize) < len {
        Some(idx as usize)
    } else {
        None
    }
}

pub(crate) fn get_item(base: &Value, index: &Value, line: usize) -> Result<Value, RuntimeFault> {
    match (base, index) {
        (Value::List(items), Value::Int(i)) => normalize_index(*i, items.len())
            .map(|idx| items[idx].clone())
            .ok_or_else(|| {
                RuntimeFault::new("IndexError", "list index out of range", line)
            }),
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            normalize_index(*i, chars.len())
                .map(|idx| Value::Str(chars[idx].to_string()))
                .ok_or_else(|| {
                    RuntimeFault::new("IndexError", "string index out of range", line)
                })
        }
        (Value::Dict(pairs), Value::Str(key)) => pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| RuntimeFault::new("KeyError", format!("'{key}'"), line)),
        (other, _) => Err(RuntimeFault::new(
            "TypeError",
            format!("'{}' object is not subscriptable", other.type_name()),
            line,
        )),
    }
}

pub(crate) fn index_mut<'a>(
    v: &'a mut Value,
    index: &Value,
    line: usize,
) -> Result<&'a mut Value, RuntimeFault> {
    match (v, index) {
        (Value::List(items), Value::Int(i)) => {
            let len = items.len();
            match normalize_index(*i, len) {
                Some(idx) => Ok(&mut items[idx]),
                None => Err(RuntimeFault::new(
                    "IndexError",
                    "list index out of range",
                    line,
                )),
            }
        }
        (Value::Dict(pairs), Value::Str(key)) => pairs
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or_else(|| RuntimeFault::new("KeyError", format!("'{key}'"), line)),
        (other, _) => Err(RuntimeFault::new(
            "TypeError",
            format!("'{}' object does not support item access", other.type_name()),
            line,
        )),
    }
}

pub(crate) fn set_item(
    v: &mut Value,
    index: &Value,
    value: Value,
    line: usize,
) -> Result<(), RuntimeFault> {
    match (v, index) {
        (Value::List(items), Value::Int(i)) => {
            let len = items.len();
            match normalize_index(*i, len) {
                Some(idx) => {
                    items[idx] = value;
                    Ok(())
                }
                None => Err(RuntimeFault::new(
                    "IndexError",
                    "list assignment index out of range",
                    line,
                )),
            }
        }
        (Value::Dict(pairs), Value::Str(key)) => {
            match pairs.iter_mut().find(|(k, _)| k == key) {
                Some((_, slot)) => *slot = value,
                None => pairs.push((key.clone(), value)),
            }
            Ok(())
        }
        (other, _) => Err(RuntimeFault::new(
            "TypeError",
            format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ),
            line,
        )),
    }
}
