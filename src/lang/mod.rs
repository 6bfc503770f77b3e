//! Line-oriented parser for the traced mini-language.
//!
//! Each physical line is parsed independently with a PEST grammar, then the
//! block tree is reconstructed from indentation. Keeping lines independent
//! is what makes the program line-stable: every line maps to exactly one
//! [`Statement`] the stepper can stop on.

use pest::Parser;
use pest_derive::Parser;

use crate::errors::StaticAnalysisError;
use crate::normalize::{indent_of, PLACEHOLDER};

pub mod ast;

#[cfg(test)]
mod tests;

use ast::{Block, Expr, FunctionDef, Node, Program, Statement, StmtKind, Target, UnaryOp};
use std::rc::Rc;

#[derive(Parser)]
#[grammar = "lang/script.pest"]
struct ScriptParser;

/* ===================== Error Types ===================== */

#[derive(Debug)]
pub enum ParseError {
    /// The line failed the grammar.
    Pest { line: usize, message: String },
    /// The line parsed but could not be built into a statement, or the
    /// block structure is inconsistent.
    Build { line: usize, message: String },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Pest { line, .. } => *line,
            ParseError::Build { line, .. } => *line,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::Pest { message, .. } => message,
            ParseError::Build { message, .. } => message,
        }
    }

    fn build(line: usize, message: impl Into<String>) -> Self {
        ParseError::Build {
            line,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line(), self.message())
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

/* ===================== Public API ===================== */

impl Program {
    /// Parse normalized lines into a program.
    pub fn parse(lines: &[String]) -> ParseResult<Program> {
        let statements = lines
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let kind = parse_line(text, i)?;
                Ok(Statement {
                    line: i,
                    text: text.clone(),
                    indent: indent_of(text),
                    kind,
                })
            })
            .collect::<ParseResult<Vec<_>>>()?;

        let mut idx = 0;
        let body = parse_nodes(&statements, &mut idx, 0)?;
        Ok(Program { statements, body })
    }
}

/// Parse one physical line into a statement kind.
pub fn parse_line(text: &str, line: usize) -> ParseResult<StmtKind> {
    let mut pairs =
        ScriptParser::parse(Rule::line, text).map_err(|e| ParseError::Pest {
            line,
            message: e.to_string(),
        })?;
    let line_pair = pairs.next().expect("line rule always produces a pair");
    for inner in line_pair.into_inner() {
        if inner.as_rule() == Rule::statement {
            return build_statement(inner, line);
        }
    }
    Ok(StmtKind::Blank)
}

/// Parse a standalone expression (used by the literal parser and the
/// template synthesizer).
pub fn parse_expression(text: &str) -> ParseResult<Expr> {
    match parse_line(text, 0)? {
        StmtKind::ExprStmt { expr } => Ok(expr),
        _ => Err(ParseError::build(0, "expected an expression")),
    }
}

/// Parse with the normalization recovery loop.
///
/// On failure, every placeholder line at or above the failing line is
/// blanked and the parse retried; if no line changed, the failure is a
/// [`StaticAnalysisError`].
pub fn parse_with_recovery(lines: &mut [String]) -> Result<Program, StaticAnalysisError> {
    loop {
        match Program::parse(lines) {
            Ok(program) => return Ok(program),
            Err(err) => {
                let line = err.line().min(lines.len().saturating_sub(1));
                let mut changed = false;
                for l in (0..=line).rev() {
                    if lines[l].contains(PLACEHOLDER) {
                        lines[l] = String::new();
                        changed = true;
                    }
                }
                if !changed {
                    return Err(StaticAnalysisError {
                        line: err.line(),
                        message: err.message().to_string(),
                    });
                }
            }
        }
    }
}

/* ===================== Statement Builder ===================== */

fn build_statement(pair: Pair, line: usize) -> ParseResult<StmtKind> {
    let inner = pair
        .into_inner()
        .next()
        .expect("statement rule always has one inner pair");
    let kind = match inner.as_rule() {
        Rule::def_stmt => {
            let mut name = String::new();
            let mut params = Vec::new();
            for p in inner.into_inner() {
                match p.as_rule() {
                    Rule::name => name = p.as_str().to_string(),
                    Rule::param_list => {
                        params = p.into_inner().map(|n| n.as_str().to_string()).collect()
                    }
                    _ => {}
                }
            }
            StmtKind::Def { name, params }
        }
        Rule::if_stmt => StmtKind::If {
            test: expect_expr(inner, line)?,
        },
        Rule::elif_stmt => StmtKind::Elif {
            test: expect_expr(inner, line)?,
        },
        Rule::else_stmt => StmtKind::Else,
        Rule::while_stmt => StmtKind::While {
            test: expect_expr(inner, line)?,
        },
        Rule::for_stmt => {
            let mut var = String::new();
            let mut iter = None;
            for p in inner.into_inner() {
                match p.as_rule() {
                    Rule::name => var = p.as_str().to_string(),
                    Rule::expr => iter = Some(build_expr(p, line)?),
                    _ => {}
                }
            }
            StmtKind::For {
                var,
                iter: iter.expect("for grammar requires an iterable"),
            }
        }
        Rule::return_stmt => {
            let mut value = None;
            for p in inner.into_inner() {
                if p.as_rule() == Rule::expr {
                    value = Some(build_expr(p, line)?);
                }
            }
            StmtKind::Return { value }
        }
        Rule::break_stmt => StmtKind::Break,
        Rule::continue_stmt => StmtKind::Continue,
        Rule::pass_stmt => StmtKind::Pass,
        Rule::assign_stmt => {
            let mut exprs = Vec::new();
            for p in inner.into_inner() {
                if p.as_rule() == Rule::expr {
                    exprs.push(build_expr(p, line)?);
                }
            }
            let value = exprs.pop().expect("assign grammar requires a value");
            let lhs = exprs.pop().expect("assign grammar requires a target");
            StmtKind::Assign {
                target: expr_to_target(lhs, line)?,
                value,
            }
        }
        Rule::expr_stmt => StmtKind::ExprStmt {
            expr: expect_expr(inner, line)?,
        },
        other => {
            return Err(ParseError::build(
                line,
                format!("unexpected statement content: {other:?}"),
            ))
        }
    };
    Ok(kind)
}

fn expect_expr(pair: Pair, line: usize) -> ParseResult<Expr> {
    for p in pair.into_inner() {
        if p.as_rule() == Rule::expr {
            return build_expr(p, line);
        }
    }
    Err(ParseError::build(line, "expected an expression"))
}

fn expr_to_target(expr: Expr, line: usize) -> ParseResult<Target> {
    match expr {
        Expr::Name(name) => Ok(Target::Name(name)),
        Expr::Index { base, index } => Ok(Target::Subscript {
            base: *base,
            index: *index,
        }),
        _ => Err(ParseError::build(line, "cannot assign to this expression")),
    }
}

/* ===================== Expression Builder ===================== */

fn build_expr(pair: Pair, line: usize) -> ParseResult<Expr> {
    let inner = pair
        .into_inner()
        .next()
        .expect("expr rule always has one inner pair");
    build_or(inner, line)
}

/// Fold a left-associative chain of `operand (op operand)*` pairs.
fn fold_binary(
    pair: Pair,
    line: usize,
    build_operand: fn(Pair, usize) -> ParseResult<Expr>,
    op_of: fn(&str) -> ast::BinOp,
) -> ParseResult<Expr> {
    let mut acc: Option<Expr> = None;
    let mut pending_op: Option<ast::BinOp> = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::add_op | Rule::mul_op | Rule::comp_op | Rule::kw_and | Rule::kw_or => {
                pending_op = Some(op_of(p.as_str()));
            }
            _ => {
                let operand = build_operand(p, line)?;
                acc = Some(match (acc.take(), pending_op.take()) {
                    (None, _) => operand,
                    (Some(left), Some(op)) => Expr::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(operand),
                    },
                    (Some(_), None) => {
                        return Err(ParseError::build(line, "operator chain without operator"))
                    }
                });
            }
        }
    }
    acc.ok_or_else(|| ParseError::build(line, "empty expression"))
}

fn build_or(pair: Pair, line: usize) -> ParseResult<Expr> {
    fold_binary(pair, line, build_and, |_| ast::BinOp::Or)
}

fn build_and(pair: Pair, line: usize) -> ParseResult<Expr> {
    fold_binary(pair, line, build_not, |_| ast::BinOp::And)
}

fn build_not(pair: Pair, line: usize) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let first = inner.next().expect("not_expr always has one inner pair");
    match first.as_rule() {
        Rule::kw_not => {
            let operand = build_not(
                inner.next().expect("not keyword requires an operand"),
                line,
            )?;
            Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            })
        }
        Rule::comparison => build_comparison(first, line),
        other => Err(ParseError::build(
            line,
            format!("unexpected negation content: {other:?}"),
        )),
    }
}

fn build_comparison(pair: Pair, line: usize) -> ParseResult<Expr> {
    fold_binary(pair, line, build_arith, comp_op_of)
}

fn comp_op_of(text: &str) -> ast::BinOp {
    match text {
        "==" => ast::BinOp::Eq,
        "!=" => ast::BinOp::Ne,
        "<=" => ast::BinOp::Le,
        ">=" => ast::BinOp::Ge,
        "<" => ast::BinOp::Lt,
        _ => ast::BinOp::Gt,
    }
}

fn build_arith(pair: Pair, line: usize) -> ParseResult<Expr> {
    fold_binary(pair, line, build_term, |t| {
        if t == "+" {
            ast::BinOp::Add
        } else {
            ast::BinOp::Sub
        }
    })
}

fn build_term(pair: Pair, line: usize) -> ParseResult<Expr> {
    fold_binary(pair, line, build_factor, |t| match t {
        "*" => ast::BinOp::Mul,
        "/" => ast::BinOp::Div,
        "//" => ast::BinOp::FloorDiv,
        _ => ast::BinOp::Mod,
    })
}

fn build_factor(pair: Pair, line: usize) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let first = inner.next().expect("factor always has one inner pair");
    match first.as_rule() {
        Rule::neg_op => {
            let operand = build_factor(
                inner.next().expect("negation requires an operand"),
                line,
            )?;
            Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            })
        }
        Rule::postfix => build_postfix(first, line),
        other => Err(ParseError::build(
            line,
            format!("unexpected factor content: {other:?}"),
        )),
    }
}

fn build_postfix(pair: Pair, line: usize) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let atom = inner.next().expect("postfix always starts with an atom");
    let mut expr = build_atom(atom, line)?;
    for trailer in inner {
        let t = trailer
            .into_inner()
            .next()
            .expect("trailer always has one inner pair");
        expr = match t.as_rule() {
            Rule::call_args => {
                let args = match t.into_inner().next() {
                    Some(list) => list
                        .into_inner()
                        .map(|a| build_expr(a, line))
                        .collect::<ParseResult<Vec<_>>>()?,
                    None => Vec::new(),
                };
                Expr::Call {
                    func: Box::new(expr),
                    args,
                }
            }
            Rule::index => {
                let idx = expect_expr_like(t, line)?;
                Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(idx),
                }
            }
            Rule::attr => {
                let name = t
                    .into_inner()
                    .next()
                    .expect("attribute access requires a name")
                    .as_str()
                    .to_string();
                Expr::Attribute {
                    base: Box::new(expr),
                    name,
                }
            }
            other => {
                return Err(ParseError::build(
                    line,
                    format!("unexpected trailer content: {other:?}"),
                ))
            }
        };
    }
    Ok(expr)
}

fn expect_expr_like(pair: Pair, line: usize) -> ParseResult<Expr> {
    let inner = pair
        .into_inner()
        .next()
        .expect("rule requires an inner expression");
    build_expr(inner, line)
}

fn build_atom(pair: Pair, line: usize) -> ParseResult<Expr> {
    let inner = pair
        .into_inner()
        .next()
        .expect("atom always has one inner pair");
    let expr = match inner.as_rule() {
        Rule::float => {
            let v: f64 = inner
                .as_str()
                .parse()
                .map_err(|_| ParseError::build(line, "invalid float literal"))?;
            Expr::Float(v)
        }
        Rule::int => {
            let v: i64 = inner
                .as_str()
                .parse()
                .map_err(|_| ParseError::build(line, "integer literal out of range"))?;
            Expr::Int(v)
        }
        Rule::string => Expr::Str(unescape_string(inner.as_str())),
        Rule::true_lit => Expr::Bool(true),
        Rule::false_lit => Expr::Bool(false),
        Rule::none_lit => Expr::None,
        Rule::name => Expr::Name(inner.as_str().to_string()),
        Rule::list => {
            let items = inner
                .into_inner()
                .map(|e| build_expr(e, line))
                .collect::<ParseResult<Vec<_>>>()?;
            Expr::List(items)
        }
        Rule::dict => {
            let pairs = inner
                .into_inner()
                .map(|p| {
                    let mut kv = p.into_inner();
                    let key = build_expr(kv.next().expect("dict pair has a key"), line)?;
                    let value = build_expr(kv.next().expect("dict pair has a value"), line)?;
                    Ok((key, value))
                })
                .collect::<ParseResult<Vec<_>>>()?;
            Expr::Dict(pairs)
        }
        Rule::paren => expect_expr_like(inner, line)?,
        other => {
            return Err(ParseError::build(
                line,
                format!("unexpected atom content: {other:?}"),
            ))
        }
    };
    Ok(expr)
}

fn unescape_string(quoted: &str) -> String {
    let body = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/* ===================== Block Tree ===================== */

fn next_significant(stmts: &[Statement], from: usize) -> Option<usize> {
    (from..stmts.len()).find(|&i| stmts[i].kind != StmtKind::Blank)
}

/// Parse the statements at one indentation level into a block.
fn parse_nodes(stmts: &[Statement], idx: &mut usize, indent: usize) -> ParseResult<Block> {
    let mut nodes = Vec::new();
    while *idx < stmts.len() {
        let s = &stmts[*idx];
        if s.kind == StmtKind::Blank {
            *idx += 1;
            continue;
        }
        if s.indent < indent {
            break;
        }
        if s.indent > indent {
            return Err(ParseError::build(s.line, "unexpected indent"));
        }
        match &s.kind {
            StmtKind::If { .. } => {
                let header = s.line;
                let header_indent = s.indent;
                *idx += 1;
                let body = parse_body(stmts, idx, header_indent, header)?;
                let mut arms = vec![(header, body)];
                let mut orelse = None;
                while let Some(j) = next_significant(stmts, *idx) {
                    let peek = &stmts[j];
                    if peek.indent != header_indent {
                        break;
                    }
                    match peek.kind {
                        StmtKind::Elif { .. } => {
                            *idx = j + 1;
                            let arm = parse_body(stmts, idx, header_indent, peek.line)?;
                            arms.push((j, arm));
                        }
                        StmtKind::Else => {
                            *idx = j + 1;
                            orelse = Some(parse_body(stmts, idx, header_indent, peek.line)?);
                            break;
                        }
                        _ => break,
                    }
                }
                nodes.push(Node::If { arms, orelse });
            }
            StmtKind::Elif { .. } => {
                return Err(ParseError::build(s.line, "elif without a matching if"));
            }
            StmtKind::Else => {
                return Err(ParseError::build(s.line, "else without a matching if"));
            }
            StmtKind::While { .. } => {
                let header = s.line;
                *idx += 1;
                let body = parse_body(stmts, idx, stmts[header].indent, header)?;
                nodes.push(Node::While { line: header, body });
            }
            StmtKind::For { .. } => {
                let header = s.line;
                *idx += 1;
                let body = parse_body(stmts, idx, stmts[header].indent, header)?;
                nodes.push(Node::For { line: header, body });
            }
            StmtKind::Def { name, params } => {
                let header = s.line;
                let name = name.clone();
                let params = params.clone();
                *idx += 1;
                let body = parse_body(stmts, idx, stmts[header].indent, header)?;
                nodes.push(Node::Def {
                    line: header,
                    func: Rc::new(FunctionDef {
                        name,
                        params,
                        body,
                        line: header,
                    }),
                });
            }
            _ => {
                nodes.push(Node::Simple(s.line));
                *idx += 1;
            }
        }
    }
    Ok(Block { nodes })
}

/// Parse the indented body after a block header.
fn parse_body(
    stmts: &[Statement],
    idx: &mut usize,
    header_indent: usize,
    header_line: usize,
) -> ParseResult<Block> {
    let first = next_significant(stmts, *idx).ok_or_else(|| {
        ParseError::build(header_line, "expected an indented block")
    })?;
    if stmts[first].indent <= header_indent {
        return Err(ParseError::build(
            header_line,
            "expected an indented block",
        ));
    }
    *idx = first;
    parse_nodes(stmts, idx, stmts[first].indent)
}
