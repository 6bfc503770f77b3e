//! Small fixed-template statement synthesizer.
//!
//! Expands a handful of statement shapes over a program's variable names
//! and executes each candidate against an example's pre-state, accepting
//! the first one whose post-state matches on every non-reserved key. The
//! search is decoupled from the trace/verify core: any
//! [`CandidateRunner`] can execute candidates, and only the literal
//! equality primitive is shared.

use std::collections::{BTreeMap, BTreeSet};

use crate::engine::{Engine, Value};
use crate::lang::ast::{Expr, Program, StmtKind, Target};
use crate::literal::{literal_eq_value, parse_literal};
use crate::trace::is_reserved;

/// The fixed statement shapes tried, `#` marking a variable hole.
pub const PATTERNS: [&str; 2] = ["# = #.split(#)", "# = #.strip()"];

/// Executes one candidate statement against a pre-seeded environment.
pub trait CandidateRunner {
    /// Run `stmt` with `setup` bound, returning the resulting environment,
    /// or `None` if the candidate failed to parse or faulted.
    fn run(&self, setup: &BTreeMap<String, Value>, stmt: &str) -> Option<BTreeMap<String, Value>>;
}

/// Candidate runner backed by the real engine.
pub struct EngineRunner(pub Engine);

impl CandidateRunner for EngineRunner {
    fn run(&self, setup: &BTreeMap<String, Value>, stmt: &str) -> Option<BTreeMap<String, Value>> {
        let program = Program::parse(&[stmt.to_string()]).ok()?;
        self.0.run(&program, setup.clone(), None).ok()
    }
}

/// Every variable name the program mentions.
pub fn collect_var_names(program: &Program) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for stmt in &program.statements {
        match &stmt.kind {
            StmtKind::Assign { target, value } => {
                match target {
                    Target::Name(n) => {
                        names.insert(n.clone());
                    }
                    Target::Subscript { base, index } => {
                        collect_expr_names(base, &mut names);
                        collect_expr_names(index, &mut names);
                    }
                }
                collect_expr_names(value, &mut names);
            }
            StmtKind::ExprStmt { expr }
            | StmtKind::If { test: expr }
            | StmtKind::Elif { test: expr }
            | StmtKind::While { test: expr } => collect_expr_names(expr, &mut names),
            StmtKind::For { var, iter } => {
                names.insert(var.clone());
                collect_expr_names(iter, &mut names);
            }
            StmtKind::Def { params, .. } => {
                names.extend(params.iter().cloned());
            }
            StmtKind::Return { value: Some(expr) } => collect_expr_names(expr, &mut names),
            _ => {}
        }
    }
    names
}

fn collect_expr_names(expr: &Expr, names: &mut BTreeSet<String>) {
    match expr {
        Expr::Name(n) => {
            names.insert(n.clone());
        }
        Expr::List(items) => items.iter().for_each(|e| collect_expr_names(e, names)),
        Expr::Dict(pairs) => pairs.iter().for_each(|(k, v)| {
            collect_expr_names(k, names);
            collect_expr_names(v, names);
        }),
        Expr::Unary { operand, .. } => collect_expr_names(operand, names),
        Expr::Binary { left, right, .. } => {
            collect_expr_names(left, names);
            collect_expr_names(right, names);
        }
        Expr::Call { func, args } => {
            collect_expr_names(func, names);
            args.iter().for_each(|a| collect_expr_names(a, names));
        }
        Expr::Attribute { base, .. } => collect_expr_names(base, names),
        Expr::Index { base, index } => {
            collect_expr_names(base, names);
            collect_expr_names(index, names);
        }
        _ => {}
    }
}

/// Expand one pattern, substituting every variable for each `#` hole.
pub fn expand_pattern(pattern: &str, vars: &[String], out: &mut Vec<String>) {
    if !pattern.contains('#') {
        out.push(pattern.to_string());
        return;
    }
    for v in vars {
        expand_pattern(&pattern.replacen('#', v, 1), vars, out);
    }
}

/// Expand the whole fixed pattern set.
pub fn expand_all_patterns(vars: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for pattern in PATTERNS {
        expand_pattern(pattern, vars, &mut out);
    }
    out
}

/// Seed the candidate environment from the example's pre-state.
pub fn build_setup(before: &BTreeMap<String, String>) -> BTreeMap<String, Value> {
    before
        .iter()
        .filter(|(name, _)| !is_reserved(name))
        .map(|(name, raw)| {
            let value = parse_literal(raw).unwrap_or_else(|| Value::Str(raw.clone()));
            (name.clone(), value)
        })
        .collect()
}

/// Does the candidate's post-state match the goal on every non-reserved key?
pub fn results_match(goal: &BTreeMap<String, String>, actual: &BTreeMap<String, Value>) -> bool {
    goal.iter().all(|(name, expected)| {
        if is_reserved(name) {
            return true;
        }
        actual
            .get(name)
            .is_some_and(|value| literal_eq_value(expected, value))
    })
}

/// Search the expanded pattern set for a statement taking `before` to
/// `after`. Returns the first accepted candidate.
pub fn synthesize(
    runner: &dyn CandidateRunner,
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
    vars: &[String],
) -> Option<String> {
    let setup = build_setup(before);
    for stmt in expand_all_patterns(vars) {
        if let Some(actual) = runner.run(&setup, &stmt) {
            if results_match(after, &actual) {
                return Some(stmt);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn pattern_expansion_fills_every_hole() {
        let mut out = Vec::new();
        expand_pattern("# = #.strip()", &vars(&["a", "b"]), &mut out);
        assert_eq!(out.len(), 4);
        assert!(out.contains(&"a = b.strip()".to_string()));
    }

    #[test]
    fn synthesizes_a_split_statement() {
        let before = btreemap! {
            "s".to_string() => "'a,b'".to_string(),
            "d".to_string() => "','".to_string(),
        };
        let after = btreemap! {
            "r".to_string() => "['a', 'b']".to_string(),
        };
        let runner = EngineRunner(Engine::default());
        let stmt = synthesize(&runner, &before, &after, &vars(&["s", "d", "r"]))
            .expect("should synthesize");
        assert_eq!(stmt, "r = s.split(d)");
    }

    #[test]
    fn synthesizes_a_strip_statement() {
        let before = btreemap! { "s".to_string() => "'  x  '".to_string() };
        let after = btreemap! { "t".to_string() => "'x'".to_string() };
        let runner = EngineRunner(Engine::default());
        let stmt = synthesize(&runner, &before, &after, &vars(&["s", "t"]))
            .expect("should synthesize");
        assert_eq!(stmt, "t = s.strip()");
    }

    #[test]
    fn reports_nothing_when_no_template_fits() {
        let before = btreemap! { "a".to_string() => "1".to_string() };
        let after = btreemap! { "b".to_string() => "99".to_string() };
        let runner = EngineRunner(Engine::default());
        assert_eq!(synthesize(&runner, &before, &after, &vars(&["a", "b"])), None);
    }

    #[test]
    fn collects_names_from_the_whole_tree() {
        let program = Program::parse(&crate::normalize::normalize(
            "def f(a):\n    return a + g\nfor i in xs:\n    ys[0] = f(i)\n",
        ).runnable)
        .expect("should parse");
        let names = collect_var_names(&program);
        for expected in ["a", "g", "i", "xs", "ys", "f"] {
            assert!(names.contains(expected), "missing {expected}");
        }
    }
}
