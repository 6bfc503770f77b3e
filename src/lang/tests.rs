//! Parser tests - verify line parsing and block tree structure.
//!
//! These tests verify that source lines become the right statements and that
//! indentation reconstructs the right block tree. They do NOT execute code -
//! that's covered by the engine tests.

use super::ast::{BinOp, Expr, Node, Program, StmtKind, Target};
use super::{parse_expression, parse_line, parse_with_recovery};
use crate::normalize::{normalize, PLACEHOLDER};

fn lines(src: &str) -> Vec<String> {
    normalize(src).runnable
}

/* ===================== Line Parsing ===================== */

#[test]
fn parse_assignment() {
    let kind = parse_line("x = 1", 0).expect("should parse");
    match kind {
        StmtKind::Assign {
            target: Target::Name(n),
            value: Expr::Int(1),
        } => assert_eq!(n, "x"),
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn parse_subscript_assignment() {
    let kind = parse_line("xs[0] = 5", 0).expect("should parse");
    match kind {
        StmtKind::Assign {
            target: Target::Subscript { base, .. },
            ..
        } => assert_eq!(base, Expr::Name("xs".to_string())),
        other => panic!("expected subscript assignment, got {other:?}"),
    }
}

#[test]
fn parse_for_header() {
    let kind = parse_line("for i in range(3):", 0).expect("should parse");
    match kind {
        StmtKind::For { var, iter } => {
            assert_eq!(var, "i");
            assert!(matches!(iter, Expr::Call { .. }));
        }
        other => panic!("expected for header, got {other:?}"),
    }
}

#[test]
fn parse_def_header() {
    let kind = parse_line("def f(a, b):", 0).expect("should parse");
    match kind {
        StmtKind::Def { name, params } => {
            assert_eq!(name, "f");
            assert_eq!(params, vec!["a", "b"]);
        }
        other => panic!("expected def header, got {other:?}"),
    }
}

#[test]
fn parse_comparison_is_not_assignment() {
    let kind = parse_line("x == 3", 0).expect("should parse");
    match kind {
        StmtKind::ExprStmt {
            expr: Expr::Binary { op: BinOp::Eq, .. },
        } => {}
        other => panic!("expected comparison expression, got {other:?}"),
    }
}

#[test]
fn parse_keyword_prefixed_name() {
    let kind = parse_line("breakfast = 1", 0).expect("should parse");
    match kind {
        StmtKind::Assign {
            target: Target::Name(n),
            ..
        } => assert_eq!(n, "breakfast"),
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn parse_method_call() {
    let expr = parse_expression("s.split(',')").expect("should parse");
    match expr {
        Expr::Call { func, args } => {
            assert!(matches!(*func, Expr::Attribute { ref name, .. } if name == "split"));
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected method call, got {other:?}"),
    }
}

#[test]
fn parse_operator_precedence() {
    // 1 + 2 * 3 parses as 1 + (2 * 3)
    let expr = parse_expression("1 + 2 * 3").expect("should parse");
    match expr {
        Expr::Binary {
            op: BinOp::Add,
            right,
            ..
        } => assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. })),
        other => panic!("expected addition, got {other:?}"),
    }
}

#[test]
fn parse_literals() {
    assert_eq!(parse_expression("2.5").unwrap(), Expr::Float(2.5));
    assert_eq!(
        parse_expression("'a b'").unwrap(),
        Expr::Str("a b".to_string())
    );
    assert_eq!(parse_expression("True").unwrap(), Expr::Bool(true));
    assert_eq!(parse_expression("None").unwrap(), Expr::None);
    assert!(matches!(
        parse_expression("[1, 2]").unwrap(),
        Expr::List(items) if items.len() == 2
    ));
    assert!(matches!(
        parse_expression("{'k': 1}").unwrap(),
        Expr::Dict(pairs) if pairs.len() == 1
    ));
}

#[test]
fn rejects_garbage_line() {
    assert!(parse_line("x = = 1", 0).is_err());
}

/* ===================== Block Tree ===================== */

#[test]
fn build_loop_body() {
    let program = Program::parse(&lines("x = 1\nfor i in range(3):\n    x = x + i\n"))
        .expect("should parse");
    assert_eq!(program.body.nodes.len(), 2);
    match &program.body.nodes[1] {
        Node::For { line, body } => {
            assert_eq!(*line, 1);
            assert_eq!(body.nodes.len(), 1);
        }
        other => panic!("expected for node, got {other:?}"),
    }
}

#[test]
fn build_if_elif_else_chain() {
    let src = "if x < 0:\n    y = 1\nelif x == 0:\n    y = 2\nelse:\n    y = 3\n";
    let program = Program::parse(&lines(src)).expect("should parse");
    match &program.body.nodes[0] {
        Node::If { arms, orelse } => {
            assert_eq!(arms.len(), 2);
            assert!(orelse.is_some());
        }
        other => panic!("expected if node, got {other:?}"),
    }
}

#[test]
fn build_function_body() {
    let program =
        Program::parse(&lines("def f(a):\n    return a + 1\n")).expect("should parse");
    match &program.body.nodes[0] {
        Node::Def { func, .. } => {
            assert_eq!(func.name, "f");
            assert_eq!(func.params, vec!["a"]);
            assert_eq!(func.body.nodes.len(), 1);
        }
        other => panic!("expected def node, got {other:?}"),
    }
}

#[test]
fn missing_body_is_an_error() {
    assert!(Program::parse(&["while x:".to_string()]).is_err());
}

#[test]
fn every_line_maps_to_one_statement() {
    let src = "x = 1\n\nfor i in range(2):\n    x = x + i\n";
    let normalized = lines(src);
    let program = Program::parse(&normalized).expect("should parse");
    assert_eq!(program.statements.len(), normalized.len());
}

/* ===================== Recovery ===================== */

#[test]
fn recovery_blanks_placeholder_lines() {
    // The blank line under the def header gets a placeholder noop at body
    // indentation; the dedented assignment after it would end the body, so
    // the program only parses once the placeholder line is blanked.
    let mut bad = vec![
        "def f():".to_string(),
        format!("        {PLACEHOLDER} = 0"),
        "    return 1".to_string(),
    ];
    let program = parse_with_recovery(&mut bad).expect("recovery should succeed");
    assert!(matches!(program.body.nodes[0], Node::Def { .. }));
    assert_eq!(bad[1], "");
}

#[test]
fn recovery_gives_up_without_placeholders() {
    let mut bad = vec!["x = = 1".to_string()];
    assert!(parse_with_recovery(&mut bad).is_err());
}
