//! Example verification.
//!
//! For each (block, example): if some live next-state at the block's first
//! code line already matches the example, it is proved and never re-run.
//! Otherwise an isolated unit test is synthesized from the block's own code
//! and executed to completion, with all expected-key mismatches collected
//! rather than short-circuiting.

use std::collections::BTreeMap;

use tracing::debug;

use crate::engine::{Engine, Value};
use crate::lang::ast::StmtKind;
use crate::lang::{parse_line, parse_with_recovery};
use crate::literal::{literal_eq, literal_eq_value, parse_literal};
use crate::normalize::{indent_of, normalize, strip_comment};
use crate::trace::{is_reserved, Location, Timeline};

use super::comments::{ExampleCase, INPUT_SUFFIX};
use super::locator::SpecBlock;

/// Name the generated call statement binds a function's result to.
pub const RESULT_NAME: &str = "rv";

/// Outcome of one (block, example) check.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub passed: bool,
    pub diagnostic: String,
    /// Whether an isolated test actually ran (false when the example was
    /// proved by the live timeline).
    pub replayed: bool,
}

/// (blockId, exampleIndex) -> outcome. Ordered for deterministic reporting.
pub type TestOutcomes = BTreeMap<(i64, usize), TestOutcome>;

/// Check every example of every block against the projected timeline,
/// replaying the unproved ones in isolation.
pub fn verify_blocks(
    blocks: &[SpecBlock],
    projected: &Timeline,
    engine: &Engine,
) -> TestOutcomes {
    let mut outcomes = TestOutcomes::new();
    for block in blocks {
        for (index, example) in block.comment.examples.iter().enumerate() {
            let outcome = if proved_by_timeline(block, example, projected) {
                debug!(block = block.id, example = index, "proved by live timeline");
                TestOutcome {
                    passed: true,
                    diagnostic: String::new(),
                    replayed: false,
                }
            } else {
                run_unit_test(block, example, engine)
            };
            outcomes.insert((block.id, index), outcome);
        }
    }
    outcomes
}

/// Does some reachable next-state at the block's first code line match the
/// example on every non-reserved key?
fn proved_by_timeline(block: &SpecBlock, example: &ExampleCase, projected: &Timeline) -> bool {
    let Some(line) = block.first_code_line() else {
        return false;
    };
    let target = example.target_env();
    projected
        .events(Location::Line(line))
        .iter()
        .filter_map(|e| e.as_snapshot())
        .any(|snapshot| {
            target.iter().all(|(name, expected)| {
                if is_reserved(name) {
                    return true;
                }
                snapshot
                    .bindings
                    .get(name)
                    .is_some_and(|rendered| literal_eq(expected, rendered))
            })
        })
}

/// Synthesize and execute one isolated unit test.
fn run_unit_test(block: &SpecBlock, example: &ExampleCase, engine: &Engine) -> TestOutcome {
    let failed = |diagnostic: String| TestOutcome {
        passed: false,
        diagnostic,
        replayed: true,
    };

    let mut code: Vec<String> = match block.first_code_offset {
        Some(off) => block.local_lines[off..].to_vec(),
        None => Vec::new(),
    };
    dedent(&mut code);

    if block.function_scoped {
        match generated_call(&code) {
            Ok(call) => code.push(call),
            Err(message) => return failed(message),
        }
    }

    let mut runnable = normalize(&code.join("\n")).runnable;
    let program = match parse_with_recovery(&mut runnable) {
        Ok(program) => program,
        Err(err) => return failed(format!("test code failed to parse: {err}")),
    };

    let mut inputs: BTreeMap<String, Value> = BTreeMap::new();
    for (name, raw) in &example.inputs {
        let stripped = name.strip_suffix(INPUT_SUFFIX).unwrap_or(name);
        let value = parse_literal(raw).unwrap_or_else(|| Value::Str(raw.clone()));
        inputs.insert(stripped.to_string(), value);
    }

    let namespace = match engine.run(&program, inputs, None) {
        Ok(namespace) => namespace,
        Err(fault) => return failed(fault.to_string()),
    };

    let mut mismatches = Vec::new();
    for (name, expected) in &example.outputs {
        match namespace.get(name) {
            None => mismatches.push(format!(
                "expected: {name} to be {expected}, but got <undefined>"
            )),
            Some(actual) if !literal_eq_value(expected, actual) => mismatches.push(format!(
                "expected: {name} to be {expected}, but got {}",
                actual.repr()
            )),
            Some(_) => {}
        }
    }

    TestOutcome {
        passed: mismatches.is_empty(),
        diagnostic: mismatches.join("\n"),
        replayed: true,
    }
}

/// Build the call statement appended to a function-scoped block's test:
/// the function invoked with its declared parameters in order, bound to a
/// fixed result name.
fn generated_call(code: &[String]) -> Result<String, String> {
    let def_line = code
        .first()
        .ok_or_else(|| "function-scoped block has no code".to_string())?;
    match parse_line(strip_comment(def_line).trim_end(), 0) {
        Ok(StmtKind::Def { name, params }) => {
            Ok(format!("{RESULT_NAME} = {name}({})", params.join(", ")))
        }
        _ => Err(format!(
            "function-scoped block does not start with a definition: {def_line:?}"
        )),
    }
}

/// Strip the common leading indentation so a block sliced from inside a
/// nested scope runs standalone.
fn dedent(lines: &mut [String]) {
    let common = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);
    if common == 0 {
        return;
    }
    for line in lines.iter_mut() {
        if line.len() >= common {
            *line = line[common..].to_string();
        } else {
            line.clear();
        }
    }
}
