//! Static write-set analysis.
//!
//! A pure function of the parsed syntax tree: for every line, the names
//! assigned there. Subscript targets resolve to their root name; a target
//! with no resolvable root is skipped with a warning, never a failure.

use std::collections::BTreeMap;

use tracing::warn;

use crate::lang::ast::{Program, StmtKind, Target};
use crate::normalize::PLACEHOLDER;

/// Line -> names assigned on that line.
pub type WriteSet = BTreeMap<usize, Vec<String>>;

/// Compute the write set of a program. No runtime dependency.
pub fn compute_writes(program: &Program) -> WriteSet {
    let mut writes = WriteSet::new();
    let mut record = |line: usize, name: &str| {
        if name != PLACEHOLDER {
            writes.entry(line).or_default().push(name.to_string());
        }
    };
    for stmt in &program.statements {
        match &stmt.kind {
            StmtKind::Assign { target, .. } => match target {
                Target::Name(name) => record(stmt.line, name),
                Target::Subscript { .. } => match target.root_name() {
                    Some(name) => record(stmt.line, name),
                    None => {
                        warn!(line = stmt.line, "did not find a root name in subscript target")
                    }
                },
            },
            StmtKind::For { var, .. } => record(stmt.line, var),
            _ => {}
        }
    }
    writes
}
