//! Persisted output records.
//!
//! Record A carries the run's status, write set, and projected timeline;
//! record B carries the per-example test outcomes and block start lines.
//! Both are written as siblings of the traced source file.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::analysis::WriteSet;
use crate::spec::{SpecBlock, TestOutcomes};
use crate::trace::Timeline;

/// Run completed cleanly.
pub const STATUS_CLEAN: i64 = 0;
/// The program never parsed; nothing ran.
pub const STATUS_STATIC_FAILURE: i64 = 1;
/// The traced program faulted at runtime.
pub const STATUS_RUNTIME_FAILURE: i64 = 2;

/// Record A: `[statusCode, writeSet, projectedTimeline]`.
pub fn record_a(status: i64, writes: &WriteSet, projected: &Timeline) -> JsonValue {
    json!([status, writes_json(writes), projected.to_json()])
}

fn writes_json(writes: &WriteSet) -> JsonValue {
    let mut obj = JsonMap::new();
    for (line, names) in writes {
        obj.insert(line.to_string(), json!(names));
    }
    JsonValue::Object(obj)
}

/// Record B: `[outcomesByBlockAndExample, blockStartLines]`.
pub fn record_b(outcomes: &TestOutcomes, block_starts: &BTreeMap<i64, usize>) -> JsonValue {
    let mut results = JsonMap::new();
    for ((block, example), outcome) in outcomes {
        results.insert(
            format!("({block}, {example})"),
            json!([outcome.passed, outcome.diagnostic]),
        );
    }
    let mut starts = JsonMap::new();
    for (block, line) in block_starts {
        starts.insert(block.to_string(), json!(line));
    }
    json!([JsonValue::Object(results), JsonValue::Object(starts)])
}

/// Block id -> start line, for record B.
pub fn block_start_lines(blocks: &[SpecBlock]) -> BTreeMap<i64, usize> {
    blocks.iter().map(|b| (b.id, b.start_line)).collect()
}

/// `<source>.out` for record A, `<source>.tests.out` for record B.
pub fn sibling_path(source: &Path, suffix: &str) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn write_json(path: &Path, value: &JsonValue) -> io::Result<()> {
    fs::write(path, value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::TestOutcome;

    #[test]
    fn record_a_shape() {
        let mut writes = WriteSet::new();
        writes.insert(0, vec!["x".to_string()]);
        let value = record_a(STATUS_CLEAN, &writes, &Timeline::default());
        assert_eq!(value[0], json!(0));
        assert_eq!(value[1]["0"], json!(["x"]));
        assert!(value[2].is_object());
    }

    #[test]
    fn record_b_uses_tuple_style_keys() {
        let mut outcomes = TestOutcomes::new();
        outcomes.insert(
            (1, 0),
            TestOutcome {
                passed: true,
                diagnostic: String::new(),
                replayed: false,
            },
        );
        outcomes.insert(
            (-1, 2),
            TestOutcome {
                passed: false,
                diagnostic: "expected: b to be 4, but got 6".to_string(),
                replayed: true,
            },
        );
        let mut starts = BTreeMap::new();
        starts.insert(1i64, 3usize);
        starts.insert(-1i64, 7usize);
        let value = record_b(&outcomes, &starts);
        assert_eq!(value[0]["(1, 0)"], json!([true, ""]));
        assert_eq!(
            value[0]["(-1, 2)"],
            json!([false, "expected: b to be 4, but got 6"])
        );
        assert_eq!(value[1]["1"], json!(3));
        assert_eq!(value[1]["-1"], json!(7));
    }

    #[test]
    fn sibling_paths_append_suffixes() {
        let a = sibling_path(Path::new("/tmp/prog.py"), ".out");
        assert_eq!(a, PathBuf::from("/tmp/prog.py.out"));
        let b = sibling_path(Path::new("/tmp/prog.py"), ".tests.out");
        assert_eq!(b, PathBuf::from("/tmp/prog.py.tests.out"));
    }
}
