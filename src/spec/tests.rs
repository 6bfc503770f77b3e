//! Spec block tests: locating, proving against the live timeline, and
//! isolated test replay.

use crate::engine::Engine;
use crate::lang::parse_with_recovery;
use crate::normalize::normalize;
use crate::spec::{locate_blocks, verify_blocks, SpecBlock, TestOutcomes};
use crate::trace::{project, TraceRecorder, SYNTH_TRACE_BUDGET};

/// Run the whole pipeline: normalize, locate, trace, project, verify.
fn verify_source(src: &str) -> (TestOutcomes, Vec<SpecBlock>) {
    let normalized = normalize(src);
    let blocks = locate_blocks(&normalized.raw);
    let mut runnable = normalized.runnable.clone();
    let program = parse_with_recovery(&mut runnable).expect("source should parse");
    let mut recorder = TraceRecorder::new(&program.statements, SYNTH_TRACE_BUDGET);
    let _ = Engine::default().run(&program, Default::default(), Some(&mut recorder));
    let projected = project(&recorder.finish(), &program.statements);
    let outcomes = verify_blocks(&blocks, &projected, &Engine::default());
    (outcomes, blocks)
}

/* ===================== Locator ===================== */

#[test]
fn explicit_blocks_get_positive_scan_order_ids() {
    let src = "\
#! Start of example block 1 of: b
#! 1) a_in = 2 => b = 4
b = a * 2
#! End of example block 1
#! Start of example block 2 of: c
#! 1) b_in = 4 => c = 5
c = b + 1
#! End of example block 2
a = 1
";
    let blocks = locate_blocks(&normalize(src).raw);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].id, 1);
    assert_eq!(blocks[1].id, 2);
    assert_eq!(blocks[0].start_line, 0);
    assert_eq!(blocks[0].first_code_offset, Some(2));
    assert!(!blocks[0].function_scoped);
}

#[test]
fn nested_blocks_are_both_located() {
    let src = "\
#! Start of example block 1 of: b
#! 1) a_in = 2 => b = 4
#! Start of example block 2 of: c
#! 1) a_in = 2 => c = 1
c = 1
#! End of example block 2
b = a * 2
#! End of example block 1
";
    let blocks = locate_blocks(&normalize(src).raw);
    assert_eq!(blocks.len(), 2);
    // The outer block's extent covers the inner one.
    assert!(blocks[0].end_line > blocks[1].end_line);
}

#[test]
fn function_scoped_block_gets_negative_id_and_inferred_extent() {
    let src = "\
#! Start of example block 1 of: rv
#! 1) a_in = 2 => rv = 3
def f(a):
    return a + 1
x = 1
";
    let blocks = locate_blocks(&normalize(src).raw);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].id, -1);
    assert!(blocks[0].function_scoped);
    assert_eq!(blocks[0].first_code_offset, Some(2));
    // Extent ends where indentation returns to the definition's level.
    assert_eq!(blocks[0].end_line, 4);
}

#[test]
fn unparsable_block_is_skipped_not_fatal() {
    let src = "\
#! Start of example block 1 of: b
#! broken example line
b = 1
#! End of example block 1
#! Start of example block 2 of: c
#! 1) b_in = 1 => c = 2
c = b + 1
#! End of example block 2
";
    let blocks = locate_blocks(&normalize(src).raw);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].id, 2);
}

/* ===================== Verifier ===================== */

#[test]
fn example_matching_the_live_run_is_proved_without_replay() {
    // The live run enters the block with a = 2 and leaves b = 4, exactly
    // the example's environment.
    let src = "\
a = 2
#! Start of example block 1 of: b
#! 1) a_in = 2 => b = 4
b = a * 2
#! End of example block 1
";
    let (outcomes, blocks) = verify_source(src);
    assert_eq!(blocks.len(), 1);
    let outcome = &outcomes[&(1, 0)];
    assert!(outcome.passed);
    assert!(!outcome.replayed);
    assert!(outcome.diagnostic.is_empty());
}

#[test]
fn unexercised_example_is_replayed_and_passes() {
    // The live run uses a = 5; the example's a = 2 never appears, so an
    // isolated test runs the block's own code.
    let src = "\
a = 5
#! Start of example block 1 of: b
#! 1) a_in = 2 => b = 4
b = a * 2
#! End of example block 1
";
    let (outcomes, _) = verify_source(src);
    let outcome = &outcomes[&(1, 0)];
    assert!(outcome.passed);
    assert!(outcome.replayed);
}

#[test]
fn failing_example_names_the_key_and_both_values() {
    let src = "\
a = 5
#! Start of example block 1 of: b
#! 1) a_in = 2 => b = 4
b = a * 3
#! End of example block 1
";
    let (outcomes, _) = verify_source(src);
    let outcome = &outcomes[&(1, 0)];
    assert!(!outcome.passed);
    assert!(outcome.diagnostic.contains('b'));
    assert!(outcome.diagnostic.contains('4'));
    assert!(outcome.diagnostic.contains('6'));
}

#[test]
fn function_scoped_block_appends_a_generated_call() {
    let src = "\
#! Start of example block 1 of: rv
#! 1) a_in = 2 => rv = 3
def f(a):
    return a + 1
x = 1
";
    let (outcomes, _) = verify_source(src);
    let outcome = &outcomes[&(-1, 0)];
    assert!(outcome.passed);
    assert!(outcome.replayed);
}

#[test]
fn throwing_test_is_a_failing_outcome_with_the_fault_text() {
    let src = "\
a = 5
#! Start of example block 1 of: b
#! 1) a_in = 2 => b = 4
b = a / 0
#! End of example block 1
";
    let (outcomes, _) = verify_source(src);
    let outcome = &outcomes[&(1, 0)];
    assert!(!outcome.passed);
    assert!(outcome.diagnostic.contains("ZeroDivisionError"));
}

#[test]
fn failing_example_does_not_abort_its_siblings() {
    let src = "\
a = 5
#! Start of example block 1 of: b
#! 1) a_in = 2 => b = 5
#! 2) a_in = 3 => b = 9
b = a * 3
#! End of example block 1
";
    let (outcomes, _) = verify_source(src);
    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[&(1, 0)].passed);
    assert!(outcomes[&(1, 1)].passed);
}

#[test]
fn all_mismatches_are_collected_not_short_circuited() {
    let src = "\
x = 0
#! Start of example block 1 of: b, c
#! 1) a_in = 1 => b = 10, c = 20
b = a + 1
c = a + 2
#! End of example block 1
";
    let (outcomes, _) = verify_source(src);
    let outcome = &outcomes[&(1, 0)];
    assert!(!outcome.passed);
    assert!(outcome.diagnostic.contains("b"));
    assert!(outcome.diagnostic.contains("c"));
    assert_eq!(outcome.diagnostic.lines().count(), 2);
}
