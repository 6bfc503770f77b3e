//! Observer callback ordering tests.

use super::helpers::{trace_events, Event};

#[test]
fn loop_header_is_observed_per_iteration_and_on_exhaustion() {
    let (result, log) = trace_events("x = 1\nfor i in range(3):\n    x = x + i\n");
    assert!(result.is_ok());
    let header_hits = log
        .events
        .iter()
        .filter(|e| matches!(e, Event::Statement { line: 1, .. }))
        .count();
    // One initial visit, one per loop-around, one exhaustion check.
    assert_eq!(header_hits, 4);
}

#[test]
fn break_skips_the_final_header_visit() {
    let src = "for i in range(9):\n    if i == 1:\n        break\n";
    let (_, log) = trace_events(src);
    let header_hits = log
        .events
        .iter()
        .filter(|e| matches!(e, Event::Statement { line: 0, .. }))
        .count();
    // Initial visit plus one loop-around; break leaves without re-testing.
    assert_eq!(header_hits, 2);
}

#[test]
fn function_return_reports_value_and_line() {
    let (_, log) = trace_events("def f(a):\n    return a + 1\nr = f(2)\n");
    let ret = log
        .events
        .iter()
        .find(|e| matches!(e, Event::Return { scope, .. } if scope == "f"))
        .expect("function return event");
    match ret {
        Event::Return { line, value, .. } => {
            assert_eq!(*line, 1);
            assert_eq!(value, "3");
        }
        _ => unreachable!(),
    }
}

#[test]
fn module_return_event_closes_the_run() {
    let (_, log) = trace_events("x = 1\n");
    match log.events.last() {
        Some(Event::Return { scope, .. }) => assert_eq!(scope, "<module>"),
        other => panic!("expected module return, got {other:?}"),
    }
}

#[test]
fn exception_notifier_precedes_each_unwinding_return() {
    let src = "def f(a):\n    return a / 0\nr = f(1)\n";
    let (result, log) = trace_events(src);
    assert!(result.is_err());
    let tail: Vec<&Event> = log.events.iter().rev().take(4).collect();
    // Reversed order: module return, module exception, f return, f exception.
    assert!(matches!(tail[0], Event::Return { scope, .. } if scope == "<module>"));
    assert!(matches!(tail[1], Event::Exception { .. }));
    assert!(matches!(tail[2], Event::Return { scope, .. } if scope == "f"));
    assert!(matches!(tail[3], Event::Exception { .. }));
}

#[test]
fn statements_inside_functions_report_the_function_scope() {
    let (_, log) = trace_events("def f(a):\n    b = a\n    return b\nr = f(1)\n");
    assert!(log
        .events
        .iter()
        .any(|e| matches!(e, Event::Statement { scope, line: 1 } if scope == "f")));
}
