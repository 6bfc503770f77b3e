//! Test helpers for engine tests.

use std::collections::BTreeMap;

use crate::engine::{Engine, FrameProbe, Observer, Value};
use crate::errors::RuntimeFault;
use crate::lang::ast::Program;
use crate::lang::parse_with_recovery;
use crate::normalize::normalize;

/// Normalize and parse a source string.
pub fn parse_source(src: &str) -> Program {
    let mut lines = normalize(src).runnable;
    parse_with_recovery(&mut lines).expect("source should parse")
}

/// Run a program and return the final module bindings.
pub fn run_source(src: &str) -> BTreeMap<String, Value> {
    run_with_inputs(src, BTreeMap::new()).expect("program should run cleanly")
}

/// Run a program with pre-seeded module bindings.
pub fn run_with_inputs(
    src: &str,
    inputs: BTreeMap<String, Value>,
) -> Result<BTreeMap<String, Value>, RuntimeFault> {
    let program = parse_source(src);
    Engine::default().run(&program, inputs, None)
}

/// Observer that logs every callback it receives, in order.
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Statement { scope: String, line: usize },
    Exception { kind: String },
    Return { scope: String, line: usize, value: String },
}

impl Observer for EventLog {
    fn on_statement(&mut self, frame: &mut dyn FrameProbe, line: usize) {
        self.events.push(Event::Statement {
            scope: frame.scope_name().to_string(),
            line,
        });
    }

    fn on_exception(&mut self, _frame: &mut dyn FrameProbe, fault: &RuntimeFault) {
        self.events.push(Event::Exception {
            kind: fault.kind.to_string(),
        });
    }

    fn on_return(&mut self, frame: &mut dyn FrameProbe, line: usize, value: &Value) {
        self.events.push(Event::Return {
            scope: frame.scope_name().to_string(),
            line,
            value: value.repr(),
        });
    }
}

/// Run a program while logging observer events.
pub fn trace_events(src: &str) -> (Result<(), RuntimeFault>, EventLog) {
    let program = parse_source(src);
    let mut log = EventLog::default();
    let result = Engine::default()
        .run(&program, BTreeMap::new(), Some(&mut log))
        .map(|_| ());
    (result, log)
}
