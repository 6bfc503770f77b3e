//! Test helpers for trace tests.

use crate::engine::Engine;
use crate::errors::RuntimeFault;
use crate::lang::ast::Program;
use crate::lang::parse_with_recovery;
use crate::normalize::normalize;
use crate::trace::{Event, Location, MarkerKind, Snapshot, Timeline, TraceRecorder};

pub struct Traced {
    pub result: Result<(), RuntimeFault>,
    pub timeline: Timeline,
    pub program: Program,
}

/// Normalize, parse, and trace a source string with the given step budget.
pub fn trace_with_budget(src: &str, budget: u64) -> Traced {
    let mut lines = normalize(src).runnable;
    let program = parse_with_recovery(&mut lines).expect("source should parse");
    let mut recorder = TraceRecorder::new(&program.statements, budget);
    let result = Engine::default()
        .run(&program, Default::default(), Some(&mut recorder))
        .map(|_| ());
    Traced {
        result,
        timeline: recorder.finish(),
        program,
    }
}

pub fn trace_source(src: &str) -> Traced {
    trace_with_budget(src, crate::trace::DEFAULT_TRACE_BUDGET)
}

pub fn snapshots_at(timeline: &Timeline, loc: Location) -> Vec<&Snapshot> {
    timeline
        .events(loc)
        .iter()
        .filter_map(Event::as_snapshot)
        .collect()
}

pub fn markers_at(timeline: &Timeline, loc: Location, kind: MarkerKind) -> Vec<&Event> {
    timeline
        .events(loc)
        .iter()
        .filter(|e| matches!(e, Event::Marker(m) if m.kind == kind))
        .collect()
}
