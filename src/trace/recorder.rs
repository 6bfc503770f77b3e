//! Loop-aware trace recorder.
//!
//! Driven by the engine's observer callbacks. Loop entry and exit are
//! reconstructed purely from re-observed line positions and indentation,
//! because no explicit scope-exit event is assumed from the engine; a richer
//! engine could bypass `record_loop_begin`/`record_loop_end` entirely.
//!
//! The logical clock and the step budget are instance fields, created at
//! recording-pass start and discarded with the recorder, so sequential or
//! interleaved recordings never cross-contaminate.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::engine::{FrameId, FrameProbe, Observer, Value, MODULE_SCOPE, TRACED_MODULE};
use crate::errors::RuntimeFault;
use crate::lang::ast::Statement;
use crate::literal::parse_literal;
use crate::normalize::PLACEHOLDER;
use crate::render::{render, render_fault};

use super::{
    is_reserved, Event, Location, LoopMarker, MarkerKind, ReturnPayload, Snapshot, Timeline,
};

/// Step budget for a plain tracing pass.
pub const DEFAULT_TRACE_BUDGET: u64 = 100;

/// Step budget when the timeline also feeds test synthesis.
pub const SYNTH_TRACE_BUDGET: u64 = 1000;

/// Marker local that identifies class-body execution.
const CLASS_BODY_MARKER: &str = "__qualname__";

/// Scope names of comprehension frames, which are never recorded.
const COMPREHENSION_SCOPES: [&str; 2] = ["<listcomp>", "<dictcomp>"];

/// A caller-requested forced binding, applied at one `(line, time)` only.
#[derive(Debug, Clone)]
pub struct ForcedBinding {
    pub line: usize,
    pub time: u64,
    pub values: Vec<(String, String)>,
}

/// One active loop of one frame.
#[derive(Debug)]
struct LoopContext {
    frame: FrameId,
    header: usize,
    indent: usize,
    iter: u64,
}

/// Back-reference to the previously recorded snapshot.
#[derive(Debug, Clone, Copy)]
struct PrevRef {
    location: Location,
    frame: FrameId,
    index: usize,
}

/// Loop-aware timeline builder. One instance per recording pass.
pub struct TraceRecorder<'a> {
    statements: &'a [Statement],
    budget: u64,
    time: u64,
    detached: bool,
    timeline: Timeline,
    prev: Option<PrevRef>,
    active_loops: Vec<LoopContext>,
    preexisting: Option<BTreeSet<String>>,
    pending_fault: Option<RuntimeFault>,
    overrides: Vec<ForcedBinding>,
}

impl<'a> TraceRecorder<'a> {
    pub fn new(statements: &'a [Statement], budget: u64) -> Self {
        TraceRecorder {
            statements,
            budget,
            time: 0,
            detached: false,
            timeline: Timeline::default(),
            prev: None,
            active_loops: Vec::new(),
            preexisting: None,
            pending_fault: None,
            overrides: Vec::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: Vec<ForcedBinding>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Freeze and take the recorded timeline.
    pub fn finish(self) -> Timeline {
        self.timeline
    }

    /// Whether the step budget detached the recorder before the run ended.
    pub fn detached(&self) -> bool {
        self.detached
    }

    fn filtered(probe: &dyn FrameProbe) -> bool {
        COMPREHENSION_SCOPES.contains(&probe.scope_name())
            || probe.module_name() != TRACED_MODULE
            || probe.has_marker(CLASS_BODY_MARKER)
    }

    fn iter_str(&self) -> String {
        let parts: Vec<String> = self.active_loops.iter().map(|l| l.iter.to_string()).collect();
        parts.join(",")
    }

    fn lines_str(&self) -> String {
        let parts: Vec<String> = self
            .active_loops
            .iter()
            .map(|l| l.header.to_string())
            .collect();
        parts.join(",")
    }

    /// Lines lexically inside the loop whose header is at `header`.
    fn lines_in_loop(&self, header: usize) -> Vec<usize> {
        let loop_indent = self.statements[header].indent;
        let mut lines = Vec::new();
        for stmt in &self.statements[header + 1..] {
            if stmt.text.trim().is_empty() {
                continue;
            }
            if stmt.indent <= loop_indent {
                break;
            }
            lines.push(stmt.line);
        }
        lines
    }

    /// Emit a marker for the innermost active loop to all its body lines.
    fn emit_marker_for_innermost(&mut self, kind: MarkerKind) {
        let Some(top) = self.active_loops.last() else {
            return;
        };
        let header = top.header;
        let marker = LoopMarker {
            kind,
            loop_iters: self.iter_str(),
            loop_lines: self.lines_str(),
        };
        for line in self.lines_in_loop(header) {
            self.timeline
                .at(Location::Line(line))
                .push(Event::Marker(marker.clone()));
        }
    }

    /// Step 1: detect loop exit from the re-observed position.
    ///
    /// A return-bearing previous statement from the same frame pops every
    /// loop of that frame (the return bypassed any number of headers); an
    /// indentation drop pops just the innermost, with the break-bearing
    /// previous statement compensating the header increment the break
    /// skipped.
    fn record_loop_end(&mut self, probe: &mut dyn FrameProbe, line: usize) {
        let Some(prev) = self.prev else {
            return;
        };
        let owns_innermost = self
            .active_loops
            .last()
            .is_some_and(|l| l.frame == probe.id());
        if !owns_innermost {
            return;
        }

        let prev_stmt = &self.statements[prev.location.line()];
        let loop_indent = self.active_loops[self.active_loops.len() - 1].indent;
        let header = self.active_loops[self.active_loops.len() - 1].header;
        let curr_indent = self.statements[line].indent;

        if prev_stmt.is_returnish() && prev.frame == probe.id() {
            while self
                .active_loops
                .last()
                .is_some_and(|l| l.frame == probe.id())
            {
                if let Some(top) = self.active_loops.last_mut() {
                    top.iter += 1;
                }
                self.emit_marker_for_innermost(MarkerKind::End);
                self.active_loops.pop();
            }
        } else if curr_indent <= loop_indent && line != header {
            if prev_stmt.is_breakish() {
                if let Some(top) = self.active_loops.last_mut() {
                    top.iter += 1;
                }
            }
            self.emit_marker_for_innermost(MarkerKind::End);
            self.active_loops.pop();
        }
    }

    /// Step 2: stamp a snapshot, unless the budget is exhausted.
    fn record_environment(
        &mut self,
        probe: &mut dyn FrameProbe,
        loc: Location,
        ret: Option<ReturnPayload>,
    ) {
        if self.time >= self.budget {
            if !self.detached {
                debug!(steps = self.time, "step budget exhausted; detaching recorder");
            }
            self.detached = true;
            return;
        }

        self.apply_forced_bindings(probe, loc);

        let mut bindings = std::collections::BTreeMap::new();
        let in_module = probe.scope_name() == MODULE_SCOPE;
        for name in probe.bound_names() {
            if name == PLACEHOLDER {
                continue;
            }
            if is_reserved(&name) {
                warn!(name = %name, "binding shadows a reserved key; omitted from snapshot");
                continue;
            }
            if in_module
                && self
                    .preexisting
                    .as_ref()
                    .is_some_and(|pre| pre.contains(&name))
            {
                continue;
            }
            if let Some(value) = probe.value_of(&name) {
                if let Some(text) = render(value) {
                    bindings.insert(name, text);
                }
            }
        }

        let snapshot = Snapshot {
            time: self.time,
            frame: probe.id(),
            location: loc,
            prev_location: self.prev.map(|p| p.location),
            next_location: None,
            loop_iters: self.iter_str(),
            loop_lines: self.lines_str(),
            bindings,
            ret,
        };

        let events = self.timeline.at(loc);
        events.push(Event::Snapshot(snapshot));
        let index = events.len() - 1;

        if let Some(prev) = self.prev {
            if let Some(Event::Snapshot(prev_snap)) = self
                .timeline
                .entries
                .get_mut(&prev.location)
                .and_then(|evs| evs.get_mut(prev.index))
            {
                prev_snap.next_location = Some(loc);
            }
        }

        self.prev = Some(PrevRef {
            location: loc,
            frame: probe.id(),
            index,
        });
        self.time += 1;
    }

    /// Step 3: detect loop entry at a loop header line.
    fn record_loop_begin(&mut self, probe: &mut dyn FrameProbe, line: usize) {
        let stmt = &self.statements[line];
        if !stmt.is_loop_header() {
            return;
        }
        if let Some(top) = self.active_loops.last_mut() {
            if top.frame == probe.id() && top.header == line {
                top.iter += 1;
                return;
            }
        }
        self.active_loops.push(LoopContext {
            frame: probe.id(),
            header: line,
            indent: stmt.indent,
            iter: 0,
        });
        self.emit_marker_for_innermost(MarkerKind::Begin);
    }

    /// Pop any loops the exiting frame still owns.
    ///
    /// A loop that runs to natural exhaustion at the very end of a frame is
    /// never re-observed from a lower indentation, so the return event is
    /// the last chance to close it. The header's own increments already
    /// counted every completed iteration; only a break-bearing final
    /// statement still owes one.
    fn release_frame_loops(&mut self, probe: &mut dyn FrameProbe, line: usize) {
        let breakish = self
            .statements
            .get(line)
            .is_some_and(Statement::is_breakish);
        let mut innermost = true;
        while self
            .active_loops
            .last()
            .is_some_and(|l| l.frame == probe.id())
        {
            if innermost && breakish {
                if let Some(top) = self.active_loops.last_mut() {
                    top.iter += 1;
                }
            }
            innermost = false;
            self.emit_marker_for_innermost(MarkerKind::End);
            self.active_loops.pop();
        }
    }

    fn apply_forced_bindings(&mut self, probe: &mut dyn FrameProbe, loc: Location) {
        if self.overrides.is_empty() {
            return;
        }
        let line = loc.line();
        let time = self.time;
        let commands: Vec<(String, String)> = self
            .overrides
            .iter()
            .filter(|o| o.line == line && o.time == time)
            .flat_map(|o| o.values.iter().cloned())
            .collect();
        for (name, raw) in commands {
            match parse_literal(&raw) {
                Some(value) => probe.set_binding(&name, value),
                None => warn!(name = %name, raw = %raw, "unparsable forced value; ignored"),
            }
        }
    }
}

impl Observer for TraceRecorder<'_> {
    fn on_statement(&mut self, probe: &mut dyn FrameProbe, line: usize) {
        if probe.scope_name() == MODULE_SCOPE && self.preexisting.is_none() {
            self.preexisting = Some(probe.bound_names().into_iter().collect());
        }
        if Self::filtered(probe) || self.detached {
            return;
        }
        self.pending_fault = None;
        self.record_loop_end(probe, line);
        self.record_environment(probe, Location::Line(line), None);
        self.record_loop_begin(probe, line);
    }

    fn on_exception(&mut self, _probe: &mut dyn FrameProbe, fault: &RuntimeFault) {
        // Captured once; the next return consumes it to pick exception
        // over value.
        self.pending_fault = Some(fault.clone());
    }

    fn on_return(&mut self, probe: &mut dyn FrameProbe, line: usize, value: &Value) {
        if Self::filtered(probe) || self.detached {
            return;
        }
        let payload = match self.pending_fault.take() {
            Some(fault) => Some(ReturnPayload::Exception(render_fault(&fault))),
            None => match render(value) {
                Some(text) if probe.scope_name() != MODULE_SCOPE => {
                    Some(ReturnPayload::Value(text))
                }
                _ => None,
            },
        };
        self.record_environment(probe, Location::Return(line), payload);
        self.record_loop_end(probe, line);
        self.release_frame_loops(probe, line);
    }
}
