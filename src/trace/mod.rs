//! Trace timeline: snapshots, loop markers, and the recorder/projector that
//! build and refine them.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::engine::FrameId;

pub mod projector;
pub mod recorder;

#[cfg(test)]
mod tests;

pub use projector::project;
pub use recorder::{ForcedBinding, TraceRecorder, DEFAULT_TRACE_BUDGET, SYNTH_TRACE_BUDGET};

/// Keys the timeline claims for itself. User bindings with these names are
/// omitted from snapshots so they can never collide with timeline metadata,
/// and equality checks always skip them.
pub const RESERVED_KEYS: [&str; 6] = ["time", "#", "$", "lineno", "prev_lineno", "next_lineno"];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_KEYS.contains(&name)
}

/// A timeline location: a source line, or the return event of a frame whose
/// last statement was on that line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Location {
    Line(usize),
    Return(usize),
}

impl Location {
    /// The underlying source line.
    pub fn line(&self) -> usize {
        match self {
            Location::Line(l) | Location::Return(l) => *l,
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Location::Return(_))
    }

    fn to_json(self) -> JsonValue {
        match self {
            Location::Line(l) => json!(l),
            Location::Return(l) => json!(format!("R{l}")),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Line(l) => write!(f, "{l}"),
            Location::Return(l) => write!(f, "R{l}"),
        }
    }
}

/// What a return-location snapshot carries besides bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnPayload {
    /// Rendered return value.
    Value(String),
    /// Rendered exception marker: a fault reached this return.
    Exception(String),
}

/// One recorded observation of a frame's bindings at a location.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Global logical time; unique and strictly increasing across the run.
    pub time: u64,
    pub frame: FrameId,
    pub location: Location,
    pub prev_location: Option<Location>,
    pub next_location: Option<Location>,
    /// Active loop iteration counts, innermost last, comma-joined.
    pub loop_iters: String,
    /// Active loop header lines, comma-joined.
    pub loop_lines: String,
    /// Rendered bindings. Reserved names and unrenderable values omitted.
    pub bindings: BTreeMap<String, String>,
    pub ret: Option<ReturnPayload>,
}

impl Snapshot {
    pub fn is_exception(&self) -> bool {
        matches!(self.ret, Some(ReturnPayload::Exception(_)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Begin,
    End,
}

/// Pseudo-snapshot marking a loop's begin/end on every body line.
#[derive(Debug, Clone)]
pub struct LoopMarker {
    pub kind: MarkerKind,
    pub loop_iters: String,
    pub loop_lines: String,
}

#[derive(Debug, Clone)]
pub enum Event {
    Snapshot(Snapshot),
    Marker(LoopMarker),
}

impl Event {
    pub fn as_snapshot(&self) -> Option<&Snapshot> {
        match self {
            Event::Snapshot(s) => Some(s),
            Event::Marker(_) => None,
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            Event::Marker(m) => {
                let key = match m.kind {
                    MarkerKind::Begin => "begin_loop",
                    MarkerKind::End => "end_loop",
                };
                let mut obj = JsonMap::new();
                obj.insert(key.to_string(), json!(m.loop_iters));
                obj.insert("#".to_string(), json!(m.loop_iters));
                obj.insert("$".to_string(), json!(m.loop_lines));
                JsonValue::Object(obj)
            }
            Event::Snapshot(s) => {
                let mut obj = JsonMap::new();
                obj.insert("time".to_string(), json!(s.time));
                obj.insert("#".to_string(), json!(s.loop_iters));
                obj.insert("$".to_string(), json!(s.loop_lines));
                for (name, text) in &s.bindings {
                    obj.insert(name.clone(), json!(text));
                }
                obj.insert("lineno".to_string(), s.location.to_json());
                if let Some(prev) = s.prev_location {
                    obj.insert("prev_lineno".to_string(), prev.to_json());
                }
                if let Some(next) = s.next_location {
                    obj.insert("next_lineno".to_string(), next.to_json());
                }
                match &s.ret {
                    Some(ReturnPayload::Value(text)) => {
                        obj.insert("rv".to_string(), json!(text));
                    }
                    Some(ReturnPayload::Exception(text)) => {
                        obj.insert("Exception Thrown".to_string(), json!(text));
                    }
                    None => {}
                }
                JsonValue::Object(obj)
            }
        }
    }
}

/// Location -> ordered event sequence. Also the shape of the projected view.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub entries: BTreeMap<Location, Vec<Event>>,
}

impl Timeline {
    pub fn at(&mut self, loc: Location) -> &mut Vec<Event> {
        self.entries.entry(loc).or_default()
    }

    pub fn events(&self, loc: Location) -> &[Event] {
        self.entries.get(&loc).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries
            .values()
            .flatten()
            .filter_map(Event::as_snapshot)
    }

    /// Persisted JSON shape: location key -> event objects. Frame identities
    /// are in-memory only and never serialized.
    pub fn to_json(&self) -> JsonValue {
        let mut obj = JsonMap::new();
        for (loc, events) in &self.entries {
            let list: Vec<JsonValue> = events.iter().map(Event::to_json).collect();
            obj.insert(loc.to_string(), JsonValue::Array(list));
        }
        JsonValue::Object(obj)
    }
}
