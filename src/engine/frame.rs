//! Call frames and the narrow frame capability.
//!
//! The trace recorder never touches the engine's frame representation
//! directly; it sees only the [`FrameProbe`] capability. A richer engine can
//! hand the recorder any implementation with stable identities.

use std::collections::BTreeMap;

use super::values::Value;

/// Scope name reported for the top-level frame.
pub const MODULE_SCOPE: &str = "<module>";

/// Module name reported for frames of the traced source.
pub const TRACED_MODULE: &str = "<string>";

/// Opaque stable frame identity. Only equality is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub u64);

/// What the recorder may do with a live frame.
pub trait FrameProbe {
    /// Stable identity of this activation.
    fn id(&self) -> FrameId;
    /// `"<module>"` for the top-level frame, the function name otherwise.
    fn scope_name(&self) -> &str;
    /// Originating module of the frame's code.
    fn module_name(&self) -> &str;
    /// Names currently bound in the frame.
    fn bound_names(&self) -> Vec<String>;
    fn value_of(&self, name: &str) -> Option<&Value>;
    /// Whether a marker local (e.g. a class-body qualifying name) is bound.
    fn has_marker(&self, name: &str) -> bool;
    /// Force a binding. Used only by the forced-value command queue.
    fn set_binding(&mut self, name: &str, value: Value);
}

/// One live activation inside the engine.
#[derive(Debug)]
pub struct FrameData {
    pub id: FrameId,
    pub scope: String,
    pub bindings: BTreeMap<String, Value>,
    /// Line currently executing; reported as the return line on frame exit.
    pub current_line: usize,
}

impl FrameData {
    pub fn module(id: FrameId, initial: BTreeMap<String, Value>) -> FrameData {
        FrameData {
            id,
            scope: MODULE_SCOPE.to_string(),
            bindings: initial,
            current_line: 0,
        }
    }

    pub fn function(id: FrameId, name: &str, bindings: BTreeMap<String, Value>) -> FrameData {
        FrameData {
            id,
            scope: name.to_string(),
            bindings,
            current_line: 0,
        }
    }
}

impl FrameProbe for FrameData {
    fn id(&self) -> FrameId {
        self.id
    }

    fn scope_name(&self) -> &str {
        &self.scope
    }

    fn module_name(&self) -> &str {
        TRACED_MODULE
    }

    fn bound_names(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    fn value_of(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    fn has_marker(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    fn set_binding(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }
}
