//! tracebox - dynamic execution tracer and example-based specification
//! verifier for line-oriented imperative programs.
//!
//! The library single-steps a program through the [`engine`], records a
//! timeline of local-variable bindings keyed by source line and logical time
//! ([`trace`]), and retrospectively checks that timeline against example
//! input/output pairs embedded as structured comments ([`spec`]),
//! synthesizing isolated unit tests for any example whose state never
//! appears in the observed run.

pub mod analysis;
pub mod engine;
pub mod errors;
pub mod lang;
pub mod literal;
pub mod normalize;
pub mod record;
pub mod render;
pub mod spec;
pub mod synth;
pub mod trace;
