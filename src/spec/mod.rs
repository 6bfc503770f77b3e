//! Spec blocks: locating them, parsing their example comments, and
//! verifying the examples against the projected timeline.

pub mod comments;
pub mod locator;
pub mod verifier;

#[cfg(test)]
mod tests;

pub use comments::{parse_comment, ExampleCase, ParsedComment, INPUT_SUFFIX};
pub use locator::{locate_blocks, SpecBlock, BLOCK_END, BLOCK_START};
pub use verifier::{verify_blocks, TestOutcome, TestOutcomes, RESULT_NAME};
