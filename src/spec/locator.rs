//! Spec block location.
//!
//! Scans the raw (comment-bearing) source for block-opening markers and
//! slices out each block's lines and examples. Two modes:
//!
//! - explicitly delimited blocks, closed by a matching end marker with
//!   nesting tracked by counting opens against closes; identified by a
//!   positive sequence number in scan order;
//! - function-scoped blocks with no close, whose first code line is a
//!   function definition; identified by a negative sequence number, with
//!   the extent inferred from indentation.

use tracing::warn;

use crate::normalize::indent_of;

use super::comments::{parse_comment, ParsedComment};

pub const BLOCK_START: &str = "#! Start of example block";
pub const BLOCK_END: &str = "#! End of example block";

/// One located block.
#[derive(Debug, Clone)]
pub struct SpecBlock {
    /// Positive for explicit blocks, negative for function-scoped ones.
    pub id: i64,
    /// Line of the opening marker.
    pub start_line: usize,
    /// Exclusive end of the block's extent.
    pub end_line: usize,
    /// Raw lines of the block, `start_line..end_line`.
    pub local_lines: Vec<String>,
    /// Offset from `start_line` of the first non-comment, non-blank line.
    /// Aligns the block with the timeline location describing state just
    /// before its first real statement.
    pub first_code_offset: Option<usize>,
    pub function_scoped: bool,
    pub comment: ParsedComment,
}

impl SpecBlock {
    /// Absolute line of the block's first real statement.
    pub fn first_code_line(&self) -> Option<usize> {
        self.first_code_offset.map(|off| self.start_line + off)
    }
}

/// Locate every example block in the file. Blocks whose comment fails the
/// grammar are skipped with a warning; nothing here is file-fatal.
pub fn locate_blocks(raw_lines: &[String]) -> Vec<SpecBlock> {
    let mut blocks = Vec::new();
    let mut positive_seq = 0i64;
    let mut negative_seq = 0i64;

    for (i, line) in raw_lines.iter().enumerate() {
        if !line.trim().starts_with(BLOCK_START) {
            continue;
        }
        let (id, end_line, function_scoped) = match find_matching_end(raw_lines, i) {
            Some(end) => {
                positive_seq += 1;
                (positive_seq, end + 1, false)
            }
            None => match function_scope_extent(raw_lines, i) {
                Some(end) => {
                    negative_seq += 1;
                    (-negative_seq, end, true)
                }
                None => {
                    warn!(line = i, "unclosed example block without a function; skipped");
                    continue;
                }
            },
        };

        let local_lines: Vec<String> = raw_lines[i..end_line].to_vec();
        let first_code_offset = local_lines
            .iter()
            .position(|l| !l.trim().is_empty() && !l.trim().starts_with('#'));

        // The block's own header plus the contiguous example lines under it;
        // a nested block's markers end the comment.
        let mut comment_lines: Vec<String> = vec![local_lines[0].clone()];
        for line in &local_lines[1..] {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !trimmed.starts_with("#!")
                || trimmed.starts_with(BLOCK_START)
                || trimmed.starts_with(BLOCK_END)
            {
                break;
            }
            comment_lines.push(line.clone());
        }
        let comment_text = comment_lines.join("\n");

        match parse_comment(&comment_text, i) {
            Ok(comment) => blocks.push(SpecBlock {
                id,
                start_line: i,
                end_line,
                local_lines,
                first_code_offset,
                function_scoped,
                comment,
            }),
            Err(err) => {
                warn!(line = i, error = %err, "unparsable example block; skipped");
            }
        }
    }
    blocks
}

/// Find the line of the end marker matching the start at `start`, counting
/// nested opens against closes.
fn find_matching_end(lines: &[String], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (k, line) in lines.iter().enumerate().skip(start) {
        let trimmed = line.trim();
        if trimmed.starts_with(BLOCK_START) {
            depth += 1;
        } else if trimmed.starts_with(BLOCK_END) {
            depth -= 1;
            if depth == 0 {
                return Some(k);
            }
        }
    }
    None
}

/// Infer the extent of a function-scoped block: its first code line must be
/// a definition, and the block ends at the first later line whose
/// indentation is at or above the definition's.
fn function_scope_extent(lines: &[String], start: usize) -> Option<usize> {
    let mut j = start;
    while j < lines.len() {
        let trimmed = lines[j].trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            j += 1;
            continue;
        }
        break;
    }
    if j >= lines.len() || !lines[j].trim().starts_with("def") {
        return None;
    }
    let def_indent = indent_of(&lines[j]);
    for (k, line) in lines.iter().enumerate().skip(j + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= def_indent {
            return Some(k);
        }
    }
    Some(lines.len())
}
