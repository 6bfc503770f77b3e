//! Source normalization.
//!
//! Produces a line-stable program in which every physical line is
//! independently observable as one statement: comments are stripped in
//! place, and blank lines are replaced with a no-op assignment to an
//! injected placeholder binding so the stepper has a statement to stop on.
//! Line count is always preserved; the raw (comment-bearing) view keeps
//! identical numbering so spec blocks and the timeline line up.

/// Name injected on blank lines. Excluded from snapshots and write sets.
pub const PLACEHOLDER: &str = "__tracebox__";

/// The two line-aligned views of one source file.
#[derive(Debug, Clone)]
pub struct NormalizedSource {
    /// Original lines with comments intact (for the spec block locator).
    pub raw: Vec<String>,
    /// Comment-stripped, noop-filled lines (for the parser and engine).
    pub runnable: Vec<String>,
}

impl NormalizedSource {
    pub fn line_count(&self) -> usize {
        self.raw.len()
    }
}

/// Normalize a source file into its raw and runnable views.
pub fn normalize(source: &str) -> NormalizedSource {
    let raw: Vec<String> = source.lines().map(str::to_string).collect();
    let mut runnable: Vec<String> = raw.iter().map(|l| strip_comment(l)).collect();
    replace_blank_lines_with_noop(&mut runnable);
    NormalizedSource { raw, runnable }
}

/// Drop everything from `#` to the end of the line.
pub fn strip_comment(line: &str) -> String {
    match line.find('#') {
        Some(pos) => line[..pos].to_string(),
        None => line.to_string(),
    }
}

/// Number of leading whitespace characters.
pub fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Replace whitespace-only lines with `<indent><PLACEHOLDER> = 0`.
///
/// First pass (top-down): a blank line directly under a `:` header gets the
/// header's indentation plus one level pre-seeded, so the placeholder lands
/// inside the block it visually belongs to. Second pass (bottom-up): every
/// remaining blank line takes the wider of its own whitespace and the
/// indentation of the next non-blank line below, then receives the noop.
fn replace_blank_lines_with_noop(lines: &mut [String]) {
    let mut header_indent: Option<String> = None;
    for i in 0..lines.len() {
        let stripped = lines[i].trim();
        if stripped.is_empty() {
            if let Some(ws) = &header_indent {
                lines[i] = format!("{ws}    ");
            }
        } else if stripped.ends_with(':') {
            let n = indent_of(&lines[i]);
            header_indent = Some(lines[i][..n].to_string());
        } else {
            header_indent = None;
        }
    }

    let mut ws_below = String::new();
    for i in (1..lines.len()).rev() {
        if lines[i].trim().is_empty() {
            let own = lines[i].trim_end_matches('\n');
            let ws = if own.len() > ws_below.len() {
                own.to_string()
            } else {
                ws_below.clone()
            };
            lines[i] = format!("{ws}{PLACEHOLDER} = 0");
        } else {
            let n = indent_of(&lines[i]);
            ws_below = lines[i][..n].to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_count_is_preserved() {
        let src = "x = 1\n\nfor i in range(3):\n    # body\n    x = x + i\n\n";
        let norm = normalize(src);
        assert_eq!(norm.raw.len(), norm.runnable.len());
        assert_eq!(norm.raw.len(), src.lines().count());
    }

    #[test]
    fn comments_are_stripped_in_place() {
        let norm = normalize("x = 1  # set x\ny = 2\n");
        assert_eq!(norm.runnable[0], "x = 1  ");
        assert_eq!(norm.raw[0], "x = 1  # set x");
    }

    #[test]
    fn blank_line_becomes_placeholder_noop() {
        let norm = normalize("x = 1\n\ny = 2\n");
        assert_eq!(norm.runnable[1], format!("{PLACEHOLDER} = 0"));
    }

    #[test]
    fn blank_line_in_loop_body_gets_body_indent() {
        let norm = normalize("for i in range(2):\n\n    x = i\n");
        assert_eq!(norm.runnable[1], format!("    {PLACEHOLDER} = 0"));
    }

    #[test]
    fn trailing_blank_line_lands_at_module_level() {
        // Nothing below the final blank line, and the line above is not a
        // header, so the noop gets no indentation.
        let norm = normalize("while x < 3:\n    x = x + 1\n\n");
        assert_eq!(norm.runnable[2], format!("{PLACEHOLDER} = 0"));
    }
}
