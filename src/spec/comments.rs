//! Comment-grammar parser for example blocks.
//!
//! A block's comment declares the output variables and a list of example
//! lines, each an input environment and an expected output environment:
//!
//! ```text
//! #! Start of example block 1 of: b
//! #! 1) a_in = 2 => b = 4
//! #! 2) a_in = 3 => b = 6
//! ```
//!
//! Right-hand literals stay raw text here; value parsing is best-effort and
//! happens at comparison time through the literal module.

use pest::Parser;
use pest_derive::Parser;

use crate::errors::SpecParseError;

#[derive(Parser)]
#[grammar = "spec/comment.pest"]
struct CommentParser;

/// Reserved suffix marking input occurrences of an output variable.
pub const INPUT_SUFFIX: &str = "_in";

/// One example: input bindings and expected output bindings, both raw text.
#[derive(Debug, Clone, Default)]
pub struct ExampleCase {
    pub inputs: Vec<(String, String)>,
    pub outputs: Vec<(String, String)>,
}

impl ExampleCase {
    /// The environment an already-proving live state must match: inputs with
    /// the reserved suffix stripped, overlaid with the expected outputs.
    pub fn target_env(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = Vec::new();
        let mut put = |name: String, value: String| {
            match env.iter_mut().find(|(n, _)| *n == name) {
                Some((_, slot)) => *slot = value,
                None => env.push((name, value)),
            }
        };
        for (name, value) in &self.inputs {
            let stripped = name.strip_suffix(INPUT_SUFFIX).unwrap_or(name);
            put(stripped.to_string(), value.clone());
        }
        for (name, value) in &self.outputs {
            put(name.clone(), value.clone());
        }
        env
    }
}

/// A parsed block comment.
#[derive(Debug, Clone)]
pub struct ParsedComment {
    /// The number written in the header text. Block identity is assigned by
    /// the locator in scan order; this is kept for round-tripping only.
    pub declared_number: i64,
    /// Declared output variable names.
    pub var_names: Vec<String>,
    pub examples: Vec<ExampleCase>,
}

/// Parse a block's comment text (header line plus example lines).
pub fn parse_comment(text: &str, start_line: usize) -> Result<ParsedComment, SpecParseError> {
    let mut pairs = CommentParser::parse(Rule::comment_block, text).map_err(|e| {
        SpecParseError {
            line: start_line,
            message: e.to_string(),
        }
    })?;
    let block = pairs.next().ok_or_else(|| SpecParseError {
        line: start_line,
        message: "empty comment block".to_string(),
    })?;

    let mut parsed = ParsedComment {
        declared_number: 0,
        var_names: Vec::new(),
        examples: Vec::new(),
    };
    for part in block.into_inner() {
        match part.as_rule() {
            Rule::header => {
                for h in part.into_inner() {
                    match h.as_rule() {
                        Rule::number => {
                            parsed.declared_number =
                                h.as_str().trim().parse().unwrap_or_default();
                        }
                        Rule::name_list => {
                            parsed.var_names =
                                h.into_inner().map(|n| n.as_str().to_string()).collect();
                        }
                        _ => {}
                    }
                }
            }
            Rule::example => {
                let mut sides: Vec<Vec<(String, String)>> = Vec::new();
                for e in part.into_inner() {
                    if e.as_rule() == Rule::bindings {
                        sides.push(build_bindings(e));
                    }
                }
                let mut case = ExampleCase::default();
                let mut sides = sides.into_iter();
                case.inputs = sides.next().unwrap_or_default();
                case.outputs = sides.next().unwrap_or_default();
                parsed.examples.push(case);
            }
            _ => {}
        }
    }
    Ok(parsed)
}

fn build_bindings(pair: pest::iterators::Pair<Rule>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for binding in pair.into_inner() {
        let mut name = String::new();
        let mut value = String::new();
        for part in binding.into_inner() {
            match part.as_rule() {
                Rule::name => name = part.as_str().to_string(),
                Rule::value => value = part.as_str().trim().to_string(),
                _ => {}
            }
        }
        out.push((name, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_examples() {
        let text = "#! Start of example block 1 of: b\n#! 1) a_in = 2 => b = 4\n#! 2) a_in = 3 => b = 6\n";
        let parsed = parse_comment(text, 0).expect("should parse");
        assert_eq!(parsed.declared_number, 1);
        assert_eq!(parsed.var_names, vec!["b"]);
        assert_eq!(parsed.examples.len(), 2);
        assert_eq!(
            parsed.examples[0].inputs,
            vec![("a_in".to_string(), "2".to_string())]
        );
        assert_eq!(
            parsed.examples[0].outputs,
            vec![("b".to_string(), "4".to_string())]
        );
    }

    #[test]
    fn parses_string_and_list_values() {
        let text =
            "#! Start of example block 2 of: out\n#! 1) s_in = 'a,b', xs = [1, [2, 3]] => out = ['a', 'b']\n";
        let parsed = parse_comment(text, 0).expect("should parse");
        let ex = &parsed.examples[0];
        assert_eq!(ex.inputs[0].1, "'a,b'");
        assert_eq!(ex.inputs[1].1, "[1, [2, 3]]");
        assert_eq!(ex.outputs[0].1, "['a', 'b']");
    }

    #[test]
    fn parses_multiple_declared_names() {
        let text = "#! Start of example block 3 of: a, b\n";
        let parsed = parse_comment(text, 0).expect("should parse");
        assert_eq!(parsed.var_names, vec!["a", "b"]);
        assert!(parsed.examples.is_empty());
    }

    #[test]
    fn target_env_strips_the_input_suffix_and_overlays_outputs() {
        let text = "#! Start of example block 1 of: b\n#! 1) a_in = 2, b_in = 0 => b = 4\n";
        let parsed = parse_comment(text, 0).expect("should parse");
        let env = parsed.examples[0].target_env();
        assert_eq!(
            env,
            vec![
                ("a".to_string(), "2".to_string()),
                ("b".to_string(), "4".to_string()),
            ]
        );
    }

    #[test]
    fn garbage_comment_is_an_error() {
        assert!(parse_comment("#! this is not a block\n", 7).is_err());
    }
}
