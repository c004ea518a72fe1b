//! Parse dependencies from JavaScript and TypeScript code.

use lazy_static::lazy_static;
use regex::Regex;

use super::{DependencyAccumulator, ParseInput, TokenParser};

lazy_static! {
    static ref EXTENSION: Regex = Regex::new(r"\.\w{1,4}$").unwrap();
}

pub struct JavascriptParser;

impl TokenParser for JavascriptParser {
    fn parse(&self, input: &ParseInput) -> Vec<String> {
        let mut acc = DependencyAccumulator::new(&[]);
        let mut state: Option<String> = None;

        for token in input.tokens {
            match token.partial() {
                "Reserved" => {
                    if state.is_none() {
                        state = Some(token.text.clone());
                    }
                }
                "Single" | "String" => {
                    if state.as_deref() == Some("import") {
                        acc.append(&format_module(&token.text));
                    }
                    state = None;
                }
                "Punctuation" => {
                    if token.text == ";" {
                        state = None;
                    }
                }
                _ => {}
            }
        }

        acc.into_dependencies()
    }
}

/// Reduce a module specifier to its bare name: strip the directory part
/// and at most one file extension.
fn format_module(content: &str) -> String {
    let trimmed = content.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    let basename = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed);
    EXTENSION.replace(basename, "").to_string()
}

pub fn new_parser() -> Box<dyn TokenParser> {
    Box::new(JavascriptParser)
}

/// Register the parser for both JavaScript and TypeScript.
pub fn register() {
    super::register("javascript", new_parser);
    super::register("typescript", new_parser);
}
