//! Parse dependencies from Elm code.

use super::{DependencyAccumulator, ParseInput, TokenParser, Truncation};

pub struct ElmParser;

impl TokenParser for ElmParser {
    fn parse(&self, input: &ParseInput) -> Vec<String> {
        let mut acc = DependencyAccumulator::new(&[]);
        let mut state: Option<String> = None;

        for token in input.tokens {
            match token.partial() {
                "Namespace" => state = Some(token.text.trim().to_string()),
                "Class" => {
                    if state.as_deref() == Some("import") {
                        acc.append_truncated(&token.text, Truncation::new(".", 1));
                    }
                }
                "Text" => {}
                _ => state = None,
            }
        }

        acc.into_dependencies()
    }
}

pub fn new_parser() -> Box<dyn TokenParser> {
    Box::new(ElmParser)
}

/// Register the Elm parser.
pub fn register() {
    super::register("elm", new_parser);
}
