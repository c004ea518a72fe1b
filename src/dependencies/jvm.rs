//! Parse dependencies from JVM languages (Java, Kotlin, Scala).
//!
//! Import paths are buffered until the statement terminator, then
//! truncated to two segments with the reversed-domain heuristic so
//! `com.fasterxml.jackson.core.JsonParser` reports `fasterxml.jackson`.

use super::{DependencyAccumulator, ParseInput, TokenParser, Truncation};

const EXCLUDE: &[&str] = &[
    r"^java\.",
    r"^javax\.",
    r"^kotlin\.",
    r"^scala\.",
    r"^import$",
    r"^package$",
    r"^static$",
];

pub struct JvmParser;

impl TokenParser for JvmParser {
    fn parse(&self, input: &ParseInput) -> Vec<String> {
        let mut acc = DependencyAccumulator::new(EXCLUDE);
        let mut importing = false;
        let mut buffer = String::new();

        for token in input.tokens {
            match token.partial() {
                "Namespace" => match token.text.as_str() {
                    "import" => {
                        flush(&mut buffer, &mut acc);
                        importing = true;
                    }
                    "package" | "static" if importing => {}
                    "package" => importing = false,
                    _ if importing => buffer.push_str(&token.text),
                    _ => {}
                },
                "Operator" | "Punctuation" => match token.text.as_str() {
                    ";" | "{" => {
                        flush(&mut buffer, &mut acc);
                        importing = false;
                    }
                    _ => {}
                },
                "Text" => {
                    if token.text == "\n" {
                        flush(&mut buffer, &mut acc);
                        importing = false;
                    }
                }
                _ => {}
            }
        }
        flush(&mut buffer, &mut acc);

        acc.into_dependencies()
    }
}

fn flush(buffer: &mut String, acc: &mut DependencyAccumulator) {
    if !buffer.is_empty() {
        acc.append_truncated(buffer, Truncation::new(".", 2).reversed_domain());
        buffer.clear();
    }
}

pub fn new_parser() -> Box<dyn TokenParser> {
    Box::new(JvmParser)
}

/// Register the JVM-family parser.
pub fn register() {
    super::register("java", new_parser);
    super::register("kotlin", new_parser);
    super::register("scala", new_parser);
}
