//! Parse dependencies from C, C++, and Objective-C code.
//!
//! Everything interesting lives in preprocessor directives; the include
//! path is truncated to its first path segment so `boost/regex.hpp`
//! reports `boost`.

use super::{DependencyAccumulator, ParseInput, TokenParser, Truncation};

const EXCLUDE: &[&str] = &[
    r"^stdio\.h$",
    r"^stdlib\.h$",
    r"^string\.h$",
    r"^time\.h$",
];

pub struct CParser;

impl TokenParser for CParser {
    fn parse(&self, input: &ParseInput) -> Vec<String> {
        let mut acc = DependencyAccumulator::new(EXCLUDE);

        for token in input.tokens {
            if token.partial() != "Preproc" {
                continue;
            }
            let directive = token.text.trim();
            let header = directive
                .strip_prefix("include")
                .or_else(|| directive.strip_prefix("import"));
            if let Some(header) = header {
                let header = header
                    .trim()
                    .trim_matches(|c| c == '"' || c == '<' || c == '>');
                acc.append_truncated(header, Truncation::new("/", 1));
            }
        }

        acc.into_dependencies()
    }
}

pub fn new_parser() -> Box<dyn TokenParser> {
    Box::new(CParser)
}

/// Register the include scanner for the whole C family.
pub fn register() {
    super::register("c", new_parser);
    super::register("c++", new_parser);
    super::register("objective-c", new_parser);
    super::register("objective-c++", new_parser);
}
