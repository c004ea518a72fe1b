//! Parse dependencies from Python code.

use crate::lexers::Token;

use super::{DependencyAccumulator, ParseInput, TokenParser, Truncation};

/// Standard-library and interpreter namespaces never reported as
/// dependencies.
const EXCLUDE: &[&str] = &[r"^os$", r"^sys$", r"^sys\.", r"^__future__$"];

pub struct PythonParser;

impl TokenParser for PythonParser {
    fn parse(&self, input: &ParseInput) -> Vec<String> {
        let mut acc = DependencyAccumulator::new(EXCLUDE);
        let mut state: Option<String> = None;
        let mut parens: i32 = 0;
        let mut nonpackage = false;

        for token in input.tokens {
            match token.partial() {
                "Namespace" => {
                    process_namespace(token, &mut state, &mut nonpackage, &mut acc)
                }
                "Operator" | "Punctuation" => {
                    process_punctuation(token, &mut state, &mut parens, &mut nonpackage)
                }
                "Text" => {
                    if state.is_some() && token.text == "\n" && parens == 0 {
                        state = None;
                        nonpackage = false;
                    }
                }
                _ => {}
            }
        }

        acc.into_dependencies()
    }
}

fn process_namespace(
    token: &Token,
    state: &mut Option<String>,
    nonpackage: &mut bool,
    acc: &mut DependencyAccumulator,
) {
    match state.as_deref() {
        None => *state = Some(token.text.clone()),
        _ if token.text == "as" => *nonpackage = true,
        Some(_) => process_import(token, state, nonpackage, acc),
    }
}

fn process_punctuation(
    token: &Token,
    state: &mut Option<String>,
    parens: &mut i32,
    nonpackage: &mut bool,
) {
    match token.text.as_str() {
        "(" => {
            *parens += 1;
            *nonpackage = false;
        }
        ")" => {
            *parens -= 1;
            *nonpackage = false;
        }
        "," if state.as_deref() == Some("import-2") => *state = Some("import".to_string()),
        _ => {}
    }
}

fn process_import(
    token: &Token,
    state: &mut Option<String>,
    nonpackage: &mut bool,
    acc: &mut DependencyAccumulator,
) {
    if !*nonpackage {
        match state.as_deref() {
            Some("from") => {
                acc.append_truncated(&token.text, Truncation::new(".", 1));
                *state = None;
            }
            Some("import") => {
                acc.append_truncated(&token.text, Truncation::new(".", 1));
                *state = Some("import-2".to_string());
            }
            Some("import-2") => {}
            _ => *state = None,
        }
    }
    *nonpackage = false;
}

pub fn new_parser() -> Box<dyn TokenParser> {
    Box::new(PythonParser)
}

/// Register the Python parser.
pub fn register() {
    super::register("python", new_parser);
}
