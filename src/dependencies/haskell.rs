//! Parse dependencies from Haskell code.

use super::{DependencyAccumulator, ParseInput, TokenParser, Truncation};

pub struct HaskellParser;

impl TokenParser for HaskellParser {
    fn parse(&self, input: &ParseInput) -> Vec<String> {
        let mut acc = DependencyAccumulator::new(&[]);
        let mut state: Option<String> = None;

        for token in input.tokens {
            match token.partial() {
                "Reserved" => state = Some(token.text.trim().to_string()),
                "Namespace" => {
                    if state.as_deref() == Some("import") {
                        acc.append_truncated(&token.text, Truncation::new(".", 1));
                    }
                }
                "Keyword" => {
                    // `qualified` keeps the import clause open, anything
                    // else (as, hiding) closes it
                    if state.as_deref() != Some("import") || token.text.trim() != "qualified" {
                        state = None;
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
    Box::new(HaskellParser)
}

/// Register the Haskell parser.
pub fn register() {
    super::register("haskell", new_parser);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexers::tokenize;
    use std::path::Path;

    fn parse(source: &str) -> Vec<String> {
        let tokens = tokenize::haskell(source);
        let input = ParseInput {
            file_path: Path::new("Main.hs"),
            language: "Haskell",
            tokens: &tokens,
        };
        let mut deps = HaskellParser.parse(&input);
        deps.sort();
        deps.dedup();
        deps
    }

    #[test]
    fn test_simple_import() {
        assert_eq!(parse("import Network\n"), vec!["Network"]);
    }

    #[test]
    fn test_qualified_import() {
        assert_eq!(parse("import qualified Data.Map as M\n"), vec!["Data"]);
    }

    #[test]
    fn test_dotted_import_truncates() {
        assert_eq!(parse("import Control.Monad.State\n"), vec!["Control"]);
    }

    #[test]
    fn test_module_declaration_ignored() {
        assert!(parse("module Main where\n").is_empty());
    }
}
