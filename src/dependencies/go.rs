//! Parse dependencies from Go code.
//!
//! Import paths arrive as string tokens. Grouped imports track paren
//! depth so the newline terminator is ignored inside `import ( ... )`;
//! local aliases and the blank identifier are plain names and fall
//! through untouched.

use super::{DependencyAccumulator, ParseInput, TokenParser};

const EXCLUDE: &[&str] = &[r"^fmt$"];

pub struct GoParser;

impl TokenParser for GoParser {
    fn parse(&self, input: &ParseInput) -> Vec<String> {
        let mut acc = DependencyAccumulator::new(EXCLUDE);
        let mut importing = false;
        let mut parens: i32 = 0;

        for token in input.tokens {
            match token.partial() {
                "Namespace" => {
                    if token.text == "import" {
                        importing = true;
                    }
                }
                "String" | "Single" => {
                    if importing {
                        acc.append(&token.text);
                        if parens == 0 {
                            importing = false;
                        }
                    }
                }
                "Punctuation" => match token.text.as_str() {
                    "(" if importing => parens += 1,
                    ")" => {
                        parens -= 1;
                        if parens <= 0 {
                            parens = 0;
                            importing = false;
                        }
                    }
                    _ => {}
                },
                "Text" => {
                    if token.text == "\n" && parens == 0 {
                        importing = false;
                    }
                }
                _ => {}
            }
        }

        acc.into_dependencies()
    }
}

pub fn new_parser() -> Box<dyn TokenParser> {
    Box::new(GoParser)
}

/// Register the Go parser.
pub fn register() {
    super::register("go", new_parser);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexers::tokenize;
    use std::path::Path;

    fn parse(source: &str) -> Vec<String> {
        let tokens = tokenize::go(source);
        let input = ParseInput {
            file_path: Path::new("main.go"),
            language: "Go",
            tokens: &tokens,
        };
        let mut deps = GoParser.parse(&input);
        deps.sort();
        deps.dedup();
        deps
    }

    #[test]
    fn test_single_import() {
        assert_eq!(parse("import \"errors\"\n"), vec!["errors"]);
    }

    #[test]
    fn test_grouped_imports() {
        let source = r#"package main

import (
    "os"
    "github.com/spf13/cobra"
)
"#;
        assert_eq!(parse(source), vec!["github.com/spf13/cobra", "os"]);
    }

    #[test]
    fn test_aliased_and_blank_imports() {
        let source = r#"import (
    m "math/rand"
    _ "net/http/pprof"
)
"#;
        assert_eq!(parse(source), vec!["math/rand", "net/http/pprof"]);
    }

    #[test]
    fn test_fmt_excluded() {
        assert!(parse("import \"fmt\"\n").is_empty());
    }

    #[test]
    fn test_strings_outside_imports_ignored() {
        assert!(parse("var s = \"github.com/not/an/import\"\n").is_empty());
    }
}
