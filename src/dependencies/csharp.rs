//! Parse dependencies from C# code.

use super::{DependencyAccumulator, ParseInput, TokenParser, Truncation};

const EXCLUDE: &[&str] = &[r"^system$", r"^microsoft$"];

pub struct CSharpParser;

impl TokenParser for CSharpParser {
    fn parse(&self, input: &ParseInput) -> Vec<String> {
        let mut acc = DependencyAccumulator::new(EXCLUDE);
        let mut using = false;
        let mut aliased = false;
        let mut buffer = String::new();

        for token in input.tokens {
            match token.partial() {
                "Namespace" => match token.text.as_str() {
                    "using" => {
                        using = true;
                        aliased = false;
                        buffer.clear();
                    }
                    "static" if using => {}
                    "namespace" => using = false,
                    _ if using => buffer.push_str(&token.text),
                    _ => {}
                },
                "Operator" | "Punctuation" => match token.text.as_str() {
                    // `using Alias = Some.Namespace;` reports nothing
                    "=" => {
                        aliased = true;
                        buffer.clear();
                    }
                    ";" => {
                        if using && !aliased && !buffer.is_empty() {
                            acc.append_truncated(&buffer, Truncation::new(".", 1));
                        }
                        using = false;
                        aliased = false;
                        buffer.clear();
                    }
                    _ => {}
                },
                "Text" => {
                    if token.text == "\n" {
                        if using && !aliased && !buffer.is_empty() {
                            acc.append_truncated(&buffer, Truncation::new(".", 1));
                        }
                        using = false;
                        aliased = false;
                        buffer.clear();
                    }
                }
                _ => {}
            }
        }

        acc.into_dependencies()
    }
}

pub fn new_parser() -> Box<dyn TokenParser> {
    Box::new(CSharpParser)
}

/// Register the C# parser.
pub fn register() {
    super::register("c#", new_parser);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexers::tokenize;
    use std::path::Path;

    fn parse(source: &str) -> Vec<String> {
        let tokens = tokenize::csharp(source);
        let input = ParseInput {
            file_path: Path::new("Program.cs"),
            language: "C#",
            tokens: &tokens,
        };
        let mut deps = CSharpParser.parse(&input);
        deps.sort();
        deps.dedup();
        deps
    }

    #[test]
    fn test_framework_namespaces_excluded() {
        assert!(parse("using System;\nusing System.Linq;\nusing Microsoft.Win32;\n").is_empty());
    }

    #[test]
    fn test_third_party_using() {
        assert_eq!(parse("using Newtonsoft.Json;\n"), vec!["Newtonsoft"]);
    }

    #[test]
    fn test_alias_using_ignored() {
        assert!(parse("using Project = PC.MyCompany.Project;\n").is_empty());
    }

    #[test]
    fn test_namespace_declaration_ignored() {
        assert!(parse("namespace MyApp.Services\n{\n}\n").is_empty());
    }
}
