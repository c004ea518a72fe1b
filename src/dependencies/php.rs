//! Parse dependencies from PHP code.
//!
//! Handles both `include`/`require` file paths and namespace imports via
//! `use`, which truncate at the backslash separator so
//! `Symfony\Component\HttpFoundation\Request` reports `Symfony`.

use super::{DependencyAccumulator, ParseInput, TokenParser, Truncation};

pub struct PhpParser;

#[derive(PartialEq)]
enum State {
    Idle,
    Include,
    Use,
    UseContinued,
}

impl TokenParser for PhpParser {
    fn parse(&self, input: &ParseInput) -> Vec<String> {
        let mut acc = DependencyAccumulator::new(&[]);
        let mut state = State::Idle;
        let mut parens: i32 = 0;
        let mut nonpackage = false;

        for token in input.tokens {
            match token.partial() {
                "Keyword" => match token.text.as_str() {
                    "include" | "include_once" | "require" | "require_once" => {
                        state = State::Include;
                    }
                    "use" => state = State::Use,
                    "as" => nonpackage = true,
                    _ => state = State::Idle,
                },
                "Single" | "String" => {
                    if state == State::Include {
                        acc.append(&token.text);
                        state = State::Idle;
                    }
                }
                "Other" => {
                    if (state == State::Use || state == State::UseContinued) && !nonpackage {
                        acc.append_truncated(&token.text, Truncation::new("\\", 1));
                        state = State::UseContinued;
                    }
                    nonpackage = false;
                }
                "Punctuation" => match token.text.as_str() {
                    "(" => parens += 1,
                    ")" => parens -= 1,
                    "," => {
                        if state == State::UseContinued {
                            state = State::Use;
                        }
                        nonpackage = false;
                    }
                    ";" => {
                        state = State::Idle;
                        nonpackage = false;
                    }
                    _ => {}
                },
                "Text" => {
                    if token.text == "\n" && parens == 0 {
                        state = State::Idle;
                        nonpackage = false;
                    }
                }
                _ => {}
            }
        }

        acc.into_dependencies()
    }
}

pub fn new_parser() -> Box<dyn TokenParser> {
    Box::new(PhpParser)
}

/// Register the PHP parser.
pub fn register() {
    super::register("php", new_parser);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexers::tokenize;
    use std::path::Path;

    fn parse(source: &str) -> Vec<String> {
        let tokens = tokenize::php(source);
        let input = ParseInput {
            file_path: Path::new("index.php"),
            language: "PHP",
            tokens: &tokens,
        };
        let mut deps = PhpParser.parse(&input);
        deps.sort();
        deps.dedup();
        deps
    }

    #[test]
    fn test_use_truncates_at_backslash() {
        assert_eq!(
            parse("use Symfony\\Component\\HttpFoundation\\Request;\n"),
            vec!["Symfony"]
        );
    }

    #[test]
    fn test_use_comma_list() {
        assert_eq!(
            parse("use Monolog\\Logger, Twig\\Environment;\n"),
            vec!["Monolog", "Twig"]
        );
    }

    #[test]
    fn test_use_alias_discarded() {
        assert_eq!(
            parse("use Doctrine\\ORM\\EntityManager as EM;\n"),
            vec!["Doctrine"]
        );
    }

    #[test]
    fn test_require_reports_path() {
        assert_eq!(parse("require 'lib/database.php';\n"), vec!["lib/database.php"]);
        assert_eq!(
            parse("require_once(\"vendor/autoload.php\");\n"),
            vec!["vendor/autoload.php"]
        );
    }

    #[test]
    fn test_plain_code_yields_nothing() {
        assert!(parse("$x = strlen('hi');\necho $x;\n").is_empty());
    }
}
