//! Parse dependencies from HTML and the template dialects embedding it.
//!
//! All template languages share one attribute-scanning implementation; a
//! per-language table declares which tag/attribute pairs count as a
//! dependency reference.

use lazy_static::lazy_static;
use regex::Regex;

use super::{DependencyAccumulator, ParseInput, TokenParser};

/// Tag/attribute pairs whose values reference a dependency.
type AttrTable = &'static [(&'static str, &'static str)];

const DEFAULT_ATTRS: AttrTable = &[("script", "src")];

/// Per-language overrides. Languages not listed use `DEFAULT_ATTRS`.
const LANGUAGE_ATTRS: &[(&str, AttrTable)] = &[
    // django templates commonly load scripts through the static tag, but
    // plain script tags are still the detectable signal
    ("HTML+Django/Jinja", DEFAULT_ATTRS),
    ("HTML+Mako", DEFAULT_ATTRS),
    ("HTML+Velocity", DEFAULT_ATTRS),
];

lazy_static! {
    static ref EXTENSION: Regex = Regex::new(r"\.\w{1,4}$").unwrap();
}

pub struct HtmlTemplateParser;

impl TokenParser for HtmlTemplateParser {
    fn parse(&self, input: &ParseInput) -> Vec<String> {
        let table = LANGUAGE_ATTRS
            .iter()
            .find(|(lang, _)| lang.eq_ignore_ascii_case(input.language))
            .map(|(_, table)| *table)
            .unwrap_or(DEFAULT_ATTRS);

        let mut acc = DependencyAccumulator::new(&[]);
        let mut current_tag: Option<String> = None;
        let mut current_attr: Option<String> = None;

        for token in input.tokens {
            match token.partial() {
                "Tag" => {
                    current_tag = Some(token.text.to_lowercase());
                    current_attr = None;
                }
                "Attribute" => current_attr = Some(token.text.to_lowercase()),
                "String" | "Single" => {
                    if let (Some(tag), Some(attr)) = (&current_tag, &current_attr) {
                        if table.iter().any(|(t, a)| *t == tag.as_str() && *a == attr.as_str()) {
                            acc.append(&format_source(&token.text));
                        }
                    }
                    current_attr = None;
                }
                "Punctuation" => {
                    if token.text == ">" {
                        current_tag = None;
                        current_attr = None;
                    }
                }
                _ => {}
            }
        }

        acc.into_dependencies()
    }
}

/// Reduce a script source url/path to its bare file name.
fn format_source(value: &str) -> String {
    let trimmed = value.trim();
    let without_query = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
    let basename = without_query
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(without_query);
    EXTENSION.replace(basename, "").to_string()
}

pub fn new_parser() -> Box<dyn TokenParser> {
    Box::new(HtmlTemplateParser)
}

/// Register the shared template parser for the root HTML language.
pub fn register() {
    super::register("html", new_parser);
    // folding is prevented for this one, so it resolves under its own name
    super::register("coldfusion html", new_parser);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexers::tokenize;
    use std::path::Path;

    fn parse(source: &str, language: &str) -> Vec<String> {
        let tokens = tokenize::html(source);
        let input = ParseInput {
            file_path: Path::new("index.html"),
            language,
            tokens: &tokens,
        };
        let mut deps = HtmlTemplateParser.parse(&input);
        deps.sort();
        deps.dedup();
        deps
    }

    #[test]
    fn test_script_src_reported() {
        let html = r#"<html><head><script src="js/vendor/jquery-3.6.0.min.js"></script></head></html>"#;
        assert_eq!(parse(html, "HTML"), vec!["jquery-3.6.0.min"]);
    }

    #[test]
    fn test_other_attributes_ignored() {
        let html = r#"<img src="logo.png"><link href="style.css"><a href="page.html">x</a>"#;
        assert!(parse(html, "HTML").is_empty());
    }

    #[test]
    fn test_template_dialect_uses_same_table() {
        let tpl = r#"{% block body %}<script src="app.js"></script>{% endblock %}"#;
        assert_eq!(parse(tpl, "HTML+Django/Jinja"), vec!["app"]);
    }

    #[test]
    fn test_query_string_stripped() {
        let html = r#"<script src="https://cdn.example.com/lib/d3.js?v=7"></script>"#;
        assert_eq!(parse(html, "HTML"), vec!["d3"]);
    }
}
