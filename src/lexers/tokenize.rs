//! Line-oriented tokenizers for dependency extraction.
//!
//! These are intentionally small: each one produces just enough of a
//! token stream (dot-hierarchical kind + text) for the dependency
//! parsers to run their state machines. They are not full lexers and
//! make no attempt at syntax validation.

use lazy_static::lazy_static;
use regex::Regex;

use super::kinds;
use super::Token;

/// A raw lexeme before language-specific classification.
enum Piece {
    Word(String),
    Str(String),
    Punct(char),
}

/// Split one line of code into words, string literals, and punctuation.
///
/// `extras` lists extra characters treated as part of a word (for dotted
/// paths, wildcards, or backslash namespaces). Escape sequences inside
/// strings are not interpreted.
fn split_pieces(line: &str, extras: &[char]) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' || c == '\'' {
            let quote = c;
            chars.next();
            let mut value = String::new();
            for next in chars.by_ref() {
                if next == quote {
                    break;
                }
                value.push(next);
            }
            pieces.push(Piece::Str(value));
        } else if c.is_alphanumeric() || c == '_' || extras.contains(&c) {
            let mut word = String::new();
            while let Some(&w) = chars.peek() {
                if w.is_alphanumeric() || w == '_' || extras.contains(&w) {
                    word.push(w);
                    chars.next();
                } else {
                    break;
                }
            }
            pieces.push(Piece::Word(word));
        } else {
            pieces.push(Piece::Punct(c));
            chars.next();
        }
    }

    pieces
}

/// Strip a line comment, ignoring markers inside string literals.
fn strip_line_comment<'a>(line: &'a str, marker: &str) -> &'a str {
    let mut quote: Option<char> = None;
    let bytes = line.as_bytes();
    let marker_bytes = marker.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        let c = b as char;
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                } else if bytes[i..].starts_with(marker_bytes) {
                    return &line[..i];
                }
            }
        }
    }
    line
}

/// Python. The module path between `import`/`from` and the end of the
/// import clause is a namespace token; names after the `import` of a
/// from-import are plain names.
pub fn python(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let code = strip_line_comment(line, "#");
        let mut saw_import = false;
        let mut in_from_names = false;
        for piece in split_pieces(code, &['.']) {
            match piece {
                Piece::Word(w) => {
                    let kind = match w.as_str() {
                        "from" => {
                            saw_import = true;
                            in_from_names = false;
                            kinds::KEYWORD_NAMESPACE
                        }
                        "import" => {
                            if saw_import {
                                in_from_names = true;
                            }
                            saw_import = true;
                            kinds::KEYWORD_NAMESPACE
                        }
                        "as" if saw_import => kinds::KEYWORD_NAMESPACE,
                        _ if saw_import && !in_from_names => kinds::NAME_NAMESPACE,
                        _ => kinds::NAME,
                    };
                    tokens.push(Token::new(kind, w));
                }
                Piece::Str(s) => tokens.push(Token::new(kinds::STRING_SINGLE, s)),
                Piece::Punct(c) => tokens.push(Token::new(kinds::OPERATOR, c.to_string())),
            }
        }
        tokens.push(Token::new(kinds::TEXT, "\n"));
    }
    tokens
}

/// C, C++, Objective-C. Only preprocessor directives matter for
/// dependency extraction; the directive body is one token.
pub fn c_family(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix('#') {
            tokens.push(Token::new(kinds::COMMENT_PREPROC, rest.trim()));
        }
        tokens.push(Token::new(kinds::TEXT, "\n"));
    }
    tokens
}

/// Go. Import paths arrive as string tokens, grouped imports track paren
/// depth via punctuation tokens.
pub fn go(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let code = strip_line_comment(line, "//");
        for piece in split_pieces(code, &[]) {
            match piece {
                Piece::Word(w) => {
                    let kind = if w == "import" {
                        kinds::KEYWORD_NAMESPACE
                    } else {
                        kinds::NAME
                    };
                    tokens.push(Token::new(kind, w));
                }
                Piece::Str(s) => tokens.push(Token::new(kinds::STRING, s)),
                Piece::Punct(c) => tokens.push(Token::new(kinds::PUNCTUATION, c.to_string())),
            }
        }
        tokens.push(Token::new(kinds::TEXT, "\n"));
    }
    tokens
}

/// Java, Kotlin, Scala. Dotted import paths (including a trailing `.*`)
/// are emitted as single namespace tokens.
pub fn jvm(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let code = strip_line_comment(line, "//");
        let mut saw_import = false;
        for piece in split_pieces(code, &['.', '*']) {
            match piece {
                Piece::Word(w) => {
                    let kind = match w.as_str() {
                        "import" => {
                            saw_import = true;
                            kinds::KEYWORD_NAMESPACE
                        }
                        "package" | "static" => kinds::KEYWORD_NAMESPACE,
                        _ if saw_import => kinds::NAME_NAMESPACE,
                        _ => kinds::NAME,
                    };
                    tokens.push(Token::new(kind, w));
                }
                Piece::Str(s) => tokens.push(Token::new(kinds::STRING_SINGLE, s)),
                Piece::Punct(c) => tokens.push(Token::new(kinds::OPERATOR, c.to_string())),
            }
        }
        tokens.push(Token::new(kinds::TEXT, "\n"));
    }
    tokens
}

/// C#. Same shape as the JVM tokenizer with `using` as the keyword.
pub fn csharp(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let code = strip_line_comment(line, "//");
        let mut saw_using = false;
        for piece in split_pieces(code, &['.', '*']) {
            match piece {
                Piece::Word(w) => {
                    let kind = match w.as_str() {
                        "using" => {
                            saw_using = true;
                            kinds::KEYWORD_NAMESPACE
                        }
                        "static" | "namespace" => kinds::KEYWORD_NAMESPACE,
                        _ if saw_using => kinds::NAME_NAMESPACE,
                        _ => kinds::NAME,
                    };
                    tokens.push(Token::new(kind, w));
                }
                Piece::Str(s) => tokens.push(Token::new(kinds::STRING_SINGLE, s)),
                Piece::Punct(c) => tokens.push(Token::new(kinds::OPERATOR, c.to_string())),
            }
        }
        tokens.push(Token::new(kinds::TEXT, "\n"));
    }
    tokens
}

/// PHP. Backslash namespace paths are single `Name.Other` tokens.
pub fn php(text: &str) -> Vec<Token> {
    const KEYWORDS: &[&str] = &[
        "include",
        "include_once",
        "require",
        "require_once",
        "use",
        "namespace",
        "as",
    ];

    let mut tokens = Vec::new();
    for line in text.lines() {
        let code = strip_line_comment(strip_line_comment(line, "//"), "#");
        for piece in split_pieces(code, &['\\']) {
            match piece {
                Piece::Word(w) => {
                    let kind = if KEYWORDS.contains(&w.as_str()) {
                        kinds::KEYWORD
                    } else {
                        kinds::NAME_OTHER
                    };
                    tokens.push(Token::new(kind, w));
                }
                Piece::Str(s) => tokens.push(Token::new(kinds::STRING_SINGLE, s)),
                Piece::Punct(c) => tokens.push(Token::new(kinds::PUNCTUATION, c.to_string())),
            }
        }
        tokens.push(Token::new(kinds::TEXT, "\n"));
    }
    tokens
}

/// JavaScript and TypeScript.
pub fn javascript(text: &str) -> Vec<Token> {
    const RESERVED: &[&str] = &["import", "export", "from", "default"];

    let mut tokens = Vec::new();
    for line in text.lines() {
        let code = strip_line_comment(line, "//");
        for piece in split_pieces(code, &['$']) {
            match piece {
                Piece::Word(w) => {
                    let kind = if RESERVED.contains(&w.as_str()) {
                        kinds::KEYWORD_RESERVED
                    } else {
                        kinds::NAME
                    };
                    tokens.push(Token::new(kind, w));
                }
                Piece::Str(s) => tokens.push(Token::new(kinds::STRING_SINGLE, s)),
                Piece::Punct(c) => tokens.push(Token::new(kinds::PUNCTUATION, c.to_string())),
            }
        }
        tokens.push(Token::new(kinds::TEXT, "\n"));
    }
    tokens
}

/// Elm. Capitalized (module) names are class tokens.
pub fn elm(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let code = strip_line_comment(line, "--");
        for piece in split_pieces(code, &['.']) {
            match piece {
                Piece::Word(w) => {
                    let kind = if w == "import" {
                        kinds::KEYWORD_NAMESPACE
                    } else if matches!(w.as_str(), "module" | "exposing" | "as" | "port") {
                        kinds::KEYWORD
                    } else if w.chars().next().is_some_and(|c| c.is_uppercase()) {
                        kinds::NAME_CLASS
                    } else {
                        kinds::NAME
                    };
                    tokens.push(Token::new(kind, w));
                }
                Piece::Str(s) => tokens.push(Token::new(kinds::STRING_SINGLE, s)),
                Piece::Punct(c) => tokens.push(Token::new(kinds::PUNCTUATION, c.to_string())),
            }
        }
        tokens.push(Token::new(kinds::TEXT, "\n"));
    }
    tokens
}

/// Haskell. Capitalized dotted module names are namespace tokens.
pub fn haskell(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let code = strip_line_comment(line, "--");
        for piece in split_pieces(code, &['.']) {
            match piece {
                Piece::Word(w) => {
                    let kind = if w == "import" {
                        kinds::KEYWORD_RESERVED
                    } else if matches!(w.as_str(), "qualified" | "as" | "hiding" | "module") {
                        kinds::KEYWORD
                    } else if w.chars().next().is_some_and(|c| c.is_uppercase()) {
                        kinds::NAME_NAMESPACE
                    } else {
                        kinds::NAME
                    };
                    tokens.push(Token::new(kind, w));
                }
                Piece::Str(s) => tokens.push(Token::new(kinds::STRING_SINGLE, s)),
                Piece::Punct(c) => tokens.push(Token::new(kinds::PUNCTUATION, c.to_string())),
            }
        }
        tokens.push(Token::new(kinds::TEXT, "\n"));
    }
    tokens
}

lazy_static! {
    static ref TAG_RE: Regex =
        Regex::new(r#"(?s)<\s*([A-Za-z][A-Za-z0-9:-]*)((?:[^>'"]|'[^']*'|"[^"]*")*)>"#).unwrap();
    static ref ATTR_RE: Regex =
        Regex::new(r#"([A-Za-z_][A-Za-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
}

/// HTML and the template dialects embedding it. Only tags and their
/// attributes are tokenized; template syntax and text content are skipped.
pub fn html(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for tag in TAG_RE.captures_iter(text) {
        tokens.push(Token::new(kinds::PUNCTUATION, "<"));
        tokens.push(Token::new(kinds::NAME_TAG, &tag[1]));
        for attr in ATTR_RE.captures_iter(tag.get(2).map_or("", |m| m.as_str())) {
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .map_or("", |m| m.as_str());
            tokens.push(Token::new(kinds::NAME_ATTRIBUTE, &attr[1]));
            tokens.push(Token::new(kinds::OPERATOR, "="));
            tokens.push(Token::new(kinds::STRING, value));
        }
        tokens.push(Token::new(kinds::PUNCTUATION, ">"));
    }
    tokens
}

/// Languages without dependency extraction.
pub fn none(_text: &str) -> Vec<Token> {
    Vec::new()
}
