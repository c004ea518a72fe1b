//! Bundled language descriptors and tokenizers.
//!
//! This module is the seam to the lexing layer: a static registry of
//! languages, each with filename patterns, a declared priority, a content
//! accuracy heuristic, and a tokenizer producing `(kind, text)` pairs with
//! dot-hierarchical kinds. Consumers only ever inspect the last segment
//! of a kind.

pub mod tokenize;

use std::io::Read;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

/// Only the first 512,000 bytes of a file are ever lexed or analysed.
pub const MAX_HEAD_BYTES: u64 = 512_000;

/// Read the head of a file as (lossy) UTF-8. Returns None on any I/O
/// failure; unreadable files are an expected outcome, not an error.
pub fn read_file_head(path: &Path) -> Option<String> {
    let file = std::fs::File::open(path).ok()?;
    let mut buf = Vec::new();
    file.take(MAX_HEAD_BYTES).read_to_end(&mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Token kind tags. Dot-hierarchical; match on the last segment.
pub mod kinds {
    pub const KEYWORD: &str = "Keyword";
    pub const KEYWORD_NAMESPACE: &str = "Keyword.Namespace";
    pub const KEYWORD_RESERVED: &str = "Keyword.Reserved";
    pub const NAME: &str = "Name";
    pub const NAME_ATTRIBUTE: &str = "Name.Attribute";
    pub const NAME_CLASS: &str = "Name.Class";
    pub const NAME_NAMESPACE: &str = "Name.Namespace";
    pub const NAME_OTHER: &str = "Name.Other";
    pub const NAME_TAG: &str = "Name.Tag";
    pub const STRING: &str = "Literal.String";
    pub const STRING_SINGLE: &str = "Literal.String.Single";
    pub const OPERATOR: &str = "Operator";
    pub const PUNCTUATION: &str = "Punctuation";
    pub const TEXT: &str = "Text";
    pub const COMMENT_PREPROC: &str = "Comment.Preproc";
}

/// One lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: &'static str,
    pub text: String,
}

impl Token {
    pub fn new(kind: &'static str, text: impl Into<String>) -> Self {
        Token {
            kind,
            text: text.into(),
        }
    }

    /// The last segment of the kind tag, e.g. "Namespace" for
    /// "Keyword.Namespace".
    pub fn partial(&self) -> &'static str {
        self.kind.rsplit('.').next().unwrap_or(self.kind)
    }
}

/// A language descriptor.
#[derive(Debug)]
pub struct Lexer {
    /// Canonical language name, e.g. "Objective-C".
    pub name: &'static str,
    /// Primary filename glob patterns.
    pub filenames: &'static [&'static str],
    /// Secondary filename patterns this language also plausibly matches.
    pub alias_filenames: &'static [&'static str],
    /// Declared priority, used as a tie-breaker during detection.
    pub priority: f64,
    /// Content accuracy heuristic in 0.0..=1.0.
    pub analyse: fn(&str) -> f64,
    /// Tokenizer over the head of the file.
    pub tokenize: fn(&str) -> Vec<Token>,
    /// For embedded/template languages: the root language dependency
    /// extraction should fold to.
    pub root: Option<&'static str>,
}

/// All known languages.
pub static LEXERS: &[Lexer] = &[
    Lexer {
        name: "Python",
        filenames: &["*.py", "*.pyw"],
        alias_filenames: &["*.pyi"],
        priority: 0.0,
        analyse: analyse_python,
        tokenize: tokenize::python,
        root: None,
    },
    Lexer {
        name: "C",
        filenames: &["*.c", "*.h"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_c,
        tokenize: tokenize::c_family,
        root: None,
    },
    Lexer {
        name: "C++",
        filenames: &[
            "*.cpp", "*.hpp", "*.cc", "*.hh", "*.cxx", "*.hxx", "*.C", "*.H",
        ],
        alias_filenames: &["*.h"],
        priority: 0.0,
        analyse: analyse_cpp,
        tokenize: tokenize::c_family,
        root: None,
    },
    Lexer {
        name: "Objective-C",
        filenames: &["*.m"],
        alias_filenames: &["*.h"],
        priority: 0.0,
        analyse: analyse_objc,
        tokenize: tokenize::c_family,
        root: None,
    },
    Lexer {
        name: "Objective-C++",
        filenames: &["*.mm"],
        alias_filenames: &["*.hh"],
        priority: 0.0,
        analyse: analyse_objc,
        tokenize: tokenize::c_family,
        root: None,
    },
    Lexer {
        name: "Matlab",
        filenames: &["*.m"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_matlab,
        tokenize: tokenize::none,
        root: None,
    },
    Lexer {
        name: "Go",
        filenames: &["*.go"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_go,
        tokenize: tokenize::go,
        root: None,
    },
    Lexer {
        name: "Java",
        filenames: &["*.java"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::jvm,
        root: None,
    },
    Lexer {
        name: "Kotlin",
        filenames: &["*.kt", "*.kts"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::jvm,
        root: None,
    },
    Lexer {
        name: "Scala",
        filenames: &["*.scala", "*.sbt"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::jvm,
        root: None,
    },
    Lexer {
        name: "C#",
        filenames: &["*.cs"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::csharp,
        root: None,
    },
    Lexer {
        name: "PHP",
        filenames: &["*.php", "*.php3", "*.php4", "*.php5"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_php,
        tokenize: tokenize::php,
        root: None,
    },
    Lexer {
        name: "JavaScript",
        filenames: &["*.js", "*.jsx", "*.mjs", "*.cjs"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::javascript,
        root: None,
    },
    Lexer {
        name: "TypeScript",
        filenames: &["*.ts", "*.tsx"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::javascript,
        root: None,
    },
    Lexer {
        name: "Elm",
        filenames: &["*.elm"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::elm,
        root: None,
    },
    Lexer {
        name: "Haskell",
        filenames: &["*.hs"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::haskell,
        root: None,
    },
    Lexer {
        name: "HTML",
        filenames: &["*.html", "*.htm", "*.xhtml"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_html,
        tokenize: tokenize::html,
        root: None,
    },
    Lexer {
        name: "HTML+Django/Jinja",
        filenames: &["*.jinja", "*.jinja2", "*.j2"],
        alias_filenames: &["*.html", "*.htm"],
        priority: 0.0,
        analyse: analyse_django,
        tokenize: tokenize::html,
        root: Some("HTML"),
    },
    Lexer {
        name: "HTML+Mako",
        filenames: &["*.mako"],
        alias_filenames: &["*.html"],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::html,
        root: Some("HTML"),
    },
    Lexer {
        name: "HTML+Velocity",
        filenames: &["*.vm"],
        alias_filenames: &["*.html"],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::html,
        root: Some("HTML"),
    },
    Lexer {
        name: "Coldfusion HTML",
        filenames: &["*.cfm", "*.cfml"],
        alias_filenames: &["*.html"],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::html,
        root: Some("HTML"),
    },
    Lexer {
        name: "JSON",
        filenames: &["*.json"],
        alias_filenames: &[],
        priority: 0.0,
        analyse: analyse_none,
        tokenize: tokenize::none,
        root: None,
    },
];

/// Look up a lexer by canonical name, case-insensitively.
pub fn find_by_name(name: &str) -> Option<&'static Lexer> {
    LEXERS
        .iter()
        .find(|l| l.name.eq_ignore_ascii_case(name.trim()))
}

/// All lexers matching a file name, with whether the match was against a
/// primary filename pattern. A lexer matching both primary and alias
/// patterns counts as primary.
pub fn candidates_for_filename(file_name: &str) -> Vec<(&'static Lexer, bool)> {
    let basename = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    let mut candidates = Vec::new();
    for lexer in LEXERS {
        let primary = lexer.filenames.iter().any(|p| fn_matches(basename, p));
        let alias = primary
            || lexer
                .alias_filenames
                .iter()
                .any(|p| fn_matches(basename, p));
        if alias {
            candidates.push((lexer, primary));
        }
    }
    candidates
}

/// fnmatch-style glob matching: `*`, `?`, and `[...]` character sets.
/// Case-sensitive, so `*.C` and `*.c` stay distinct.
pub fn fn_matches(name: &str, pattern: &str) -> bool {
    glob_match(pattern.as_bytes(), name.as_bytes())
}

fn glob_match(pattern: &[u8], name: &[u8]) -> bool {
    if pattern.is_empty() {
        return name.is_empty();
    }
    match pattern[0] {
        b'*' => {
            // match zero or more characters
            (0..=name.len()).any(|i| glob_match(&pattern[1..], &name[i..]))
        }
        b'?' => !name.is_empty() && glob_match(&pattern[1..], &name[1..]),
        b'[' => {
            let Some(end) = pattern.iter().position(|&c| c == b']') else {
                return !name.is_empty()
                    && pattern[0] == name[0]
                    && glob_match(&pattern[1..], &name[1..]);
            };
            if name.is_empty() {
                return false;
            }
            let (set, negate) = if pattern.get(1) == Some(&b'!') {
                (&pattern[2..end], true)
            } else {
                (&pattern[1..end], false)
            };
            if set_matches(set, name[0]) != negate {
                glob_match(&pattern[end + 1..], &name[1..])
            } else {
                false
            }
        }
        c => !name.is_empty() && c == name[0] && glob_match(&pattern[1..], &name[1..]),
    }
}

fn set_matches(set: &[u8], c: u8) -> bool {
    let mut i = 0;
    while i < set.len() {
        if i + 2 < set.len() && set[i + 1] == b'-' {
            if set[i] <= c && c <= set[i + 2] {
                return true;
            }
            i += 3;
        } else {
            if set[i] == c {
                return true;
            }
            i += 1;
        }
    }
    false
}

lazy_static! {
    static ref MODELINE_RE: Regex = Regex::new(
        r"(?:^|\s)(?:vi|vim|ex)(?:[<=>]?\d*)?:\s*(?:set?\s+)?[^:]*?(?:ft|filetype|syntax)=([A-Za-z0-9_+#-]+)"
    )
    .unwrap();
}

/// Detect a language from a vim modeline in the first or last five lines.
pub fn modeline_language(text: &str) -> Option<&'static Lexer> {
    let lines: Vec<&str> = text.lines().collect();
    let head = lines.iter().take(5);
    let tail = lines.iter().rev().take(5);

    for line in head.chain(tail) {
        if let Some(caps) = MODELINE_RE.captures(line) {
            let filetype = caps.get(1).map_or("", |m| m.as_str());
            if let Some(lexer) = lexer_for_filetype(filetype) {
                return Some(lexer);
            }
        }
    }
    None
}

/// Map a vim filetype value to a lexer.
fn lexer_for_filetype(filetype: &str) -> Option<&'static Lexer> {
    let name = match filetype.to_lowercase().as_str() {
        "python" | "python3" => "Python",
        "c" => "C",
        "cpp" | "cxx" => "C++",
        "objc" => "Objective-C",
        "objcpp" => "Objective-C++",
        "go" => "Go",
        "java" => "Java",
        "kotlin" => "Kotlin",
        "scala" => "Scala",
        "cs" | "csharp" => "C#",
        "php" => "PHP",
        "javascript" => "JavaScript",
        "typescript" => "TypeScript",
        "elm" => "Elm",
        "haskell" => "Haskell",
        "html" => "HTML",
        "jinja" | "jinja2" | "htmldjango" => "HTML+Django/Jinja",
        "mako" => "HTML+Mako",
        "velocity" => "HTML+Velocity",
        "matlab" => "Matlab",
        "json" => "JSON",
        other => return find_by_name(other),
    };
    find_by_name(name)
}

fn analyse_none(_text: &str) -> f64 {
    0.0
}

fn analyse_python(text: &str) -> f64 {
    let first = text.lines().next().unwrap_or("");
    if first.starts_with("#!") && first.contains("python") {
        return 1.0;
    }
    if text.contains("def ") && text.contains(':') {
        return 0.2;
    }
    0.0
}

fn analyse_c(text: &str) -> f64 {
    if text.contains("#include") {
        return 0.1;
    }
    0.0
}

fn analyse_cpp(text: &str) -> f64 {
    let mut score: f64 = 0.0;
    if text.contains("#include") {
        score += 0.1;
    }
    if text.contains("::") || text.contains("template") || text.contains("namespace ") {
        score += 0.2;
    }
    score.min(1.0)
}

fn analyse_objc(text: &str) -> f64 {
    if text.contains("@interface") || text.contains("@implementation") {
        return 0.8;
    }
    if text.contains("#import") {
        return 0.3;
    }
    0.0
}

fn analyse_matlab(text: &str) -> f64 {
    let mut score: f64 = 0.0;
    // comments starting with % are a strong matlab signal
    if text.lines().any(|l| l.trim_start().starts_with('%')) {
        score += 0.2;
    }
    if text.contains("function ") && text.contains("end") {
        score += 0.1;
    }
    score.min(1.0)
}

fn analyse_go(text: &str) -> f64 {
    if text.contains("package ") && text.contains("func ") {
        return 0.4;
    }
    0.0
}

fn analyse_php(text: &str) -> f64 {
    if text.contains("<?php") {
        return 1.0;
    }
    0.0
}

fn analyse_html(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    if lowered.contains("<!doctype html") {
        return 0.5;
    }
    if lowered.contains("<html") {
        return 0.3;
    }
    0.0
}

fn analyse_django(text: &str) -> f64 {
    if text.contains("{%") || text.contains("{{") {
        return 0.4;
    }
    0.0
}
