//! Dependency extraction from source files.
//!
//! This module provides:
//! - `TokenParser` trait: per-language state machines over a token stream
//! - `DependencyAccumulator`: shared exclude-filtering and truncation rules
//! - a factory registry mapping canonical language names to parsers
//! - `DependencyResolver`: picks the right parser for a detected language
//!
//! Extraction is strictly best-effort: unsupported languages, unreadable
//! files, and unlexable content all produce an empty set, never an error.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::RwLock;

use regex::RegexBuilder;

use crate::lexers::{self, Lexer, Token};

pub mod c_cpp;
pub mod csharp;
pub mod elm;
pub mod go;
pub mod haskell;
pub mod javascript;
pub mod jvm;
pub mod php;
pub mod python;
pub mod templates;
pub mod unknown;

/// Languages whose embedded sub-languages must not fold to the root
/// language during parser resolution.
const PREVENT_ROOT_FOLDING: &[&str] = &["coldfusion html"];

/// Everything a parser gets to look at.
pub struct ParseInput<'a> {
    /// Path of the file being parsed.
    pub file_path: &'a Path,
    /// Concrete (pre-folding) language name, for parameterized parsers.
    pub language: &'a str,
    /// Token stream over the head of the file.
    pub tokens: &'a [Token],
}

/// Parser trait for extracting dependency names from a token stream.
///
/// Implementations keep no state between calls; all per-file state lives
/// inside `parse`.
pub trait TokenParser: Send + Sync {
    /// Extract raw dependency names. Duplicates are fine; the resolver
    /// dedupes.
    fn parse(&self, input: &ParseInput) -> Vec<String>;
}

/// Factory function type for creating parser instances.
pub type ParserFactory = fn() -> Box<dyn TokenParser>;

lazy_static::lazy_static! {
    /// Global parser registry mapping lowercased language names to factories.
    static ref REGISTRY: RwLock<HashMap<String, ParserFactory>> = RwLock::new(HashMap::new());
}

/// Register a parser factory for a canonical language name.
pub fn register(language: &str, factory: ParserFactory) {
    let mut registry = REGISTRY.write().unwrap();
    registry.insert(language.to_lowercase(), factory);
}

/// Get a parser for the given language name.
/// Returns None if no parser is registered for the language.
pub fn for_language(language: &str) -> Option<Box<dyn TokenParser>> {
    let registry = REGISTRY.read().unwrap();
    registry.get(&language.to_lowercase()).map(|factory| factory())
}

/// Initialize the parser registry with all language parsers.
/// Call this once at startup before resolving dependencies.
pub fn init() {
    python::register();
    c_cpp::register();
    go::register();
    jvm::register();
    csharp::register();
    php::register();
    javascript::register();
    elm::register();
    haskell::register();
    templates::register();
    unknown::register();
}

/// Truncation rule for dotted/slashed import paths.
#[derive(Debug, Clone, Copy)]
pub struct Truncation {
    /// Path separator: `.` for module paths, `/` for includes, `\` for
    /// namespace imports.
    pub separator: &'static str,
    /// Number of leading segments to keep, at least 1.
    pub depth: usize,
    /// Drop a three-character first segment, treating it as a reversed
    /// domain prefix (com, org, net, ...).
    pub reversed_domain: bool,
}

impl Truncation {
    pub fn new(separator: &'static str, depth: usize) -> Self {
        Truncation {
            separator,
            depth,
            reversed_domain: false,
        }
    }

    pub fn reversed_domain(mut self) -> Self {
        self.reversed_domain = true;
        self
    }
}

/// Collects dependency candidates, applying the shared exclude and
/// truncation rules before acceptance.
pub struct DependencyAccumulator {
    deps: Vec<String>,
    exclude: Vec<regex::Regex>,
}

impl DependencyAccumulator {
    /// Compile the parser's case-insensitive exclude patterns. Invalid
    /// patterns are skipped.
    pub fn new(exclude: &[&str]) -> Self {
        let exclude = exclude
            .iter()
            .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
            .collect();
        DependencyAccumulator {
            deps: Vec::new(),
            exclude,
        }
    }

    /// Accept a candidate as-is (after trimming and exclude filtering).
    pub fn append(&mut self, dep: &str) {
        self.save(dep, None);
    }

    /// Accept a candidate after truncating it to the rule's leading
    /// segments. Wildcard suffix segments are stripped before truncation.
    pub fn append_truncated(&mut self, dep: &str, rule: Truncation) {
        self.save(dep, Some(rule));
    }

    fn save(&mut self, dep: &str, rule: Option<Truncation>) {
        let mut candidate = dep.trim().to_string();
        let mut separator = None;

        if let Some(rule) = rule {
            separator = Some(rule.separator);
            let mut parts: Vec<&str> = candidate.split(rule.separator).collect();
            while parts.last().is_some_and(|p| p.trim() == "*") {
                parts.pop();
            }
            while parts.last().is_some_and(|p| p.trim().is_empty()) {
                parts.pop();
            }
            if rule.reversed_domain && parts.len() > 1 && parts[0].trim().len() == 3 {
                parts.remove(0);
            }
            let depth = rule.depth.max(1).min(parts.len());
            candidate = parts[..depth].join(rule.separator);
        }

        let candidate = candidate.trim();
        if candidate.is_empty() {
            return;
        }
        if let Some(sep) = separator {
            if candidate.starts_with(sep) {
                return;
            }
        }
        if self.exclude.iter().any(|re| re.is_match(candidate)) {
            return;
        }
        self.deps.push(candidate.to_string());
    }

    /// The accepted candidates, duplicates included.
    pub fn into_dependencies(self) -> Vec<String> {
        self.deps
    }
}

/// Selects and runs the right parser for a file's detected language.
pub struct DependencyResolver<'a> {
    file_path: &'a Path,
    lexer: Option<&'static Lexer>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(file_path: &'a Path, lexer: Option<&'static Lexer>) -> Self {
        DependencyResolver { file_path, lexer }
    }

    /// The canonical language used for parser lookup, unwrapping embedded
    /// lexers to their root language unless folding is prevented.
    fn parser_language(&self) -> &'static str {
        let Some(lexer) = self.lexer else {
            return "unknown";
        };
        if let Some(root) = lexer.root {
            if !PREVENT_ROOT_FOLDING.contains(&lexer.name.to_lowercase().as_str()) {
                return root;
            }
        }
        lexer.name
    }

    /// Parse, dedupe, and return the file's dependencies. Always succeeds;
    /// missing parsers and unreadable files yield an empty set.
    pub fn parse(&self) -> Vec<String> {
        let language = self.parser_language();
        let Some(parser) = for_language(language) else {
            tracing::debug!("parsing dependencies not supported for {}", language);
            return Vec::new();
        };

        let text = lexers::read_file_head(self.file_path).unwrap_or_default();
        let tokens = self
            .lexer
            .map(|l| (l.tokenize)(&text))
            .unwrap_or_default();

        let input = ParseInput {
            file_path: self.file_path,
            language: self.lexer.map_or("unknown", |l| l.name),
            tokens: &tokens,
        };

        let unique: HashSet<String> = parser
            .parse(&input)
            .into_iter()
            .filter(|d| !d.is_empty())
            .collect();
        let mut deps: Vec<String> = unique.into_iter().collect();
        deps.sort();
        deps
    }
}
