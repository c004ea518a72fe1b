//! Stats about files: language detection, dependency extraction, and line
//! counts.
//!
//! Language resolution order:
//! 1. an explicit override, when it names a known language after
//!    standardization;
//! 2. extension disambiguation for ambiguous C-family files using sibling
//!    files in the same folder;
//! 3. a combined guess from filename-matching lexers and a vim modeline,
//!    where the modeline wins only when strictly more accurate.
//!
//! Any I/O failure in here degrades to null fields; the only non-success
//! outcome is the explicit "not enough accuracy" skip signal.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use once_cell::sync::Lazy;
use phf::phf_map;

use crate::dependencies::DependencyResolver;
use crate::heartbeat::SkipHeartbeat;
use crate::lexers::{self, Lexer};

/// Files larger than this (bytes) skip the line count stat.
pub const MAX_FILE_SIZE_SUPPORTED: u64 = 2_000_000;

/// Priority overrides applied during lexer tie-breaking, keyed by
/// lowercased language name.
static LANGUAGE_PRIORITIES: phf::Map<&'static str, f64> = phf_map! {
    "f#" => 0.01,
    "perl" => 0.01,
    "typescript" => 0.01,
};

static LANGUAGE_TABLES: Lazy<HashMap<&'static str, HashMap<String, String>>> = Lazy::new(|| {
    let mut tables = HashMap::new();
    for (name, raw) in [
        ("default", include_str!("languages/default.json")),
        ("vscode", include_str!("languages/vscode.json")),
    ] {
        let table: HashMap<String, String> =
            serde_json::from_str(raw).expect("embedded language table is valid json");
        tables.insert(name, table);
    }
    tables
});

/// Information about an entity produced by the stats collector.
#[derive(Debug, Clone, Default)]
pub struct FileStats {
    pub language: Option<String>,
    pub dependencies: Option<Vec<String>>,
    pub lines: Option<u32>,
    pub lineno: Option<u32>,
    pub cursorpos: Option<u32>,
}

/// Inputs to the stats collector.
#[derive(Debug, Clone, Default)]
pub struct StatsRequest<'a> {
    pub file_name: &'a str,
    pub entity_type: &'a str,
    pub lineno: Option<u32>,
    pub cursorpos: Option<u32>,
    pub plugin: Option<&'a str>,
    pub language: Option<&'a str>,
    pub local_file: Option<&'a str>,
}

/// Collect stats about the entity.
pub fn file_stats(req: &StatsRequest) -> Result<FileStats, SkipHeartbeat> {
    let language = standardize_language(req.language, req.plugin);
    let mut stats = FileStats {
        language: language.clone(),
        dependencies: None,
        lines: None,
        lineno: req.lineno,
        cursorpos: req.cursorpos,
    };

    if req.entity_type == "file" {
        let read_path = req.local_file.unwrap_or(req.file_name);

        let mut lexer = language.as_deref().and_then(lexers::find_by_name);
        let mut reported = language;
        if lexer.is_none() {
            lexer = guess_lexer(req.file_name, read_path)?;
            reported = root_language(lexer);
        }

        let dependencies = DependencyResolver::new(Path::new(read_path), lexer).parse();
        stats.language = standardize_language(reported.as_deref(), None);
        stats.dependencies = Some(dependencies);
        stats.lines = count_lines(Path::new(read_path));
    }

    Ok(stats)
}

/// Guess the language of a file.
///
/// Looks at ambiguous C-family extensions first, then compares a
/// filename-restricted content analysis with a vim modeline guess.
fn guess_lexer(file_name: &str, read_path: &str) -> Result<Option<&'static Lexer>, SkipHeartbeat> {
    if let Some(language) = language_from_extension(Path::new(file_name)) {
        if let Some(lexer) = lexers::find_by_name(language) {
            return Ok(Some(lexer));
        }
    }

    let text = lexers::read_file_head(Path::new(read_path)).unwrap_or_default();
    let (lexer1, accuracy1) = guess_lexer_using_filename(read_path, &text)?;
    let (lexer2, accuracy2) = guess_lexer_using_modeline(&text);

    let mut lexer = lexer1;
    if let (Some(l2), Some(a2)) = (lexer2, accuracy2) {
        if accuracy1.is_none() || a2 > accuracy1.unwrap_or(0.0) {
            lexer = Some(l2);
        }
    }
    Ok(lexer)
}

/// Guess the lexer from lexers matching this file name, breaking ties with
/// content analysis.
fn guess_lexer_using_filename(
    path: &str,
    text: &str,
) -> Result<(Option<&'static Lexer>, Option<f64>), SkipHeartbeat> {
    let candidates = lexers::candidates_for_filename(path);
    if candidates.is_empty() {
        return Ok((None, None));
    }

    let lexer = if candidates.len() == 1 {
        candidates[0].0
    } else {
        match pick_lexer(Path::new(path), text, &candidates)? {
            Some(l) => l,
            None => return Ok((None, None)),
        }
    };

    Ok((Some(lexer), Some((lexer.analyse)(text))))
}

/// Rank rival lexers matching the same file name.
///
/// A perfect content score wins immediately. Otherwise candidates are
/// ranked ascending by `(accuracy, primary-filename-match, priority,
/// name)` and the maximum wins - unless Matlab and Objective-C tie on
/// accuracy, which aborts detection as not confident enough.
pub(crate) fn pick_lexer(
    path: &Path,
    text: &str,
    candidates: &[(&'static Lexer, bool)],
) -> Result<Option<&'static Lexer>, SkipHeartbeat> {
    let mut scored: Vec<(f64, bool, f64, &'static Lexer)> = Vec::new();

    for &(lexer, primary) in candidates {
        let rv = (lexer.analyse)(text);
        if rv == 1.0 {
            return Ok(Some(lexer));
        }
        let (accuracy, priority) = customize_lexer_priority(path, rv, lexer);
        scored.push((accuracy, primary, priority, lexer));
    }

    let matlab = scored
        .iter()
        .find(|s| s.3.name.eq_ignore_ascii_case("matlab"));
    let objc = scored
        .iter()
        .find(|s| s.3.name.eq_ignore_ascii_case("objective-c"));
    if let (Some(m), Some(o)) = (matlab, objc) {
        if m.0 == o.0 {
            return Err(SkipHeartbeat::new(
                "Skipping because not enough language accuracy.",
            ));
        }
    }

    scored.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
            .then(a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
            .then(a.3.name.cmp(b.3.name))
    });
    Ok(scored.last().map(|s| s.3))
}

/// Adjust a candidate's accuracy and priority using neighboring files and
/// the static priority table.
fn customize_lexer_priority(path: &Path, accuracy: f64, lexer: &Lexer) -> (f64, f64) {
    let mut accuracy = accuracy;
    let mut priority = lexer.priority;

    let name = lexer.name.to_lowercase().replace("sharp", "#");
    if let Some(p) = LANGUAGE_PRIORITIES.get(name.as_str()) {
        priority = *p;
    } else if name == "matlab" {
        let extensions = extensions_in_same_folder(path);
        if extensions.contains(".mat") {
            accuracy += 0.01;
        }
        if !extensions.contains(".h") {
            accuracy += 0.01;
        }
    } else if name == "objective-c" {
        let extensions = extensions_in_same_folder(path);
        if extensions.contains(".mat") {
            accuracy -= 0.01;
        } else {
            accuracy += 0.01;
        }
        if extensions.contains(".h") {
            accuracy += 0.01;
        }
    }

    (accuracy, priority)
}

/// Guess the lexer from a vim modeline in the file head.
fn guess_lexer_using_modeline(text: &str) -> (Option<&'static Lexer>, Option<f64>) {
    let lexer = lexers::modeline_language(text);
    let accuracy = lexer.map(|l| (l.analyse)(text));
    (lexer, accuracy)
}

/// Resolve ambiguous C-family extensions using sibling files.
fn language_from_extension(path: &Path) -> Option<&'static str> {
    let file_name = path.file_name()?.to_string_lossy();
    if file_name == "go.mod" {
        return Some("Go");
    }

    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    if extension.starts_with(".h") || extension.starts_with(".c") {
        if sibling_exists(path, "c") || sibling_exists(path, "C") {
            return Some("C");
        }
        if sibling_exists(path, "m") || sibling_exists(path, "M") {
            return Some("Objective-C");
        }
        if sibling_exists(path, "mm") || sibling_exists(path, "MM") {
            return Some("Objective-C++");
        }

        let available = extensions_in_same_folder(path);
        const CPP_EXTENSIONS: &[&str] = &[".cpp", ".hpp", ".cc", ".hh", ".cxx", ".hxx"];
        if CPP_EXTENSIONS.iter().any(|e| available.contains(*e)) {
            return Some("C++");
        }
        if available.contains(".c") {
            return Some("C");
        }
    }

    if extension == ".m" && (sibling_exists(path, "h") || sibling_exists(path, "H")) {
        return Some("Objective-C");
    }
    if extension == ".mm" && (sibling_exists(path, "h") || sibling_exists(path, "H")) {
        return Some("Objective-C++");
    }

    None
}

fn sibling_exists(path: &Path, extension: &str) -> bool {
    path.with_extension(extension).exists()
}

/// Lowercased extensions of all files in the same folder.
fn extensions_in_same_folder(path: &Path) -> HashSet<String> {
    let mut extensions = HashSet::new();
    let Some(parent) = path.parent() else {
        return extensions;
    };
    let Ok(entries) = std::fs::read_dir(parent) else {
        return extensions;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if let Some(ext) = Path::new(&name).extension() {
            extensions.insert(format!(".{}", ext.to_string_lossy().to_lowercase()));
        }
    }
    extensions
}

/// The language to report for a lexer, folding embedded lexers to their
/// root language unless folding is prevented.
fn root_language(lexer: Option<&'static Lexer>) -> Option<String> {
    const PREVENT_USING_ROOT: &[&str] = &["coldfusion html"];

    let lexer = lexer?;
    if let Some(root) = lexer.root {
        if !PREVENT_USING_ROOT.contains(&lexer.name.to_lowercase().as_str()) {
            return Some(root.to_string());
        }
    }
    Some(lexer.name.to_string())
}

/// Map a raw language name through the plugin-scoped table, falling back
/// to the default table. Unmapped names pass through unchanged.
pub fn standardize_language(language: Option<&str>, plugin: Option<&str>) -> Option<String> {
    let language = language?.trim();
    if language.is_empty() {
        return None;
    }

    let mut standardized = language.to_string();
    if let Some(plugin) = plugin {
        if let Some(short) = plugin_short_name(plugin) {
            if let Some(mapped) = lookup_language(&standardized, &short) {
                standardized = mapped;
            }
        }
    }
    if let Some(mapped) = lookup_language(&standardized, "default") {
        standardized = mapped;
    }
    Some(standardized)
}

/// Derive a plugin's short name by trimming version and path suffixes,
/// e.g. "vscode/1.68 vscode-codetick/4.0.9" becomes "vscode".
fn plugin_short_name(plugin: &str) -> Option<String> {
    let last = plugin.split(' ').next_back()?;
    let name = last.split('/').next()?.split('-').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

fn lookup_language(language: &str, table: &str) -> Option<String> {
    LANGUAGE_TABLES
        .get(table)?
        .get(&language.to_lowercase())
        .cloned()
}

/// Count lines with a linear newline scan. Files over the size ceiling
/// and unreadable files report no count.
fn count_lines(path: &Path) -> Option<u32> {
    let metadata = std::fs::metadata(path).ok()?;
    if metadata.len() > MAX_FILE_SIZE_SUPPORTED {
        return None;
    }
    let bytes = std::fs::read(path).ok()?;
    let text = String::from_utf8_lossy(&bytes);
    Some(text.lines().count() as u32)
}
