//! Dependency detection for files without a known language.
//!
//! Some well-known config files imply a tool dependency purely by name,
//! for example `bower.json` implies bower.

use phf::phf_map;

use super::{DependencyAccumulator, ParseInput, TokenParser};

/// Substring (or exact) file name matches mapping to a dependency name.
/// The boolean marks exact matches.
static FILES: phf::Map<&'static str, (bool, &'static str)> = phf_map! {
    "bower.json" => (true, "bower"),
    "component.json" => (true, "component"),
    "gruntfile" => (false, "grunt"),
    "gulpfile" => (false, "gulp"),
    "bower" => (false, "bower"),
};

pub struct UnknownParser;

impl TokenParser for UnknownParser {
    fn parse(&self, input: &ParseInput) -> Vec<String> {
        let mut acc = DependencyAccumulator::new(&[]);

        let file_name = input
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        for (key, (exact, dependency)) in FILES.entries() {
            let matched = if *exact {
                file_name == *key
            } else {
                file_name.contains(key)
            };
            if matched {
                acc.append(dependency);
            }
        }

        acc.into_dependencies()
    }
}

pub fn new_parser() -> Box<dyn TokenParser> {
    Box::new(UnknownParser)
}

/// Register for unrecognized files and bare data files.
pub fn register() {
    super::register("unknown", new_parser);
    super::register("json", new_parser);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(path: &str) -> Vec<String> {
        let input = ParseInput {
            file_path: Path::new(path),
            language: "unknown",
            tokens: &[],
        };
        let mut deps = UnknownParser.parse(&input);
        deps.sort();
        deps.dedup();
        deps
    }

    #[test]
    fn test_bower_json() {
        assert_eq!(parse("/project/bower.json"), vec!["bower"]);
    }

    #[test]
    fn test_gruntfile_substring_match() {
        assert_eq!(parse("/project/Gruntfile.js"), vec!["grunt"]);
    }

    #[test]
    fn test_ordinary_file_yields_nothing() {
        assert!(parse("/project/notes.txt").is_empty());
    }
}
