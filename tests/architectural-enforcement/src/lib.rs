//! Architectural Enforcement Integration Tests
//!
//! This package scans the workspace sources and enforces architectural
//! principles that the compiler cannot:
//! - No blocking sleeps in production code (reveal pacing uses one interval)
//! - No `unwrap()` / `expect()` outside tests, errors are propagated
//! - No mutable statics, session state lives in the session that owns it
//! - The core crate stays free of terminal UI dependencies
//!
//! These tests are designed to catch violations early in the development cycle.

use std::fmt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// A forbidden source pattern
#[derive(Clone, Copy, Debug)]
pub struct Rule {
    /// Short name shown in failures
    pub name: &'static str,
    /// Substring that must not appear
    pub pattern: &'static str,
}

/// Rules for non-test code in every crate
pub const PRODUCTION_RULES: &[Rule] = &[
    Rule {
        name: "blocking sleep",
        pattern: "thread::sleep",
    },
    Rule {
        name: "mutable static",
        pattern: "static mut ",
    },
    Rule {
        name: "unwrap outside tests",
        pattern: ".unwrap()",
    },
    Rule {
        name: "expect outside tests",
        pattern: ".expect(",
    },
    Rule {
        name: "truncating duration cast",
        pattern: "as_millis() as ",
    },
];

/// Extra rules for the core library
pub const CORE_RULES: &[Rule] = &[
    Rule {
        name: "timer sleep in core",
        pattern: "time::sleep(",
    },
    Rule {
        name: "terminal output in core",
        pattern: "println!(",
    },
];

/// Crates the core must never depend on
pub const FORBIDDEN_CORE_DEPENDENCIES: &[&str] = &["ratatui", "crossterm", "clap"];

/// One rule violation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File containing it
    pub file: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Rule name
    pub rule: &'static str,
    /// The offending line, trimmed
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} -> {}",
            self.file.display(),
            self.line,
            self.rule,
            self.text
        )
    }
}

/// Workspace root, two levels above this crate
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// The part of a source file before its `#[cfg(test)] mod ...` block
#[must_use]
pub fn production_source(text: &str) -> &str {
    let mut offset = 0;
    let mut lines = text.split_inclusive('\n').peekable();

    while let Some(line) = lines.next() {
        if line.trim() == "#[cfg(test)]" {
            let next = lines.peek().map_or("", |l| l.trim_start());
            if next.starts_with("mod ") {
                return &text[..offset];
            }
        }
        offset += line.len();
    }
    text
}

/// Check one file's text against `rules`
///
/// Comment lines are skipped, so documentation may mention patterns.
#[must_use]
pub fn scan_source(file: &Path, text: &str, rules: &[Rule]) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (index, line) in production_source(text).lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("//") {
            continue;
        }
        for rule in rules {
            if trimmed.contains(rule.pattern) {
                violations.push(Violation {
                    file: file.to_path_buf(),
                    line: index + 1,
                    rule: rule.name,
                    text: trimmed.to_string(),
                });
            }
        }
    }
    violations
}

/// Check every `.rs` file under `dir`
///
/// # Panics
///
/// Panics if a source file cannot be read.
#[must_use]
pub fn scan_dir(dir: &Path, rules: &[Rule]) -> Vec<Violation> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "rs"))
        .flat_map(|entry| {
            let text = std::fs::read_to_string(entry.path())
                .unwrap_or_else(|e| panic!("cannot read {}: {e}", entry.path().display()));
            scan_source(entry.path(), &text, rules)
        })
        .collect()
}

/// Dependency names declared in a Cargo manifest's `[dependencies]` table
#[must_use]
pub fn declared_dependencies(manifest: &str) -> Vec<String> {
    let mut in_dependencies = false;
    let mut names = Vec::new();

    for line in manifest.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }
        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, _)) = line.split_once('=') {
            names.push(name.trim().to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_module_is_excluded() {
        let text = "fn a() {}\n#[cfg(test)]\nmod tests {\n    fn b() { x.unwrap(); }\n}\n";
        assert_eq!(production_source(text), "fn a() {}\n");
        assert!(scan_source(Path::new("a.rs"), text, PRODUCTION_RULES).is_empty());
    }

    #[test]
    fn test_cfg_test_item_does_not_end_production_code() {
        let text = "#[cfg(test)]\nfn helper() {}\nfn real() { v.unwrap(); }\n";
        let violations = scan_source(Path::new("a.rs"), text, PRODUCTION_RULES);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 3);
    }

    #[test]
    fn test_comments_are_ignored() {
        let text = "/// Never call `std::thread::sleep` here\nfn ok() {}\n";
        assert!(scan_source(Path::new("a.rs"), text, PRODUCTION_RULES).is_empty());
    }

    #[test]
    fn test_violation_reported_with_location() {
        let text = "fn main() {\n    std::thread::sleep(d);\n}\n";
        let violations = scan_source(Path::new("src/main.rs"), text, PRODUCTION_RULES);
        assert_eq!(
            violations,
            vec![Violation {
                file: PathBuf::from("src/main.rs"),
                line: 2,
                rule: "blocking sleep",
                text: "std::thread::sleep(d);".to_string(),
            }]
        );
    }

    #[test]
    fn test_duration_cast_flagged() {
        let text = "fn log(d: Duration) {\n    let ms = d.as_millis() as u64;\n}\n";
        let violations = scan_source(Path::new("a.rs"), text, PRODUCTION_RULES);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, "truncating duration cast");
        assert_eq!(violations[0].line, 2);
    }

    #[test]
    fn test_declared_dependencies() {
        let manifest = "[package]\nname = \"x\"\n\n[dependencies]\n# http\nreqwest = \"0.12\"\ntokio = { version = \"1\" }\n\n[dev-dependencies]\nwiremock = \"0.6\"\n";
        assert_eq!(declared_dependencies(manifest), vec!["reqwest", "tokio"]);
    }
}
