//! Source hygiene for the canvas crate.
//!
//! The canvas code runs inside every participant's session loop, so a panic
//! there takes the whole session down and a swallowed error hides a bad mark.
//! These tests scan `src/` (test files excluded) and hold each pattern to a
//! budget. Budgets only ratchet down.

use std::fs;
use std::path::{Path, PathBuf};

/// `(pattern, budget, what it costs us)`.
const BUDGETS: &[(&str, usize, &str)] = &[
    (".unwrap()", 0, "panics on None/Err"),
    (".expect(", 0, "panics on None/Err"),
    ("panic!(", 0, "aborts the session loop"),
    ("unreachable!(", 0, "aborts the session loop"),
    ("todo!(", 0, "unfinished code path"),
    ("unimplemented!(", 0, "unfinished code path"),
    ("dbg!(", 0, "debug output left behind"),
    ("let _ =", 0, "discards a result unseen"),
    (".ok()", 0, "turns an error into silence"),
    ("#[allow(dead_code)]", 0, "hides unused code"),
];

fn production_sources() -> Vec<(PathBuf, String)> {
    let mut out = Vec::new();
    walk(Path::new("src"), &mut out);
    out
}

fn walk(dir: &Path, out: &mut Vec<(PathBuf, String)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        if path.is_dir() {
            walk(&path, out);
            continue;
        }
        let is_rs = path.extension().is_some_and(|e| e == "rs");
        let is_test = path.to_string_lossy().ends_with("_test.rs");
        if is_rs && !is_test {
            if let Ok(content) = fs::read_to_string(&path) {
                out.push((path, content));
            }
        }
    }
}

fn hits(files: &[(PathBuf, String)], pattern: &str) -> Vec<String> {
    files
        .iter()
        .flat_map(|(path, content)| {
            content
                .lines()
                .enumerate()
                .filter(move |(_, line)| line.contains(pattern))
                .map(move |(n, line)| format!("  {}:{}: {}", path.display(), n + 1, line.trim()))
        })
        .collect()
}

#[test]
fn sources_are_found() {
    assert!(!production_sources().is_empty(), "run from the canvas crate root");
}

#[test]
fn every_pattern_is_within_budget() {
    let files = production_sources();
    let mut failures = Vec::new();
    for &(pattern, budget, cost) in BUDGETS {
        let found = hits(&files, pattern);
        if found.len() > budget {
            failures.push(format!("`{pattern}` ({cost}): found {}, budget {budget}\n{}", found.len(), found.join("\n")));
        }
    }
    assert!(failures.is_empty(), "hygiene budgets exceeded:\n{}", failures.join("\n"));
}
