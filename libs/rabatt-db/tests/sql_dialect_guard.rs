//! Source-scan guard: every SQL literal in this crate must stay on the
//! Postgres dialect, and row locking must stay inside the ledger repository.

use std::fs;
use std::path::{Path, PathBuf};

fn rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                out.push(path);
            }
        }
    }
    out
}

/// Contents of every string literal in the file, raw or plain, with the
/// line number it starts on.
fn string_literals(content: &str) -> Vec<(usize, String)> {
    let bytes = content.as_bytes();
    let mut out = Vec::new();
    let mut line = 1usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                line += 1;
                i += 1;
            }
            b'r' if bytes.get(i + 1) == Some(&b'#') || bytes.get(i + 1) == Some(&b'"') => {
                let mut hashes = 0;
                let mut j = i + 1;
                while bytes.get(j) == Some(&b'#') {
                    hashes += 1;
                    j += 1;
                }
                if bytes.get(j) != Some(&b'"') {
                    i += 1;
                    continue;
                }
                let start = j + 1;
                let terminator = format!("\"{}", "#".repeat(hashes));
                let Some(rel) = content[start..].find(&terminator) else {
                    break;
                };
                let literal = &content[start..start + rel];
                out.push((line, literal.to_string()));
                line += literal.bytes().filter(|b| *b == b'\n').count();
                i = start + rel + terminator.len();
            }
            b'"' => {
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() {
                    match bytes[j] {
                        b'\\' => j += 2,
                        b'"' => break,
                        _ => j += 1,
                    }
                }
                if j <= bytes.len() {
                    let literal = &content[start..j.min(bytes.len())];
                    out.push((line, literal.to_string()));
                    line += literal.bytes().filter(|b| *b == b'\n').count();
                }
                i = j + 1;
            }
            _ => i += 1,
        }
    }
    out
}

fn looks_like_sql(literal: &str) -> bool {
    let upper = literal.to_uppercase();
    ["SELECT", "INSERT", "UPDATE", "DELETE"]
        .iter()
        .any(|kw| upper.trim_start().starts_with(kw))
}

fn sql_literals_in_crate() -> Vec<(PathBuf, usize, String)> {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut out = Vec::new();
    for file in rs_files(&src) {
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };
        for (line, literal) in string_literals(&content) {
            if looks_like_sql(&literal) {
                out.push((file.clone(), line, literal));
            }
        }
    }
    out
}

#[test]
fn sql_literals_use_postgres_placeholders() {
    let violations: Vec<String> = sql_literals_in_crate()
        .into_iter()
        .filter(|(_, _, sql)| sql.contains('?'))
        .map(|(file, line, _)| format!("{}:{} uses '?' instead of $N binds", file.display(), line))
        .collect();
    assert!(violations.is_empty(), "{}", violations.join("\n"));
}

#[test]
fn sql_literals_avoid_sqlite_only_syntax() {
    let violations: Vec<String> = sql_literals_in_crate()
        .into_iter()
        .filter(|(_, _, sql)| {
            let lower = sql.to_lowercase();
            lower.contains("insert or ignore")
                || lower.contains("strftime(")
                || lower.contains("datetime(")
                || lower.contains("julianday(")
        })
        .map(|(file, line, _)| format!("{}:{} uses SQLite-only syntax", file.display(), line))
        .collect();
    assert!(violations.is_empty(), "{}", violations.join("\n"));
}

#[test]
fn row_locking_stays_in_the_ledger_repository() {
    let violations: Vec<String> = sql_literals_in_crate()
        .into_iter()
        .filter(|(file, _, sql)| {
            sql.to_uppercase().contains("FOR UPDATE")
                && file.file_name().and_then(|n| n.to_str()) != Some("ledger_repo.rs")
        })
        .map(|(file, line, _)| {
            format!(
                "{}:{} acquires a row lock outside ledger_repo.rs",
                file.display(),
                line
            )
        })
        .collect();
    assert!(violations.is_empty(), "{}", violations.join("\n"));
}
