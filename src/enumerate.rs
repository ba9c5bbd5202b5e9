//! Turns command line arguments into candidate paths.
//!
//! Wildcards are honored in the final component only, the way directory
//! searches on Windows match them. Brace alternatives are expanded first.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::common::types::MatchFlags;
use crate::{list_directory, CASE_INSENSITIVE_NAMES};

#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub name: OsString,
    pub is_dir: bool,
}

pub struct Enumerator {
    flags: MatchFlags,
}

impl Enumerator {
    pub fn new(flags: MatchFlags) -> Self {
        Self { flags }
    }

    /// Arguments that are not valid Unicode skip brace expansion and keep
    /// their exact bytes.
    pub fn candidates(&self, arg: &OsStr) -> Vec<PathBuf> {
        let patterns: Vec<OsString> = match arg.to_str() {
            Some(text) if !self.flags.basic_expansion => {
                expand_braces(text).into_iter().map(OsString::from).collect()
            }
            _ => vec![arg.to_os_string()],
        };

        let mut found = Vec::new();
        for pattern in patterns {
            self.expand_pattern(Path::new(&pattern), &mut found);
        }
        found
    }

    fn expand_pattern(&self, pattern: &Path, found: &mut Vec<PathBuf>) {
        let Some(leaf) = pattern.file_name() else {
            // Roots and `..` have no final component to match against.
            if pattern.exists() {
                found.push(pattern.to_path_buf());
            }
            return;
        };
        let leaf = leaf.to_string_lossy().into_owned();
        let parent = pattern.parent().unwrap_or(Path::new(""));

        if self.flags.recursive {
            self.walk(parent, &leaf, found);
            return;
        }

        if !has_wildcards(&leaf, self.flags.basic_expansion) {
            if std::fs::symlink_metadata(pattern).is_ok() {
                found.push(pattern.to_path_buf());
            }
            return;
        }

        for entry in self.matching_entries(parent, &leaf) {
            found.push(parent.join(&entry.name));
        }
    }

    /// Visits `dir` depth first; descendants come before the directory
    /// that contains them.
    fn walk(&self, dir: &Path, leaf: &str, found: &mut Vec<PathBuf>) {
        let entries = match read_sorted(dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::debug!("skipping {}: {err}", listing_dir(dir).display());
                return;
            }
        };
        for entry in entries {
            let path = dir.join(&entry.name);
            if entry.is_dir {
                self.walk(&path, leaf, found);
            }
            if self.name_matches(leaf, &entry.name.to_string_lossy()) {
                found.push(path);
            }
        }
    }

    fn matching_entries(&self, dir: &Path, leaf: &str) -> Vec<DirEntryInfo> {
        match read_sorted(dir) {
            Ok(entries) => entries
                .into_iter()
                .filter(|entry| self.name_matches(leaf, &entry.name.to_string_lossy()))
                .collect(),
            Err(err) => {
                log::debug!("cannot list {}: {err}", listing_dir(dir).display());
                Vec::new()
            }
        }
    }

    fn name_matches(&self, pattern: &str, name: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        let name: Vec<char> = name.chars().collect();
        wildcard_match(&pattern, &name, !self.flags.basic_expansion, CASE_INSENSITIVE_NAMES)
    }
}

fn listing_dir(dir: &Path) -> &Path {
    if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    }
}

fn read_sorted(dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
    let mut entries = list_directory(listing_dir(dir))?;
    entries.retain(|entry| entry.name != "." && entry.name != "..");
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

pub fn has_wildcards(component: &str, basic: bool) -> bool {
    component.contains(&['*', '?'][..]) || (!basic && component.contains('['))
}

enum Token<'a> {
    Star,
    Any,
    Set(&'a [char]),
    Literal(char),
}

impl Token<'_> {
    fn matches(&self, candidate: char, fold_case: bool) -> bool {
        match self {
            Token::Star | Token::Any => true,
            Token::Set(set) => set_contains(set, candidate, fold_case),
            Token::Literal(ch) => chars_equal(*ch, candidate, fold_case),
        }
    }
}

fn tokenize(pattern: &[char], sets: bool) -> Vec<Token<'_>> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut index = 0;
    while index < pattern.len() {
        let token = match pattern[index] {
            '*' => Token::Star,
            '?' => Token::Any,
            '[' if sets => match pattern[index + 1..].iter().position(|c| *c == ']') {
                Some(offset) => {
                    let close = index + 1 + offset;
                    tokens.push(Token::Set(&pattern[index + 1..close]));
                    index = close + 1;
                    continue;
                }
                None => Token::Literal('['),
            },
            ch => Token::Literal(ch),
        };
        tokens.push(token);
        index += 1;
    }
    tokens
}

/// Matches `name` against a single-component pattern. On a mismatch only the
/// most recent `*` is retried, so the cost stays proportional to
/// `pattern.len() * name.len()`.
pub fn wildcard_match(pattern: &[char], name: &[char], sets: bool, fold_case: bool) -> bool {
    let tokens = tokenize(pattern, sets);
    let (mut p, mut n) = (0, 0);
    let mut resume: Option<(usize, usize)> = None;

    while n < name.len() {
        match tokens.get(p) {
            Some(Token::Star) => {
                resume = Some((p, n));
                p += 1;
                continue;
            }
            Some(token) if token.matches(name[n], fold_case) => {
                p += 1;
                n += 1;
                continue;
            }
            _ => {}
        }
        let Some((star, skipped)) = resume else {
            return false;
        };
        p = star + 1;
        n = skipped + 1;
        resume = Some((star, n));
    }
    tokens[p..].iter().all(|token| matches!(token, Token::Star))
}

fn chars_equal(a: char, b: char, fold_case: bool) -> bool {
    if fold_case {
        a.to_lowercase().eq(b.to_lowercase())
    } else {
        a == b
    }
}

fn set_contains(set: &[char], candidate: char, fold_case: bool) -> bool {
    let mut index = 0;
    while index < set.len() {
        if index + 2 < set.len() && set[index + 1] == '-' {
            let (low, high) = (set[index], set[index + 2]);
            let hit = (low..=high).contains(&candidate)
                || (fold_case
                    && candidate
                        .to_lowercase()
                        .chain(candidate.to_uppercase())
                        .any(|c| (low..=high).contains(&c)));
            if hit {
                return true;
            }
            index += 3;
        } else {
            if chars_equal(set[index], candidate, fold_case) {
                return true;
            }
            index += 1;
        }
    }
    false
}

/// Expands `{a,b}` groups, nested groups included. Unbalanced braces stay
/// literal.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close)) = find_brace_group(pattern) else {
        return vec![pattern.to_string()];
    };
    let prefix = &pattern[..open];
    let body = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];

    let mut expanded = Vec::new();
    for alternative in split_alternatives(body) {
        expanded.extend(expand_braces(&format!("{prefix}{alternative}{suffix}")));
    }
    expanded
}

fn find_brace_group(pattern: &str) -> Option<(usize, usize)> {
    let open = pattern.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in pattern[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open, open + offset));
                }
            }
            _ => {}
        }
    }
    None
}

fn split_alternatives(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (offset, ch) in body.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..offset]);
                start = offset + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

/// Absolute, lexically normalized form of `arg`. The target need not exist.
pub fn canonicalize_literal(arg: &OsStr) -> io::Result<PathBuf> {
    let input = Path::new(arg);
    let absolute = if input.is_absolute() {
        input.to_path_buf()
    } else {
        std::env::current_dir()?.join(input)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if normalized.file_name().is_some() {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
