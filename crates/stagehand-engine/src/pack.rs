//! Build context packaging.
//!
//! Walks a component's build context directory into a tar archive suitable
//! for the container engine's image-build API, preserving file modes and
//! modification times. A `.dockerignore` at the context root is honored
//! (comments, `*`/`?` segment globs, `**`, trailing `/`, and `!` negation;
//! the last matching pattern wins).

use std::path::Path;

use anyhow::Context;
use walkdir::WalkDir;

/// Name of the ignore file looked for at the context root.
pub const DOCKERIGNORE: &str = ".dockerignore";

/// Parsed `.dockerignore` patterns, in file order.
#[derive(Debug, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

#[derive(Debug)]
struct Pattern {
    negated: bool,
    segments: Vec<String>,
}

impl IgnoreRules {
    /// Parse ignore rules from file text.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut patterns = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (negated, body) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let body = body.trim_start_matches('/').trim_end_matches('/');
            if body.is_empty() {
                continue;
            }
            patterns.push(Pattern {
                negated,
                segments: body.split('/').map(str::to_string).collect(),
            });
        }
        Self { patterns }
    }

    /// Whether a context-relative path is excluded from the archive.
    ///
    /// A pattern matching the path or any of its ancestor directories
    /// applies to the path; the last applicable pattern decides.
    #[must_use]
    pub fn excludes(&self, relative: &Path) -> bool {
        let segments: Vec<&str> = relative
            .iter()
            .filter_map(|part| part.to_str())
            .collect();
        if segments.is_empty() {
            return false;
        }

        let mut excluded = false;
        for pattern in &self.patterns {
            let applies = (1..=segments.len())
                .any(|len| match_segments(&pattern.segments, &segments[..len]));
            if applies {
                excluded = !pattern.negated;
            }
        }
        excluded
    }
}

/// Match pattern segments against path segments; `**` spans any number of
/// whole segments.
fn match_segments(pattern: &[String], path: &[&str]) -> bool {
    match pattern.first() {
        None => path.is_empty(),
        Some(part) if part == "**" => {
            (0..=path.len()).any(|skip| match_segments(&pattern[1..], &path[skip..]))
        }
        Some(part) => {
            !path.is_empty()
                && glob_match(part, path[0])
                && match_segments(&pattern[1..], &path[1..])
        }
    }
}

/// Single-segment glob: `*` matches any run of characters, `?` exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // Iterative backtracking over the most recent `*`.
    let (mut p, mut t) = (0usize, 0usize);
    let (mut star, mut star_t) = (None::<usize>, 0usize);
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Package a build context directory into a tar archive.
///
/// Files are stored under their context-relative paths with their modes and
/// modification times preserved. Entries excluded by a root-level
/// `.dockerignore` are skipped.
///
/// # Errors
///
/// Fails when the context cannot be walked or a file cannot be read.
pub fn pack_context(context: &Path) -> anyhow::Result<Vec<u8>> {
    let ignore_path = context.join(DOCKERIGNORE);
    let rules = if ignore_path.is_file() {
        let text = std::fs::read_to_string(&ignore_path)
            .with_context(|| format!("reading '{}'", ignore_path.display()))?;
        Some(IgnoreRules::parse(&text))
    } else {
        None
    };

    let mut builder = tar::Builder::new(Vec::new());
    for entry in WalkDir::new(context).sort_by_file_name() {
        let entry = entry.context("walking build context")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(context)
            .context("context-relative path")?;
        if rules.as_ref().is_some_and(|r| r.excludes(relative)) {
            continue;
        }
        builder
            .append_path_with_name(entry.path(), relative)
            .with_context(|| format!("archiving '{}'", relative.display()))?;
    }

    builder.into_inner().context("finishing context archive")
}
