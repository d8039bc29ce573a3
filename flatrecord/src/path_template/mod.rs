// Path patterns - glob building, expansion and reverse extraction

use crate::error::{FlatRecordError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// A model path pattern such as `data/**/*/post.md`.
///
/// `*` stands for exactly one path segment. `**` followed by `/` (or at the
/// very end) stands for any number of segments, including none. Wildcards
/// are numbered from 1 in order of appearance.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<PatternSegment>,
    extractor: Regex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    Literal(String),
    /// `*`
    AnySegment,
    /// `**/` when `trailing_slash`, otherwise a `**` ending the pattern
    AnyDepth { trailing_slash: bool },
}

impl PatternSegment {
    fn token(&self) -> &str {
        match self {
            PatternSegment::Literal(text) => text,
            PatternSegment::AnySegment => "*",
            PatternSegment::AnyDepth { trailing_slash: true } => "**/",
            PatternSegment::AnyDepth { trailing_slash: false } => "**",
        }
    }

    fn is_wildcard(&self) -> bool {
        !matches!(self, PatternSegment::Literal(_))
    }
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(FlatRecordError::Schema("path pattern is empty".into()));
        }
        if pattern.starts_with('/') {
            return Err(FlatRecordError::Schema(format!(
                "path pattern '{pattern}' must be relative to the store root"
            )));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = pattern;

        while let Some(c) = rest.chars().next() {
            if c != '*' {
                literal.push(c);
                rest = &rest[c.len_utf8()..];
                continue;
            }

            if !literal.is_empty() {
                segments.push(PatternSegment::Literal(std::mem::take(&mut literal)));
            }
            if let Some(after) = rest.strip_prefix("**/") {
                segments.push(PatternSegment::AnyDepth { trailing_slash: true });
                rest = after;
            } else if rest == "**" {
                segments.push(PatternSegment::AnyDepth { trailing_slash: false });
                rest = "";
            } else {
                segments.push(PatternSegment::AnySegment);
                rest = &rest[1..];
            }
        }
        if !literal.is_empty() {
            segments.push(PatternSegment::Literal(literal));
        }

        let mut regex = String::from("^");
        for segment in &segments {
            match segment {
                PatternSegment::Literal(text) => regex.push_str(&regex::escape(text)),
                PatternSegment::AnySegment => regex.push_str("([^/]+)"),
                PatternSegment::AnyDepth { trailing_slash: true } => {
                    regex.push_str("((?:[^/]+/)*)")
                }
                PatternSegment::AnyDepth { trailing_slash: false } => regex.push_str("(.*)"),
            }
        }
        regex.push('$');

        Ok(PathPattern {
            raw: pattern.to_string(),
            segments,
            extractor: Regex::new(&regex)?,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    pub fn wildcard_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_wildcard()).count()
    }

    /// Build a glob, substituting known values for their wildcards.
    ///
    /// Values are glob-escaped. A value for a `**/` wildcard is only used if
    /// it is empty or ends with `/`; anything else keeps the wildcard so the
    /// narrowing never excludes a file the value could still match.
    pub fn to_glob(&self, values: &BTreeMap<usize, String>) -> String {
        self.fill(values, |segment, value| match segment {
            PatternSegment::AnyDepth { trailing_slash: true }
                if !(value.is_empty() || value.ends_with('/')) =>
            {
                None
            }
            PatternSegment::AnySegment if value.is_empty() || value.contains('/') => None,
            _ => Some(glob::Pattern::escape(value)),
        })
    }

    /// Render a concrete relative path from wildcard values. Missing values
    /// leave their wildcard in place, see [`is_concrete`].
    pub fn render(&self, values: &BTreeMap<usize, String>) -> String {
        self.fill(values, |segment, value| match segment {
            PatternSegment::AnyDepth { trailing_slash: true }
                if !value.is_empty() && !value.ends_with('/') =>
            {
                Some(format!("{value}/"))
            }
            _ => Some(value.to_string()),
        })
    }

    fn fill<F>(&self, values: &BTreeMap<usize, String>, substitute: F) -> String
    where
        F: Fn(&PatternSegment, &str) -> Option<String>,
    {
        let mut out = String::with_capacity(self.raw.len());
        let mut wildcard = 0;
        for segment in &self.segments {
            if segment.is_wildcard() {
                wildcard += 1;
                let replacement = values
                    .get(&wildcard)
                    .and_then(|value| substitute(segment, value));
                match replacement {
                    Some(text) => out.push_str(&text),
                    None => out.push_str(segment.token()),
                }
            } else {
                out.push_str(segment.token());
            }
        }
        out
    }

    /// Capture the text matched by every wildcard, in order.
    /// Returns `None` if `relative_path` does not fit the pattern.
    pub fn extract(&self, relative_path: &str) -> Option<Vec<String>> {
        let captures = self.extractor.captures(relative_path)?;
        Some(
            captures
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }
}

/// Whether a rendered path is free of glob metacharacters
pub fn is_concrete(path: &str) -> bool {
    !path.contains(|c| matches!(c, '*' | '?' | '[' | '{'))
}

/// Expand a glob relative to `root` into matching files, in traversal order.
pub fn expand(root: &Path, relative_glob: &str) -> Result<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&root.to_string_lossy());
    let pattern = format!("{}/{}", base.trim_end_matches('/'), relative_glob);

    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("Skipping unreadable path while expanding {pattern}: {e}"),
        }
    }
    Ok(files)
}

/// `root` as an absolute path without `.` components. Globbing, cache keys
/// and directory pruning all compare against this form.
pub fn absolute(root: &Path) -> Result<PathBuf> {
    let joined = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()?.join(root)
    };
    Ok(joined
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect())
}

/// Path relative to `root` with `/` separators, if it lies under `root`
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}
