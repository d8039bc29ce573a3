use crate::entry::{scalar_string, Entry};
use crate::error::Result;
use crate::schema::FieldKind;
use regex::Regex;
use serde_yaml::Value;

/// Constraint on a single field
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Value must be equal
    Exact(Value),
    /// String form of the value must contain a match
    Pattern(Regex),
}

impl Matcher {
    pub fn exact(value: impl Into<Value>) -> Self {
        Matcher::Exact(value.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Matcher::Pattern(Regex::new(pattern)?))
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Matcher::Exact(_))
    }

    pub fn test(&self, value: Option<&Value>) -> bool {
        match self {
            Matcher::Exact(expected) => value.unwrap_or(&Value::Null) == expected,
            Matcher::Pattern(regex) => value
                .and_then(scalar_string)
                .map(|text| regex.is_match(&text))
                .unwrap_or(false),
        }
    }
}

impl From<Regex> for Matcher {
    fn from(regex: Regex) -> Self {
        Matcher::Pattern(regex)
    }
}

/// Field constraints combined with AND. Setting a field twice keeps the
/// last constraint.
///
/// ```
/// use flatrecord::Matchers;
///
/// let matchers = Matchers::new()
///     .eq("login", "john")
///     .like("name", "^John")
///     .unwrap();
/// assert_eq!(matchers.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Matchers {
    pairs: Vec<(String, Matcher)>,
}

impl Matchers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, matcher: Matcher) -> Self {
        self.pairs.retain(|(name, _)| name != field);
        self.pairs.push((field.to_string(), matcher));
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Matcher::exact(value))
    }

    pub fn like(self, field: &str, pattern: &str) -> Result<Self> {
        Ok(self.with(field, Matcher::pattern(pattern)?))
    }

    pub fn get(&self, field: &str) -> Option<&Matcher> {
        self.pairs
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, matcher)| matcher)
    }

    /// The literal value required for `field`, if any
    pub fn exact(&self, field: &str) -> Option<&Value> {
        match self.get(field)? {
            Matcher::Exact(value) => Some(value),
            Matcher::Pattern(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Matcher)> {
        self.pairs.iter().map(|(name, matcher)| (name.as_str(), matcher))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn is_path_derived(entry: &Entry, field: &str) -> bool {
    entry
        .model()
        .field_def(field)
        .is_some_and(|def| matches!(def.kind, FieldKind::Filepath(_)))
}

/// Whether `entry` satisfies every matcher.
///
/// Path-derived values are compared by their string form, the same form
/// used to narrow the glob, so `eq("name", 1)` finds `data/1/post.md`.
pub fn matches(entry: &Entry, matchers: &Matchers) -> bool {
    matchers.iter().all(|(field, matcher)| {
        let value = entry.resolve(field);
        match matcher {
            Matcher::Exact(expected) if is_path_derived(entry, field) => {
                value.as_ref().and_then(scalar_string) == scalar_string(expected)
            }
            _ => matcher.test(value.as_ref()),
        }
    })
}
