// Header schema: which sheet column plays which role.
//
// All header matching rules live in one table so they can be read, tested and
// swapped without touching the normalizer.
use once_cell::sync::Lazy;

use crate::types::CoLabel;

/// The role a column plays in a marks sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    StudentName,
    RollNumber,
    TotalMarks,
    CoMarks,
}

/// How a header key is recognised. Keys are lower-cased and trimmed first.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Key contains `needle` and none of `unless`.
    Contains {
        needle: &'static str,
        unless: &'static [&'static str],
    },
    /// Key equals one of the listed spellings.
    Exact(&'static [&'static str]),
    /// Key carries a `co<number>` marker.
    CoNumber,
}

impl Matcher {
    fn matches(&self, key: &str) -> bool {
        match self {
            Matcher::Contains { needle, unless } => {
                key.contains(needle) && !unless.iter().any(|u| key.contains(u))
            }
            Matcher::Exact(options) => options.iter().any(|o| key == *o),
            Matcher::CoNumber => CoLabel::find_in(key).is_some(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub role: FieldRole,
    pub matcher: Matcher,
}

/// Result of classifying one header key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMatch {
    pub role: FieldRole,
    pub co: Option<CoLabel>,
}

/// Ordered rule table; the first matching rule decides a key's role.
#[derive(Debug, Clone)]
pub struct HeaderSchema {
    pub rules: Vec<FieldRule>,
    /// First-cell marker that ends the student block (`"Total:"` rows).
    pub row_terminator: &'static str,
}

pub static DEFAULT_SCHEMA: Lazy<HeaderSchema> = Lazy::new(|| HeaderSchema {
    rules: vec![
        FieldRule {
            role: FieldRole::StudentName,
            matcher: Matcher::Contains {
                needle: "name",
                unless: &["co"],
            },
        },
        FieldRule {
            role: FieldRole::RollNumber,
            matcher: Matcher::Contains {
                needle: "roll",
                unless: &[],
            },
        },
        FieldRule {
            role: FieldRole::TotalMarks,
            matcher: Matcher::Exact(&["total marks", "total mark"]),
        },
        FieldRule {
            role: FieldRole::CoMarks,
            matcher: Matcher::CoNumber,
        },
    ],
    row_terminator: "total:",
});

impl HeaderSchema {
    pub fn classify(&self, key: &str) -> Option<HeaderMatch> {
        let key = normalize_key(key);
        if key.is_empty() {
            return None;
        }
        let rule = self.rules.iter().find(|r| r.matcher.matches(&key))?;
        let co = match rule.role {
            FieldRole::CoMarks => CoLabel::find_in(&key),
            _ => None,
        };
        Some(HeaderMatch {
            role: rule.role,
            co,
        })
    }

    /// A key that starts with "total" outranks other columns mapped to the
    /// same CO (`Total of CO1` beats `Q1 (CO1)`).
    pub fn is_total_key(&self, key: &str) -> bool {
        normalize_key(key).starts_with("total")
    }

    pub fn is_terminator(&self, first_cell: &str) -> bool {
        normalize_key(first_cell).contains(self.row_terminator)
    }
}

pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}
