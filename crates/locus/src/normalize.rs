//! Query normalisation and classification.

use once_cell::sync::Lazy;
use regex::Regex;

static POSTAL_LIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+").unwrap());

/// How a normalised query is routed through the matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Starts with one or more digits. Postal codes are tried first.
    PostalLike,
    PlaceName,
}

/// A lowercased, trimmed query that passed the length check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedQuery {
    text: String,
    kind: QueryKind,
}

impl NormalizedQuery {
    /// Returns `None` when the trimmed query is shorter than `min_len`
    /// characters.
    pub fn parse(raw: &str, min_len: usize) -> Option<Self> {
        let text = raw.trim().to_lowercase();
        if text.chars().count() < min_len {
            return None;
        }
        let kind = if POSTAL_LIKE.is_match(&text) {
            QueryKind::PostalLike
        } else {
            QueryKind::PlaceName
        };
        Some(Self { text, kind })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub const fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn is_postal_like(&self) -> bool {
        self.kind == QueryKind::PostalLike
    }
}

/// Upper-cased, trimmed country code.
pub fn normalize_country(country: &str) -> String {
    country.trim().to_uppercase()
}
