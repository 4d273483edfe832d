//! Slug, alpha-name and collation helpers.
//!
//! Alpha names are the search and sort key for items: the display name
//! folded to ASCII-ish lowercase words with leading articles removed.

use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Leading words dropped from alpha names, checked in order.
const ARTICLES: &[&str] = &["the ", "a ", "an "];

/// Build a slug from `s` joined by `separator`.
///
/// Steps: NFD + strip combining marks → lowercase → drop anything that is
/// not a word character, whitespace or hyphen → collapse whitespace,
/// underscores and hyphens into `separator` → trim separators at the edges.
pub fn slugify(s: &str, separator: &str) -> String {
    let folded = strip_marks(s).to_lowercase();

    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in folded.chars() {
        if c.is_alphanumeric() {
            current.push(c);
        } else if c.is_whitespace() || c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        // Other punctuation is erased without splitting the word.
    }
    if !current.is_empty() {
        words.push(current);
    }

    words.join(separator)
}

/// Derive the alpha name used to sort and search items.
pub fn alpha_name(name: &str) -> String {
    let mut slug = slugify(name, " ");
    for article in ARTICLES {
        if let Some(rest) = slug.strip_prefix(article) {
            slug = rest.to_string();
        }
    }
    slug.trim().to_string()
}

/// Compare two strings ignoring case and accents ("base" sensitivity).
pub fn base_cmp(a: &str, b: &str) -> Ordering {
    fold(a).cmp(&fold(b))
}

fn fold(s: &str) -> String {
    strip_marks(s).to_lowercase()
}

fn strip_marks(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}
