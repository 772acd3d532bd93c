//! Text normalization for graph node and edge identifiers
//!
//! - Entity names: Uses `slug` crate for robust Unicode handling
//! - Relations: Uses `rust-stemmers` so that "founded"/"founds" map to the same edge

use rust_stemmers::{Algorithm, Stemmer};
use slug::slugify;

/// Normalize an entity name into an IRI-safe local name
///
/// # Examples
///
/// ```
/// use text_to_kg::normalize::normalize_entity_name;
///
/// assert_eq!(normalize_entity_name("Varun Kumar"), "varun_kumar");
/// assert_eq!(normalize_entity_name("José García"), "jose_garcia");
/// ```
#[must_use]
pub fn normalize_entity_name(name: &str) -> String {
    slugify(name).replace('-', "_")
}

/// Normalize a relation phrase into a stemmed, underscore-joined local name
///
/// Each word is stemmed with the English Porter stemmer, so inflections of
/// the same verb collapse into one edge label. `camelCase` relations are split
/// into words first.
///
/// # Examples
///
/// ```
/// use text_to_kg::normalize::normalize_predicate;
///
/// assert_eq!(normalize_predicate("was born in"), "was_born_in");
/// assert_eq!(normalize_predicate("founded"), "found");
/// assert_eq!(normalize_predicate("alumniOf"), "alumni_of");
/// ```
#[must_use]
pub fn normalize_predicate(predicate: &str) -> String {
    let stemmer = Stemmer::create(Algorithm::English);

    let stemmed: Vec<String> = predicate
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .flat_map(split_camel_case)
        .map(|w| stemmer.stem(&w).into_owned())
        .collect();

    slugify(stemmed.join(" ")).replace('-', "_")
}

/// Split `camelCase` or `PascalCase` into lowercase words
fn split_camel_case(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();

    for ch in s.chars() {
        if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.extend(ch.to_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }

    words
}
