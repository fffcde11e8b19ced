//! Header similarity matching.
//!
//! Ranks how well a search term matches one of a list of candidate
//! strings -- the machinery behind "what does this spreadsheet column
//! mean". Matching is tiered: exact equality, a concept-alias table,
//! substring containment, and finally Levenshtein distance. Nothing
//! below the acceptance threshold is ever returned.

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Minimum similarity for any match to be accepted.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Score assigned to a concept-alias hit.
pub const ALIAS_TABLE_SCORE: f64 = 0.95;

/// Upper bound for substring-containment scores.
pub const SUBSTRING_SCORE_CAP: f64 = 0.9;

/// Semantic concepts and their known synonyms/abbreviations. A search
/// term equal to one of the synonyms matches any candidate containing
/// the concept word itself.
const CONCEPT_ALIASES: &[(&str, &[&str])] = &[
    (
        "phone",
        &["mobile", "mob", "cell", "contact no", "contact number", "ph", "tel", "telephone"],
    ),
    ("email", &["mail", "e mail", "email id", "mail id"]),
    ("name", &["title", "label", "party"]),
    ("gst", &["gstin", "gst no", "gst number", "tax id", "tin"]),
    ("address", &["addr", "location", "street"]),
    ("date", &["dt", "dated", "day"]),
    ("quantity", &["qty", "nos", "pcs", "no of units", "count"]),
    ("rate", &["price", "unit price", "unit cost", "cost"]),
    ("amount", &["amt", "value", "total", "net value"]),
    ("number", &["no", "num", "sr no"]),
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A candidate accepted by [`best_match`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Index into the candidate slice.
    pub index: usize,
    /// Similarity score in `(SIMILARITY_THRESHOLD, 1.0]`.
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Canonical comparison form: lower-cased, punctuation replaced by
/// spaces, whitespace collapsed. `"PO No."` and `"po   no"` compare equal.
pub fn normalized(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    let mut pending_space = false;
    for c in term.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            for lower in c.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_space = true;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Edit distance
// ---------------------------------------------------------------------------

/// Classic Levenshtein distance over characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Edit-distance similarity between lower-cased strings:
/// `1 - distance / max(len_a, len_b)`. Two empty strings score 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

// ---------------------------------------------------------------------------
// Tiered matching
// ---------------------------------------------------------------------------

/// Find the best candidate for `term`, or `None` if nothing scores above
/// [`SIMILARITY_THRESHOLD`].
///
/// Tiers, first satisfied wins:
/// 1. exact match (case-insensitive, punctuation-insensitive) → 1.0;
/// 2. concept-alias table: `term` is a known synonym of concept *K* and a
///    candidate contains the word *K* → 0.95;
/// 3. substring containment → length ratio, capped at 0.9;
/// 4. Levenshtein similarity.
pub fn best_match<S: AsRef<str>>(term: &str, candidates: &[S]) -> Option<Match> {
    let needle = normalized(term);
    if needle.is_empty() {
        return None;
    }

    // Tier 1: exact.
    for (index, candidate) in candidates.iter().enumerate() {
        if normalized(candidate.as_ref()) == needle {
            return Some(Match { index, score: 1.0 });
        }
    }

    // Tier 2: concept aliases.
    if let Some(concept) = concept_for(&needle) {
        for (index, candidate) in candidates.iter().enumerate() {
            if normalized(candidate.as_ref()).contains(concept) {
                return Some(Match {
                    index,
                    score: ALIAS_TABLE_SCORE,
                });
            }
        }
    }

    // Tiers 3 and 4: substring containment, then edit distance.
    let mut best: Option<Match> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let hay = normalized(candidate.as_ref());
        if hay.is_empty() {
            continue;
        }

        let score = if hay.contains(&needle) || needle.contains(&hay) {
            let (short, long) = if hay.len() < needle.len() {
                (hay.len(), needle.len())
            } else {
                (needle.len(), hay.len())
            };
            (short as f64 / long as f64).min(SUBSTRING_SCORE_CAP)
        } else {
            similarity(&needle, &hay)
        };

        if best.map_or(true, |b| score > b.score) {
            best = Some(Match { index, score });
        }
    }

    best.filter(|m| m.score > SIMILARITY_THRESHOLD)
}

/// Look up the concept whose synonym list contains `needle` (already
/// normalized). The concept word itself also counts as a synonym.
fn concept_for(needle: &str) -> Option<&'static str> {
    CONCEPT_ALIASES
        .iter()
        .find(|(concept, synonyms)| *concept == needle || synonyms.contains(&needle))
        .map(|(concept, _)| *concept)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
