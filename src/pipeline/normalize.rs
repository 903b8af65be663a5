//! Canonicalization of model-produced subject labels and comment text.
//!
//! Both functions are total and pure: any input, including `None`, maps to a
//! usable string, so downstream code never handles a normalization error.

/// Synonym table mapping lower-cased spoken labels to canonical subject names.
const SUBJECT_SYNONYMS: &[(&[&str], &str)] = &[
    (&["english", "eng"], "English"),
    (&["math", "maths", "mathematics"], "Maths"),
    (&["science"], "Science"),
    (&["pe", "p.e", "p.e.", "physical education"], "PE"),
    (&["reading"], "Reading"),
    (&["writing"], "Writing"),
];

/// Comment text containing either of these (case-insensitively) means the
/// teacher explicitly declined to comment.
const NO_COMMENT_SENTINELS: &[&str] = &["#no_comment#", "no comment"];

/// Map a raw subject label to its canonical name.
///
/// Matching is case- and whitespace-insensitive against the synonym table.
/// Unknown subjects fall back to title-casing each word of the original
/// (untouched-case) input. Absent or blank input yields `"Subject"`.
pub fn normalize_subject_name(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => return "Subject".to_string(),
    };

    let lowered = raw.trim().to_lowercase();
    for (synonyms, canonical) in SUBJECT_SYNONYMS {
        if synonyms.contains(&lowered.as_str()) {
            return canonical.to_string();
        }
    }

    title_case_words(raw.trim())
}

/// Normalize a raw comment.
///
/// Absent or blank input, or text carrying a no-comment sentinel, becomes
/// `""` (explicit suppression). Anything else is returned trimmed.
pub fn normalize_comment_text(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(s) => s,
        None => return String::new(),
    };

    let lowered = raw.to_lowercase();
    if NO_COMMENT_SENTINELS.iter().any(|s| lowered.contains(s)) {
        return String::new();
    }

    raw.trim().to_string()
}

fn title_case_words(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
