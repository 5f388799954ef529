// ── Text Normalization ──────────────────────────────────────────────────
// Pure, I/O-free helpers shared by the identity resolver (C2) and the
// repost detector (C3). Both need the same base transform — lowercase,
// strip diacritics, collapse whitespace — diverging only in whether
// corporate suffixes are additionally stripped (identity only).

use unicode_normalization::UnicodeNormalization;

const CORPORATE_SUFFIXES: &[&str] = &[
    "inc", "incorporated", "llc", "ltd", "limited", "corp", "corporation",
    "co", "company", "plc", "gmbh", "ag", "kg", "bv", "nv",
    "sl", "sa", "srl", "slu", "sau", "sau.",
];

/// Lowercase, strip combining diacritical marks (NFD decomposition then
/// drop combining-mark codepoints), collapse consecutive whitespace, and
/// trim. Shared by both identity matching and repost fingerprinting so
/// the two stay consistent about what counts as "the same text".
pub fn normalize_basic(input: &str) -> String {
    let lowered = input.to_lowercase();
    let decomposed: String = lowered.nfd().filter(|c| !is_combining_mark(*c)).collect();
    collapse_whitespace(&decomposed)
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF)
}

/// Collapse any run of whitespace to a single ASCII space and trim the
/// ends.
pub fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for c in input.chars() {
        if c.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Normalize a company name the way the identity resolver does: base
/// normalization, strip punctuation, then drop a single trailing
/// corporate-suffix token before comparison (S.A., S.L., Inc, Ltd, GmbH,
/// and similar).
pub fn normalize_company_name(input: &str) -> String {
    let base = normalize_basic(input);
    let stripped_punct: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    let collapsed = collapse_whitespace(&stripped_punct);
    let mut tokens: Vec<&str> = collapsed.split(' ').filter(|t| !t.is_empty()).collect();
    if let Some(last) = tokens.last() {
        let bare = last.trim_end_matches('.');
        if CORPORATE_SUFFIXES.contains(&bare) && tokens.len() > 1 {
            tokens.pop();
        }
    }
    tokens.join(" ")
}

/// Tokenize normalized text into a bag of words, for Jaccard similarity.
pub fn tokenize(input: &str) -> Vec<String> {
    normalize_basic(input)
        .split_whitespace()
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_normalization_strips_diacritics_and_case() {
        assert_eq!(normalize_basic("Café   Múnich"), "cafe munich");
    }

    #[test]
    fn collapse_whitespace_handles_tabs_and_newlines() {
        assert_eq!(collapse_whitespace("a\t\tb\n\nc"), "a b c");
    }

    #[test]
    fn company_name_strips_corporate_suffix() {
        assert_eq!(normalize_company_name("Acme Corp."), "acme");
        assert_eq!(normalize_company_name("Globex S.L."), "globex");
        assert_eq!(normalize_company_name("Acme"), "acme");
    }

    #[test]
    fn company_name_does_not_strip_sole_token() {
        // A single-word company whose name happens to equal a suffix
        // token is not reduced to an empty string.
        assert_eq!(normalize_company_name("Company"), "company");
    }

    #[test]
    fn tokenize_splits_and_normalizes() {
        assert_eq!(
            tokenize("Backend Engineer, Node.js role!"),
            vec!["backend", "engineer", "node.js", "role"]
        );
    }
}
