// crates/rollup-matchers/src/glob.rs
// ============================================================================
// Module: Glob Matching
// Description: The single-wildcard glob matching used by the arn and name
//              matchers (spec.md §3 "pattern (glob with *)").
// Purpose: A minimal, allocation-light matcher for the one wildcard token
//          the matcher configuration grammar actually supports.
// Dependencies: none
// ============================================================================

//! ## Overview
//! `*` matches any run of characters (including none); every other
//! character matches literally. This is intentionally narrower than a full
//! glob crate — the matcher configuration grammar (`spec.md` §3) only ever
//! allows a single wildcard token, not character classes or `?`.

/// Returns whether `text` matches `pattern`, where `*` in `pattern` matches
/// any run of characters.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_from(&pattern, &text)
}

/// Iterative glob matcher using the classic two-pointer backtracking
/// algorithm, bounded by the input lengths (no catastrophic backtracking is
/// possible: there is exactly one wildcard kind and no nested
/// quantifiers).
fn match_from(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    let (mut star_p, mut star_t) = (None::<usize>, 0usize);

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '*' || pattern[p] == text[t]) {
            if pattern[p] == '*' {
                star_p = Some(p);
                star_t = t;
                p += 1;
            } else {
                p += 1;
                t += 1;
            }
        } else if let Some(sp) = star_p {
            p = sp + 1;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_any_run_of_characters() {
        assert!(glob_match("arn:aws:s3:::*", "arn:aws:s3:::my-bucket"));
        assert!(glob_match("*", "anything"));
        assert!(!glob_match("arn:aws:s3:::prod-*", "arn:aws:s3:::dev-bucket"));
    }

    #[test]
    fn literal_pattern_requires_exact_match() {
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }
}
