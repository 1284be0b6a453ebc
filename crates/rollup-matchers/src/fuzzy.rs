// crates/rollup-matchers/src/fuzzy.rs
// ============================================================================
// Module: Fuzzy Name Comparison
// Description: Levenshtein distance and the similarity ratio the name
//              matcher uses (spec.md §4.C "fuzzy (Levenshtein ratio)").
// Purpose: Give the name matcher a pure, dependency-free ratio function.
// Dependencies: none
// ============================================================================

/// Computes the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (len_a, len_b) = (a.len(), b.len());

    let mut prev: Vec<usize> = (0..=len_b).collect();
    let mut curr = vec![0usize; len_b + 1];

    for i in 1..=len_a {
        curr[0] = i;
        for j in 1..=len_b {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[len_b]
}

/// Computes a Levenshtein-based similarity ratio in `[0, 100]`, where `100`
/// is an exact match and `0` is maximally dissimilar (`spec.md` §4.C "fuzzy
/// (Levenshtein ratio ≥ threshold) = score is the ratio").
///
/// # Invariants
/// - Returns `100` when both strings are empty.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    reason = "name lengths are bounded well under f64's exact integer range"
)]
pub fn levenshtein_ratio(a: &str, b: &str) -> u8 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100;
    }
    let distance = levenshtein_distance(a, b);
    let ratio = 1.0 - (distance as f64 / max_len as f64);
    (ratio.clamp(0.0, 1.0) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_have_zero_distance_and_full_ratio() {
        assert_eq!(levenshtein_distance("bucket", "bucket"), 0);
        assert_eq!(levenshtein_ratio("bucket", "bucket"), 100);
    }

    #[test]
    fn single_substitution_costs_one() {
        assert_eq!(levenshtein_distance("bucket", "rocket"), 2);
    }

    #[test]
    fn ratio_is_bounded_to_0_100() {
        assert_eq!(levenshtein_ratio("", ""), 100);
        assert!(levenshtein_ratio("abc", "xyz") <= 100);
    }
}
