//! Fuzzy string similarity on a 0–100 scale.
//!
//! Both scores are case-insensitive and built on the indel distance
//! (insertions + deletions, no substitutions), so a score is
//! `100 · 2·LCS / (|a| + |b|)`. Label thresholds are tuned against this scale.

/// Whole-string similarity.
pub fn ratio(a: &str, b: &str) -> u8 {
    score(&prepare(a), &prepare(b))
}

/// Best similarity over every alignment of the shorter string against the
/// longer one, including alignments that hang off either end.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a = prepare(a);
    let b = prepare(b);
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    if a.len() == b.len() {
        return aligned(&a, &b).max(aligned(&b, &a));
    }
    let (short, long) = if a.len() < b.len() { (&a, &b) } else { (&b, &a) };
    aligned(short, long)
}

/// Score `needle` against every slice of `haystack` it can be laid over:
/// prefixes shorter than the needle, full-length windows, then suffixes.
fn aligned(needle: &[char], haystack: &[char]) -> u8 {
    let (n, h) = (needle.len(), haystack.len());
    let prefixes = (1..n).map(|i| &haystack[..i]);
    let windows = (0..h - n).map(|i| &haystack[i..i + n]);
    let suffixes = (h - n..h).map(|i| &haystack[i..]);

    let mut best = 0;
    for slice in prefixes.chain(windows).chain(suffixes) {
        best = best.max(score(needle, slice));
        if best == 100 {
            break;
        }
    }
    best
}

/// True when `word` partially matches any variant strictly above `threshold`.
pub fn is_similar<S: AsRef<str>>(word: &str, variants: &[S], threshold: u8) -> bool {
    variants
        .iter()
        .any(|v| partial_ratio(word, v.as_ref()) > threshold)
}

fn prepare(s: &str) -> Vec<char> {
    s.to_uppercase().chars().collect()
}

fn score(a: &[char], b: &[char]) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let total = (a.len() + b.len()) as f64;
    let similarity = 2.0 * lcs_len(a, b) as f64 / total;
    (similarity * 100.0).round_ties_even() as u8
}

/// Longest common subsequence length using the two-row DP.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    // Keep the shorter string in the inner loop.
    let (a, b) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let n = b.len();

    let mut prev = vec![0usize; n + 1];
    let mut curr = vec![0usize; n + 1];

    for &ca in a {
        for j in 1..=n {
            curr[j] = if ca == b[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_100() {
        assert_eq!(ratio("NIL", "NIL"), 100);
        assert_eq!(partial_ratio("LUSAKA", "LUSAKA"), 100);
    }

    #[test]
    fn empty_strings_score_zero() {
        assert_eq!(ratio("", ""), 0);
        assert_eq!(ratio("ABC", ""), 0);
        assert_eq!(partial_ratio("", "ABC"), 0);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(ratio("chief", "CHIEF"), 100);
        assert_eq!(partial_ratio("male", "MALE"), 100);
    }

    #[test]
    fn ratio_counts_indels() {
        // LCS "ABC" of 8 total characters.
        assert_eq!(ratio("ABCD", "ABCE"), 75);
        // LCS "MAS" of 11 total characters.
        assert_eq!(ratio("MWANSA", "MARKS"), 55);
        assert_eq!(ratio("KABWE", "NIL"), 0);
    }

    #[test]
    fn partial_finds_substring() {
        assert_eq!(partial_ratio("DISTRICT", "DIST"), 100);
        assert_eq!(partial_ratio("DIST", "DISTRICT"), 100);
        assert_eq!(partial_ratio("FEMALE", "MALE"), 100);
        assert_eq!(partial_ratio("REPUBLIC OF ZAMBIA", "OF"), 100);
    }

    #[test]
    fn partial_tolerates_one_misread() {
        // Best window "DISTNICT" vs "DISTRICT": LCS 7 of 16.
        assert_eq!(partial_ratio("DISTNICT:", "DISTRICT"), 88);
    }

    #[test]
    fn partial_scores_text_clipped_at_the_end() {
        // "CHIE" hangs off the end of the line: LCS 4 of 9.
        assert_eq!(partial_ratio("MR CHIE", "CHIEF"), 89);
        assert_eq!(partial_ratio("CHIEF", "MR CHIE"), 89);
    }

    #[test]
    fn partial_scores_text_clipped_at_the_start() {
        assert_eq!(partial_ratio("HIEF MWAPE", "CHIEF"), 89);
    }

    #[test]
    fn partial_equal_lengths_allow_overhang() {
        // "ABC" against the whole of "ABCD": LCS 3 of 7.
        assert_eq!(partial_ratio("XABC", "ABCD"), 86);
        assert_eq!(partial_ratio("ABCD", "XABC"), 86);
    }

    #[test]
    fn partial_is_symmetric() {
        assert_eq!(partial_ratio("VILL", "NIL"), partial_ratio("NIL", "VILL"));
        assert_eq!(partial_ratio("VILL", "NIL"), 67);
    }

    #[test]
    fn partial_is_never_below_whole() {
        for (a, b) in [("CHIEF", "CHEIF"), ("MWANSA", "MARKS"), ("SAX", "SEX")] {
            assert!(partial_ratio(a, b) >= ratio(a, b), "{a} vs {b}");
        }
    }

    #[test]
    fn is_similar_is_strict() {
        assert!(is_similar("DISTNICT", &["DISTRICT"], 80));
        // Exactly 80 does not clear a strict threshold of 80.
        assert_eq!(partial_ratio("ABXDE", "ABCDE"), 80);
        assert!(!is_similar("ABXDE", &["ABCDE"], 80));
        assert!(!is_similar("LUSAKA", &["DISTRICT", "DIST"], 80));
    }

    #[test]
    fn non_ascii_is_compared_by_character() {
        assert_eq!(ratio("MÖLLER", "MOLLER"), 83);
    }
}
