//! "Did you mean" ranking shared by flag and command lookups.

use strsim::levenshtein;

pub const MAX_SUGGESTIONS: usize = 3;

/// Distance used for ranking: a candidate that starts with the input scores
/// 0, anything else scores its Levenshtein distance.
pub fn score(input: &str, candidate: &str) -> usize {
    if candidate.starts_with(input) {
        0
    } else {
        levenshtein(input, candidate)
    }
}

/// Rank `candidates` against `input` and return up to [`MAX_SUGGESTIONS`]
/// within `max_distance`, closest first, ties ordered lexicographically.
pub fn suggest<S: AsRef<str>>(input: &str, candidates: &[S], max_distance: usize) -> Vec<String> {
    let mut scored: Vec<(usize, &str)> = candidates
        .iter()
        .map(AsRef::as_ref)
        .filter(|c| !c.is_empty())
        .map(|c| (score(input, c), c))
        .filter(|(d, _)| *d <= max_distance)
        .collect();
    scored.sort_unstable();
    scored.dedup_by(|a, b| a.1 == b.1);
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, c)| c.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transposition_is_within_default_distance() {
        let known = ["--status", "-s", "--verbose"];
        assert_eq!(suggest("--stauts", &known, 2), vec!["--status"]);
    }

    #[test]
    fn prefix_matches_rank_first() {
        let known = ["--output", "--outdir", "--input"];
        assert_eq!(suggest("--out", &known, 2), vec!["--outdir", "--output"]);
    }

    #[test]
    fn caps_at_three_and_breaks_ties_by_name() {
        let known = ["bb", "ba", "bc", "bd", "zz"];
        assert_eq!(suggest("b", &known, 2), vec!["ba", "bb", "bc"]);
    }

    #[test]
    fn threshold_filters_distant_names() {
        let known = ["deploy", "status"];
        assert!(suggest("xyz", &known, 2).is_empty());
        assert_eq!(suggest("deplyo", &known, 2), vec!["deploy"]);
        assert!(suggest("deplyo", &known, 1).is_empty());
    }
}
