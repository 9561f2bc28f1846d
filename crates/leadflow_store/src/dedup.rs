//! Token-set similarity for fuzzy duplicate detection.

use std::collections::BTreeSet;

/// Token-set ratio in [0,1].
///
/// Both strings are tokenized into sorted unique word sets; the score is
/// the best normalized edit similarity among (intersection vs a-side),
/// (intersection vs b-side), and (a-side vs b-side), where each side is
/// the intersection followed by its own leftover tokens. A title that is
/// a strict subset of another ("Riverside Hospital Expansion" vs
/// "Riverside Hospital Expansion Project") scores 1.0.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let base = intersection.join(" ");
    let combined_a = join_parts(&base, &only_a);
    let combined_b = join_parts(&base, &only_b);

    let scores = [
        strsim::normalized_levenshtein(&base, &combined_a),
        strsim::normalized_levenshtein(&base, &combined_b),
        strsim::normalized_levenshtein(&combined_a, &combined_b),
    ];
    scores.into_iter().fold(0.0, f64::max)
}

fn join_parts(base: &str, rest: &[&str]) -> String {
    if rest.is_empty() {
        base.to_string()
    } else if base.is_empty() {
        rest.join(" ")
    } else {
        format!("{} {}", base, rest.join(" "))
    }
}
