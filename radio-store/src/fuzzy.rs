//! Comparaison floue de titres de chanson, pour la détection de doublons
//! dans la blocklist (deux orthographes d'un même titre doivent matcher).
//!
//! Reprend le principe de `token_set_ratio` : les deux chaînes sont
//! tokenisées, l'intersection des jetons est comparée séparément aux
//! jetons propres à chacune, ce qui rend la mesure insensible à l'ordre des
//! mots et à du texte en plus d'un côté (ex : "feat. Someone" en suffixe).

use std::collections::BTreeSet;

/// Seuil à partir duquel deux titres sont considérés comme le même morceau.
pub const BLOCK_MATCH_THRESHOLD: u8 = 85;

fn tokenize(s: &str) -> BTreeSet<String> {
    s.to_lowercase()
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}

fn join(tokens: &BTreeSet<String>) -> String {
    tokens.iter().cloned().collect::<Vec<_>>().join(" ")
}

/// Ratio de similarité (0-100) basé sur la distance de Levenshtein.
fn ratio(a: &str, b: &str) -> u8 {
    let len = a.chars().count() + b.chars().count();
    if len == 0 {
        return 100;
    }
    let distance = strsim::levenshtein(a, b);
    let similarity = (len.saturating_sub(distance)) as f64 / len as f64;
    (similarity * 100.0).round() as u8
}

/// Similarité floue entre deux titres, sur l'échelle 0-100.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    let intersection: BTreeSet<String> = tokens_a.intersection(&tokens_b).cloned().collect();
    let only_a: BTreeSet<String> = tokens_a.difference(&intersection).cloned().collect();
    let only_b: BTreeSet<String> = tokens_b.difference(&intersection).cloned().collect();

    let sorted_sect = join(&intersection);
    let combined_a = format!("{sorted_sect} {}", join(&only_a)).trim().to_string();
    let combined_b = format!("{sorted_sect} {}", join(&only_b)).trim().to_string();

    ratio(&sorted_sect, &combined_a)
        .max(ratio(&sorted_sect, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}

/// `true` si `a` et `b` désignent probablement le même morceau.
pub fn is_similar(a: &str, b: &str) -> bool {
    token_set_ratio(a, b) >= BLOCK_MATCH_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_match_fully() {
        assert_eq!(token_set_ratio("Bohemian Rhapsody", "Bohemian Rhapsody"), 100);
    }

    #[test]
    fn reordered_tokens_still_match() {
        assert!(is_similar("Rhapsody Bohemian", "Bohemian Rhapsody"));
    }

    #[test]
    fn extra_suffix_tokens_still_match() {
        assert!(is_similar(
            "Shape of You",
            "Shape of You (feat. Someone)"
        ));
    }

    #[test]
    fn unrelated_titles_do_not_match() {
        assert!(!is_similar("Bohemian Rhapsody", "Stairway to Heaven"));
    }
}
