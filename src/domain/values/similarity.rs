use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Domain abbreviations treated as equivalent when comparing tickers.
/// The first element is the canonical spelling.
const ABBREVIATIONS: &[(&str, &[&str])] = &[
    ("BANK", &["BNK", "BANKING"]),
    ("FINANCE", &["FIN", "FINANCIAL"]),
    ("TECH", &["TECHNOLOGY", "IT"]),
    ("AUTO", &["AUTOMOBILE", "AUTOMOTIVE"]),
    ("PHARMA", &["PHARMACEUTICAL"]),
    ("INFRA", &["INFRASTRUCTURE"]),
    ("POWER", &["ENERGY", "ELECTRICITY"]),
    ("STEEL", &["METALS", "IRON"]),
];

/// Heuristic ticker similarity used when no exact dataset row matches.
///
/// A candidate is only scored when at least one cheap signal fires
/// (containment, shared prefix, symbol inside the display name, abbreviation
/// equivalence). The score itself blends character-set Jaccard overlap with
/// a length ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyMatcher {
    /// A candidate is accepted only when its score is strictly above this.
    pub threshold: f64,
    pub jaccard_weight: f64,
    pub length_weight: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            jaccard_weight: 0.6,
            length_weight: 0.4,
        }
    }
}

impl FuzzyMatcher {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Scores a dataset row against a suffix-free base symbol. Returns 0.0
    /// when no signal links the two.
    pub fn score(&self, base: &str, trading_symbol: &str, display_name: &str) -> f64 {
        let base = base.to_ascii_uppercase();
        let trading = trading_symbol.to_ascii_uppercase();
        if base.is_empty() || trading.is_empty() {
            return 0.0;
        }
        let name = display_name.to_ascii_uppercase();

        let base_canon = canonical_form(&base);
        let trading_canon = canonical_form(&trading);

        let contains = trading.contains(&base) || base.contains(&trading);
        let prefix = common_prefix_len(&base, &trading) >= 3;
        let in_name = base.len() >= 3 && name.contains(&base);
        let abbreviated = (base_canon != base || trading_canon != trading)
            && (trading_canon.contains(&base_canon) || base_canon.contains(&trading_canon));

        if !(contains || prefix || in_name || abbreviated) {
            return 0.0;
        }

        self.blend(&base, &trading)
            .max(self.blend(&base_canon, &trading_canon))
    }

    /// Highest-scoring candidate, if it clears the threshold. Earlier
    /// candidates win ties.
    pub fn best_match<'a, T, I, F>(&self, base: &str, candidates: I, fields: F) -> Option<(&'a T, f64)>
    where
        I: IntoIterator<Item = &'a T>,
        F: Fn(&'a T) -> (&'a str, &'a str),
    {
        let mut best: Option<(&'a T, f64)> = None;
        for candidate in candidates {
            let (symbol, name) = fields(candidate);
            let score = self.score(base, symbol, name);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }
        best.filter(|(_, score)| *score > self.threshold)
    }

    fn blend(&self, a: &str, b: &str) -> f64 {
        self.jaccard_weight * jaccard(a, b) + self.length_weight * length_ratio(a, b)
    }
}

fn jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<char> = a.chars().collect();
    let b: HashSet<char> = b.chars().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

fn length_ratio(a: &str, b: &str) -> f64 {
    let (la, lb) = (a.chars().count(), b.chars().count());
    let longest = la.max(lb);
    if longest == 0 {
        return 0.0;
    }
    la.min(lb) as f64 / longest as f64
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// Rewrites known abbreviations to their canonical spelling, both as whole
/// words and as word suffixes (`HDFCBNK` -> `HDFCBANK`). Word separators are
/// dropped. Two-letter variants only match whole words.
fn canonical_form(s: &str) -> String {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(canonical_word)
        .collect()
}

fn canonical_word(word: &str) -> String {
    for (canonical, variants) in ABBREVIATIONS {
        for variant in *variants {
            if word == *variant {
                return canonical.to_string();
            }
            if variant.len() >= 3 && word.len() > variant.len() && word.ends_with(variant) {
                let stem = &word[..word.len() - variant.len()];
                return format!("{stem}{canonical}");
            }
        }
    }
    word.to_string()
}
