use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::micro_cluster::TermFrequencies;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s']").unwrap());
static APOSTROPHE_TRIM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^'+|'+$").unwrap());

/// Tokenize text into lowercase words.
/// Preserves apostrophes within words (e.g., "don't"). No stemming.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned = NON_WORD.replace_all(text, " ");
    cleaned
        .to_lowercase()
        .split_whitespace()
        .map(|t| APOSTROPHE_TRIM.replace_all(t, "").to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Turns raw text into a term-frequency map: tokens, stop-word removal,
/// then counts of every n-gram in `ngram_min..=ngram_max`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BagOfWords {
    pub ngram_min: usize,
    pub ngram_max: usize,
    pub stop_words: Vec<String>,
}

impl Default for BagOfWords {
    fn default() -> Self {
        Self {
            ngram_min: 1,
            ngram_max: 1,
            stop_words: Vec::new(),
        }
    }
}

impl BagOfWords {
    pub fn term_frequencies(&self, text: &str) -> TermFrequencies {
        let stop: HashSet<String> = self.stop_words.iter().map(|w| w.to_lowercase()).collect();
        let tokens: Vec<String> = tokenize(text)
            .into_iter()
            .filter(|t| !stop.contains(t))
            .collect();

        let lo = self.ngram_min.max(1);
        let hi = self.ngram_max.max(lo);
        let mut tf = TermFrequencies::new();
        for n in lo..=hi {
            for gram in tokens.windows(n) {
                *tf.entry(gram.join(" ")).or_insert(0.0) += 1.0;
            }
        }
        tf
    }
}
