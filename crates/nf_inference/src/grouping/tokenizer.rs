use std::collections::HashSet;

use once_cell::sync::Lazy;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Trailing particles, longest first so `에서는` wins over `는`.
const KOREAN_PARTICLES: &[&str] = &[
    "에서는", "에게서", "으로는", "으로서", "으로써", "이라는", "에서", "에게", "으로", "까지",
    "부터", "보다", "처럼", "라는", "이나", "에는", "와의", "과의", "은", "는", "이", "가", "을",
    "를", "의", "에", "와", "과", "도", "로", "만",
];

static ENGLISH_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
        "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down",
        "during", "each", "few", "for", "from", "further", "had", "has", "have", "having", "he",
        "her", "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in",
        "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no",
        "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
        "ourselves", "out", "over", "own", "said", "same", "she", "should", "so", "some",
        "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
        "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
        "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who",
        "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
        "yourselves",
    ]
    .into_iter()
    .collect()
});

pub fn is_hangul_syllable(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

/// Tokenization strategy for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tokenizer {
    /// Particle-stripped Hangul words, an approximation of noun extraction.
    Korean,
    /// Lowercase words of two or more characters, stop-words removed.
    Default,
}

impl Tokenizer {
    /// Picks a strategy from a sample body; any Hangul selects `Korean`.
    pub fn detect(sample: &str) -> Self {
        if sample.chars().any(is_hangul_syllable) {
            Self::Korean
        } else {
            Self::Default
        }
    }

    pub fn tokenize(self, text: &str) -> Vec<String> {
        let normalized: String = text.nfc().collect();
        match self {
            Self::Korean => normalized
                .unicode_words()
                .map(|word| strip_particle(&word.to_lowercase()))
                .filter(|token| token.chars().count() >= 2)
                .collect(),
            Self::Default => normalized
                .unicode_words()
                .map(str::to_lowercase)
                .filter(|token| token.chars().count() >= 2)
                .filter(|token| !ENGLISH_STOP_WORDS.contains(token.as_str()))
                .collect(),
        }
    }
}

fn strip_particle(word: &str) -> String {
    let length = word.chars().count();
    for particle in KOREAN_PARTICLES {
        if let Some(stem) = word.strip_suffix(particle) {
            if length - particle.chars().count() >= 2 {
                return stem.to_string();
            }
        }
    }
    word.to_string()
}

/// Expands tokens into the n-grams of every size in `range`, inclusive.
pub fn ngrams(tokens: &[String], range: (usize, usize)) -> Vec<String> {
    let (low, high) = range;
    if low == 1 && high == 1 {
        return tokens.to_vec();
    }
    let mut terms = Vec::new();
    for n in low.max(1)..=high {
        terms.extend(tokens.windows(n).map(|window| window.join(" ")));
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("정부는 오늘 발표했다", Tokenizer::Korean)]
    #[case("Seoul 시청에서 회의", Tokenizer::Korean)]
    #[case("Markets rallied on Friday", Tokenizer::Default)]
    #[case("", Tokenizer::Default)]
    fn detects_batch_language(#[case] sample: &str, #[case] expected: Tokenizer) {
        assert_eq!(Tokenizer::detect(sample), expected);
    }

    #[test]
    fn korean_strips_particles_and_single_syllables() {
        let tokens = Tokenizer::Korean.tokenize("대통령이 서울에서 회의를 열고 새 정책을 발표했다");
        assert_eq!(tokens, ["대통령", "서울", "회의", "열고", "정책", "발표했다"]);
    }

    #[test]
    fn korean_keeps_short_nouns_that_end_like_particles() {
        assert_eq!(Tokenizer::Korean.tokenize("회의 국가"), ["회의", "국가"]);
    }

    #[test]
    fn default_lowercases_and_drops_stop_words() {
        let tokens = Tokenizer::Default.tokenize("The Company reported a 5% rise in Q3 earnings");
        assert_eq!(tokens, ["company", "reported", "rise", "q3", "earnings"]);
    }

    #[test]
    fn bigrams_follow_unigrams() {
        let tokens: Vec<String> = ["rain", "heavy", "coast"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            ngrams(&tokens, (1, 2)),
            ["rain", "heavy", "coast", "rain heavy", "heavy coast"]
        );
    }
}
