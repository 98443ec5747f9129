//! Lexicon sentiment scoring for feedback text
//!
//! Deliberately small: a word list with simple negation, nudged by the star
//! rating the student gave. Good enough to move feedback out of `neutral`
//! when the signal is clear, and to leave it there when it is not.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        })
    }
}

const POSITIVE: &[&str] = &[
    "amazing", "awesome", "best", "brilliant", "clear", "engaging", "enjoyed", "excellent", "fantastic",
    "good", "great", "helpful", "insightful", "interesting", "love", "loved", "useful", "well",
    "wonderful",
];

const NEGATIVE: &[&str] = &[
    "awful", "bad", "boring", "confusing", "difficult", "disappointing", "hate", "hated", "poor",
    "terrible", "unclear", "useless", "waste", "worst", "rushed", "disorganized",
];

const NEGATORS: &[&str] = &["not", "no", "never", "hardly", "isn't", "wasn't", "didn't", "don't"];

/// Net word score of `text`: +1 per positive word, -1 per negative word,
/// flipped when the previous word is a negator
pub fn score_text(text: &str) -> i32 {
    let words: Vec<String> = text
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();

    let mut score = 0;
    for (i, word) in words.iter().enumerate() {
        let polarity = if POSITIVE.contains(&word.as_str()) {
            1
        } else if NEGATIVE.contains(&word.as_str()) {
            -1
        } else {
            continue;
        };
        let negated = i > 0 && NEGATORS.contains(&words[i - 1].as_str());
        score += if negated { -polarity } else { polarity };
    }
    score
}

/// Classify one piece of feedback from its rating (1..=5) and optional message
pub fn classify(rating: u8, message: Option<&str>) -> Sentiment {
    let rating_bias = i32::from(rating.clamp(1, 5)) - 3;
    let total = rating_bias + message.map(score_text).unwrap_or(0);
    match total {
        t if t > 0 => Sentiment::Positive,
        t if t < 0 => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}
