//! Local sentiment backend.
//!
//! Classifies the latest user message as positive, negative, or neutral and
//! answers with one of three fixed replies. Needs no network and no key, so
//! it is the default provider and the one unit tests run against.
//!
//! Scoring is a small weighted lexicon with negation flipping: the score is
//! the mean weight of matched words, in [-1, 1], and `not happy` counts as
//! the opposite of `happy`.

use crate::history::{BOT_SENDER, Turn};
use crate::reply::ProviderError;

/// Polarity beyond which a message stops being neutral.
const THRESHOLD: f32 = 0.3;

const POSITIVE_REPLY: &str =
    "That's wonderful to hear! I'm really glad things are looking up for you.";
const NEGATIVE_REPLY: &str =
    "I'm sorry you're going through this. I'm here with you, and it's okay to feel this way.";
const NEUTRAL_REPLY: &str =
    "Thank you for sharing that with me. Tell me more about how you're feeling.";

#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentProvider;

impl SentimentProvider {
    /// Classify the newest user turn and return the matching canned reply.
    pub async fn reply(&self, turns: &[Turn]) -> Result<String, ProviderError> {
        let latest = turns
            .iter()
            .rev()
            .find(|t| t.kind.is_message() && t.sender != BOT_SENDER)
            .map(|t| t.text.as_str())
            .unwrap_or("");

        let score = polarity(latest);
        tracing::debug!(score, "classified user message");

        let reply = if score > THRESHOLD {
            POSITIVE_REPLY
        } else if score < -THRESHOLD {
            NEGATIVE_REPLY
        } else {
            NEUTRAL_REPLY
        };
        Ok(reply.to_string())
    }
}

/// Mean weight of matched lexicon words, clamped to [-1, 1].
/// No matches scores 0.
pub fn polarity(text: &str) -> f32 {
    let mut total = 0.0f32;
    let mut hits = 0u32;
    // Counts down over the tokens following a negator.
    let mut negate_window = 0u8;

    for raw in text.split(|c: char| !c.is_ascii_alphanumeric() && c != '\'') {
        if raw.is_empty() {
            continue;
        }
        let token = raw.to_ascii_lowercase();
        if NEGATORS.contains(&token.as_str()) {
            negate_window = 3;
            continue;
        }
        if let Some(weight) = weight_of(&token) {
            total += if negate_window > 0 { -weight } else { weight };
            hits += 1;
            negate_window = 0;
        } else if negate_window > 0 {
            negate_window -= 1;
        }
    }

    if hits == 0 {
        0.0
    } else {
        (total / hits as f32).clamp(-1.0, 1.0)
    }
}

fn weight_of(token: &str) -> Option<f32> {
    LEXICON
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, weight)| *weight)
}

const NEGATORS: &[&str] = &[
    "not", "no", "never", "don't", "dont", "can't", "cant", "isn't", "isnt", "won't", "wont",
    "didn't", "didnt", "wasn't", "wasnt", "aren't", "arent", "hardly", "barely",
];

const LEXICON: &[(&str, f32)] = &[
    // positive
    ("good", 0.6),
    ("great", 0.8),
    ("happy", 0.8),
    ("love", 0.9),
    ("loved", 0.9),
    ("wonderful", 0.9),
    ("amazing", 0.9),
    ("excited", 0.7),
    ("hopeful", 0.7),
    ("grateful", 0.8),
    ("thankful", 0.8),
    ("proud", 0.7),
    ("calm", 0.5),
    ("relaxed", 0.6),
    ("peaceful", 0.6),
    ("better", 0.5),
    ("glad", 0.7),
    ("joy", 0.8),
    ("fine", 0.3),
    ("okay", 0.2),
    // negative
    ("sad", -0.7),
    ("anxious", -0.7),
    ("anxiety", -0.7),
    ("terrible", -0.9),
    ("awful", -0.9),
    ("bad", -0.6),
    ("worried", -0.6),
    ("worry", -0.6),
    ("stressed", -0.7),
    ("stress", -0.6),
    ("depressed", -0.9),
    ("angry", -0.7),
    ("lonely", -0.7),
    ("alone", -0.5),
    ("scared", -0.7),
    ("afraid", -0.7),
    ("tired", -0.4),
    ("exhausted", -0.6),
    ("hopeless", -0.9),
    ("hurt", -0.6),
    ("cry", -0.6),
    ("crying", -0.7),
    ("panic", -0.8),
    ("worse", -0.6),
    ("hate", -0.8),
];

#[cfg(test)]
mod tests {
    use super::*;

    async fn reply_to(text: &str) -> String {
        let turns = vec![Turn::message("alice", text)];
        SentimentProvider.reply(&turns).await.unwrap()
    }

    #[tokio::test]
    async fn positive_message_gets_positive_reply() {
        assert_eq!(reply_to("I feel really happy and grateful today").await, POSITIVE_REPLY);
    }

    #[tokio::test]
    async fn negative_message_gets_negative_reply() {
        assert_eq!(reply_to("I am so sad and anxious about everything").await, NEGATIVE_REPLY);
    }

    #[tokio::test]
    async fn flat_message_gets_neutral_reply() {
        assert_eq!(reply_to("I went to the shop this morning").await, NEUTRAL_REPLY);
    }

    #[tokio::test]
    async fn empty_message_is_neutral() {
        assert_eq!(reply_to("").await, NEUTRAL_REPLY);
    }

    #[tokio::test]
    async fn score_exactly_at_threshold_stays_neutral() {
        // "fine" weighs 0.3: on the cutoff, not past it, in either sign.
        assert_eq!(polarity("fine"), THRESHOLD);
        assert_eq!(polarity("not fine"), -THRESHOLD);
        assert_eq!(reply_to("fine").await, NEUTRAL_REPLY);
        assert_eq!(reply_to("not fine").await, NEUTRAL_REPLY);
    }

    #[test]
    fn negation_flips_polarity() {
        assert!(polarity("I am not happy") < -THRESHOLD);
        assert!(polarity("I am not sad anymore") > THRESHOLD);
    }

    #[test]
    fn negation_window_expires() {
        // Three non-lexicon tokens exhaust the negation.
        assert!(polarity("not that it really matters but happy") > 0.0);
    }

    #[test]
    fn mixed_feelings_average_out() {
        let score = polarity("happy but stressed");
        assert!(score.abs() <= THRESHOLD, "score {score} should be neutral");
    }

    #[test]
    fn score_stays_in_range() {
        assert!(polarity("terrible awful hopeless depressed") >= -1.0);
        assert!(polarity("wonderful amazing love joy") <= 1.0);
    }

    #[tokio::test]
    async fn classifies_latest_user_turn_not_older_ones() {
        let turns = vec![
            Turn::message("alice", "I am so sad"),
            Turn::message(BOT_SENDER, NEGATIVE_REPLY),
            Turn::message("alice", "actually I feel wonderful and grateful now"),
        ];
        let reply = SentimentProvider.reply(&turns).await.unwrap();
        assert_eq!(reply, POSITIVE_REPLY);
    }

    #[tokio::test]
    async fn trailing_error_turn_is_ignored() {
        let turns = vec![
            Turn::message("alice", "feeling wonderful and happy"),
            Turn::error("upstream unavailable"),
        ];
        let reply = SentimentProvider.reply(&turns).await.unwrap();
        assert_eq!(reply, POSITIVE_REPLY);
    }
}
