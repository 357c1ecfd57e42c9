//! Heuristic sentiment scoring.
//!
//! Two passes feed the same counters. The sentence pass classifies each
//! sentence of the joined batch text as positive, negative or neutral, with a
//! negation word flipping the polarity. The word pass then adds half a point
//! per vocabulary hit over the whole batch's keyword tokens. Both passes are
//! kept because the resulting scale is what stored reports were computed on.

use crate::tokenize::{batch_text, keyword_tokens, sentences, words};
use crate::vocabulary::{is_negation, is_negative, is_positive};
use subpulse_core::{Post, SentimentDistribution, SentimentResult};

const WORD_HIT_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Positive,
    Negative,
    Neutral,
}

/// Raw counters behind a [`SentimentResult`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SentimentTally {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl SentimentTally {
    pub fn from_posts(posts: &[Post]) -> Self {
        let text = batch_text(posts);
        let mut tally = Self::default();

        for sentence in sentences(&text) {
            match classify_sentence(sentence) {
                Polarity::Positive => tally.positive += 1.0,
                Polarity::Negative => tally.negative += 1.0,
                Polarity::Neutral => tally.neutral += 1.0,
            }
        }

        for word in keyword_tokens(&text) {
            if is_positive(word) {
                tally.positive += WORD_HIT_WEIGHT;
            } else if is_negative(word) {
                tally.negative += WORD_HIT_WEIGHT;
            }
        }

        tally
    }

    pub fn average(&self) -> f64 {
        let polar = self.positive + self.negative;
        let denominator = if polar == 0.0 { 1.0 } else { polar };
        (self.positive - self.negative) / denominator
    }

    /// Each share is rounded on its own; the three need not add up to 100.
    pub fn distribution(&self) -> SentimentDistribution {
        let sum = self.positive + self.negative + self.neutral;
        let total = if sum == 0.0 { 1.0 } else { sum };
        let percent = |count: f64| (count / total * 100.0).round() as u32;

        SentimentDistribution {
            positive: percent(self.positive),
            neutral: percent(self.neutral),
            negative: percent(self.negative),
        }
    }

    pub fn result(&self) -> SentimentResult {
        SentimentResult {
            average: self.average(),
            distribution: self.distribution(),
        }
    }
}

fn classify_sentence(sentence: &str) -> Polarity {
    let mut positive = 0u32;
    let mut negative = 0u32;
    let mut negated = false;

    for word in words(sentence).filter(|word| word.len() > 2) {
        negated |= is_negation(word);
        if is_positive(word) {
            positive += 1;
        } else if is_negative(word) {
            negative += 1;
        }
    }

    if positive > negative {
        if negated {
            Polarity::Negative
        } else {
            Polarity::Positive
        }
    } else if negative > positive {
        if negated {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    } else {
        Polarity::Neutral
    }
}

pub fn score_sentiment(posts: &[Post]) -> SentimentResult {
    SentimentTally::from_posts(posts).result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, body: &str) -> Post {
        Post {
            id: title.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            score: 0,
            num_comments: 0,
            created_utc: 0,
            permalink: String::new(),
            author: "tester".to_string(),
            url: String::new(),
        }
    }

    #[test]
    fn test_empty_batch_is_neutral_zero() {
        let result = score_sentiment(&[]);
        assert_eq!(result.average, 0.0);
        assert_eq!(result.distribution, SentimentDistribution::default());
    }

    #[test]
    fn test_combined_totals_for_fixture() {
        let posts = vec![
            post("Great tool, I love it. Not good at all!", ""),
            post("Worst update ever", "This is a terrible mess. Nothing works"),
        ];

        // Sentences: positive, negated positive, negative, neutral.
        // Word pass: great, love, good (+1.5) and worst, terrible, mess (+1.5).
        let tally = SentimentTally::from_posts(&posts);
        assert_eq!(
            tally,
            SentimentTally {
                positive: 2.5,
                negative: 3.5,
                neutral: 1.0,
            }
        );

        let result = tally.result();
        assert!((result.average - (-1.0 / 6.0)).abs() < 1e-12);
        assert_eq!(
            result.distribution,
            SentimentDistribution {
                positive: 36,
                neutral: 14,
                negative: 50,
            }
        );
    }

    #[test]
    fn test_three_letter_words_skip_word_pass() {
        // "bad" counts for its sentence but is too short for the word pass.
        let tally = SentimentTally::from_posts(&[post("good. bad. meh.", "")]);
        assert_eq!(
            tally,
            SentimentTally {
                positive: 1.5,
                negative: 1.0,
                neutral: 1.0,
            }
        );
    }

    #[test]
    fn test_rounding_artifacts_are_preserved() {
        let result = score_sentiment(&[post("good. bad. meh.", "")]);
        let d = result.distribution;
        assert_eq!((d.positive, d.neutral, d.negative), (43, 29, 29));
        assert_eq!(d.positive + d.neutral + d.negative, 101);
        assert!((result.average - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_negation_flips_negative_sentence() {
        let tally = SentimentTally::from_posts(&[post("It was never broken", "")]);
        // Sentence flips to positive; "broken" still adds to the word pass.
        assert_eq!(tally.positive, 1.0);
        assert_eq!(tally.negative, 0.5);
    }

    #[test]
    fn test_unreachable_negations() {
        // "no" is too short and "don't" splits into "don" and "t".
        let tally = SentimentTally::from_posts(&[post("no, I don't love it", "")]);
        assert_eq!(tally.positive, 1.5);
        assert_eq!(tally.negative, 0.0);
    }

    #[test]
    fn test_positive_batch_outweighs_negative_batch() {
        let posts = vec![
            post("This is great and amazing, I love it", ""),
            post("Awful and horrible", ""),
        ];
        let result = score_sentiment(&posts);
        assert!(result.average.is_finite());
        assert!(result.distribution.positive > result.distribution.negative);
        assert_eq!(result.distribution.positive, 71);
        assert_eq!(result.distribution.negative, 29);
    }

    #[test]
    fn test_bounds_hold() {
        let batches = vec![
            vec![post("terrible terrible terrible", "awful")],
            vec![post("love love love", "best")],
            vec![post("not good. not bad.", "no opinion")],
            vec![post("", "")],
        ];
        for posts in batches {
            let result = score_sentiment(&posts);
            assert!(result.average >= -1.0 && result.average <= 1.0);
            assert!(!result.average.is_nan());
            let d = result.distribution;
            for share in [d.positive, d.neutral, d.negative] {
                assert!(share <= 100);
            }
        }
    }
}
