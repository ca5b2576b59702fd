//! Linguistic completeness heuristics for end-of-turn detection.
//!
//! A fixed silence timeout alone either cuts speakers off after a natural
//! mid-thought pause or, stretched long enough to avoid that, feels sluggish
//! on short complete utterances. Pairing acoustic silence with a cheap
//! completeness check on the transcript resolves both.

use crate::defaults;

/// Words that almost never end a complete English utterance.
///
/// Conjunctions, prepositions, articles, unstressed possessive determiners,
/// and contractions ending in an auxiliary. A transcript whose last token is
/// in this set is treated as mid-thought.
pub const TRAILING_FUNCTION_WORDS: &[&str] = &[
    // conjunctions
    "and", "or", "but", "because", "although", "though", "while", "if", "than",
    "nor", "whether", "since", "unless", "until",
    // prepositions
    "with", "to", "of", "in", "on", "at", "by", "for", "from", "about", "into",
    "over", "under", "through", "between", "during", "before", "after",
    "without", "within", "against", "toward", "towards", "upon", "onto",
    "near", "per", "via",
    // articles and determiners
    "a", "an", "the", "each", "every",
    // unstressed possessives (determiner position only)
    "its", "my", "your", "their", "our", "whose",
    // contractions ending in an auxiliary
    "it's", "that's", "i'm", "i've", "i'll", "i'd", "we're", "we've", "we'll",
    "we'd", "you're", "you've", "you'll", "you'd", "he's", "she's", "he'll",
    "she'll", "they're", "they've", "they'll", "they'd", "there's", "here's",
    "what's", "who's", "let's",
];

/// Decide whether a transcript looks like an unfinished thought.
///
/// The last whitespace-delimited token (trailing punctuation stripped) is
/// tested against [`TRAILING_FUNCTION_WORDS`]; independently, a short
/// transcript with no terminal punctuation is judged incomplete.
///
/// An empty transcript is incomplete: there is nothing to hand off yet.
pub fn is_incomplete(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let has_terminal = trimmed.ends_with(['.', '!', '?']);

    let last_token = trimmed
        .split_whitespace()
        .next_back()
        .unwrap_or("")
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase();

    if TRAILING_FUNCTION_WORDS.contains(&last_token.as_str()) {
        return true;
    }

    !has_terminal && word_count(trimmed) < defaults::SHORT_UTTERANCE_WORDS
}

/// Number of whitespace-delimited words in a transcript.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Silence the segmenter must observe before tentatively closing a turn.
///
/// `wait = min(base + floor(words / 10) * step, cap)` — longer utterances
/// earn more trailing tolerance. Monotone nondecreasing in `words`, capped.
pub fn required_wait_ms(words: usize, base_ms: u32, step_ms: u32, cap_ms: u32) -> u32 {
    let extension = (words as u32 / 10).saturating_mul(step_ms);
    base_ms.saturating_add(extension).min(cap_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_conjunction_is_incomplete() {
        assert!(is_incomplete("I was thinking we could go and"));
        assert!(is_incomplete("it depends on whether"));
    }

    #[test]
    fn test_trailing_article_is_incomplete() {
        assert!(is_incomplete("I wanted to talk about the"));
        assert!(is_incomplete("could you hand me a"));
    }

    #[test]
    fn test_trailing_preposition_is_incomplete() {
        assert!(is_incomplete("let me check with"));
        assert!(is_incomplete("she put it on"));
    }

    #[test]
    fn test_trailing_contraction_is_incomplete() {
        assert!(is_incomplete("well the thing is it's"));
        assert!(is_incomplete("honestly I think they're"));
    }

    #[test]
    fn test_trailing_punctuation_is_stripped_before_lookup() {
        assert!(is_incomplete("I wanted to talk about the,"));
        assert!(is_incomplete("we could try and..."));
    }

    #[test]
    fn test_complete_sentence_is_complete() {
        assert!(!is_incomplete("I think we are done."));
        assert!(!is_incomplete("What time is it?"));
        assert!(!is_incomplete("That sounds great!"));
    }

    #[test]
    fn test_long_unpunctuated_content_is_complete() {
        // Streaming recognizers often omit terminal punctuation; content
        // words at the end of a long utterance still read as finished.
        assert!(!is_incomplete(
            "please set a reminder for my dentist appointment tomorrow morning"
        ));
    }

    #[test]
    fn test_short_unpunctuated_is_incomplete() {
        assert!(is_incomplete("so I was"));
        assert!(is_incomplete("okay"));
    }

    #[test]
    fn test_short_punctuated_command_is_complete() {
        assert!(!is_incomplete("Stop."));
        assert!(!is_incomplete("Yes please."));
    }

    #[test]
    fn test_empty_transcript_is_incomplete() {
        assert!(is_incomplete(""));
        assert!(is_incomplete("   "));
    }

    #[test]
    fn test_every_function_word_final_input_is_incomplete() {
        for word in TRAILING_FUNCTION_WORDS {
            let text = format!("something something {}", word);
            assert!(is_incomplete(&text), "should be incomplete: {:?}", text);
        }
    }

    #[test]
    fn test_case_insensitive_lookup() {
        assert!(is_incomplete("I wanted to talk about THE"));
        assert!(is_incomplete("let me think about And"));
    }

    #[test]
    fn test_wait_time_base_below_ten_words() {
        assert_eq!(required_wait_ms(0, 2000, 200, 3500), 2000);
        assert_eq!(required_wait_ms(9, 2000, 200, 3500), 2000);
    }

    #[test]
    fn test_wait_time_steps_per_ten_words() {
        assert_eq!(required_wait_ms(10, 2000, 200, 3500), 2200);
        assert_eq!(required_wait_ms(25, 2000, 200, 3500), 2400);
        assert_eq!(required_wait_ms(50, 2000, 200, 3500), 3000);
    }

    #[test]
    fn test_wait_time_capped() {
        assert_eq!(required_wait_ms(100, 2000, 200, 3500), 3500);
        assert_eq!(required_wait_ms(10_000, 2000, 200, 3500), 3500);
    }

    #[test]
    fn test_wait_time_monotone_nondecreasing() {
        let mut last = 0;
        for words in 0..200 {
            let wait = required_wait_ms(words, 2000, 200, 3500);
            assert!(wait >= last, "wait decreased at {} words", words);
            assert!(wait <= 3500);
            last = wait;
        }
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("one"), 1);
        assert_eq!(word_count("  spaced   out  words "), 3);
    }
}
