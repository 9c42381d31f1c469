//! Candidate values for completing events.
//!
//! Workers draw candidates from a [`CandidateSource`]. The production source
//! is a [`Dictionary`] loaded once at startup from a word list; an empty or
//! unreadable list is a startup failure.

use std::path::Path;

use rand::seq::SliceRandom;
use tracing::info;

use crate::error::{Error, Result};

/// Produces tentative values for events. Uniqueness is checked by the caller.
pub trait CandidateSource: Send + Sync {
    fn candidate(&self) -> String;
}

/// A non-empty word list sampled uniformly at random.
#[derive(Debug, Clone)]
pub struct Dictionary {
    words: Vec<String>,
}

impl Dictionary {
    /// Load a word list: one word per line, surrounding whitespace trimmed,
    /// blank lines skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Dictionary(format!("cannot read word list {}: {e}", path.display()))
        })?;
        let dictionary = Self::from_words(content.lines())?;
        info!(
            path = %path.display(),
            words = dictionary.len(),
            "word list loaded"
        );
        Ok(dictionary)
    }

    /// Build from any iterator of words, with the same trimming rules as [`Dictionary::load`].
    pub fn from_words<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words: Vec<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return Err(Error::Dictionary("no words found in word list".to_string()));
        }
        Ok(Self { words })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }
}

impl CandidateSource for Dictionary {
    fn candidate(&self) -> String {
        // `from_words` guarantees at least one word.
        self.words
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_skips_blank_lines() {
        let dict = Dictionary::from_words(["  casa ", "", "\t", "lua"]).unwrap();
        assert_eq!(dict.len(), 2);
        assert!(dict.contains("casa"));
        assert!(dict.contains("lua"));
    }

    #[test]
    fn empty_list_is_rejected() {
        let err = Dictionary::from_words(["", "   "]).unwrap_err();
        assert!(matches!(err, Error::Dictionary(_)));
    }

    #[test]
    fn missing_file_is_rejected() {
        let err = Dictionary::load("/nonexistent/words.txt").unwrap_err();
        assert!(matches!(err, Error::Dictionary(_)));
    }

    #[test]
    fn candidates_come_from_the_list() {
        let dict = Dictionary::from_words(["sol", "mar", "rio"]).unwrap();
        for _ in 0..50 {
            assert!(dict.contains(&dict.candidate()));
        }
    }

    #[test]
    fn bundled_word_list_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/words.txt");
        let dict = Dictionary::load(path).unwrap();
        assert!(dict.len() > 100);
    }
}
