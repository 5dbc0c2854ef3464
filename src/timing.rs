//! Word and sentence timing from per-character synthesis alignment.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn sentence_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+\s*").expect("valid regex"))
}

/// Per-character timing returned alongside synthesized audio. The three
/// arrays are parallel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterAlignment {
    pub characters: Vec<String>,
    #[serde(rename = "character_start_times_seconds")]
    pub start_times: Vec<f64>,
    #[serde(rename = "character_end_times_seconds")]
    pub end_times: Vec<f64>,
}

impl CharacterAlignment {
    /// Build an alignment from characters and their `(start, end)` times.
    pub fn from_chars<I>(chars: I) -> Self
    where
        I: IntoIterator<Item = (char, f64, f64)>,
    {
        let mut alignment = Self::default();
        for (ch, start, end) in chars {
            alignment.characters.push(ch.to_string());
            alignment.start_times.push(start);
            alignment.end_times.push(end);
        }
        alignment
    }

    /// True when the arrays are non-empty and of equal length.
    pub fn is_consistent(&self) -> bool {
        let n = self.characters.len();
        n > 0 && self.start_times.len() == n && self.end_times.len() == n
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSpan {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceSpan {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Sentence timing for one synthesized text, as stored in `timing/<key>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    pub text: String,
    pub sentences: Vec<SentenceSpan>,
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '\'' || ch == '-'
}

fn is_word_forming(token: &str) -> bool {
    !token.is_empty() && token.chars().all(is_word_char)
}

/// Group contiguous word-forming characters into word spans.
pub fn words(alignment: &CharacterAlignment) -> Vec<WordSpan> {
    let mut words = Vec::new();
    let mut current: Option<WordSpan> = None;

    let chars = alignment
        .characters
        .iter()
        .zip(&alignment.start_times)
        .zip(&alignment.end_times);

    for ((ch, &start), &end) in chars {
        if is_word_forming(ch) {
            match current.as_mut() {
                Some(word) => {
                    word.text.push_str(ch);
                    word.end = end;
                }
                None => {
                    current = Some(WordSpan {
                        text: ch.clone(),
                        start,
                        end,
                    });
                }
            }
        } else if let Some(word) = current.take() {
            words.push(word);
        }
    }
    if let Some(word) = current {
        words.push(word);
    }
    words
}

/// Byte offset in `text` of each word, searched forward from the previous
/// match. A word that cannot be found is placed at the current cursor.
fn locate_words(text: &str, words: &[WordSpan]) -> Vec<usize> {
    let mut cursor = 0;
    words
        .iter()
        .map(|word| match text[cursor..].find(word.text.as_str()) {
            Some(offset) => {
                let pos = cursor + offset;
                cursor = pos + word.text.len();
                pos
            }
            None => cursor,
        })
        .collect()
}

fn span(text: &str, words: &[WordSpan]) -> Option<SentenceSpan> {
    let first = words.first()?;
    let last = words.last()?;
    let trimmed = text.trim();
    let text = if trimmed.is_empty() {
        words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        trimmed.to_string()
    };
    Some(SentenceSpan {
        text,
        start: first.start,
        end: last.end,
    })
}

/// Group word spans into sentences of `text`.
pub fn sentences(text: &str, words: &[WordSpan]) -> Vec<SentenceSpan> {
    if words.is_empty() {
        return Vec::new();
    }

    let positions = locate_words(text, words);
    let mut sentences = Vec::new();
    let mut next_word = 0;
    let mut prev_end = 0;

    for boundary in sentence_end_re().find_iter(text) {
        let first = next_word;
        while next_word < words.len() && positions[next_word] < boundary.end() {
            next_word += 1;
        }
        if let Some(sentence) = span(&text[prev_end..boundary.end()], &words[first..next_word]) {
            sentences.push(sentence);
        }
        prev_end = boundary.end();
    }

    if next_word < words.len() {
        if let Some(sentence) = span(&text[prev_end..], &words[next_word..]) {
            sentences.push(sentence);
        }
    }

    sentences
}

/// Rebuild sentence timing for `text` from its character alignment.
///
/// Returns `None` when the alignment is empty or inconsistent, or when it
/// contains no words.
pub fn reconstruct(text: &str, alignment: &CharacterAlignment) -> Option<TimingRecord> {
    if !alignment.is_consistent() {
        return None;
    }
    let words = words(alignment);
    if words.is_empty() {
        return None;
    }
    Some(TimingRecord {
        text: text.to_string(),
        sentences: sentences(text, &words),
    })
}
