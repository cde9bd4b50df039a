//! Tokenizing and counting words for the cloud.

use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Common English words left out of every cloud.
pub const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "can't", "cannot", "com", "could", "couldn't", "did", "didn't",
    "do", "does", "doesn't", "doing", "don't", "down", "during", "each", "else", "ever", "few",
    "for", "from", "further", "get", "had", "hadn't", "has", "hasn't", "have", "haven't",
    "having", "he", "he'd", "he'll", "he's", "hence", "her", "here", "here's", "hers", "herself",
    "him", "himself", "his", "how", "how's", "however", "http", "i", "i'd", "i'll", "i'm",
    "i've", "if", "in", "into", "is", "isn't", "it", "it's", "its", "itself", "just", "k",
    "let's", "like", "me", "more", "most", "mustn't", "my", "myself", "no", "nor", "not", "of",
    "off", "on", "once", "only", "or", "other", "otherwise", "ought", "our", "ours",
    "ourselves", "out", "over", "own", "r", "same", "shall", "shan't", "she", "she'd",
    "she'll", "she's", "should", "shouldn't", "since", "so", "some", "such", "than", "that",
    "that's", "the", "their", "theirs", "them", "themselves", "then", "there", "there's",
    "therefore", "these", "they", "they'd", "they'll", "they're", "they've", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "wasn't", "we", "we'd",
    "we'll", "we're", "we've", "were", "weren't", "what", "what's", "when", "when's", "where",
    "where's", "which", "while", "who", "who's", "whom", "why", "why's", "with", "won't",
    "would", "wouldn't", "www", "you", "you'd", "you'll", "you're", "you've", "your", "yours",
    "yourself", "yourselves",
];

pub fn default_stopwords() -> HashSet<String> {
    STOPWORDS.iter().map(|s| s.to_string()).collect()
}

/// A word and how often it occurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordCount {
    pub word: String,
    pub count: u32,
}

fn token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w[\w']+").expect("static regex"))
}

/// Split `text` into candidate words.
///
/// Words are two or more word characters (apostrophes allowed after the
/// first), with a trailing `'s` removed. Pure numbers are dropped.
pub fn tokenize(text: &str) -> Vec<&str> {
    token_pattern()
        .find_iter(text)
        .map(|m| {
            let w = m.as_str();
            if w.ends_with("'s") || w.ends_with("'S") {
                &w[..w.len() - 2]
            } else {
                w
            }
        })
        .filter(|w| !w.is_empty() && !w.chars().all(char::is_numeric))
        .collect()
}

fn drop_last_char(s: &str) -> &str {
    s.char_indices().last().map_or(s, |(i, _)| &s[..i])
}

/// Count words case-insensitively, most frequent first.
///
/// Stopwords (compared in lower case) are removed. Each word is shown in the
/// spelling it appears in most often, earliest spelling winning ties. A
/// plural ending in a single `s` is folded into its singular when the
/// singular also occurs. Equal counts sort alphabetically.
pub fn count_words(text: &str, stopwords: &HashSet<String>) -> Vec<WordCount> {
    let stopwords: HashSet<String> = stopwords.iter().map(|s| s.to_lowercase()).collect();

    // lower-case key -> spellings in first-seen order
    let mut groups: HashMap<String, Vec<(String, u32)>> = HashMap::new();
    for word in tokenize(text) {
        let key = word.to_lowercase();
        if stopwords.contains(&key) {
            continue;
        }
        let spellings = groups.entry(key).or_default();
        match spellings.iter_mut().find(|(s, _)| s == word) {
            Some((_, n)) => *n += 1,
            None => spellings.push((word.to_string(), 1)),
        }
    }

    let plurals: Vec<String> = groups
        .keys()
        .filter(|k| k.ends_with('s') && !k.ends_with("ss"))
        .filter(|k| groups.contains_key(drop_last_char(k)))
        .cloned()
        .collect();
    for plural in plurals {
        let Some(spellings) = groups.remove(&plural) else {
            continue;
        };
        let singular_key = drop_last_char(&plural);
        if let Some(target) = groups.get_mut(singular_key) {
            for (spelling, n) in spellings {
                let singular = drop_last_char(&spelling);
                match target.iter_mut().find(|(s, _)| s == singular) {
                    Some((_, m)) => *m += n,
                    None => target.push((singular.to_string(), n)),
                }
            }
        }
    }

    let mut counts: Vec<WordCount> = groups
        .into_values()
        .filter_map(|spellings| {
            let total: u32 = spellings.iter().map(|(_, n)| n).sum();
            let mut best: Option<&(String, u32)> = None;
            for entry in &spellings {
                if best.map_or(true, |b| entry.1 > b.1) {
                    best = Some(entry);
                }
            }
            best.map(|(word, _)| WordCount {
                word: word.clone(),
                count: total,
            })
        })
        .collect();

    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    counts
}
