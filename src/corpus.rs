use rand::Rng;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

static SHORT_WORDS: &str = include_str!("../res/short-words.txt");
static LONG_PHRASES: &str = include_str!("../res/long-phrases.txt");

/// How many phrases either side of a probe hit are inspected when collecting
/// prefix matches.
const MATCH_WINDOW: usize = 10;

/// Read-only word corpus: a set of short words for existence checks and a
/// sorted list of long phrases used as nucleus candidates.
///
/// Built once at startup and shared by reference; nothing here mutates after
/// construction, so concurrent readers need no locking.
pub struct PhraseIndex {
    words: HashSet<String>,
    phrases: Vec<String>,
}

impl PhraseIndex {
    /// Builds the index from the word lists compiled into the binary.
    pub fn embedded() -> Self {
        Self::from_lists(parse_word_list(SHORT_WORDS), parse_word_list(LONG_PHRASES))
    }

    /// Builds the index from two newline-delimited word-list files.
    pub fn from_files(short_words: &Path, long_phrases: &Path) -> io::Result<Self> {
        let words = fs::read_to_string(short_words)?;
        let phrases = fs::read_to_string(long_phrases)?;
        Ok(Self::from_lists(
            parse_word_list(&words),
            parse_word_list(&phrases),
        ))
    }

    /// Builds the index from in-memory lists. Phrases are sorted here so the
    /// search below never depends on file order.
    pub fn from_lists<W, P>(words: W, phrases: P) -> Self
    where
        W: IntoIterator<Item = String>,
        P: IntoIterator<Item = String>,
    {
        let words = words.into_iter().collect();
        let mut phrases: Vec<String> = phrases.into_iter().collect();
        phrases.sort();
        Self { words, phrases }
    }

    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }

    /// Samples `count` phrases uniformly, with replacement.
    pub fn random_phrases(&self, count: usize, rng: &mut impl Rng) -> Vec<&str> {
        if self.phrases.is_empty() {
            return Vec::new();
        }
        (0..count)
            .map(|_| self.phrases[rng.gen_range(0..self.phrases.len())].as_str())
            .collect()
    }

    /// Membership test against the short-word set, case-sensitive as loaded.
    pub fn word_exists(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    /// Returns phrases whose leading characters equal `prefix`.
    ///
    /// Binary search over the sorted phrase list, comparing only the head of
    /// each candidate. The first probe is drawn at random instead of using the
    /// arithmetic midpoint: common prefixes such as "con" cluster there, and a
    /// fixed probe would keep landing on the same phrase. On a hit, up to 20
    /// phrases around the probe are collected and filtered to true matches.
    ///
    /// Truncated-prefix order is not strictly monotonic across phrases of very
    /// different lengths, so a match is found if encountered rather than
    /// guaranteed. The occasional miss feeds joke variety; do not replace this
    /// with a linear scan.
    pub fn phrases_starting_with(&self, prefix: &str, rng: &mut impl Rng) -> Vec<&str> {
        if self.phrases.is_empty() || prefix.is_empty() {
            return Vec::new();
        }
        let mut low = 0usize;
        let mut high = self.phrases.len() - 1;
        let mut mid = rng.gen_range(low..=high);
        loop {
            let candidate = head(&self.phrases[mid], prefix.len());
            match prefix.cmp(candidate) {
                std::cmp::Ordering::Equal => {
                    let window_start = mid.saturating_sub(MATCH_WINDOW).max(low);
                    let window_end = (mid + MATCH_WINDOW).min(high);
                    return self.phrases[window_start..window_end]
                        .iter()
                        .filter(|phrase| head(phrase, prefix.len()) == prefix)
                        .map(String::as_str)
                        .collect();
                }
                std::cmp::Ordering::Less => {
                    if mid == 0 {
                        return Vec::new();
                    }
                    high = mid - 1;
                }
                std::cmp::Ordering::Greater => {
                    low = mid + 1;
                }
            }
            if low > high {
                return Vec::new();
            }
            mid = low + (high - low) / 2;
        }
    }
}

/// Leading `len` bytes of `phrase`, or the whole phrase when shorter.
fn head(phrase: &str, len: usize) -> &str {
    phrase.get(..len).unwrap_or(phrase)
}

/// Splits a newline-delimited word list, trimming each line and skipping
/// blanks.
pub(crate) fn parse_word_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
