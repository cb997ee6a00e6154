use crate::corpus::PhraseIndex;
use std::cmp;

// Affixes that lead to bad jokes. Banned items are dropped outright to avoid
// common poor pronunciation; common items are dropped to avoid recreating
// actual words.
const BANNED_PREFIXES: &[&str] = &[];
const BANNED_SUFFIXES: &[&str] = &["ion", "ing"];
const COMMON_PREFIXES: &[&str] = &["un"];
const COMMON_SUFFIXES: &[&str] = &[
    "acy", "al", "dom", "er", "or", "ion", "ism", "ist", "ity", "ment", "ing", "s", "es", "ed",
];

/// Affixes of `phrase` that stand alone as words and so can be punned on.
///
/// Affix lengths run from 3 up to 6 characters, additionally capped at half
/// the phrase plus one so the unmatched remainder stays recognizable (5
/// letters for an 8/9-letter phrase, 6 for 10/11). Prefixes are skipped when
/// the leftover tail is a common morphological suffix; suffixes are skipped
/// when banned or when they are a common prefix fragment. Survivors must
/// exist in the short-word corpus.
pub fn extract_constituents(phrase: &str, index: &PhraseIndex) -> Vec<String> {
    let limit = cmp::min(7, 2 + phrase.len() / 2);
    let mut affixes: Vec<&str> = Vec::new();
    for n in 3..limit {
        if let (Some(prefix), Some(tail)) = (phrase.get(..n), phrase.get(n..)) {
            if !BANNED_PREFIXES.contains(&prefix) && !COMMON_SUFFIXES.contains(&tail) {
                push_unique(&mut affixes, prefix);
            }
        }
    }
    for n in 3..limit {
        let suffix = phrase.len().checked_sub(n).and_then(|at| phrase.get(at..));
        if let Some(suffix) = suffix {
            if !BANNED_SUFFIXES.contains(&suffix) && !COMMON_PREFIXES.contains(&suffix) {
                push_unique(&mut affixes, suffix);
            }
        }
    }
    affixes
        .into_iter()
        .filter(|affix| index.word_exists(affix))
        .map(str::to_string)
        .collect()
}

fn push_unique<'a>(affixes: &mut Vec<&'a str>, affix: &'a str) {
    if !affixes.contains(&affix) {
        affixes.push(affix);
    }
}

/// Splices `change` into `nucleus` in place of `component`, hyphen-joined.
///
/// `component` must be a genuine prefix or suffix of `nucleus`; the
/// orchestrator only ever derives it from the nucleus itself, so anything
/// else is a caller bug.
pub fn build_substitution(nucleus: &str, component: &str, change: &str) -> String {
    if let Some(tail) = nucleus.strip_prefix(component) {
        format!("{change}-{tail}")
    } else if let Some(stem) = nucleus.strip_suffix(component) {
        format!("{stem}-{change}")
    } else {
        panic!("component {component:?} is not an affix of nucleus {nucleus:?}");
    }
}
