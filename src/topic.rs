use crate::error::{JokeError, TopicError};
use crate::model::LanguageModel;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

static BLOCKLIST: &str = include_str!("../res/topic-blocklist.txt");

/// Longest topic accepted, in characters.
pub const MAX_TOPIC_CHARS: usize = 16;

/// Gatekeeps user-supplied topics before any joke strategy runs.
///
/// Local checks run first (blank, length, blocklist); only a topic that
/// passes them is sent to the model for moderation. The blocklist is loaded
/// once and never mutated.
pub struct TopicValidator {
    blocked: HashSet<String>,
}

impl TopicValidator {
    /// Uses the blocklist compiled into the binary.
    pub fn embedded() -> Self {
        Self::from_entries(crate::corpus::parse_word_list(BLOCKLIST))
    }

    /// Loads the blocklist from a newline-delimited file.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(Self::from_entries(crate::corpus::parse_word_list(&raw)))
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            blocked: entries.into_iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// Checks run in order and short-circuit on the first failure; no partial
    /// state is kept between calls.
    pub fn validate(&self, topic: &str, model: &dyn LanguageModel) -> Result<(), JokeError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(TopicError::Missing.into());
        }
        if topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(TopicError::TooLong {
                max: MAX_TOPIC_CHARS,
            }
            .into());
        }
        let lowered = topic.to_lowercase();
        if self.is_blocked(&lowered) {
            debug!(topic = %lowered, "topic rejected by blocklist");
            return Err(TopicError::Inappropriate { topic: lowered }.into());
        }
        if model.is_inappropriate(&lowered)? {
            debug!(topic = %lowered, "topic flagged by moderation");
            return Err(TopicError::Inappropriate { topic: lowered }.into());
        }
        Ok(())
    }

    /// Exact match, or a match with the trailing character stripped so that
    /// simple plurals of blocked topics do not slip through.
    fn is_blocked(&self, topic: &str) -> bool {
        if self.blocked.contains(topic) {
            return true;
        }
        let mut chars = topic.chars();
        chars.next_back();
        let stripped = chars.as_str();
        !stripped.is_empty() && self.blocked.contains(stripped)
    }
}
