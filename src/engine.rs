//! Joke orchestration: strategy selection, retry/fallback iteration, and
//! assembly of the final joke.

use crate::corpus::PhraseIndex;
use crate::error::JokeError;
use crate::model::LanguageModel;
use crate::topic::TopicValidator;
use crate::wordplay;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// How many nucleus candidates a from-scratch joke samples.
const SCRATCH_CANDIDATES: usize = 10;
/// Topics longer than this are too long to sit inside a phrase as an affix.
const MAX_AFFIX_TOPIC_CHARS: usize = 7;
/// Topics shorter than this are too short to break into constituents.
const MIN_NUCLEUS_TOPIC_CHARS: usize = 6;

/// One generated joke. Created whole by the orchestrator; `substitution` is
/// always derived from the other fields, never set independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joke {
    pub setup: String,
    pub punchline: String,
    /// The original phrase the joke is based on.
    pub nucleus: String,
    /// The affix of the nucleus that was replaced.
    pub component: String,
    /// The sound-alike word substituted for the component.
    pub change: String,
    /// The nucleus with the component swapped for the change, hyphen-joined.
    pub substitution: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Treat the input as the phrase to break apart.
    Nucleus,
    /// Treat the input as the word to substitute in.
    Change,
    /// Treat the input as the affix to replace.
    Component,
    /// Fall back to a related topic.
    Topic,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Nucleus => write!(f, "nucleus"),
            Strategy::Change => write!(f, "change"),
            Strategy::Component => write!(f, "component"),
            Strategy::Topic => write!(f, "topic"),
        }
    }
}

/// Composes the phrase index, topic validation, and the language-model
/// collaborator into complete jokes.
///
/// The index and validator are immutable; the only shared mutable state is
/// the root RNG, which is locked just long enough to derive an independent
/// per-call stream, so concurrent calls never contend while a model request
/// is in flight.
pub struct JokeEngine<M> {
    index: Arc<PhraseIndex>,
    validator: TopicValidator,
    model: M,
    rng: Mutex<SmallRng>,
}

impl<M: LanguageModel> JokeEngine<M> {
    pub fn new(index: Arc<PhraseIndex>, validator: TopicValidator, model: M) -> Self {
        Self {
            index,
            validator,
            model,
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Seeded constructor: strategy order, sampling, and the index's search
    /// probes all become deterministic.
    pub fn with_seed(index: Arc<PhraseIndex>, validator: TopicValidator, model: M, seed: u64) -> Self {
        Self {
            index,
            validator,
            model,
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }

    /// Generates a joke from scratch by sampling nucleus candidates from the
    /// phrase corpus.
    pub fn tell_joke(&self) -> Result<Joke, JokeError> {
        let mut rng = self.call_rng();
        info!("generating a joke from scratch");
        let candidates = self.index.random_phrases(SCRATCH_CANDIDATES, &mut rng);
        debug!(?candidates, "sampled nucleus candidates");

        for candidate in candidates {
            match self.nucleus_strategy(candidate, &mut rng) {
                Ok(joke) => return Ok(joke),
                Err(err) if err.is_recoverable() => {
                    info!(phrase = %candidate, "could not make a joke from phrase");
                }
                Err(err) => return Err(err),
            }
        }
        Err(JokeError::NoJokeFound)
    }

    /// Generates a joke about a user-supplied topic.
    pub fn tell_joke_about(&self, topic: &str) -> Result<Joke, JokeError> {
        self.tell_joke_about_inner(topic, false)
    }

    fn tell_joke_about_inner(&self, topic: &str, related: bool) -> Result<Joke, JokeError> {
        self.validator.validate(topic, &self.model)?;
        let topic = topic.trim().to_lowercase();
        info!(topic = %topic, related, "generating a joke about a topic");

        let mut rng = self.call_rng();
        for strategy in Self::strategy_order(&topic, related, &mut rng) {
            let outcome = match strategy {
                Strategy::Nucleus => self.nucleus_strategy(&topic, &mut rng),
                Strategy::Change => self.change_strategy(&topic, &mut rng),
                Strategy::Component => self.component_strategy(&topic, &mut rng),
                Strategy::Topic => self.backoff_strategy(&topic, &mut rng),
            };
            match outcome {
                Ok(joke) => return Ok(joke),
                Err(err) if err.is_recoverable() => {
                    info!(topic = %topic, %strategy, "strategy found no joke");
                }
                Err(err) => return Err(err),
            }
        }
        Err(JokeError::NoJokeFound)
    }

    /// Which strategies fit the topic, shuffled, with the related-topic
    /// backoff pinned last. A backoff call never backs off again.
    fn strategy_order(topic: &str, related: bool, rng: &mut SmallRng) -> Vec<Strategy> {
        let length = topic.chars().count();
        let mut order = Vec::new();
        if length <= MAX_AFFIX_TOPIC_CHARS {
            order.push(Strategy::Change);
            if !related {
                order.push(Strategy::Component);
            }
        }
        if length >= MIN_NUCLEUS_TOPIC_CHARS {
            order.push(Strategy::Nucleus);
        }
        order.shuffle(rng);
        if !related {
            order.push(Strategy::Topic);
        }
        order
    }

    /// Breaks the phrase into constituents and swaps one for a sound-alike.
    fn nucleus_strategy(&self, phrase: &str, rng: &mut SmallRng) -> Result<Joke, JokeError> {
        info!(phrase = %phrase, "trying to joke about a phrase");
        let components = wordplay::extract_constituents(phrase, &self.index);
        if components.is_empty() {
            info!(phrase = %phrase, "phrase could not be broken up");
            return Err(JokeError::NoJokeFound);
        }
        debug!(?components, "possible components");

        for component in &components {
            let mut changes = self.model.phonetic_neighbors(component, Some(phrase))?;
            if changes.is_empty() {
                debug!(%component, "no sound-alikes for component");
                continue;
            }
            changes.shuffle(rng);
            let change = &changes[0];
            return self.assemble(phrase, component, change);
        }
        info!(phrase = %phrase, "no sound-alikes for any component");
        Err(JokeError::NoJokeFound)
    }

    /// Treats the topic as the word to substitute in: its sound-alikes are
    /// candidate components, each looked up as a phrase prefix.
    fn change_strategy(&self, topic: &str, rng: &mut SmallRng) -> Result<Joke, JokeError> {
        info!(change = %topic, "trying to joke by substituting the topic in");
        let components = self.model.phonetic_neighbors(topic, None)?;
        if components.is_empty() {
            info!(change = %topic, "topic does not sound like anything");
            return Err(JokeError::NoJokeFound);
        }

        for component in &components {
            let mut nuclei = self.index.phrases_starting_with(component, rng);
            if nuclei.is_empty() {
                debug!(%component, "no phrases start with candidate component");
                continue;
            }
            nuclei.shuffle(rng);
            let nucleus = nuclei[0];
            return self.assemble(nucleus, component, topic);
        }
        Err(JokeError::NoJokeFound)
    }

    /// Treats the topic as the component: find a phrase it starts and a
    /// sound-alike to replace it with.
    fn component_strategy(&self, topic: &str, rng: &mut SmallRng) -> Result<Joke, JokeError> {
        info!(component = %topic, "trying to joke by replacing the topic");
        let mut nuclei = self.index.phrases_starting_with(topic, rng);
        if nuclei.is_empty() {
            info!(component = %topic, "no phrases start with topic");
            return Err(JokeError::NoJokeFound);
        }
        nuclei.shuffle(rng);
        let nucleus = nuclei[0];

        let mut changes = self.model.phonetic_neighbors(topic, Some(nucleus))?;
        if changes.is_empty() {
            info!(component = %topic, "topic does not sound like anything");
            return Err(JokeError::NoJokeFound);
        }
        changes.shuffle(rng);
        let change = changes[0].clone();
        self.assemble(nucleus, topic, &change)
    }

    /// Backs off to topics related in meaning. Nested attempts run with
    /// `related` set, which keeps them from backing off a second time.
    fn backoff_strategy(&self, topic: &str, rng: &mut SmallRng) -> Result<Joke, JokeError> {
        info!(topic = %topic, "backing off to related topics");
        let mut related = self.model.related_words(topic)?;
        if related.is_empty() {
            return Err(JokeError::NoJokeFound);
        }
        related.shuffle(rng);

        for word in &related {
            match self.tell_joke_about_inner(word, true) {
                Ok(joke) => return Ok(joke),
                Err(err) if err.is_recoverable() => {
                    info!(topic = %topic, related_word = %word, "no joke for related word");
                }
                Err(err) => return Err(err),
            }
        }
        Err(JokeError::NoJokeFound)
    }

    /// Shared assembly: derive the substitution, have the model phrase the
    /// joke, and populate the value.
    fn assemble(&self, nucleus: &str, component: &str, change: &str) -> Result<Joke, JokeError> {
        let substitution = wordplay::build_substitution(nucleus, component, change);
        debug!(%nucleus, %component, %change, %substitution, "phrasing joke");
        let lines = self.model.phrase_joke(&substitution, nucleus, change)?;
        Ok(Joke {
            setup: lines.setup,
            punchline: lines.punchline,
            nucleus: nucleus.to_string(),
            component: component.to_string(),
            change: change.to_string(),
            substitution,
        })
    }

    /// Derives an independent RNG stream for one call. The root lock is held
    /// only for the seed draw, never across model calls.
    fn call_rng(&self) -> SmallRng {
        let mut root = self.rng.lock();
        SmallRng::seed_from_u64(root.next_u64())
    }
}
