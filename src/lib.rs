//! Pun-construction engine.
//!
//! Finds a word or phrase (the nucleus), picks an affix of it that stands
//! alone as a word (the component), swaps in a sound-alike (the change), and
//! has a language model dress the result up as a setup/punchline pair.

pub mod corpus;
pub mod engine;
pub mod error;
pub mod model;
pub mod topic;
#[cfg(feature = "web")]
pub mod web;
pub mod wordplay;

pub use corpus::PhraseIndex;
pub use engine::{Joke, JokeEngine};
pub use error::{JokeError, ModelError, TopicError};
pub use model::{JokeLines, LanguageModel, OpenAiModel};
pub use topic::TopicValidator;
