//! Language-model collaborator: phonetic-neighbor lookup, joke phrasing,
//! related-word lookup, and topic moderation.

use crate::error::ModelError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const LIST_TEMPERATURE: f32 = 1.0;
const JOKE_TEMPERATURE: f32 = 1.2;
const MODERATION_TEMPERATURE: f32 = 0.0;

static WORD_LIST_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\w+, )+\w+").expect("word list pattern compiles"));
static SETUP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SETUP:(.*)").expect("setup pattern compiles"));
static PUNCHLINE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"PUNCHLINE:(.*)").expect("punchline pattern compiles"));

const SOUND_ALIKE_PROMPT: &str = "\
You are a poet's assistant. You generate options for words that either rhyme with or sound like other words.
Users will supply a candidate word, and optionally a larger word or phrase containing that word.
The larger word should be used when the candidate could be pronounced in different ways.
Return a comma separated list of words. Do not say anything other than the list.

Examples:
'wave' from 'microwave' -> [knave, rave, waive, gave, save, wove]
'read' from 'bread' -> [red, led, sled, spread, bred, dread]
'read' from 'reading' -> [reed, feed, freed, reek, reap, lead, seed]";

const JOKE_PROMPT: &str = "\
You are a joke generation bot used to create simple puns. You tell jokes that ask what happens when you combine two things, and respond with a punchline that combines them as a punchline word.

Users will supply three things:
P: The punchline word
O: The word it is based on
R: The part that was substituted in

Write a joke with a setup and a punchline.

The setup should reference O and R. The punchline should contain P.

E.g.
P: fight-mare, O: nightmare, R: fight ->
SETUP:What do you call a cross between a bad dream and a battle?
PUNCHLINE:A fightmare!

P: pup-cake, O: cupcake, R: pup ->
SETUP:What dog is made in a bakery?
PUNCHLINE:A pup-cake!";

const RELATED_PROMPT: &str = "\
You are a brainstorming assistant. Users supply a topic and you reply with words related to it in meaning.
Return a comma separated list of single words. Do not say anything other than the list.

Examples:
'ocean' -> [wave, fish, tide, coral, sailor, beach]
'bakery' -> [bread, cake, oven, flour, pastry, dough]";

const MODERATION_PROMPT: &str = "\
You are a content moderator for a family-friendly joke generator. Users supply a topic.
Answer YES if the topic is inappropriate to joke about for a general audience, otherwise answer NO.
Do not say anything other than YES or NO.";

/// One rendered joke from the phrasing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JokeLines {
    pub setup: String,
    pub punchline: String,
}

/// Contract the orchestrator consumes. Implementations perform blocking
/// calls; any method may fail with a retriable or permanent service error
/// instead of returning a value.
pub trait LanguageModel: Send + Sync {
    /// Words that sound like `word`, optionally pronounced as it is within
    /// `context`.
    fn phonetic_neighbors(
        &self,
        word: &str,
        context: Option<&str>,
    ) -> Result<Vec<String>, ModelError>;

    /// Phrases a setup/punchline pair around the substituted word.
    fn phrase_joke(
        &self,
        punchline_word: &str,
        original: &str,
        change: &str,
    ) -> Result<JokeLines, ModelError>;

    /// Words related in meaning to `topic`.
    fn related_words(&self, topic: &str) -> Result<Vec<String>, ModelError>;

    /// Moderation check; `true` flags the topic as unusable.
    fn is_inappropriate(&self, topic: &str) -> Result<bool, ModelError>;
}

/// Chat Completions client for the OpenAI API.
#[derive(Clone)]
pub struct OpenAiModel {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiModel {
    pub fn new(api_key: String) -> Self {
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_model(api_key: String, model: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY` (and optionally `OPENAI_MODEL`) from the
    /// environment.
    pub fn from_env() -> Result<Self, ModelError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| ModelError::Permanent {
            reason: "OPENAI_API_KEY environment variable not set".to_string(),
        })?;
        Ok(Self::new(api_key))
    }

    /// Points the client at a different API root, e.g. a compatible proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    fn chat(
        &self,
        endpoint: &'static str,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String, ModelError> {
        let body = json!({
            "model": &self.model,
            "temperature": temperature,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        #[derive(Deserialize)]
        struct Message {
            content: String,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let parsed: ApiResponse = response.json().map_err(|err| ModelError::ResponseFormat {
            endpoint,
            reply: format!("undecodable response body: {err}"),
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ModelError::ResponseFormat {
                endpoint,
                reply: "response carried no choices".to_string(),
            })?;
        debug!(endpoint, reply = %content, "model replied");
        Ok(content)
    }
}

impl LanguageModel for OpenAiModel {
    fn phonetic_neighbors(
        &self,
        word: &str,
        context: Option<&str>,
    ) -> Result<Vec<String>, ModelError> {
        let user = match context {
            Some(context) => format!("'{word}' from '{context}'"),
            None => format!("'{word}'"),
        };
        let reply = self.chat("sound-alike", SOUND_ALIKE_PROMPT, &user, LIST_TEMPERATURE)?;
        parse_word_list("sound-alike", &reply)
    }

    fn phrase_joke(
        &self,
        punchline_word: &str,
        original: &str,
        change: &str,
    ) -> Result<JokeLines, ModelError> {
        let user = format!("P:'{punchline_word}', O:'{original}', R:'{change}'");
        let reply = self.chat("joke", JOKE_PROMPT, &user, JOKE_TEMPERATURE)?;
        parse_joke_lines(&reply)
    }

    fn related_words(&self, topic: &str) -> Result<Vec<String>, ModelError> {
        let user = format!("'{topic}'");
        let reply = self.chat("related-words", RELATED_PROMPT, &user, LIST_TEMPERATURE)?;
        parse_word_list("related-words", &reply)
    }

    fn is_inappropriate(&self, topic: &str) -> Result<bool, ModelError> {
        let reply = self.chat(
            "moderation",
            MODERATION_PROMPT,
            topic,
            MODERATION_TEMPERATURE,
        )?;
        parse_verdict(&reply)
    }
}

fn classify_transport(err: reqwest::Error) -> ModelError {
    if err.is_timeout() || err.is_connect() {
        ModelError::Retriable {
            reason: err.to_string(),
        }
    } else {
        ModelError::Permanent {
            reason: err.to_string(),
        }
    }
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> ModelError {
    let reason = format!("service returned {status}: {body}");
    if status == reqwest::StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        ModelError::Retriable { reason }
    } else {
        // Rate limiting (429) lands here too; it is not retried.
        ModelError::Permanent { reason }
    }
}

/// Extracts exactly one comma-separated word list from a reply.
fn parse_word_list(endpoint: &'static str, reply: &str) -> Result<Vec<String>, ModelError> {
    let lists: Vec<&str> = WORD_LIST_PATTERN
        .find_iter(reply)
        .map(|found| found.as_str())
        .collect();
    match lists.as_slice() {
        [list] => Ok(list.split(", ").map(str::to_string).collect()),
        _ => Err(ModelError::ResponseFormat {
            endpoint,
            reply: reply.to_string(),
        }),
    }
}

/// Extracts exactly one `SETUP:` and one `PUNCHLINE:` line from a reply.
fn parse_joke_lines(reply: &str) -> Result<JokeLines, ModelError> {
    let setups: Vec<_> = SETUP_PATTERN.captures_iter(reply).collect();
    let punchlines: Vec<_> = PUNCHLINE_PATTERN.captures_iter(reply).collect();
    match (setups.as_slice(), punchlines.as_slice()) {
        ([setup], [punchline]) => Ok(JokeLines {
            setup: setup[1].trim().to_string(),
            punchline: punchline[1].trim().to_string(),
        }),
        _ => Err(ModelError::ResponseFormat {
            endpoint: "joke",
            reply: reply.to_string(),
        }),
    }
}

/// Reads a moderation verdict; anything other than YES or NO is unparseable.
fn parse_verdict(reply: &str) -> Result<bool, ModelError> {
    match reply
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .to_ascii_uppercase()
        .as_str()
    {
        "YES" => Ok(true),
        "NO" => Ok(false),
        _ => Err(ModelError::ResponseFormat {
            endpoint: "moderation",
            reply: reply.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_model_overrides_the_default() {
        let client = OpenAiModel::with_model("test-key".to_string(), "gpt-4o-mini");
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn word_list_parses_a_single_list() {
        let words = parse_word_list("sound-alike", "[knave, rave, waive, wove]").expect("parses");
        assert_eq!(words, ["knave", "rave", "waive", "wove"]);
    }

    #[test]
    fn word_list_rejects_prose() {
        assert!(parse_word_list("sound-alike", "I could not think of any words.").is_err());
    }

    #[test]
    fn word_list_rejects_two_lists() {
        let reply = "Here you go: red, led, sled. Or maybe: reed, feed, freed.";
        assert!(parse_word_list("sound-alike", reply).is_err());
    }

    #[test]
    fn joke_lines_parse() {
        let reply = "SETUP:What dog is made in a bakery?\nPUNCHLINE:A pup-cake!";
        let lines = parse_joke_lines(reply).expect("parses");
        assert_eq!(lines.setup, "What dog is made in a bakery?");
        assert_eq!(lines.punchline, "A pup-cake!");
    }

    #[test]
    fn joke_lines_require_both_parts() {
        assert!(parse_joke_lines("SETUP:A setup with no punchline").is_err());
        assert!(parse_joke_lines("A joke with neither label").is_err());
    }

    #[test]
    fn joke_lines_reject_duplicates() {
        let reply = "SETUP:one\nPUNCHLINE:two\nSETUP:three\nPUNCHLINE:four";
        assert!(parse_joke_lines(reply).is_err());
    }

    #[test]
    fn verdicts_parse() {
        assert!(parse_verdict("YES").expect("yes"));
        assert!(!parse_verdict("no.").expect("no"));
        assert!(parse_verdict("It depends on the audience.").is_err());
    }

    #[test]
    fn missing_api_key_is_permanent() {
        // from_env reads the real environment, so only exercise the error
        // path when the variable is genuinely absent.
        if std::env::var("OPENAI_API_KEY").is_err() {
            match OpenAiModel::from_env() {
                Err(ModelError::Permanent { .. }) => {}
                Err(other) => panic!("expected Permanent, got {other:?}"),
                Ok(_) => panic!("expected an error"),
            }
        }
    }
}
