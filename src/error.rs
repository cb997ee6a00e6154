use thiserror::Error;

/// Failures reported by the language-model collaborator.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The reply arrived but could not be parsed into the expected shape.
    #[error("model reply for {endpoint} was not in the expected format: {reply:?}")]
    ResponseFormat {
        endpoint: &'static str,
        reply: String,
    },

    /// The request failed in a way that could succeed on a later attempt.
    #[error("model request failed and may be retried: {reason}")]
    Retriable { reason: String },

    /// The request cannot succeed no matter how often it is retried.
    #[error("model request cannot succeed as issued: {reason}")]
    Permanent { reason: String },
}

/// Reasons a topic is rejected before any strategy runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("no topic was provided")]
    Missing,

    #[error("topic is longer than {max} characters")]
    TooLong { max: usize },

    #[error("topic {topic:?} is not something to joke about")]
    Inappropriate { topic: String },
}

/// Everything that can go wrong while generating a joke.
#[derive(Debug, Error)]
pub enum JokeError {
    /// No candidate or strategy produced a usable joke.
    #[error("could not find a joke")]
    NoJokeFound,

    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl JokeError {
    /// Whether strategy iteration may absorb this failure and move on to the
    /// next candidate. Everything else aborts the call.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            JokeError::NoJokeFound | JokeError::Model(ModelError::ResponseFormat { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_joke_and_format_errors_are_recoverable() {
        assert!(JokeError::NoJokeFound.is_recoverable());
        assert!(
            JokeError::Model(ModelError::ResponseFormat {
                endpoint: "sound-alike",
                reply: "gibberish".to_string(),
            })
            .is_recoverable()
        );
    }

    #[test]
    fn service_and_topic_errors_abort() {
        let retriable = JokeError::Model(ModelError::Retriable {
            reason: "timeout".to_string(),
        });
        let permanent = JokeError::Model(ModelError::Permanent {
            reason: "bad key".to_string(),
        });
        let topic = JokeError::Topic(TopicError::Missing);
        assert!(!retriable.is_recoverable());
        assert!(!permanent.is_recoverable());
        assert!(!topic.is_recoverable());
    }
}
