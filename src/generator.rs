//! Answer generation through the hosted chat-completion model.

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::prompt::ComposedPrompt;
use crate::types::ChatError;

/// Deadline for a single completion call.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);
/// Completion attempts per request (initial call + one retry).
const MAX_ATTEMPTS: usize = 2;
/// Pause between attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

const TEMPERATURE: f64 = 0.4;

/// Seam between the pipeline and the hosted model.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produces a free-text answer for the composed prompt.
    async fn generate(&self, prompt: &ComposedPrompt) -> Result<String, ChatError>;
}

/// Generator backed by a rig completion model.
///
/// Each call builds a fresh request: the composed preamble carries the
/// instructions and retrieved context, the user turn carries the raw
/// question. Calls are bounded by a deadline and retried once on
/// transient failure.
pub struct ChatGenerator<M>
where
    M: CompletionModel,
{
    model: M,
    temperature: f64,
    deadline: Duration,
    max_attempts: usize,
}

impl<M> ChatGenerator<M>
where
    M: CompletionModel,
{
    pub fn new(model: M) -> Self {
        Self {
            model,
            temperature: TEMPERATURE,
            deadline: COMPLETION_TIMEOUT,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    async fn attempt(&self, prompt: &ComposedPrompt) -> Result<String, ChatError> {
        let request = self
            .model
            .completion_request(Message::user(prompt.question.clone()))
            .preamble(prompt.preamble.clone())
            .temperature(self.temperature)
            .build();

        let response = timeout(self.deadline, self.model.completion(request))
            .await
            .map_err(|_| ChatError::Timeout(self.deadline))?
            .map_err(|err| ChatError::Completion(err.to_string()))?;

        let answer: String = response
            .choice
            .into_iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if answer.is_empty() {
            return Err(ChatError::Completion(
                "reply contained no text parts".to_string(),
            ));
        }
        Ok(answer)
    }
}

#[async_trait]
impl<M> Generator for ChatGenerator<M>
where
    M: CompletionModel,
{
    async fn generate(&self, prompt: &ComposedPrompt) -> Result<String, ChatError> {
        let mut last_error = ChatError::Completion("no completion attempts made".to_string());

        for attempt in 1..=self.max_attempts {
            match self.attempt(prompt).await {
                Ok(answer) => return Ok(answer),
                Err(err) => {
                    warn!(attempt, error = %err, "completion attempt failed");
                    last_error = err;
                }
            }
            if attempt < self.max_attempts {
                sleep(RETRY_BACKOFF).await;
            }
        }

        Err(last_error)
    }
}
