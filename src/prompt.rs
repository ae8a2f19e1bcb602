//! The fixed instruction template and per-request prompt composition.

use crate::types::Passage;

/// System instructions for the assistant persona.
const SYSTEM_PROMPT: &str = "You are a medical assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, say that you don't know. \
Use three sentences maximum and keep the answer concise.";

/// A prompt ready to hand to the generator: fixed instructions plus
/// retrieved context in the preamble, the raw question as the user turn.
#[derive(Clone, Debug, PartialEq)]
pub struct ComposedPrompt {
    pub preamble: String,
    pub question: String,
}

/// Template binding the system instructions to per-request context.
#[derive(Clone, Debug)]
pub struct PromptTemplate {
    system: String,
}

impl PromptTemplate {
    /// The medical question-answering persona used in production.
    pub fn medical_assistant() -> Self {
        Self::new(SYSTEM_PROMPT)
    }

    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
        }
    }

    /// Stuffs the retrieved passages under the system instructions and
    /// carries the question through unchanged. Built fresh per request.
    pub fn compose(&self, passages: &[Passage], question: &str) -> ComposedPrompt {
        let mut preamble = self.system.clone();
        for passage in passages {
            preamble.push_str("\n\n");
            preamble.push_str(&passage.content);
        }

        ComposedPrompt {
            preamble,
            question: question.to_string(),
        }
    }
}
