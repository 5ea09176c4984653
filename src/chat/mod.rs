//! Conversational answering: turns, bounded memory and the answerer

mod answerer;
mod memory;

pub use answerer::{Answer, ConversationalAnswerer, ANSWER_POLICY, CONDENSE_POLICY};
pub use memory::{estimate_tokens, ChatMemory};

use crate::evaluation::Evaluation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    /// Only ever set on assistant turns
    #[serde(rename = "eval", default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            evaluation: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            evaluation: None,
        }
    }

    pub fn with_evaluation(mut self, evaluation: Evaluation) -> Self {
        self.evaluation = Some(evaluation);
        self
    }
}
