//! Prompt assembly and answer generation.

use std::sync::Arc;

use crate::error::CompletionError;
use crate::models::{ConversationTurn, Role};
use crate::services::completion::{ChatMessage, CompletionProvider};
use crate::utils::retry::{RetryPolicy, with_retry};

/// Grounding instruction: the model answers from supplied content only and
/// must say when that content is insufficient.
const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about a PDF \
document.\n\
Guidelines:\n\
- Answer only from the document content provided below\n\
- If the answer is not in the provided content, say so explicitly\n\
- Cite page numbers when referencing specific content\n\
- Keep responses concise but informative";

pub struct AnswerComposer {
    provider: Arc<dyn CompletionProvider>,
    history_turns: usize,
    retry: RetryPolicy,
}

impl AnswerComposer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        history_turns: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            history_turns: history_turns as usize,
            retry,
        }
    }

    /// Build the full prompt: grounding instruction with the context block,
    /// the trailing window of conversation history, then the question.
    pub fn build_messages(
        &self,
        question: &str,
        context: &str,
        history: &[ConversationTurn],
    ) -> Vec<ChatMessage> {
        let mut system = SYSTEM_PROMPT.to_string();
        if !context.is_empty() {
            system.push_str("\n\nRelevant document content:\n");
            system.push_str(context);
        }

        let mut messages = vec![ChatMessage::system(system)];

        let skip = history.len().saturating_sub(self.history_turns);
        for turn in &history[skip..] {
            messages.push(match turn.role {
                Role::User => ChatMessage::user(turn.text.clone()),
                Role::Assistant => ChatMessage::assistant(turn.text.clone()),
            });
        }

        messages.push(ChatMessage::user(question.to_string()));
        messages
    }

    /// Generate an answer grounded in the supplied context. The caller must
    /// not commit the question to any visible transcript until this returns
    /// successfully.
    pub async fn compose(
        &self,
        question: &str,
        context: &str,
        history: &[ConversationTurn],
    ) -> Result<String, CompletionError> {
        let messages = self.build_messages(question, context, history);
        let answer = with_retry(&self.retry, || self.provider.complete(messages.clone()))
            .await
            .into_result()?;
        tracing::debug!(answer_len = answer.len(), "completion returned");
        Ok(answer)
    }
}
