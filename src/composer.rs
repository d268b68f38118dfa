//! Response composer — assembles outward-facing instructions and delegates
//! free-text generation to the LLM provider.
//!
//! The chat instruction is built from fixed sections in a fixed order (role
//! preamble, profile, history, retrieved knowledge, current message) so the
//! prompt shape is stable whatever the retrieval outcome. Model failures
//! degrade to a sentinel reply; the conversation keeps flowing.

use std::sync::Arc;

use tracing::warn;

use crate::engine::profile::Profile;
use crate::error::LlmError;
use crate::llm::{CompletionRequest, LlmProvider};
use crate::retrieval::SnippetIndex;
use crate::store::ChatExchange;

/// Returned in place of a reply when the model call fails outright.
pub const UPSTREAM_ERROR_REPLY: &str = "Error: Unable to get response.";

/// Placeholder for the retrieval section when nothing relevant is found.
pub const NO_RELEVANT_DATA: &str = "No relevant data found.";

const COACH_SYSTEM: &str = "You are a short, collaborative running coach. \
    Your responses must be under 50 words and always end with a follow-up question.";

const MAX_REPLY_TOKENS: u32 = 120;

pub struct Composer {
    llm: Arc<dyn LlmProvider>,
    retrieval: Option<Arc<dyn SnippetIndex>>,
    top_k: usize,
}

impl Composer {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        retrieval: Option<Arc<dyn SnippetIndex>>,
        top_k: usize,
    ) -> Self {
        Self {
            llm,
            retrieval,
            top_k,
        }
    }

    /// Generate a coaching reply for a general-chat turn.
    ///
    /// On transport failure the sentinel reply is returned instead — it is
    /// appended to history like any other response.
    pub async fn chat_reply(
        &self,
        profile: &Profile,
        history: &[ChatExchange],
        message: &str,
    ) -> String {
        let instruction = self.build_chat_instruction(profile, history, message).await;
        let request = CompletionRequest::new(instruction)
            .with_system(COACH_SYSTEM)
            .with_max_tokens(MAX_REPLY_TOKENS);

        match self.llm.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!(error = %e, "Chat generation failed, degrading to sentinel reply");
                UPSTREAM_ERROR_REPLY.to_string()
            }
        }
    }

    /// Ask the model to rephrase a workflow step draft as three candidate
    /// phrasings. Raw model text is returned; the workflow engine parses it
    /// and falls back to a local rewrite when this fails.
    pub async fn refine_step(
        &self,
        step_name: &str,
        description: &str,
        input: &str,
    ) -> Result<String, LlmError> {
        let instruction = format!(
            "The user is working through the \"{step_name}\" stage of their project plan.\n\
             Stage description: {description}\n\n\
             Their draft input:\n{input}\n\n\
             Rewrite the draft as exactly three alternative phrasings, one per line, \
             each formatted as `Option N: <phrasing>`. After the three options, ask \
             which option works best. No other text."
        );
        let request = CompletionRequest::new(instruction)
            .with_max_tokens(MAX_REPLY_TOKENS)
            .with_temperature(0.4);
        let response = self.llm.complete(request).await?;
        Ok(response.content)
    }

    async fn build_chat_instruction(
        &self,
        profile: &Profile,
        history: &[ChatExchange],
        message: &str,
    ) -> String {
        let profile_text = match serde_json::to_string_pretty(profile) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to serialize profile for prompt");
                "{}".to_string()
            }
        };

        let formatted_history = history
            .iter()
            .map(|entry| format!("You: {}\nCoach: {}", entry.user, entry.bot))
            .collect::<Vec<_>>()
            .join("\n");

        let snippets = match &self.retrieval {
            Some(index) => index.search(message, self.top_k).await,
            None => Vec::new(),
        };
        let retrieved_text = if snippets.is_empty() {
            NO_RELEVANT_DATA.to_string()
        } else {
            snippets.join("\n")
        };

        format!(
            "**ROLE & OBJECTIVE:**\n\
             You are a **collaborative running coach** who provides **brief, engaging \
             responses**. You **MUST keep answers under 50 words** and **ALWAYS end with \
             a follow-up question**. DO NOT give lists or detailed breakdowns. Instead, \
             ask the user about their preferences.\n\n\
             **USER PROFILE:**\n{profile_text}\n\n\
             **PREVIOUS CONVERSATION (Context):**\n{formatted_history}\n\n\
             **RETRIEVED KNOWLEDGE:**\n{retrieved_text}\n\n\
             **CURRENT USER MESSAGE:**\n{message}\n\n\
             **COACH RESPONSE:**\n\
             You MUST keep your response **under 50 words** and **always ask a follow-up \
             question to ask if the runner feels good with the recommendation**."
        )
    }
}
