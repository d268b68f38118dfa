//! Field-completion engine — drives a profile to completeness, one question
//! per outstanding field, then opens up general coaching chat.
//!
//! Conversation and profile-completion are mutually exclusive: until the
//! profile is complete, every inbound message is either captured as the name
//! (the very first exchange) or answered with a reminder of the outstanding
//! field. Only a complete profile reaches the composer and the model.

use std::sync::Arc;

use tracing::debug;

use crate::composer::Composer;
use crate::error::{EngineError, Error};
use crate::store::{ChatExchange, Store};

use super::profile::{FieldValue, Profile, ProfileField};
use super::rules::{RuleSet, UtteranceClass};

/// Fixed clarification for vague messages; sent without a model call.
const CLARIFY_REPLY: &str =
    "Can you clarify what you're looking for? I want to make sure I give you the best answer.";

/// What a session-start or profile-update call tells the caller.
#[derive(Debug, Clone)]
pub struct SessionPrompt {
    pub message: String,
    pub next_field: Option<ProfileField>,
    pub profile_complete: bool,
}

/// Outcome of a submitted chat turn. `history` is only present on turns
/// that went through the general conversation path.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub next_field: Option<ProfileField>,
    pub profile_complete: bool,
    pub history: Option<Vec<ChatExchange>>,
}

/// Read-only engine state for the status endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProfileStatus {
    pub user_id: String,
    pub profile: Profile,
    pub is_complete: bool,
    pub next_empty_field: Option<ProfileField>,
    pub next_prompt: Option<&'static str>,
}

pub struct CompletionEngine {
    store: Arc<dyn Store>,
    composer: Arc<Composer>,
    rules: RuleSet,
}

impl CompletionEngine {
    pub fn new(store: Arc<dyn Store>, composer: Arc<Composer>) -> Self {
        Self {
            store,
            composer,
            rules: RuleSet::coaching_defaults(),
        }
    }

    /// Start (or resume) a session. Read-only: calling this twice without an
    /// intervening turn yields the same prompt.
    pub async fn start_session(&self, identity: &str) -> Result<SessionPrompt, Error> {
        let profile = self.store.load_profile(identity).await?;

        if profile.is_complete() {
            return Ok(SessionPrompt {
                message: format!(
                    "Hello {}, how are you today? How can I help you with your running?",
                    profile.name
                ),
                next_field: None,
                profile_complete: true,
            });
        }

        // The name gates everything else: personalized prompts need it, so
        // the no-name branch always asks for the name first.
        let (next_field, prompt) = profile
            .next_missing()
            .unwrap_or((ProfileField::Name, ProfileField::Name.prompt()));

        if !profile.name.trim().is_empty() {
            Ok(SessionPrompt {
                message: format!(
                    "Hello {}, I see your profile isn't complete. {prompt}",
                    profile.name
                ),
                next_field: Some(next_field),
                profile_complete: false,
            })
        } else {
            Ok(SessionPrompt {
                message: "Hello, thanks for logging in. Let me get to know you so I can \
                          provide better help. What's your name?"
                    .to_string(),
                next_field: Some(ProfileField::Name),
                profile_complete: false,
            })
        }
    }

    /// Process one inbound chat message.
    pub async fn submit_turn(&self, identity: &str, message: &str) -> Result<TurnOutcome, Error> {
        let message = message.trim();
        if message.is_empty() {
            return Err(EngineError::EmptyMessage.into());
        }

        let mut profile = self.store.load_profile(identity).await?;

        if !profile.is_complete() {
            return self.completion_turn(&mut profile, message).await;
        }

        // Complete profile: general conversation path.
        match self.rules.classify(message) {
            UtteranceClass::Vague => {
                let exchange = ChatExchange {
                    user: message.to_string(),
                    bot: CLARIFY_REPLY.to_string(),
                };
                self.store.append_exchange(identity, exchange).await?;
                let history = self.store.chat_history(identity).await?;
                return Ok(TurnOutcome {
                    response: CLARIFY_REPLY.to_string(),
                    next_field: None,
                    profile_complete: true,
                    history: Some(history),
                });
            }
            UtteranceClass::OffTopic => {
                debug!(identity, "User sounds frustrated this turn");
            }
            _ => {}
        }

        let history = self.store.chat_history(identity).await?;
        let mut reply = self.composer.chat_reply(&profile, &history, message).await;

        if !profile.name.is_empty() && reply.contains("Hello") {
            reply = reply.replace("Hello", &format!("Hello {}", profile.name));
        }

        profile.last_check_in = chrono::Utc::now().format("%Y-%m-%d").to_string();
        self.store.save_profile(&profile).await?;

        self.store
            .append_exchange(
                identity,
                ChatExchange {
                    user: message.to_string(),
                    bot: reply.clone(),
                },
            )
            .await?;
        let history = self.store.chat_history(identity).await?;

        Ok(TurnOutcome {
            response: reply,
            next_field: None,
            profile_complete: true,
            history: Some(history),
        })
    }

    /// A turn received while the profile is still incomplete. The first
    /// ever message is captured verbatim as the name; after that, messages
    /// only get a reminder of the outstanding field.
    async fn completion_turn(
        &self,
        profile: &mut Profile,
        message: &str,
    ) -> Result<TurnOutcome, Error> {
        let (next_field, prompt) = match profile.next_missing() {
            Some(pair) => pair,
            None => (ProfileField::Name, ProfileField::Name.prompt()),
        };

        if next_field == ProfileField::Name {
            profile.name = message.to_string();
            self.store.save_profile(profile).await?;

            return Ok(match profile.next_missing() {
                Some((field, prompt)) => TurnOutcome {
                    response: format!(
                        "Nice to meet you, {message}! Let's complete your profile. {prompt}"
                    ),
                    next_field: Some(field),
                    profile_complete: false,
                    history: None,
                },
                None => TurnOutcome {
                    response: format!(
                        "Nice to meet you, {message}! Your profile is now complete. \
                         How can I help you with your running?"
                    ),
                    next_field: None,
                    profile_complete: true,
                    history: None,
                },
            });
        }

        Ok(TurnOutcome {
            response: format!("Before we chat, let's complete your profile. {prompt}"),
            next_field: Some(next_field),
            profile_complete: false,
            history: None,
        })
    }

    /// Explicit name update — the one field whose emptiness is rejected.
    pub async fn set_name(&self, identity: &str, name: &str) -> Result<SessionPrompt, Error> {
        let mut profile = self.store.load_profile(identity).await?;
        profile.set_value(ProfileField::Name, FieldValue::Text(name.to_string()))?;
        self.store.save_profile(&profile).await?;
        let name = profile.name.clone();

        Ok(match profile.next_missing() {
            Some((field, prompt)) => SessionPrompt {
                message: format!(
                    "Nice to meet you, {name}! Let's complete your profile. {prompt}"
                ),
                next_field: Some(field),
                profile_complete: false,
            },
            None => SessionPrompt {
                message: format!(
                    "Nice to meet you, {name}! Your profile is now complete. \
                     How can I help you with your running?"
                ),
                next_field: None,
                profile_complete: true,
            },
        })
    }

    /// Explicit typed field update, independent of free-text inference.
    pub async fn set_field(
        &self,
        identity: &str,
        field: ProfileField,
        value: FieldValue,
    ) -> Result<SessionPrompt, Error> {
        let mut profile = self.store.load_profile(identity).await?;
        profile.set_value(field, value)?;
        self.store.save_profile(&profile).await?;

        Ok(match profile.next_missing() {
            Some((next, prompt)) => SessionPrompt {
                message: format!("Thanks! {prompt}"),
                next_field: Some(next),
                profile_complete: false,
            },
            None => SessionPrompt {
                message: "Great! Your profile is now complete. How can I help you with \
                          your running?"
                    .to_string(),
                next_field: None,
                profile_complete: true,
            },
        })
    }

    /// The stored profile, created lazily.
    pub async fn profile(&self, identity: &str) -> Result<Profile, Error> {
        Ok(self.store.load_profile(identity).await?)
    }

    /// Windowed chat history.
    pub async fn history(&self, identity: &str) -> Result<Vec<ChatExchange>, Error> {
        Ok(self.store.chat_history(identity).await?)
    }

    /// Read-only engine state for debugging.
    pub async fn status(&self, identity: &str) -> Result<ProfileStatus, Error> {
        let profile = self.store.load_profile(identity).await?;
        let next = profile.next_missing();
        Ok(ProfileStatus {
            user_id: identity.to_string(),
            is_complete: profile.is_complete(),
            next_empty_field: next.map(|(f, _)| f),
            next_prompt: next.map(|(_, p)| p),
            profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::store::JsonStore;

    struct StaticLlm(&'static str);

    #[async_trait]
    impl LlmProvider for StaticLlm {
        fn model_name(&self) -> &str {
            "static"
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
            })
        }
    }

    struct DownLlm;

    #[async_trait]
    impl LlmProvider for DownLlm {
        fn model_name(&self) -> &str {
            "down"
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "down".to_string(),
                reason: "unreachable".to_string(),
            })
        }
    }

    fn engine_with(llm: Arc<dyn LlmProvider>) -> (tempfile::TempDir, CompletionEngine) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::new(dir.path(), 10));
        let composer = Arc::new(Composer::new(llm, None, 3));
        (dir, CompletionEngine::new(store, composer))
    }

    async fn fill_profile(engine: &CompletionEngine, identity: &str) {
        engine.set_name(identity, "Alex").await.unwrap();
        for (field, value) in [
            (ProfileField::Age, FieldValue::Number(29)),
            (ProfileField::WeeklyMileage, FieldValue::Number(40)),
            (ProfileField::RaceType, FieldValue::Text("marathon".into())),
            (ProfileField::BestTime, FieldValue::Text("3:20:00".into())),
            (
                ProfileField::BestTimeDate,
                FieldValue::Text("2025-10-12".into()),
            ),
            (ProfileField::LastTime, FieldValue::Text("3:25:41".into())),
            (
                ProfileField::LastTimeDate,
                FieldValue::Text("2026-03-01".into()),
            ),
            (
                ProfileField::TargetRace,
                FieldValue::Text("Berlin Marathon".into()),
            ),
            (ProfileField::TargetTime, FieldValue::Text("3:10:00".into())),
            (
                ProfileField::InjuryHistory,
                FieldValue::List(vec!["none".into()]),
            ),
            (
                ProfileField::Nutrition,
                FieldValue::List(vec!["none".into()]),
            ),
        ] {
            engine.set_field(identity, field, value).await.unwrap();
        }
    }

    #[tokio::test]
    async fn fresh_identity_gets_generic_greeting_asking_for_name() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        let prompt = engine.start_session("alex@example.com").await.unwrap();
        assert!(prompt.message.contains("thanks for logging in"));
        assert_eq!(prompt.next_field, Some(ProfileField::Name));
        assert!(!prompt.profile_complete);
    }

    #[tokio::test]
    async fn start_session_is_idempotent() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        let first = engine.start_session("alex@example.com").await.unwrap();
        let second = engine.start_session("alex@example.com").await.unwrap();
        assert_eq!(first.message, second.message);
        assert_eq!(first.next_field, second.next_field);
    }

    #[tokio::test]
    async fn named_but_incomplete_profile_gets_personalized_reminder() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        engine.set_name("alex@example.com", "Alex").await.unwrap();

        let prompt = engine.start_session("alex@example.com").await.unwrap();
        assert!(prompt.message.starts_with("Hello Alex, I see your profile isn't complete."));
        assert_eq!(prompt.next_field, Some(ProfileField::Age));
    }

    #[tokio::test]
    async fn complete_profile_gets_personal_greeting() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        fill_profile(&engine, "alex@example.com").await;

        let prompt = engine.start_session("alex@example.com").await.unwrap();
        assert!(prompt.message.starts_with("Hello Alex"));
        assert!(prompt.profile_complete);
        assert_eq!(prompt.next_field, None);
    }

    #[tokio::test]
    async fn first_turn_is_captured_as_name() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        let outcome = engine.submit_turn("alex@example.com", "Alex").await.unwrap();

        assert!(outcome.response.contains("Nice to meet you, Alex!"));
        assert_eq!(outcome.next_field, Some(ProfileField::Age));

        let profile = engine.profile("alex@example.com").await.unwrap();
        assert_eq!(profile.name, "Alex");
    }

    #[tokio::test]
    async fn incomplete_profile_gates_chat_with_a_reminder() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        engine.set_name("alex@example.com", "Alex").await.unwrap();

        let outcome = engine
            .submit_turn("alex@example.com", "what workout should I do today?")
            .await
            .unwrap();
        assert!(outcome.response.starts_with("Before we chat"));
        assert_eq!(outcome.next_field, Some(ProfileField::Age));

        // The reminder repeats unchanged as long as the field stays empty.
        let again = engine
            .submit_turn("alex@example.com", "but really, any workout ideas?")
            .await
            .unwrap();
        assert_eq!(outcome.response, again.response);
        assert_eq!(again.next_field, Some(ProfileField::Age));

        // Gated turns never reach the chat log.
        assert!(engine.history("alex@example.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn complete_profile_routes_to_conversation() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm(
            "Try an easy 5 miles. Does that feel right?",
        )));
        fill_profile(&engine, "alex@example.com").await;

        let outcome = engine
            .submit_turn("alex@example.com", "what should I run today?")
            .await
            .unwrap();
        assert_eq!(outcome.response, "Try an easy 5 miles. Does that feel right?");
        assert!(outcome.profile_complete);

        let history = outcome.history.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user, "what should I run today?");
    }

    #[tokio::test]
    async fn chat_turn_stamps_last_check_in() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("Sure! How far?")));
        fill_profile(&engine, "alex@example.com").await;
        engine
            .submit_turn("alex@example.com", "plan my week")
            .await
            .unwrap();

        let profile = engine.profile("alex@example.com").await.unwrap();
        assert_eq!(profile.last_check_in.len(), 10); // YYYY-MM-DD
    }

    #[tokio::test]
    async fn greeting_replies_are_personalized() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("Hello! Ready to train?")));
        fill_profile(&engine, "alex@example.com").await;

        let outcome = engine.submit_turn("alex@example.com", "hi").await.unwrap();
        assert_eq!(outcome.response, "Hello Alex! Ready to train?");
    }

    #[tokio::test]
    async fn vague_messages_get_clarification_without_model_call() {
        let (_dir, engine) = engine_with(Arc::new(DownLlm));
        fill_profile(&engine, "alex@example.com").await;

        // DownLlm would produce the sentinel; the clarification proves the
        // model was never called.
        let outcome = engine.submit_turn("alex@example.com", "idk").await.unwrap();
        assert_eq!(outcome.response, CLARIFY_REPLY);
        assert_eq!(outcome.history.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn model_failure_degrades_to_sentinel_and_still_logs() {
        let (_dir, engine) = engine_with(Arc::new(DownLlm));
        fill_profile(&engine, "alex@example.com").await;

        let outcome = engine
            .submit_turn("alex@example.com", "plan my long run")
            .await
            .unwrap();
        assert_eq!(outcome.response, crate::composer::UPSTREAM_ERROR_REPLY);

        let history = engine.history("alex@example.com").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].bot, crate::composer::UPSTREAM_ERROR_REPLY);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        let result = engine.submit_turn("alex@example.com", "   ").await;
        assert!(matches!(
            result,
            Err(Error::Engine(EngineError::EmptyMessage))
        ));
    }

    #[tokio::test]
    async fn set_name_rejects_blank_and_leaves_profile_unchanged() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        engine.set_name("alex@example.com", "Alex").await.unwrap();

        let result = engine.set_name("alex@example.com", "  ").await;
        assert!(matches!(
            result,
            Err(Error::Engine(EngineError::InvalidField { .. }))
        ));
        let profile = engine.profile("alex@example.com").await.unwrap();
        assert_eq!(profile.name, "Alex");
    }

    #[tokio::test]
    async fn set_field_walks_schema_order() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        engine.set_name("alex@example.com", "Alex").await.unwrap();

        let prompt = engine
            .set_field("alex@example.com", ProfileField::Age, FieldValue::Number(29))
            .await
            .unwrap();
        assert_eq!(prompt.next_field, Some(ProfileField::WeeklyMileage));
        assert!(prompt.message.starts_with("Thanks!"));
    }

    #[tokio::test]
    async fn set_field_rejects_mismatched_kind() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        let result = engine
            .set_field(
                "alex@example.com",
                ProfileField::Age,
                FieldValue::Text("twenty-nine".into()),
            )
            .await;
        assert!(matches!(
            result,
            Err(Error::Engine(EngineError::InvalidField { .. }))
        ));
    }

    #[tokio::test]
    async fn completing_the_last_field_announces_completion() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        fill_profile(&engine, "alex@example.com").await;

        let status = engine.status("alex@example.com").await.unwrap();
        assert!(status.is_complete);
        assert_eq!(status.next_empty_field, None);

        // The final set_field in fill_profile reported completion; verify
        // by re-setting a field and checking the message.
        let prompt = engine
            .set_field(
                "alex@example.com",
                ProfileField::Nutrition,
                FieldValue::List(vec!["high carb".into()]),
            )
            .await
            .unwrap();
        assert!(prompt.message.contains("profile is now complete"));
        assert!(prompt.profile_complete);
    }

    #[tokio::test]
    async fn status_reports_next_outstanding_field() {
        let (_dir, engine) = engine_with(Arc::new(StaticLlm("hi")));
        engine.set_name("alex@example.com", "Alex").await.unwrap();

        let status = engine.status("alex@example.com").await.unwrap();
        assert!(!status.is_complete);
        assert_eq!(status.next_empty_field, Some(ProfileField::Age));
        assert_eq!(status.next_prompt, Some(ProfileField::Age.prompt()));
    }
}
