use std::sync::Arc;
use std::time::Duration;

use agent_core::llm::{GenerationRequest, GenerationResponse, LlmError, MockProvider, TextProvider};
use agent_core::{EngineConfig, EngineError, GameSession, HistoryEvent, ResponseType};
use async_trait::async_trait;
use sandbox_rules::{ActionTarget, AgentId};

struct Unauthorized;

#[async_trait]
impl TextProvider for Unauthorized {
    async fn complete(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        Err(LlmError::Auth("missing key".to_string()))
    }

    fn name(&self) -> &str {
        "unauthorized"
    }
}

#[tokio::test(start_paused = true)]
async fn test_narration_is_merged_into_history() {
    let mut session = GameSession::new(EngineConfig::default())
        .with_provider(Arc::new(MockProvider::default()));
    session
        .submit_text("你好", ActionTarget::Character(AgentId::gm()))
        .unwrap();

    let entry = session.narrate(&AgentId::gm()).await.unwrap();
    match &entry.event {
        HistoryEvent::NpcResponse {
            npc_id,
            response_type,
            content,
            action_id,
            ..
        } => {
            assert_eq!(npc_id, &AgentId::gm());
            assert_eq!(*response_type, ResponseType::Dialogue);
            assert_eq!(content, "Hello, traveler! Welcome to our humble town.");
            assert!(action_id.is_some());
        }
        other => panic!("unexpected entry {other:?}"),
    }
    assert_eq!(session.history().entries().last().unwrap().id, entry.id);
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_narrations_are_spaced() {
    let mut session = GameSession::new(EngineConfig::default())
        .with_provider(Arc::new(MockProvider::default()));
    let delay = session.config().llm.request_delay();

    let start = tokio::time::Instant::now();
    session.narrate(&AgentId::gm()).await.unwrap();
    session.narrate(&AgentId::gm()).await.unwrap();
    assert!(start.elapsed() >= delay);
    assert_eq!(delay, Duration::from_millis(1000));
}

#[tokio::test]
async fn test_failed_narration_leaves_history_untouched() {
    let mut session = GameSession::new(EngineConfig::default())
        .with_provider(Arc::new(Unauthorized));
    let before = session.history().len();

    let err = session.narrate(&AgentId::gm()).await.unwrap_err();
    assert!(matches!(err, EngineError::Llm(LlmError::Auth(_))));
    assert_eq!(session.history().len(), before);

    let missing = session.narrate(&AgentId::new("ghost")).await.unwrap_err();
    assert!(matches!(missing, EngineError::AgentMissing(_)));
}

#[tokio::test]
async fn test_cancelled_generation_restarts_on_demand() {
    let mut session = GameSession::new(EngineConfig::default())
        .with_provider(Arc::new(MockProvider::default()));
    session.narrate(&AgentId::gm()).await.unwrap();
    session.cancel_generation();
    // A fresh queue is started for the next request.
    assert!(session.narrate(&AgentId::gm()).await.is_ok());
}
