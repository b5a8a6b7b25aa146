//! Plain HTTP handlers: session creation and the three read-only
//! operational endpoints. Grounded on `gateway/src/api/chat.rs`'s
//! extractor/response shape.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use rtd_domain::{CharacterControl, EmotionControl, PersonaPreset, SystemCapabilities, SystemHealth, TurnControl};

use crate::state::AppState;

/// `POST /v1/sessions` request body — spec.md §6: `{ persona_id?,
/// emotion?, character? }`. An unknown `persona_id` falls back to
/// `"default"` (handled by `persona_defaults`, not here).
#[derive(Debug, Deserialize, Default)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub persona_id: Option<String>,
    #[serde(default)]
    pub emotion: Option<EmotionControl>,
    #[serde(default)]
    pub character: Option<CharacterControl>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Json<CreateSessionResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let persona_id = body.persona_id.as_deref().unwrap_or("default");
    let id = uuid::Uuid::new_v4().to_string();
    let session = state
        .registry
        .create(id.clone(), persona_id, state.config.drift.window);

    // A request-supplied emotion/character overrides the persona default
    // for this session's pending control, same resolution rule `resolve`
    // applies per-turn (spec.md §6's creation body is just a convenience
    // for setting the first turn's override up front).
    if body.emotion.is_some() || body.character.is_some() {
        let mut s = session.lock();
        let mut pending = TurnControl::default();
        if let Some(emotion) = body.emotion {
            pending.emotion = emotion;
        }
        if let Some(character) = body.character {
            pending.character = character;
        }
        s.pending_control = Some(pending);
    }

    Json(CreateSessionResponse { session_id: id })
}

pub async fn health(State(state): State<AppState>) -> Json<SystemHealth> {
    Json(state.generators.health().await)
}

pub async fn capabilities(State(state): State<AppState>) -> Json<SystemCapabilities> {
    Json(state.generators.capabilities())
}

#[derive(Debug, Serialize)]
pub struct PersonaSummary {
    pub id: String,
    pub display_name: String,
    pub defaults: TurnControl,
}

impl From<PersonaPreset> for PersonaSummary {
    fn from(p: PersonaPreset) -> Self {
        Self {
            id: p.id.to_string(),
            display_name: p.display_name.to_string(),
            defaults: p.defaults,
        }
    }
}

pub async fn personas() -> Json<Vec<PersonaSummary>> {
    Json(
        rtd_domain::list_personas()
            .into_iter()
            .map(PersonaSummary::from)
            .collect(),
    )
}

/// Shared 404 body shape for a missing session, used by both the
/// session-creation 404 path (none today — creation never 404s) and the
/// WS upgrade handler.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

pub fn session_not_found(id: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            code: "session_not_found",
            message: format!("session not found: {id}"),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtd_domain::config::Config;
    use rtd_generator::{MockAvatarGenerator, MockLlmGenerator, MockTtsGenerator};
    use rtd_orchestrator::GeneratorSet;
    use std::sync::Arc;

    fn test_state() -> AppState {
        let generators = Arc::new(GeneratorSet::Split {
            llm: Arc::new(MockLlmGenerator::default()),
            tts: Arc::new(MockTtsGenerator::default()),
            avatar: Arc::new(MockAvatarGenerator::default()),
        });
        AppState::new(Arc::new(Config::default()), generators)
    }

    #[tokio::test]
    async fn create_session_without_body_uses_default_persona() {
        let state = test_state();
        let Json(resp) = create_session(State(state.clone()), None).await;
        let session = state.registry.get(&resp.session_id).expect("session exists");
        assert_eq!(session.lock().persona_id, "default");
    }

    #[tokio::test]
    async fn create_session_with_persona_id() {
        let state = test_state();
        let Json(resp) = create_session(
            State(state.clone()),
            Some(Json(CreateSessionRequest {
                persona_id: Some("excited".into()),
                ..Default::default()
            })),
        )
        .await;
        let session = state.registry.get(&resp.session_id).expect("session exists");
        assert_eq!(session.lock().persona_id, "excited");
    }

    #[tokio::test]
    async fn health_reports_all_three_generators() {
        let state = test_state();
        let Json(h) = health(State(state)).await;
        assert!(h.llm.healthy);
        assert!(h.tts.healthy);
        assert!(h.avatar.healthy);
    }

    #[tokio::test]
    async fn personas_lists_all_four_presets() {
        let Json(list) = personas().await;
        assert_eq!(list.len(), 4);
        assert!(list.iter().any(|p| p.id == "default"));
    }
}
