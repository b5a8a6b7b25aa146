use rtd_domain::cancel::CancelToken;
use rtd_domain::TurnControl;

use crate::drift::DriftTracker;

/// A turn's role in conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Finite states a session can be in. `StreamingOutput` is an alias any
/// component may treat as equivalent to `TtsRun`/`AvatarRun` once any
/// media has been enqueued — it isn't a distinct transition target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    LlmRun,
    CtrlMerge,
    TtsRun,
    AvatarRun,
    StreamingOutput,
    TurnComplete,
    TurnError,
    Interrupted,
}

/// The legal transitions from spec.md §4.4. `transition` asserts against
/// this table — an illegal target is a programmer error, not a
/// recoverable condition. `Interrupted` and `TurnError` are reachable
/// from any non-terminal state, matching barge-in and generator
/// failure, which can happen at any suspension point.
fn is_legal_transition(from: SessionState, to: SessionState) -> bool {
    use SessionState::*;
    if matches!(to, Interrupted | TurnError) {
        return !matches!(from, Idle | TurnComplete);
    }
    matches!(
        (from, to),
        (Idle, LlmRun)
            | (LlmRun, TtsRun)
            | (LlmRun, CtrlMerge)
            | (CtrlMerge, TtsRun)
            | (TtsRun, AvatarRun)
            | (AvatarRun, TtsRun)
            | (TtsRun, TurnComplete)
            | (AvatarRun, TurnComplete)
            | (LlmRun, TurnComplete)
            | (TurnComplete, Idle)
            | (Interrupted, Idle)
            | (TurnError, Idle)
            | (LlmRun, StreamingOutput)
            | (CtrlMerge, StreamingOutput)
            | (StreamingOutput, TtsRun)
            | (StreamingOutput, AvatarRun)
    )
}

/// Per-client state: identity, conversation history, effective persona,
/// pending control, current turn handle, drift tracker, and status.
/// Mutated only by the single connection task that owns it or by the
/// turn task it spawns.
pub struct Session {
    pub id: String,
    pub persona_id: String,
    pub persona_name: String,
    pub persona_defaults: TurnControl,
    pub history: Vec<(Role, String)>,
    pub pending_control: Option<TurnControl>,
    pub current_turn: Option<CancelToken>,
    pub drift: DriftTracker,
    pub state: SessionState,
}

impl Session {
    pub fn new(
        id: String,
        persona_id: String,
        persona_name: String,
        persona_defaults: TurnControl,
        drift_window: usize,
    ) -> Self {
        Self {
            id,
            persona_id,
            persona_name,
            persona_defaults,
            history: Vec::new(),
            pending_control: None,
            current_turn: None,
            drift: DriftTracker::new(drift_window),
            state: SessionState::Idle,
        }
    }

    /// Assert-only state setter. Panics on an illegal transition — the
    /// orchestrator is expected to drive transitions correctly by
    /// construction, so a violation here is a bug, not user input.
    pub fn transition(&mut self, to: SessionState) {
        assert!(
            is_legal_transition(self.state, to),
            "illegal session transition: {:?} -> {:?}",
            self.state,
            to
        );
        tracing::trace!(session_id = %self.id, from = ?self.state, to = ?to, "session transition");
        self.state = to;
    }

    pub fn append_history(&mut self, role: Role, content: impl Into<String>) {
        self.history.push((role, content.into()));
    }

    /// Flip the current turn's cancel flag and return to `IDLE`. The
    /// turn task observes the flag on its own at its next suspension
    /// point and winds down there; this only updates local state, it
    /// does not wait for that task to actually finish. Safe to call
    /// when no turn is running.
    ///
    /// Callers must hold `&mut self` (i.e. the session lock) across the
    /// whole `token.cancel()` + transition sequence, as this does — the
    /// turn task relies on that same lock to check `is_cancelled()` and
    /// transition atomically (`rtd-orchestrator`'s `transition_if_live`),
    /// so whichever side acquires the lock first wins the race outright
    /// instead of a stale turn asserting on an illegal transition.
    pub fn cancel_current_turn(&mut self) {
        if let Some(token) = self.current_turn.take() {
            token.cancel();
            self.transition(SessionState::Interrupted);
            self.transition(SessionState::Idle);
        }
    }
}
