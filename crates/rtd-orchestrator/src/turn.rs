//! The turn orchestrator (C6) — runs one turn in either split-stage or
//! combined mode, drives the three generator stages, and tears the
//! session back down to `IDLE` on completion, cancellation, or failure.
//!
//! Entry point: [`spawn_turn`] registers a cancel token on the session,
//! spawns the turn body, and supervises it for uncaught panics (mirrors
//! `gateway/src/runtime/turn.rs`'s spawn/span/cleanup shape).

use std::sync::Arc;

use futures_util::{FutureExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::Instrument;

use rtd_domain::cancel::CancelToken;
use rtd_domain::config::TurnConfig;
use rtd_domain::{AudioChunk, CharacterControl, Error, OutboundEvent, Result, TurnControl};
use rtd_generator::{
    AvatarGenerator, CombinedEvent, CombinedGenerator, GeneratorContext, LlmGenerator, Role as GenRole,
    TtsGenerator,
};
use rtd_session::session::{Role as SessionRole, Session, SessionState};

// ─────────────────────────────────────────────────────────────────────
// Generator bundle
// ─────────────────────────────────────────────────────────────────────

/// Which stage set a session's turns run against. The avatar generator
/// is shared by both modes; split mode additionally needs a separate
/// LLM and TTS generator, combined mode needs the fused transport.
pub enum GeneratorSet {
    Split {
        llm: Arc<dyn LlmGenerator>,
        tts: Arc<dyn TtsGenerator>,
        avatar: Arc<dyn AvatarGenerator>,
    },
    Combined {
        combined: Arc<dyn CombinedGenerator>,
        avatar: Arc<dyn AvatarGenerator>,
    },
}

impl GeneratorSet {
    /// Aggregate health across whichever generators this set holds.
    /// Combined mode reports its single transport's health for both
    /// `llm` and `tts`, since there is no separate TTS leg to probe.
    pub async fn health(&self) -> rtd_domain::SystemHealth {
        match self {
            GeneratorSet::Split { llm, tts, avatar } => rtd_domain::SystemHealth {
                llm: llm.health().await,
                tts: tts.health().await,
                avatar: avatar.health().await,
            },
            GeneratorSet::Combined { combined, avatar } => {
                let combined_health = combined.health().await;
                rtd_domain::SystemHealth {
                    llm: combined_health.clone(),
                    tts: combined_health,
                    avatar: avatar.health().await,
                }
            }
        }
    }

    /// Aggregate capability descriptors, same combined-mode duplication
    /// as [`GeneratorSet::health`].
    pub fn capabilities(&self) -> rtd_domain::SystemCapabilities {
        match self {
            GeneratorSet::Split { llm, tts, avatar } => rtd_domain::SystemCapabilities {
                llm: llm.capabilities(),
                tts: tts.capabilities(),
                avatar: avatar.capabilities(),
            },
            GeneratorSet::Combined { combined, avatar } => rtd_domain::SystemCapabilities {
                llm: combined.capabilities(),
                tts: combined.capabilities(),
                avatar: avatar.capabilities(),
            },
        }
    }
}

fn to_generator_role(role: SessionRole) -> GenRole {
    match role {
        SessionRole::User => GenRole::User,
        SessionRole::Assistant => GenRole::Assistant,
    }
}

fn build_context(session: &Session, frame_counter: u64, control: &TurnControl) -> GeneratorContext {
    GeneratorContext {
        persona_name: session.persona_name.clone(),
        history: session
            .history
            .iter()
            .map(|(role, content)| (to_generator_role(*role), content.clone()))
            .collect(),
        frame_counter,
        system_prompt: rtd_session::build_system_prompt(control, &session.persona_name),
    }
}

// ─────────────────────────────────────────────────────────────────────
// spawn_turn — entry point used by the connection loop (C7)
// ─────────────────────────────────────────────────────────────────────

/// Resolve the effective control, record the user turn in history,
/// register a fresh cancel token, and spawn the turn body. Returns
/// immediately; the turn runs to completion (or cancellation) on its
/// own task.
///
/// Any uncaught panic in the turn body is trapped here and converted
/// into a single `error` event, matching the connection loop's "on
/// uncaught exception, enqueue one error event" contract (spec.md
/// §4.7) without requiring the caller to know about it.
pub fn spawn_turn(
    gens: Arc<GeneratorSet>,
    session: Arc<Mutex<Session>>,
    user_text: String,
    turn_control: TurnControl,
    outbound: mpsc::Sender<OutboundEvent>,
    cfg: TurnConfig,
) {
    let turn_id = uuid::Uuid::new_v4().to_string();
    let token = CancelToken::new();

    let effective = {
        let mut s = session.lock();
        let effective = rtd_session::resolve(&turn_control, &s.persona_defaults);
        s.append_history(SessionRole::User, user_text.clone());
        s.current_turn = Some(token.clone());
        effective
    };

    let session_for_panic = session.clone();
    let outbound_for_panic = outbound.clone();
    let turn_id_for_span = turn_id.clone();

    let body = async move {
        match &*gens {
            GeneratorSet::Combined { .. } => {
                run_turn_combined(gens, session, token, turn_id, user_text, effective, outbound)
                    .await
            }
            GeneratorSet::Split { .. } => {
                run_turn_split(
                    gens, session, token, turn_id, user_text, effective, outbound, cfg,
                )
                .await
            }
        }
    };

    let span = tracing::info_span!("turn", turn_id = %turn_id_for_span);
    tokio::spawn(
        async move {
            if std::panic::AssertUnwindSafe(body).catch_unwind().await.is_err() {
                tracing::error!("turn task panicked");
                let mut s = session_for_panic.lock();
                s.current_turn = None;
                if !matches!(s.state, SessionState::Idle) {
                    s.transition(SessionState::TurnError);
                    s.transition(SessionState::Idle);
                }
                drop(s);
                let _ = outbound_for_panic
                    .send(OutboundEvent::Error {
                        code: "turn_error",
                        message: "internal orchestrator error".into(),
                    })
                    .await;
            }
        }
        .instrument(span),
    );
}

// ─────────────────────────────────────────────────────────────────────
// Shared completion/failure bookkeeping
// ─────────────────────────────────────────────────────────────────────

/// What a turn body settled into once its stages have stopped running.
enum Outcome {
    Completed(String),
    Failed(Error),
    Cancelled,
}

/// Apply the outcome to session state and emit the terminal event (if
/// any). Cancellation observed *before* a turn reached its last stage is
/// handled entirely by whoever flipped the cancel token (see
/// `Session::cancel_current_turn`) — `Outcome::Cancelled` is a no-op
/// here. But a stage can return its final `Ok` and race a barge-in that
/// lands between that return and this function's own lock acquisition;
/// both `Completed` and `Failed` re-check `cancel` under the same lock
/// `cancel_current_turn` uses, so that race resolves the same way every
/// other transition point does — whoever gets the lock first wins, and
/// a turn that loses it neither mutates state further nor emits a
/// terminal event, instead of asserting on `TurnComplete`/`TurnError`
/// from a state a concurrent barge-in already reset to `Idle`.
async fn finish_turn(
    session: &Arc<Mutex<Session>>,
    outbound: &mpsc::Sender<OutboundEvent>,
    cancel: &CancelToken,
    turn_id: String,
    outcome: Outcome,
) {
    match outcome {
        Outcome::Cancelled => {}
        Outcome::Completed(full_text) => {
            let emit = {
                let mut s = session.lock();
                if cancel.is_cancelled() {
                    false
                } else {
                    s.append_history(SessionRole::Assistant, full_text);
                    if !matches!(s.state, SessionState::TurnComplete) {
                        s.transition(SessionState::TurnComplete);
                    }
                    s.transition(SessionState::Idle);
                    s.current_turn = None;
                    true
                }
            };
            if emit {
                let _ = outbound.send(OutboundEvent::TurnComplete { turn_id }).await;
            }
        }
        Outcome::Failed(err) => {
            let emit = {
                let mut s = session.lock();
                if cancel.is_cancelled() {
                    false
                } else {
                    if !matches!(s.state, SessionState::Idle) {
                        s.transition(SessionState::TurnError);
                        s.transition(SessionState::Idle);
                    }
                    s.current_turn = None;
                    true
                }
            };
            if emit {
                let _ = outbound
                    .send(OutboundEvent::Error {
                        code: err.wire_code(),
                        message: err.to_string(),
                    })
                    .await;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Split-stage mode
// ─────────────────────────────────────────────────────────────────────

/// Producer — LLM tokens in, sentence segments out on `sentence_tx`.
/// Flush rule (spec.md §4.6): a token whose last character is one of
/// `. ! ? \n` flushes the trimmed buffer once it is at least
/// `min_sentence_len` characters, avoiding premature flushes on
/// abbreviations like "Dr.".
async fn run_llm_producer(
    llm: Arc<dyn LlmGenerator>,
    text: String,
    control: TurnControl,
    ctx: GeneratorContext,
    outbound: mpsc::Sender<OutboundEvent>,
    cancel: CancelToken,
    sentence_tx: mpsc::Sender<String>,
    min_sentence_len: usize,
) -> Result<String> {
    let mut stream = llm.infer_stream(&text, &control, &ctx).await?;
    let mut buf = String::new();
    let mut full = String::new();

    while let Some(token) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let token = token?;
        full.push_str(&token);
        buf.push_str(&token);

        if outbound
            .send(OutboundEvent::TextDelta {
                token: token.clone(),
            })
            .await
            .is_err()
        {
            return Err(Error::TransportLost("outbound queue closed".into()));
        }

        let ends_sentence = token
            .trim_end()
            .chars()
            .last()
            .is_some_and(|c| matches!(c, '.' | '!' | '?' | '\n'));
        if ends_sentence {
            let trimmed = buf.trim();
            if trimmed.len() >= min_sentence_len {
                let segment = trimmed.to_string();
                buf.clear();
                if sentence_tx.send(segment).await.is_err() {
                    return Err(Error::TransportLost("sentence queue closed".into()));
                }
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        let _ = sentence_tx.send(trimmed.to_string()).await;
    }
    Ok(full)
}

/// Consumer — sentence segments in, `audio_chunk`/`video_frame` events
/// out. Emits a chunk's audio before driving the avatar stage to
/// completion over it, preserving the ordering guarantee that a chunk's
/// frames never interleave with the next chunk's audio.
async fn run_tts_avatar_consumer(
    tts: Arc<dyn TtsGenerator>,
    avatar: Arc<dyn AvatarGenerator>,
    control: TurnControl,
    ctx: GeneratorContext,
    outbound: mpsc::Sender<OutboundEvent>,
    cancel: CancelToken,
    mut sentence_rx: mpsc::Receiver<String>,
    session: Arc<Mutex<Session>>,
) -> Result<()> {
    let mut frame_counter: u64 = 0;
    // Set once on the first chunk (LlmRun -> TtsRun); every chunk after
    // that re-enters TtsRun only via the AvatarRun -> TtsRun edge, since
    // TtsRun -> TtsRun isn't a transition the state machine allows.
    let mut entered_media = false;

    while let Some(segment) = sentence_rx.recv().await {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut audio_stream = tts.infer_stream(&segment, &control, &ctx).await?;
        while let Some(chunk) = audio_stream.next().await {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let chunk = chunk?;

            if !entered_media {
                transition_if_live(&session, &cancel, SessionState::TtsRun)?;
                entered_media = true;
            }
            emit_audio_chunk(&outbound, &chunk).await?;

            transition_if_live(&session, &cancel, SessionState::AvatarRun)?;
            let n = drive_avatar(
                &avatar,
                &chunk,
                &control,
                frame_counter,
                &session,
                &outbound,
                &cancel,
            )
            .await?;
            frame_counter += n;
            transition_if_live(&session, &cancel, SessionState::TtsRun)?;
        }
    }
    Ok(())
}

async fn emit_audio_chunk(outbound: &mpsc::Sender<OutboundEvent>, chunk: &AudioChunk) -> Result<()> {
    outbound
        .send(OutboundEvent::AudioChunk {
            data: chunk.data.clone(),
            timestamp_ms: chunk.timestamp_ms,
            duration_ms: chunk.duration_ms,
            encoding: chunk.encoding.clone(),
            sample_rate: chunk.sample_rate,
        })
        .await
        .map_err(|_| Error::TransportLost("outbound queue closed".into()))
}

/// Check cancellation and apply a state transition as one atomic step
/// under the session lock. `Session::cancel_current_turn` holds the
/// same lock across its own `token.cancel()` + transition pair, so
/// whichever side gets the lock first wins outright: a turn that loses
/// the race sees `is_cancelled()` already true and returns
/// `Err(Cancelled)` without ever calling `transition`, instead of
/// racing a barge-in's reset back to `Idle` and asserting on an illegal
/// target. Every transition a turn body makes after its first `.await`
/// must go through this rather than a bare `session.lock().transition`.
fn transition_if_live(
    session: &Mutex<Session>,
    cancel: &CancelToken,
    to: SessionState,
) -> Result<()> {
    let mut s = session.lock();
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    s.transition(to);
    Ok(())
}

/// Drive the avatar generator over one audio chunk, updating drift and
/// emitting a `video_frame` event per returned frame. Returns the
/// number of frames emitted, for the caller's running frame counter.
async fn drive_avatar(
    avatar: &Arc<dyn AvatarGenerator>,
    chunk: &AudioChunk,
    control: &TurnControl,
    frame_counter: u64,
    session: &Arc<Mutex<Session>>,
    outbound: &mpsc::Sender<OutboundEvent>,
    cancel: &CancelToken,
) -> Result<u64> {
    let avatar_ctx = {
        let s = session.lock();
        build_context(&s, frame_counter, control)
    };
    let mut frame_stream = avatar.infer_stream(chunk, control, &avatar_ctx).await?;
    let mut n = 0u64;
    while let Some(frame) = frame_stream.next().await {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let frame = frame?;
        let drift = session
            .lock()
            .drift
            .update(chunk.timestamp_ms, frame.timestamp_ms);
        outbound
            .send(OutboundEvent::VideoFrame {
                data: frame.data,
                timestamp_ms: frame.timestamp_ms,
                frame_index: frame.frame_index,
                width: frame.width,
                height: frame.height,
                content_type: frame.content_type,
                drift_ms: drift,
            })
            .await
            .map_err(|_| Error::TransportLost("outbound queue closed".into()))?;
        n += 1;
    }
    Ok(n)
}

#[allow(clippy::too_many_arguments)]
async fn run_turn_split(
    gens: Arc<GeneratorSet>,
    session: Arc<Mutex<Session>>,
    cancel: CancelToken,
    turn_id: String,
    text: String,
    effective: TurnControl,
    outbound: mpsc::Sender<OutboundEvent>,
    cfg: TurnConfig,
) {
    let (llm, tts, avatar) = match &*gens {
        GeneratorSet::Split { llm, tts, avatar } => (llm.clone(), tts.clone(), avatar.clone()),
        GeneratorSet::Combined { .. } => unreachable!("split runner requires split generators"),
    };

    let ctx = {
        let mut s = session.lock();
        // A barge-in/interrupt for this very turn can land before this
        // task is ever scheduled (spawn_turn only registers the cancel
        // token synchronously); checked under the same lock `cancel_
        // current_turn` uses, so there is no window for it to flip
        // between this check and the transition below.
        if cancel.is_cancelled() {
            drop(s);
            finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Cancelled).await;
            return;
        }
        s.transition(SessionState::LlmRun);
        build_context(&s, 0, &effective)
    };

    let (sentence_tx, sentence_rx) = mpsc::channel::<String>(cfg.sentence_queue_capacity);

    let producer = tokio::spawn(run_llm_producer(
        llm,
        text,
        effective.clone(),
        ctx.clone(),
        outbound.clone(),
        cancel.clone(),
        sentence_tx,
        cfg.min_sentence_len,
    ));
    let consumer = tokio::spawn(run_tts_avatar_consumer(
        tts,
        avatar,
        effective,
        ctx,
        outbound.clone(),
        cancel.clone(),
        sentence_rx,
        session.clone(),
    ));

    let (producer_res, consumer_res) = tokio::join!(producer, consumer);

    if cancel.is_cancelled() {
        finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Cancelled).await;
        return;
    }

    let outcome = match (producer_res, consumer_res) {
        (Ok(Ok(full_text)), Ok(Ok(()))) => Outcome::Completed(full_text),
        (Ok(Err(Error::Cancelled)), _) | (_, Ok(Err(Error::Cancelled))) => Outcome::Cancelled,
        (Ok(Err(e)), _) => Outcome::Failed(e),
        (_, Ok(Err(e))) => Outcome::Failed(e),
        (Err(join_err), _) | (_, Err(join_err)) => {
            Outcome::Failed(Error::GeneratorFailed {
                stage: "orchestrator",
                message: format!("turn sub-task panicked: {join_err}"),
            })
        }
    };
    finish_turn(&session, &outbound, &cancel, turn_id, outcome).await;
}

// ─────────────────────────────────────────────────────────────────────
// Combined mode
// ─────────────────────────────────────────────────────────────────────

/// Drain any events already enqueued on the combined generator's stream
/// past a cancellation, so the next turn's `connect`-once session never
/// observes a prior turn's stale frames (DESIGN.md Open Question 1).
/// A short idle gap is treated as having reached the watermark.
async fn drain_stale_events(
    events: &mut rtd_domain::BoxStream<'static, Result<CombinedEvent>>,
) {
    loop {
        match tokio::time::timeout(std::time::Duration::from_millis(50), events.next()).await {
            Ok(Some(_)) => continue,
            _ => break,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_turn_combined(
    gens: Arc<GeneratorSet>,
    session: Arc<Mutex<Session>>,
    cancel: CancelToken,
    turn_id: String,
    text: String,
    effective: TurnControl,
    outbound: mpsc::Sender<OutboundEvent>,
) {
    let (combined, avatar) = match &*gens {
        GeneratorSet::Combined { combined, avatar } => (combined.clone(), avatar.clone()),
        GeneratorSet::Split { .. } => unreachable!("combined runner requires a combined generator"),
    };

    // Same race as split mode's preamble: a barge-in for this turn can
    // land before this task is ever scheduled. Nothing has been sent to
    // the transport yet, so no cancel_response/drain is needed here.
    if transition_if_live(&session, &cancel, SessionState::LlmRun).is_err() {
        finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Cancelled).await;
        return;
    }

    if effective.character != CharacterControl::default() {
        tracing::warn!(
            turn_id = %turn_id,
            "combined mode does not expose character controls to the transport; ignoring"
        );
    }

    if let Err(e) = combined.send_user_text(&text).await {
        finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Failed(e)).await;
        return;
    }

    let mut events = combined.stream_events();
    let mut full_text = String::new();
    let mut frame_counter: u64 = 0;
    let mut entered_media = false;

    loop {
        if cancel.is_cancelled() {
            let _ = combined.cancel_response().await;
            drain_stale_events(&mut events).await;
            finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Cancelled).await;
            return;
        }

        match events.next().await {
            Some(Ok(CombinedEvent::TextDelta(token))) => {
                full_text.push_str(&token);
                if outbound
                    .send(OutboundEvent::TextDelta { token })
                    .await
                    .is_err()
                {
                    finish_turn(
                        &session,
                        &outbound,
                        &cancel,
                        turn_id,
                        Outcome::Failed(Error::TransportLost("outbound queue closed".into())),
                    )
                    .await;
                    return;
                }
            }
            Some(Ok(CombinedEvent::AudioChunk(chunk))) => {
                if !entered_media {
                    if transition_if_live(&session, &cancel, SessionState::TtsRun).is_err() {
                        let _ = combined.cancel_response().await;
                        drain_stale_events(&mut events).await;
                        finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Cancelled).await;
                        return;
                    }
                    entered_media = true;
                }
                if let Err(e) = emit_audio_chunk(&outbound, &chunk).await {
                    finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Failed(e)).await;
                    return;
                }

                if transition_if_live(&session, &cancel, SessionState::AvatarRun).is_err() {
                    let _ = combined.cancel_response().await;
                    drain_stale_events(&mut events).await;
                    finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Cancelled).await;
                    return;
                }
                match drive_avatar(
                    &avatar,
                    &chunk,
                    &effective,
                    frame_counter,
                    &session,
                    &outbound,
                    &cancel,
                )
                .await
                {
                    Ok(n) => frame_counter += n,
                    Err(Error::Cancelled) => {
                        let _ = combined.cancel_response().await;
                        drain_stale_events(&mut events).await;
                        finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Cancelled).await;
                        return;
                    }
                    Err(e) => {
                        finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Failed(e)).await;
                        return;
                    }
                }
                if transition_if_live(&session, &cancel, SessionState::TtsRun).is_err() {
                    let _ = combined.cancel_response().await;
                    drain_stale_events(&mut events).await;
                    finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Cancelled).await;
                    return;
                }
            }
            Some(Ok(CombinedEvent::TurnComplete)) => {
                finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Completed(full_text)).await;
                return;
            }
            Some(Err(e)) => {
                finish_turn(&session, &outbound, &cancel, turn_id, Outcome::Failed(e)).await;
                return;
            }
            None => {
                finish_turn(
                    &session,
                    &outbound,
                    &cancel,
                    turn_id,
                    Outcome::Failed(Error::TransportLost(
                        "combined generator event stream ended".into(),
                    )),
                )
                .await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtd_domain::{persona_defaults, EmotionControl, EmotionLabel};
    use rtd_generator::{MockAvatarGenerator, MockCombinedGenerator, MockLlmGenerator, MockTtsGenerator};

    fn new_session(id: &str) -> Arc<Mutex<Session>> {
        let preset = persona_defaults("default");
        Arc::new(Mutex::new(Session::new(
            id.into(),
            preset.id.into(),
            preset.display_name.into(),
            preset.defaults,
            10,
        )))
    }

    fn split_generators() -> Arc<GeneratorSet> {
        Arc::new(GeneratorSet::Split {
            llm: Arc::new(MockLlmGenerator),
            tts: Arc::new(MockTtsGenerator),
            avatar: Arc::new(MockAvatarGenerator),
        })
    }

    fn combined_generators() -> Arc<GeneratorSet> {
        Arc::new(GeneratorSet::Combined {
            combined: Arc::new(MockCombinedGenerator::default()),
            avatar: Arc::new(MockAvatarGenerator),
        })
    }

    /// S1 — offline smoke test: a full split-stage turn against the mock
    /// trio produces at least one audio chunk, one video frame, and a
    /// terminal `turn_complete`, and the drift budget holds.
    #[tokio::test]
    async fn scenario_s1_offline_smoke() {
        let session = new_session("s1");
        let gens = split_generators();
        let (tx, mut rx) = mpsc::channel(64);

        spawn_turn(
            gens,
            session.clone(),
            "Explain one practical tip to improve model inference latency.".into(),
            TurnControl::default(),
            tx,
            TurnConfig::default(),
        );

        let mut audio = 0;
        let mut frames = 0;
        let mut text = String::new();
        let mut saw_complete = false;
        while let Some(event) = rx.recv().await {
            match event {
                OutboundEvent::TextDelta { token } => text.push_str(&token),
                OutboundEvent::AudioChunk { .. } => audio += 1,
                OutboundEvent::VideoFrame { .. } => frames += 1,
                OutboundEvent::TurnComplete { .. } => {
                    saw_complete = true;
                    break;
                }
                OutboundEvent::Error { message, .. } => panic!("unexpected error: {message}"),
            }
        }

        assert!(audio >= 1);
        assert!(frames >= 1);
        assert!(saw_complete);
        assert!(text.trim_end().ends_with(|c: char| matches!(c, '.' | '!' | '?')));
        assert!(session.lock().history.len() == 2);
        assert_eq!(session.lock().state, SessionState::Idle);
    }

    /// S4 — interrupt after the first `text_delta`: no further
    /// `turn_complete`/`error` should ever arrive, and the session must
    /// settle back to `IDLE`.
    #[tokio::test]
    async fn scenario_s4_interrupt_emits_no_terminal_event() {
        let session = new_session("s4");
        let gens = split_generators();
        let (tx, mut rx) = mpsc::channel(64);

        spawn_turn(
            gens,
            session.clone(),
            "long answer please, take your time".into(),
            TurnControl::default(),
            tx,
            TurnConfig::default(),
        );

        // Wait for the first text_delta, then interrupt.
        let first = rx.recv().await.expect("expected at least one event");
        assert!(matches!(first, OutboundEvent::TextDelta { .. }));
        session.lock().cancel_current_turn();
        assert_eq!(session.lock().state, SessionState::Idle);

        // Drain whatever was already in flight; none of it may be a
        // terminal event.
        while let Ok(Some(event)) =
            tokio::time::timeout(std::time::Duration::from_millis(300), rx.recv()).await
        {
            assert!(!matches!(
                event,
                OutboundEvent::TurnComplete { .. } | OutboundEvent::Error { .. }
            ));
        }
    }

    /// S6 — frame count: chunks of 80ms and 1000ms must yield 2 and 25
    /// frames respectively, with strictly increasing frame indices.
    #[tokio::test]
    async fn scenario_s6_frame_count_and_indices() {
        let session = new_session("s6");
        let avatar: Arc<dyn AvatarGenerator> = Arc::new(MockAvatarGenerator);
        let control = TurnControl::default();

        let chunk_a = AudioChunk {
            data: vec![0u8; 4],
            timestamp_ms: 0.0,
            duration_ms: 80.0,
            sample_rate: 24_000,
            encoding: rtd_domain::AudioEncoding::Pcm,
        };
        let chunk_b = AudioChunk {
            data: vec![0u8; 4],
            timestamp_ms: 80.0,
            duration_ms: 1000.0,
            sample_rate: 24_000,
            encoding: rtd_domain::AudioEncoding::Pcm,
        };

        let (tx, mut rx) = mpsc::channel(256);
        let cancel = CancelToken::new();
        let n1 = drive_avatar(&avatar, &chunk_a, &control, 0, &session, &tx, &cancel)
            .await
            .unwrap();
        let n2 = drive_avatar(&avatar, &chunk_b, &control, n1, &session, &tx, &cancel)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(n1, 2);
        assert_eq!(n2, 25);

        let mut indices = Vec::new();
        while let Some(OutboundEvent::VideoFrame { frame_index, .. }) = rx.recv().await {
            indices.push(frame_index);
        }
        assert_eq!(indices.len(), 27);
        for (i, idx) in indices.iter().enumerate() {
            assert_eq!(*idx, i as u64);
        }
    }

    /// Combined mode smoke: text, then audio+video, then turn_complete,
    /// with history updated exactly once.
    #[tokio::test]
    async fn combined_mode_smoke() {
        let session = new_session("combined");
        let gens = combined_generators();
        if let GeneratorSet::Combined { combined, .. } = &*gens {
            combined.connect("be helpful", "nova").await.unwrap();
        }
        let (tx, mut rx) = mpsc::channel(64);

        spawn_turn(
            gens,
            session.clone(),
            "hello there, how are you today".into(),
            TurnControl::default(),
            tx,
            TurnConfig::default(),
        );

        let mut saw_complete = false;
        let mut saw_audio = false;
        while let Some(event) = rx.recv().await {
            match event {
                OutboundEvent::AudioChunk { .. } => saw_audio = true,
                OutboundEvent::TurnComplete { .. } => {
                    saw_complete = true;
                    break;
                }
                OutboundEvent::Error { message, .. } => panic!("unexpected error: {message}"),
                _ => {}
            }
        }
        assert!(saw_audio);
        assert!(saw_complete);
        assert_eq!(session.lock().history.len(), 2);
    }

    /// An LLM generator that streams a fixed string, tokenized the same
    /// word-plus-trailing-space way as [`rtd_generator`]'s mocks, so the
    /// segmentation flush rule sees exactly the tokens spec.md's S5
    /// scenario describes — unlike `MockLlmGenerator`, which wraps the
    /// input in a canned tone prefix/suffix.
    struct FixedTextLlmGenerator(&'static str);

    #[async_trait::async_trait]
    impl LlmGenerator for FixedTextLlmGenerator {
        async fn infer_stream(
            &self,
            _text: &str,
            _control: &TurnControl,
            _context: &GeneratorContext,
        ) -> Result<rtd_domain::BoxStream<'static, Result<String>>> {
            let tokens: Vec<Result<String>> = self
                .0
                .split_whitespace()
                .map(|w| Ok(format!("{w} ")))
                .collect();
            Ok(Box::pin(futures_util::stream::iter(tokens)))
        }

        async fn health(&self) -> rtd_domain::HealthStatus {
            rtd_domain::HealthStatus::ok(0.1)
        }

        fn capabilities(&self) -> rtd_domain::GeneratorCapabilities {
            rtd_domain::GeneratorCapabilities {
                supports_streaming: true,
                supports_emotion: false,
                supports_identity: false,
                max_text_length: 10_000,
                supported_emotions: Vec::new(),
            }
        }
    }

    /// A TTS generator that counts its invocations instead of doing any
    /// real synthesis, so a test can assert how many segments the
    /// orchestrator's sentence-flush rule handed it.
    struct CountingTtsGenerator {
        calls: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl TtsGenerator for CountingTtsGenerator {
        async fn infer_stream(
            &self,
            _segment: &str,
            _control: &TurnControl,
            _context: &GeneratorContext,
        ) -> Result<rtd_domain::BoxStream<'static, Result<AudioChunk>>> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let chunk = AudioChunk {
                data: vec![0u8; 4],
                timestamp_ms: 0.0,
                duration_ms: 100.0,
                sample_rate: 24_000,
                encoding: rtd_domain::AudioEncoding::Pcm,
            };
            Ok(Box::pin(futures_util::stream::iter(vec![Ok(chunk)])))
        }

        async fn health(&self) -> rtd_domain::HealthStatus {
            rtd_domain::HealthStatus::ok(0.1)
        }

        fn capabilities(&self) -> rtd_domain::GeneratorCapabilities {
            rtd_domain::GeneratorCapabilities {
                supports_streaming: true,
                supports_emotion: false,
                supports_identity: false,
                max_text_length: 10_000,
                supported_emotions: Vec::new(),
            }
        }
    }

    /// S5 — sentence segmentation edge: `"Dr. Smith arrived. Done."`
    /// must not flush at the `"Dr."` boundary (trimmed buffer length 3
    /// is under `min_sentence_len`), so TTS sees exactly the two
    /// segments `"Dr. Smith arrived."` and `"Done."` — never one per
    /// token.
    #[tokio::test]
    async fn scenario_s5_sentence_segmentation_abbreviation_edge() {
        let session = new_session("s5");
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let gens = Arc::new(GeneratorSet::Split {
            llm: Arc::new(FixedTextLlmGenerator("Dr. Smith arrived. Done.")),
            tts: Arc::new(CountingTtsGenerator {
                calls: calls.clone(),
            }),
            avatar: Arc::new(MockAvatarGenerator),
        });
        let (tx, mut rx) = mpsc::channel(64);

        spawn_turn(
            gens,
            session.clone(),
            "ignored by FixedTextLlmGenerator".into(),
            TurnControl::default(),
            tx,
            TurnConfig::default(),
        );

        let mut saw_complete = false;
        while let Some(event) = rx.recv().await {
            match event {
                OutboundEvent::TurnComplete { .. } => {
                    saw_complete = true;
                    break;
                }
                OutboundEvent::Error { message, .. } => panic!("unexpected error: {message}"),
                _ => {}
            }
        }

        assert!(saw_complete);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    /// S3 — barge-in: a second `user_text` arriving after the first
    /// turn's first `audio_chunk` must cancel the first turn cleanly
    /// (no `turn_complete`, no `error`) and let the second run to a
    /// normal `turn_complete`. This is also the regression test for the
    /// state-machine race a concurrent barge-in can hit: the first
    /// turn's consumer task is suspended mid-`.await` (inside
    /// `emit_audio_chunk`/`drive_avatar`) exactly when `cancel_
    /// current_turn` flips it back to `Idle`, so its next transition
    /// must observe the cancellation instead of asserting on an illegal
    /// `Idle -> AvatarRun`/`Idle -> TtsRun` target.
    #[tokio::test]
    async fn scenario_s3_barge_in_cancels_first_turn_cleanly() {
        let session = new_session("s3");
        let gens = split_generators();
        let (tx, mut rx) = mpsc::channel(256);

        spawn_turn(
            gens.clone(),
            session.clone(),
            "long answer please, take your time describing it in detail".into(),
            TurnControl::default(),
            tx.clone(),
            TurnConfig::default(),
        );

        // Wait for the first turn's first audio_chunk, as S3 specifies,
        // without ever seeing a terminal event beforehand.
        loop {
            match rx.recv().await.expect("expected at least one event") {
                OutboundEvent::AudioChunk { .. } => break,
                OutboundEvent::TurnComplete { .. } | OutboundEvent::Error { .. } => {
                    panic!("first turn must not settle before the barge-in arrives")
                }
                _ => {}
            }
        }

        // Barge in: cancel whatever is running, then spawn a fresh turn,
        // mirroring the connection loop's user_text handler (ws.rs).
        session.lock().cancel_current_turn();
        spawn_turn(
            gens,
            session.clone(),
            "new question".into(),
            TurnControl::default(),
            tx,
            TurnConfig::default(),
        );

        let mut turn_completes = 0;
        let mut saw_error = false;
        while let Some(event) = rx.recv().await {
            match event {
                OutboundEvent::TurnComplete { .. } => turn_completes += 1,
                OutboundEvent::Error { .. } => saw_error = true,
                _ => {}
            }
        }

        assert!(!saw_error, "barge-in must never surface a spurious error event");
        assert_eq!(turn_completes, 1, "exactly the second turn's completion should arrive");
        assert_eq!(session.lock().state, SessionState::Idle);
        // Two user turns recorded, but only the second's answer: the
        // cancelled first turn's assistant reply never gets appended.
        assert_eq!(session.lock().history.len(), 3);
    }

    /// Regression for the lost-finish-race window `finish_turn` documents:
    /// a stage can return its final `Ok` and a barge-in can land between
    /// that return and `finish_turn`'s own lock acquisition. When that
    /// happens the turn must neither emit `turn_complete` nor append the
    /// assistant reply to history — invariant #8's no-op contract applies
    /// to history mutation too, not just the outbound event.
    #[tokio::test]
    async fn finish_turn_completed_after_losing_cancel_race_mutates_nothing() {
        let session = new_session("lost-race");
        session.lock().append_history(SessionRole::User, "hi");
        session.lock().transition(SessionState::LlmRun);

        let cancel = CancelToken::new();
        cancel.cancel();
        let (tx, mut rx) = mpsc::channel(4);

        finish_turn(
            &session,
            &tx,
            &cancel,
            "turn-1".into(),
            Outcome::Completed("assistant reply that must not be recorded".into()),
        )
        .await;
        drop(tx);

        assert!(rx.recv().await.is_none(), "no turn_complete may be emitted");
        assert_eq!(
            session.lock().history.len(),
            1,
            "assistant reply must not be appended when the turn lost the finish race"
        );
    }

    /// The LLM call's `GeneratorContext` must carry a non-empty system
    /// prompt built from the turn's effective control (spec.md §6,
    /// SPEC_FULL.md §D.3) — not just persona name/history/frame_counter.
    #[tokio::test]
    async fn generator_context_carries_system_prompt() {
        let session = new_session("prompt-check");
        let control = TurnControl::new(
            EmotionControl::new(EmotionLabel::Happy, 0.8, 0.5, 0.5).unwrap(),
            CharacterControl::default(),
        );
        let ctx = {
            let s = session.lock();
            build_context(&s, 0, &control)
        };
        assert!(!ctx.system_prompt.is_empty());
        assert!(ctx.system_prompt.contains("Assistant"));
    }
}
