use async_trait::async_trait;
use futures_util::StreamExt;
use rtd_domain::{AudioChunk, BoxStream, GeneratorCapabilities, HealthStatus, Result, TurnControl};

/// Conversation turn so far, as seen by the LLM generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Context passed alongside a generator call. `frame_counter` only
/// matters to the avatar stage — it is the running frame index for the
/// turn (spec.md §4.1: `frame_index = context.frame_counter + i`).
#[derive(Debug, Clone, Default)]
pub struct GeneratorContext {
    pub persona_name: String,
    pub history: Vec<(Role, String)>,
    pub frame_counter: u64,
    /// Persona- and emotion-aware system prompt built from the turn's
    /// effective `TurnControl` (see `rtd_session::control::build_system_prompt`).
    pub system_prompt: String,
}

/// The LLM generator: user text in, a lazy sequence of non-empty text
/// tokens out.
#[async_trait]
pub trait LlmGenerator: Send + Sync {
    async fn infer_stream(
        &self,
        text: &str,
        control: &TurnControl,
        context: &GeneratorContext,
    ) -> Result<BoxStream<'static, Result<String>>>;

    /// Default batch fallback: drain the stream and join. Only used by
    /// callers that don't need incremental delivery (none in the core
    /// pipeline today, kept for generator implementors that want a
    /// synchronous-feeling test helper).
    async fn infer_batch(
        &self,
        text: &str,
        control: &TurnControl,
        context: &GeneratorContext,
    ) -> Result<String> {
        let mut stream = self.infer_stream(text, control, context).await?;
        let mut out = String::new();
        while let Some(token) = stream.next().await {
            out.push_str(&token?);
        }
        Ok(out)
    }

    async fn health(&self) -> HealthStatus;
    fn capabilities(&self) -> GeneratorCapabilities;
}

/// The TTS generator: one text segment in, a lazy sequence of
/// `AudioChunk`s out.
#[async_trait]
pub trait TtsGenerator: Send + Sync {
    async fn infer_stream(
        &self,
        segment: &str,
        control: &TurnControl,
        context: &GeneratorContext,
    ) -> Result<BoxStream<'static, Result<AudioChunk>>>;

    async fn infer_batch(
        &self,
        segment: &str,
        control: &TurnControl,
        context: &GeneratorContext,
    ) -> Result<Vec<AudioChunk>> {
        let mut stream = self.infer_stream(segment, control, context).await?;
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.push(chunk?);
        }
        Ok(out)
    }

    async fn health(&self) -> HealthStatus;
    fn capabilities(&self) -> GeneratorCapabilities;
}

/// The avatar generator: one `AudioChunk` in, a lazy sequence of
/// `VideoFrame`s out.
#[async_trait]
pub trait AvatarGenerator: Send + Sync {
    async fn infer_stream(
        &self,
        chunk: &AudioChunk,
        control: &TurnControl,
        context: &GeneratorContext,
    ) -> Result<BoxStream<'static, Result<rtd_domain::VideoFrame>>>;

    async fn health(&self) -> HealthStatus;
    fn capabilities(&self) -> GeneratorCapabilities;
}

/// An event pulled from a combined LLM+TTS generator's persistent
/// session.
#[derive(Debug, Clone)]
pub enum CombinedEvent {
    TextDelta(String),
    AudioChunk(AudioChunk),
    TurnComplete,
}

/// The optional combined mode: one persistent bidirectional session
/// fuses LLM and TTS. Established once per logical session via
/// [`CombinedGenerator::connect`], never reconnected per turn.
#[async_trait]
pub trait CombinedGenerator: Send + Sync {
    async fn connect(&self, system_instructions: &str, voice: &str) -> Result<()>;

    async fn send_user_text(&self, text: &str) -> Result<()>;

    /// Request cancellation of the response currently being generated.
    /// Any events already enqueued before cancellation took effect are
    /// still observable on the next `stream_events` pull — the caller is
    /// responsible for draining them (see `rtd-orchestrator`'s combined
    /// turn runner).
    async fn cancel_response(&self) -> Result<()>;

    /// A persistent stream of events for this session's responses. The
    /// caller pulls until a `TurnComplete`, then stops pulling until the
    /// next `send_user_text`.
    fn stream_events(&self) -> BoxStream<'static, Result<CombinedEvent>>;

    async fn health(&self) -> HealthStatus;
    fn capabilities(&self) -> GeneratorCapabilities;
}
