//! Deterministic LLM/TTS/Avatar/Combined generators used by the test
//! suite and the `--demo` CLI. No network calls, no randomness.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rtd_domain::{
    AudioChunk, AudioEncoding, BoxStream, EmotionLabel, GeneratorCapabilities, HealthStatus,
    Result, TurnControl, VideoContentType, VideoFrame,
};
use tokio::sync::mpsc;

use crate::traits::{
    AvatarGenerator, CombinedEvent, CombinedGenerator, GeneratorContext, LlmGenerator,
    TtsGenerator,
};

fn tone_prefix(label: EmotionLabel) -> &'static str {
    match label {
        EmotionLabel::Neutral => "Here is a clear answer.",
        EmotionLabel::Happy => "Great question, this is exciting.",
        EmotionLabel::Sad => "I understand, here is a calm response.",
        EmotionLabel::Angry => "Let us be direct and focused.",
        EmotionLabel::Surprised => "Interesting twist, here is what matters.",
        EmotionLabel::Fearful => "Carefully and step by step, here is the answer.",
        EmotionLabel::Disgusted => "Let us keep this practical and concise.",
    }
}

fn supported_emotion_names() -> Vec<String> {
    ["neutral", "happy", "sad", "angry", "surprised", "fearful", "disgusted"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn mock_response_text(input: &str, control: &TurnControl) -> String {
    format!(
        "{} You asked: {} I will keep the answer short, useful, and easy to act on.",
        tone_prefix(control.emotion.label()),
        input.trim()
    )
}

/// Word-level tokens, each carrying its trailing space, matching the
/// flush rule's expectation that punctuation lands at the end of a token.
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| format!("{w} ")).collect()
}

/// OpenAI-style voice chosen by emotion label. Informational only — the
/// core never depends on this table (spec.md §6).
pub fn map_emotion_to_tts_params(control: &TurnControl) -> (&'static str, f32) {
    let voice = match control.emotion.label() {
        EmotionLabel::Neutral => "nova",
        EmotionLabel::Happy => "shimmer",
        EmotionLabel::Sad => "onyx",
        EmotionLabel::Angry => "echo",
        EmotionLabel::Surprised => "fable",
        EmotionLabel::Fearful => "alloy",
        EmotionLabel::Disgusted => "echo",
    };
    let speed_mod = 1.0 + control.emotion.arousal() * 0.15;
    let speed = (control.character.speech_rate() * speed_mod).clamp(0.25, 4.0);
    (voice, speed)
}

// ─────────────────────────────────────────────────────────────────────
// LLM
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockLlmGenerator;

#[async_trait]
impl LlmGenerator for MockLlmGenerator {
    async fn infer_stream(
        &self,
        text: &str,
        control: &TurnControl,
        _context: &GeneratorContext,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let tokens = tokenize(&mock_response_text(text, control));
        Ok(Box::pin(async_stream::stream! {
            for token in tokens {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                yield Ok(token);
            }
        }))
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::ok(0.1)
    }

    fn capabilities(&self) -> GeneratorCapabilities {
        GeneratorCapabilities {
            supports_streaming: true,
            supports_emotion: true,
            supports_identity: false,
            max_text_length: 100_000,
            supported_emotions: supported_emotion_names(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// TTS
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockTtsGenerator;

#[async_trait]
impl TtsGenerator for MockTtsGenerator {
    async fn infer_stream(
        &self,
        segment: &str,
        control: &TurnControl,
        _context: &GeneratorContext,
    ) -> Result<BoxStream<'static, Result<AudioChunk>>> {
        let total_ms = (segment.len() as f64 * 12.0).clamp(250.0, 1800.0);
        let num_chunks = ((segment.len() / 35 + 1) as u32).clamp(2, 8);
        let chunk_ms = total_ms / num_chunks as f64;
        let (_voice, speed) = map_emotion_to_tts_params(control);
        let segment = segment.to_string();

        Ok(Box::pin(async_stream::stream! {
            let mut ts = 0.0;
            for i in 0..num_chunks {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                let mut payload = format!("MOCK_MP3|chunk={i}|speed={speed:.2}|{segment}").into_bytes();
                payload.truncate(2048);
                yield Ok(AudioChunk {
                    data: payload,
                    timestamp_ms: ts,
                    duration_ms: chunk_ms,
                    sample_rate: rtd_domain::media::PCM_SAMPLE_RATE_HZ,
                    encoding: AudioEncoding::Other("mock_mp3".into()),
                });
                ts += chunk_ms;
            }
        }))
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::ok(0.1)
    }

    fn capabilities(&self) -> GeneratorCapabilities {
        GeneratorCapabilities {
            supports_streaming: true,
            supports_emotion: true,
            supports_identity: false,
            max_text_length: 100_000,
            supported_emotions: supported_emotion_names(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Avatar
// ─────────────────────────────────────────────────────────────────────

const FRAME_W: u32 = 256;
const FRAME_H: u32 = 256;

#[derive(Debug, Default)]
pub struct MockAvatarGenerator;

#[async_trait]
impl AvatarGenerator for MockAvatarGenerator {
    async fn infer_stream(
        &self,
        chunk: &AudioChunk,
        _control: &TurnControl,
        context: &GeneratorContext,
    ) -> Result<BoxStream<'static, Result<VideoFrame>>> {
        let frames = rtd_domain::media::frame_count_for_duration(chunk.duration_ms);
        let frame_duration_ms = rtd_domain::media::frame_spacing_ms();
        let base_idx = context.frame_counter;
        let base_ts = chunk.timestamp_ms;

        Ok(Box::pin(async_stream::stream! {
            let black_frame = vec![0u8; (FRAME_W * FRAME_H * 3) as usize];
            for i in 0..frames {
                tokio::time::sleep(std::time::Duration::from_millis(
                    (frame_duration_ms) as u64,
                ))
                .await;
                yield Ok(VideoFrame {
                    data: black_frame.clone(),
                    timestamp_ms: base_ts + i as f64 * frame_duration_ms,
                    frame_index: base_idx + i,
                    width: FRAME_W,
                    height: FRAME_H,
                    content_type: VideoContentType::RawRgb,
                });
            }
        }))
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::ok(0.1)
    }

    fn capabilities(&self) -> GeneratorCapabilities {
        GeneratorCapabilities {
            supports_streaming: true,
            supports_emotion: false,
            supports_identity: false,
            max_text_length: 0,
            supported_emotions: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Combined LLM+TTS
// ─────────────────────────────────────────────────────────────────────

struct CombinedState {
    tx: Option<mpsc::Sender<Result<CombinedEvent>>>,
    rx: Option<mpsc::Receiver<Result<CombinedEvent>>>,
    cancelled: Arc<AtomicBool>,
}

/// A mock stand-in for a provider's fused realtime session. Connects
/// once, then each `send_user_text` replays the same deterministic
/// text+audio generation as [`MockLlmGenerator`]/[`MockTtsGenerator`]
/// through a single persistent event stream.
pub struct MockCombinedGenerator {
    state: parking_lot::Mutex<CombinedState>,
}

impl Default for MockCombinedGenerator {
    fn default() -> Self {
        Self {
            state: parking_lot::Mutex::new(CombinedState {
                tx: None,
                rx: None,
                cancelled: Arc::new(AtomicBool::new(false)),
            }),
        }
    }
}

async fn generate_combined(
    tx: mpsc::Sender<Result<CombinedEvent>>,
    cancelled: Arc<AtomicBool>,
    text: String,
) {
    let control = TurnControl::default();
    let tokens = tokenize(&mock_response_text(&text, &control));
    for token in tokens {
        if cancelled.load(Ordering::Acquire) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        if tx.send(Ok(CombinedEvent::TextDelta(token))).await.is_err() {
            return;
        }
    }

    let total_ms = (text.len() as f64 * 12.0).clamp(250.0, 1800.0);
    let num_chunks = ((text.len() / 35 + 1) as u32).clamp(2, 8);
    let chunk_ms = total_ms / num_chunks as f64;
    let mut ts = 0.0;
    for i in 0..num_chunks {
        if cancelled.load(Ordering::Acquire) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let mut payload = format!("MOCK_REALTIME|chunk={i}|{text}").into_bytes();
        payload.truncate(2048);
        let chunk = AudioChunk {
            data: payload,
            timestamp_ms: ts,
            duration_ms: chunk_ms,
            sample_rate: rtd_domain::media::PCM_SAMPLE_RATE_HZ,
            encoding: AudioEncoding::Other("mock_realtime".into()),
        };
        if tx.send(Ok(CombinedEvent::AudioChunk(chunk))).await.is_err() {
            return;
        }
        ts += chunk_ms;
    }

    if !cancelled.load(Ordering::Acquire) {
        let _ = tx.send(Ok(CombinedEvent::TurnComplete)).await;
    }
}

#[async_trait]
impl CombinedGenerator for MockCombinedGenerator {
    async fn connect(&self, _system_instructions: &str, _voice: &str) -> Result<()> {
        let (tx, rx) = mpsc::channel(64);
        let mut st = self.state.lock();
        st.tx = Some(tx);
        st.rx = Some(rx);
        Ok(())
    }

    async fn send_user_text(&self, text: &str) -> Result<()> {
        let (tx, cancelled) = {
            let st = self.state.lock();
            let tx = st.tx.clone().ok_or_else(|| {
                rtd_domain::Error::GeneratorFailed {
                    stage: "combined",
                    message: "send_user_text called before connect".into(),
                }
            })?;
            (tx, st.cancelled.clone())
        };
        cancelled.store(false, Ordering::Release);
        tokio::spawn(generate_combined(tx, cancelled, text.to_string()));
        Ok(())
    }

    async fn cancel_response(&self) -> Result<()> {
        self.state.lock().cancelled.store(true, Ordering::Release);
        Ok(())
    }

    fn stream_events(&self) -> BoxStream<'static, Result<CombinedEvent>> {
        let rx = self.state.lock().rx.take();
        Box::pin(async_stream::stream! {
            if let Some(mut rx) = rx {
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            }
        })
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::ok(0.1)
    }

    fn capabilities(&self) -> GeneratorCapabilities {
        GeneratorCapabilities {
            supports_streaming: true,
            supports_emotion: true,
            supports_identity: false,
            max_text_length: 100_000,
            supported_emotions: supported_emotion_names(),
        }
    }
}
