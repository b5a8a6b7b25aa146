use serde::{Deserialize, Serialize};

/// Sample rate used by the PCM TTS path and the mock generators. Chosen
/// as the authoritative rate — see DESIGN.md's Open Question decision on
/// which `OpenAITTSAdapter` variant is normative.
pub const PCM_SAMPLE_RATE_HZ: u32 = 24_000;

/// Reference bitrate used only to estimate duration for MP3-encoded
/// chunks arriving from a provider that doesn't report it directly.
pub const MP3_REFERENCE_BITRATE_KBPS: u32 = 128;

/// Avatar generator's fixed target rate.
pub const AVATAR_FPS: f64 = 25.0;

/// Audio container/codec tag. `Other` carries a provider-specific string
/// for encodings the core doesn't need to reason about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    Mp3,
    Pcm,
    Other(String),
}

/// One chunk of synthesized audio. `duration_ms` is always computed from
/// `data` and `encoding`, never asserted by the caller, so it cannot be
/// wrong relative to the bytes it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunk {
    pub data: Vec<u8>,
    pub timestamp_ms: f64,
    pub duration_ms: f64,
    pub sample_rate: u32,
    pub encoding: AudioEncoding,
}

impl AudioChunk {
    /// Build a chunk, deriving `duration_ms` from the payload and encoding.
    pub fn new(
        data: Vec<u8>,
        timestamp_ms: f64,
        sample_rate: u32,
        encoding: AudioEncoding,
    ) -> Self {
        let duration_ms = estimate_duration_ms(&data, sample_rate, &encoding);
        Self {
            data,
            timestamp_ms,
            duration_ms,
            sample_rate,
            encoding,
        }
    }
}

fn estimate_duration_ms(data: &[u8], sample_rate: u32, encoding: &AudioEncoding) -> f64 {
    match encoding {
        AudioEncoding::Pcm => estimate_pcm_duration_ms(data, sample_rate),
        AudioEncoding::Mp3 => estimate_mp3_duration_ms(data, MP3_REFERENCE_BITRATE_KBPS),
        AudioEncoding::Other(_) => estimate_pcm_duration_ms(data, sample_rate),
    }
}

/// 16-bit mono PCM: `samples = len(data) / 2`; `duration_ms = samples /
/// sample_rate * 1000`.
pub fn estimate_pcm_duration_ms(data: &[u8], sample_rate: u32) -> f64 {
    if data.is_empty() || sample_rate == 0 {
        return 0.0;
    }
    let samples = data.len() as f64 / 2.0;
    (samples / sample_rate as f64) * 1000.0
}

/// Constant-bitrate estimate: `duration_ms = len(data) * 8 / bitrate_kbps`.
pub fn estimate_mp3_duration_ms(data: &[u8], bitrate_kbps: u32) -> f64 {
    if data.is_empty() || bitrate_kbps == 0 {
        return 0.0;
    }
    (data.len() as f64 * 8.0) / bitrate_kbps as f64
}

/// Video frame container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoContentType {
    Jpeg,
    H264Nal,
    RawRgb,
}

/// One lip-synced video frame, derived from one `AudioChunk`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub timestamp_ms: f64,
    pub frame_index: u64,
    pub width: u32,
    pub height: u32,
    pub content_type: VideoContentType,
}

/// Number of frames the avatar generator must emit for a chunk of the
/// given duration at [`AVATAR_FPS`]: `max(1, round(duration_ms/1000 *
/// fps))`.
pub fn frame_count_for_duration(duration_ms: f64) -> u64 {
    let raw = (duration_ms / 1000.0 * AVATAR_FPS).round();
    raw.max(1.0) as u64
}

/// Per-frame spacing at [`AVATAR_FPS`], in milliseconds.
pub fn frame_spacing_ms() -> f64 {
    1000.0 / AVATAR_FPS
}
