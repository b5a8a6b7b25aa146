use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Discrete emotional register. Carries no intensity of its own — see
/// [`EmotionControl::intensity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgusted,
}

impl Default for EmotionLabel {
    fn default() -> Self {
        EmotionLabel::Neutral
    }
}

/// Per-turn emotional target. Constructed only through [`EmotionControl::new`]
/// (or `Default::default`) so an out-of-range value can never exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEmotionControl", into = "RawEmotionControl")]
pub struct EmotionControl {
    label: EmotionLabel,
    intensity: f32,
    valence: f32,
    arousal: f32,
}

impl Default for EmotionControl {
    fn default() -> Self {
        Self {
            label: EmotionLabel::Neutral,
            intensity: 0.5,
            valence: 0.0,
            arousal: 0.0,
        }
    }
}

impl EmotionControl {
    pub fn new(
        label: EmotionLabel,
        intensity: f32,
        valence: f32,
        arousal: f32,
    ) -> crate::error::Result<Self> {
        if !(0.0..=1.0).contains(&intensity) {
            return Err(Error::InvalidControl(format!(
                "emotion.intensity {intensity} out of range [0,1]"
            )));
        }
        if !(-1.0..=1.0).contains(&valence) {
            return Err(Error::InvalidControl(format!(
                "emotion.valence {valence} out of range [-1,1]"
            )));
        }
        if !(-1.0..=1.0).contains(&arousal) {
            return Err(Error::InvalidControl(format!(
                "emotion.arousal {arousal} out of range [-1,1]"
            )));
        }
        Ok(Self {
            label,
            intensity,
            valence,
            arousal,
        })
    }

    pub fn label(&self) -> EmotionLabel {
        self.label
    }
    pub fn intensity(&self) -> f32 {
        self.intensity
    }
    pub fn valence(&self) -> f32 {
        self.valence
    }
    pub fn arousal(&self) -> f32 {
        self.arousal
    }
}

/// Unvalidated wire shape; only used as a serde intermediate so a
/// malformed payload surfaces as [`Error::InvalidControl`] rather than a
/// panic.
#[derive(Serialize, Deserialize)]
struct RawEmotionControl {
    #[serde(default)]
    label: EmotionLabel,
    #[serde(default = "default_intensity")]
    intensity: f32,
    #[serde(default)]
    valence: f32,
    #[serde(default)]
    arousal: f32,
}

fn default_intensity() -> f32 {
    0.5
}

impl TryFrom<RawEmotionControl> for EmotionControl {
    type Error = Error;

    fn try_from(raw: RawEmotionControl) -> crate::error::Result<Self> {
        EmotionControl::new(raw.label, raw.intensity, raw.valence, raw.arousal)
    }
}

impl From<EmotionControl> for RawEmotionControl {
    fn from(c: EmotionControl) -> Self {
        Self {
            label: c.label,
            intensity: c.intensity,
            valence: c.valence,
            arousal: c.arousal,
        }
    }
}
