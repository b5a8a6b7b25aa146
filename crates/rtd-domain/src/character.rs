use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Per-turn voice/body target. `persona_id` is not validated against the
/// persona registry here — an unknown id is resolved to `"default"` by
/// whichever component consults the registry (session creation, the
/// control resolver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCharacterControl", into = "RawCharacterControl")]
pub struct CharacterControl {
    persona_id: String,
    speech_rate: f32,
    pitch_shift: f32,
    expressivity: f32,
    motion_gain: f32,
}

impl Default for CharacterControl {
    fn default() -> Self {
        Self {
            persona_id: "default".into(),
            speech_rate: 1.0,
            pitch_shift: 0.0,
            expressivity: 0.6,
            motion_gain: 1.0,
        }
    }
}

impl CharacterControl {
    pub fn new(
        persona_id: impl Into<String>,
        speech_rate: f32,
        pitch_shift: f32,
        expressivity: f32,
        motion_gain: f32,
    ) -> crate::error::Result<Self> {
        if !(0.25..=4.0).contains(&speech_rate) {
            return Err(Error::InvalidControl(format!(
                "character.speech_rate {speech_rate} out of range [0.25,4.0]"
            )));
        }
        if !(-1.0..=1.0).contains(&pitch_shift) {
            return Err(Error::InvalidControl(format!(
                "character.pitch_shift {pitch_shift} out of range [-1,1]"
            )));
        }
        if !(0.0..=1.0).contains(&expressivity) {
            return Err(Error::InvalidControl(format!(
                "character.expressivity {expressivity} out of range [0,1]"
            )));
        }
        if !(0.0..=2.0).contains(&motion_gain) {
            return Err(Error::InvalidControl(format!(
                "character.motion_gain {motion_gain} out of range [0,2]"
            )));
        }
        Ok(Self {
            persona_id: persona_id.into(),
            speech_rate,
            pitch_shift,
            expressivity,
            motion_gain,
        })
    }

    pub fn persona_id(&self) -> &str {
        &self.persona_id
    }
    pub fn speech_rate(&self) -> f32 {
        self.speech_rate
    }
    pub fn pitch_shift(&self) -> f32 {
        self.pitch_shift
    }
    pub fn expressivity(&self) -> f32 {
        self.expressivity
    }
    pub fn motion_gain(&self) -> f32 {
        self.motion_gain
    }

    /// `true` only when `persona_id` is the sentinel value — used by the
    /// control resolver's `resolve`, which (unlike `merge`) keys the
    /// "is this unset" question on `persona_id` alone, not full equality.
    pub fn has_default_persona_id(&self) -> bool {
        self.persona_id == "default"
    }
}

#[derive(Serialize, Deserialize)]
struct RawCharacterControl {
    #[serde(default = "default_persona_id")]
    persona_id: String,
    #[serde(default = "default_speech_rate")]
    speech_rate: f32,
    #[serde(default)]
    pitch_shift: f32,
    #[serde(default = "default_expressivity")]
    expressivity: f32,
    #[serde(default = "default_motion_gain")]
    motion_gain: f32,
}

fn default_persona_id() -> String {
    "default".into()
}
fn default_speech_rate() -> f32 {
    1.0
}
fn default_expressivity() -> f32 {
    0.6
}
fn default_motion_gain() -> f32 {
    1.0
}

impl TryFrom<RawCharacterControl> for CharacterControl {
    type Error = Error;

    fn try_from(raw: RawCharacterControl) -> crate::error::Result<Self> {
        CharacterControl::new(
            raw.persona_id,
            raw.speech_rate,
            raw.pitch_shift,
            raw.expressivity,
            raw.motion_gain,
        )
    }
}

impl From<CharacterControl> for RawCharacterControl {
    fn from(c: CharacterControl) -> Self {
        Self {
            persona_id: c.persona_id,
            speech_rate: c.speech_rate,
            pitch_shift: c.pitch_shift,
            expressivity: c.expressivity,
            motion_gain: c.motion_gain,
        }
    }
}
