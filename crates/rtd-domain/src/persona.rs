use crate::character::CharacterControl;
use crate::control::TurnControl;
use crate::emotion::{EmotionControl, EmotionLabel};

/// An immutable, named `TurnControl` — the defaults a session falls back
/// to whenever a user omits a sub-control on a turn.
#[derive(Debug, Clone)]
pub struct PersonaPreset {
    pub id: &'static str,
    pub display_name: &'static str,
    pub defaults: TurnControl,
}

fn preset(
    id: &'static str,
    display_name: &'static str,
    label: EmotionLabel,
    intensity: f32,
    valence: f32,
    arousal: f32,
    speech_rate: f32,
    pitch_shift: f32,
    expressivity: f32,
    motion_gain: f32,
) -> PersonaPreset {
    PersonaPreset {
        id,
        display_name,
        defaults: TurnControl::new(
            EmotionControl::new(label, intensity, valence, arousal)
                .expect("persona preset emotion values must be in range"),
            CharacterControl::new(id, speech_rate, pitch_shift, expressivity, motion_gain)
                .expect("persona preset character values must be in range"),
        ),
    }
}

/// All persona presets, authoritative values per the persona table.
fn presets() -> Vec<PersonaPreset> {
    vec![
        preset(
            "default",
            "Assistant",
            EmotionLabel::Neutral,
            0.5,
            0.0,
            0.0,
            1.00,
            0.00,
            0.60,
            1.0,
        ),
        preset(
            "professional",
            "Professional",
            EmotionLabel::Neutral,
            0.3,
            0.1,
            -0.1,
            0.95,
            0.00,
            0.40,
            0.7,
        ),
        preset(
            "casual",
            "Casual",
            EmotionLabel::Happy,
            0.4,
            0.3,
            0.1,
            1.05,
            0.00,
            0.70,
            1.1,
        ),
        preset(
            "excited",
            "Excited",
            EmotionLabel::Happy,
            0.8,
            0.7,
            0.6,
            1.20,
            0.05,
            0.90,
            1.5,
        ),
    ]
}

/// Look up a persona preset by id, falling back to `"default"` if the id
/// is unknown. The `default` preset is always present, so this never
/// panics.
pub fn persona_defaults(id: &str) -> PersonaPreset {
    presets()
        .into_iter()
        .find(|p| p.id == id)
        .unwrap_or_else(|| {
            presets()
                .into_iter()
                .find(|p| p.id == "default")
                .expect("default persona preset must exist")
        })
}

/// List all registered persona presets, for the `/v1/personas` endpoint.
pub fn list_personas() -> Vec<PersonaPreset> {
    presets()
}
