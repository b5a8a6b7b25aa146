use serde::{Deserialize, Serialize};

use crate::character::CharacterControl;
use crate::emotion::EmotionControl;

/// The pair of controls carried by a turn. Equality is structural —
/// relied on by the control resolver to detect "unset" sub-controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnControl {
    #[serde(default)]
    pub emotion: EmotionControl,
    #[serde(default)]
    pub character: CharacterControl,
}

impl TurnControl {
    pub fn new(emotion: EmotionControl, character: CharacterControl) -> Self {
        Self { emotion, character }
    }
}
