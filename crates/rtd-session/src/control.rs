use rtd_domain::{CharacterControl, EmotionControl, TurnControl};

/// Layered merge of a turn's user-supplied control with a persona's
/// defaults. Each sub-control is taken from `user` if it differs from
/// the type default, otherwise from `persona`.
///
/// `character` is keyed on `persona_id` alone (not full structural
/// equality) — see DESIGN.md's Open Question decision on why `resolve`
/// and [`merge`] disagree here.
pub fn resolve(user: &TurnControl, persona: &TurnControl) -> TurnControl {
    let emotion_is_default = user.emotion == EmotionControl::default();
    let character_is_default = user.character.has_default_persona_id();
    TurnControl {
        emotion: if emotion_is_default {
            persona.emotion
        } else {
            user.emotion
        },
        character: if character_is_default {
            persona.character.clone()
        } else {
            user.character.clone()
        },
    }
}

/// Merge a stored `pending_control` (`base`) with a freshly-sent
/// `user_text`'s control (`override_`). `override_` wins per sub-control
/// when it differs from the type default; otherwise `base` fills in;
/// otherwise the type default. Gives `control_update` a next-turn-only
/// effect without requiring it to be complete.
pub fn merge(base: &TurnControl, override_: &TurnControl) -> TurnControl {
    let base_emotion_default = base.emotion == EmotionControl::default();
    let base_character_default = base.character == CharacterControl::default();
    let over_emotion_default = override_.emotion == EmotionControl::default();
    let over_character_default = override_.character == CharacterControl::default();

    TurnControl {
        emotion: if !over_emotion_default {
            override_.emotion
        } else if !base_emotion_default {
            base.emotion
        } else {
            EmotionControl::default()
        },
        character: if !over_character_default {
            override_.character.clone()
        } else if !base_character_default {
            base.character.clone()
        } else {
            CharacterControl::default()
        },
    }
}

/// Build a persona- and emotion-aware system prompt for the LLM
/// generator from a resolved [`TurnControl`].
pub fn build_system_prompt(control: &TurnControl, persona_name: &str) -> String {
    let e = &control.emotion;
    let c = &control.character;
    let mut parts = vec![format!("You are {persona_name}.")];

    if e.label() != rtd_domain::EmotionLabel::Neutral || e.intensity() > 0.3 {
        parts.push(format!(
            "Respond with a {:?} tone (intensity {:.1}/1.0).",
            e.label(),
            e.intensity()
        ));
    }
    if c.speech_rate() < 0.85 {
        parts.push("Speak slowly and deliberately.".into());
    } else if c.speech_rate() > 1.2 {
        parts.push("Speak at a brisk, energetic pace.".into());
    }
    if c.expressivity() > 0.7 {
        parts.push("Be expressive and emotionally engaged.".into());
    }
    parts.push("Keep responses conversational and appropriately brief.".into());
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtd_domain::EmotionLabel;

    fn persona_control() -> TurnControl {
        TurnControl::new(
            EmotionControl::new(EmotionLabel::Happy, 0.4, 0.3, 0.1).unwrap(),
            CharacterControl::new("casual", 1.05, 0.0, 0.7, 1.1).unwrap(),
        )
    }

    #[test]
    fn resolve_falls_back_to_persona_when_user_control_default() {
        let user = TurnControl::default();
        let effective = resolve(&user, &persona_control());
        assert_eq!(effective.emotion, persona_control().emotion);
        assert_eq!(effective.character, persona_control().character);
    }

    #[test]
    fn resolve_keeps_user_emotion_when_non_default() {
        let user = TurnControl::new(
            EmotionControl::new(EmotionLabel::Angry, 0.9, -0.5, 0.8).unwrap(),
            CharacterControl::default(),
        );
        let effective = resolve(&user, &persona_control());
        assert_eq!(effective.emotion.label(), EmotionLabel::Angry);
    }

    #[test]
    fn resolve_character_keyed_on_persona_id_only() {
        // persona_id differs from "default" but every other field is
        // still the type default — resolve must still prefer the user's
        // character wholesale, per the persona_id-only check.
        let user = TurnControl::new(
            EmotionControl::default(),
            CharacterControl::new("casual", 1.0, 0.0, 0.6, 1.0).unwrap(),
        );
        let effective = resolve(&user, &persona_control());
        assert_eq!(effective.character.persona_id(), "casual");
        assert_eq!(effective.character.speech_rate(), 1.0);
    }

    #[test]
    fn merge_prefers_override_when_non_default() {
        let base = TurnControl::new(
            EmotionControl::new(EmotionLabel::Happy, 0.7, 0.0, 0.6).unwrap(),
            CharacterControl::new("default", 1.2, 0.0, 0.6, 1.0).unwrap(),
        );
        let override_ = TurnControl::default();
        let effective = merge(&base, &override_);
        // override is fully default, so base fills in.
        assert_eq!(effective.emotion.label(), EmotionLabel::Happy);
        assert_eq!(effective.character.speech_rate(), 1.2);
    }

    #[test]
    fn merge_override_wins_over_base() {
        let base = TurnControl::new(
            EmotionControl::new(EmotionLabel::Sad, 0.6, -0.2, -0.1).unwrap(),
            CharacterControl::default(),
        );
        let override_ = TurnControl::new(
            EmotionControl::new(EmotionLabel::Happy, 0.8, 0.7, 0.6).unwrap(),
            CharacterControl::default(),
        );
        let effective = merge(&base, &override_);
        assert_eq!(effective.emotion.label(), EmotionLabel::Happy);
    }

    #[test]
    fn merge_both_default_yields_type_default() {
        let effective = merge(&TurnControl::default(), &TurnControl::default());
        assert_eq!(effective, TurnControl::default());
    }

    #[test]
    fn scenario_s2_pending_control_applies_next_turn() {
        // First turn: neutral control (fully default).
        let persona = TurnControl::default();
        let turn_a = resolve(&TurnControl::default(), &persona);
        assert_eq!(turn_a, persona);

        // control_update stores emotion=happy, speech_rate=1.2.
        let pending = TurnControl::new(
            EmotionControl::new(EmotionLabel::Happy, 0.5, 0.0, 0.0).unwrap(),
            CharacterControl::new("default", 1.2, 0.0, 0.6, 1.0).unwrap(),
        );

        // Second turn: user_text carries no control.
        let effective = merge(&pending, &TurnControl::default());
        assert_eq!(effective.emotion.label(), EmotionLabel::Happy);
        assert_eq!(effective.character.speech_rate(), 1.2);
        // First turn's effective control is untouched by this.
        assert_eq!(turn_a, persona);
    }
}
