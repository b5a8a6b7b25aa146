pub mod mock;
pub mod traits;

pub use mock::{
    map_emotion_to_tts_params, MockAvatarGenerator, MockCombinedGenerator, MockLlmGenerator,
    MockTtsGenerator,
};
pub use traits::{
    AvatarGenerator, CombinedEvent, CombinedGenerator, GeneratorContext, LlmGenerator, Role,
    TtsGenerator,
};
