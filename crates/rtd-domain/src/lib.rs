pub mod cancel;
pub mod capability;
pub mod character;
pub mod config;
pub mod control;
pub mod emotion;
pub mod error;
pub mod events;
pub mod media;
pub mod persona;
pub mod stream;

pub use cancel::CancelToken;
pub use capability::{GeneratorCapabilities, HealthStatus, SystemCapabilities, SystemHealth};
pub use character::CharacterControl;
pub use config::Config;
pub use control::TurnControl;
pub use emotion::{EmotionControl, EmotionLabel};
pub use error::{Error, Result};
pub use events::{InboundEvent, OutboundEvent};
pub use media::{AudioChunk, AudioEncoding, VideoContentType, VideoFrame};
pub use persona::{list_personas, persona_defaults, PersonaPreset};
pub use stream::BoxStream;
