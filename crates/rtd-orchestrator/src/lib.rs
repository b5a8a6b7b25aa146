pub mod turn;

pub use turn::{spawn_turn, GeneratorSet};
