use std::pin::Pin;

use futures_core::Stream;

/// A boxed, owned, `Send` stream — the shape every generator method
/// returns so trait objects can be stored behind `Arc<dyn Generator>`.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;
