pub mod random;
pub mod seq;

pub use random::RandomHexGenerator;
pub use seq::SeqGenerator;

use snip_core::ShortId;

/// Trait for generating short ids.
///
/// Implementations are pure generators that don't interact with storage.
/// Uniqueness against the ids already stored is checked by the repository,
/// which regenerates on collision.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortId>;

    /// Generates a candidate short id.
    fn generate(&self) -> Self::Output;
}

impl<G: Generator> Generator for std::sync::Arc<G> {
    type Output = G::Output;

    fn generate(&self) -> Self::Output {
        (**self).generate()
    }
}
