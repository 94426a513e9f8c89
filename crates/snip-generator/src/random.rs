use crate::Generator;
use rand::Rng;
use snip_core::ShortId;
use typed_builder::TypedBuilder;

/// Default number of random bytes per id (8 hex characters).
pub const DEFAULT_ID_BYTES: usize = 4;
/// Upper bound on the configurable byte length (64 hex characters).
pub const MAX_ID_BYTES: usize = 32;

/// Produces fixed-length lowercase hex ids from a cryptographically strong
/// random source.
///
/// Bytes come from the thread-local CSPRNG, which is seeded from the
/// operating system. A failure of that source is treated as unrecoverable.
#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomHexGenerator {
    /// Number of random bytes; the id is twice as many hex characters.
    #[builder(default = DEFAULT_ID_BYTES, setter(transform = |bytes: usize| bytes.clamp(1, MAX_ID_BYTES)))]
    bytes: usize,
}

impl RandomHexGenerator {
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Length in characters of every generated id.
    pub fn id_len(&self) -> usize {
        self.bytes * 2
    }
}

impl Default for RandomHexGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomHexGenerator {
    type Output = ShortId;

    fn generate(&self) -> ShortId {
        let mut buf = vec![0u8; self.bytes];
        rand::rng().fill(buf.as_mut_slice());
        ShortId::from_bytes(buf)
    }
}
