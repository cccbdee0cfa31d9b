use office_shared::participant::ParticipantId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Mints participant identities.
///
/// Identities are random v4 UUIDs drawn from a ChaCha8 stream. A candidate
/// that collides with a live identity is discarded, so an identity is never
/// handed out while another connection still holds it.
pub struct IdentityAllocator {
    rng: ChaCha8Rng,
}

impl IdentityAllocator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { rng }
    }

    pub fn allocate(&mut self, is_live: impl Fn(&ParticipantId) -> bool) -> ParticipantId {
        loop {
            let bytes: [u8; 16] = self.rng.gen();
            let id = ParticipantId::from(uuid::Builder::from_random_bytes(bytes).into_uuid());
            if !is_live(&id) {
                return id;
            }
            tracing::warn!("Identity {} collided with a live participant", id.short());
        }
    }
}
