//! Randomness that does not need to be secret.
//!
//! Heartbeat padding is random filler the peer discards. With
//! [`Config::rng_seed`](crate::Config::rng_seed) set it becomes
//! reproducible, which keeps captured datagrams stable across test runs.
//! Handshake randoms and keys always come from the crypto provider.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub(crate) struct SeededRng {
    seeded: Option<StdRng>,
}

impl SeededRng {
    /// Seeded when `seed` is given, otherwise backed by the thread rng.
    pub fn new(seed: Option<u64>) -> Self {
        SeededRng {
            seeded: seed.map(StdRng::seed_from_u64),
        }
    }

    pub fn fill(&mut self, dest: &mut [u8]) {
        match &mut self.seeded {
            Some(rng) => rng.fill(dest),
            None => rand::rng().fill(dest),
        }
    }
}

impl std::fmt::Debug for SeededRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededRng")
            .field("seeded", &self.seeded.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_padding() {
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        SeededRng::new(Some(7)).fill(&mut a);
        SeededRng::new(Some(7)).fill(&mut b);
        assert_eq!(a, b);

        SeededRng::new(Some(8)).fill(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn unseeded_fills() {
        let mut a = [0u8; 32];
        SeededRng::new(None).fill(&mut a);
        assert_ne!(a, [0u8; 32]);
    }
}
