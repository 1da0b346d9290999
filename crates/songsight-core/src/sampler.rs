//! Seedable uniform sampling without replacement.
//!
//! All randomness in songsight flows through this module. With an explicit
//! seed the generator is a PCG64 seeded from that value, so the same seed
//! and the same candidate sequence always give the same output, in the same
//! order. Without a seed the generator is seeded from OS entropy.

use rand::seq::index;
use rand::SeedableRng;
use rand_pcg::Pcg64;

/// Creates the generator used for one sampling call.
pub fn create_rng(seed: Option<u64>) -> Pcg64 {
    match seed {
        Some(seed) => Pcg64::seed_from_u64(seed),
        None => Pcg64::from_entropy(),
    }
}

/// Picks `min(count, candidates.len())` distinct candidates uniformly at
/// random. The returned order is itself random.
pub fn sample<T>(candidates: &[T], count: usize, seed: Option<u64>) -> Vec<&T> {
    let amount = count.min(candidates.len());
    if amount == 0 {
        return Vec::new();
    }

    let mut rng = create_rng(seed);
    index::sample(&mut rng, candidates.len(), amount)
        .into_iter()
        .map(|i| &candidates[i])
        .collect()
}
