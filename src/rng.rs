//! Deterministic random streams.
//!
//! All stochastic content in the encoders (movement jitter, navigation
//! filler bits, stick waveforms, jamming noise) flows through seeded PCG32
//! generators. Stream seeds are derived with BLAKE3 from a base seed and a
//! label so each component draws from an independent, reproducible stream.

use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::f64::consts::PI;

/// Fixed seed constant shared by hop sequences and default content streams.
pub const DEFAULT_SEED: u32 = 0x1234_5678;

/// Create a PCG32 generator from a 32-bit seed.
///
/// The seed is duplicated into both halves of the 64-bit state word.
pub fn create_rng(seed: u32) -> Pcg32 {
    let seed64 = (seed as u64) | ((seed as u64) << 32);
    Pcg32::seed_from_u64(seed64)
}

/// Derive an independent stream seed from a base seed and a label.
///
/// `stream_seed = truncate_u32(BLAKE3(base_le || label))`
pub fn derive_stream_seed(base: u32, label: &str) -> u32 {
    let mut input = Vec::with_capacity(4 + label.len());
    input.extend_from_slice(&base.to_le_bytes());
    input.extend_from_slice(label.as_bytes());
    let hash = blake3::hash(&input);
    let bytes: [u8; 4] = hash.as_bytes()[0..4].try_into().expect("blake3 output");
    u32::from_le_bytes(bytes)
}

/// Create a generator for a named component stream.
pub fn create_stream_rng(base: u32, label: &str) -> Pcg32 {
    create_rng(derive_stream_seed(base, label))
}

/// Draw a pair of independent standard-normal values (Box-Muller).
pub fn gaussian_pair(rng: &mut Pcg32) -> (f64, f64) {
    let u1: f64 = rng.gen::<f64>().max(1e-30);
    let u2: f64 = rng.gen();
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = 2.0 * PI * u2;
    (r * theta.cos(), r * theta.sin())
}

/// Draw a single normal value with the given mean and standard deviation.
pub fn gaussian(rng: &mut Pcg32, mean: f64, std_dev: f64) -> f64 {
    let (z, _) = gaussian_pair(rng);
    mean + std_dev * z
}

/// Fisher-Yates permutation of `0..n` from a seeded stream.
pub fn shuffled_indices(n: usize, seed: u32) -> Vec<usize> {
    let mut rng = create_rng(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        indices.swap(i, j);
    }
    indices
}
