//! Frequency-hop channel plans and hop sequence generation.
//!
//! Each RC band owns a channel list; a hop sequence is an ordered list of
//! indices into that list. Sequences are deterministic for a fixed seed so a
//! run can be reproduced exactly.
//!
//! ```text
//! Time →
//! ┌──────┬──────┬──────┬──────┬──────┐
//! │      │  ●   │      │      │      │  ch 4
//! │      │      │      │  ●   │      │  ch 3
//! │  ●   │      │      │      │  ●   │  ch 2
//! │      │      │  ●   │      │      │  ch 1
//! └──────┴──────┴──────┴──────┴──────┘
//!  hop 1  hop 2  hop 3  hop 4  hop 5
//! ```

use crate::rng::{shuffled_indices, DEFAULT_SEED};
use crate::types::{SignalError, SignalResult};

/// Dwell per channel in barrage mode, seconds. Barrage is rapid sequential
/// retuning across every channel, not simultaneous transmission.
pub const BARRAGE_DWELL_SECS: f64 = 0.15;

/// 433 MHz band jamming channels (100 kHz raster).
pub const CHANNELS_433: [f64; 20] = [
    433.075e6, 433.175e6, 433.275e6, 433.375e6, 433.475e6, 433.575e6, 433.675e6, 433.775e6,
    433.875e6, 433.975e6, 434.075e6, 434.175e6, 434.275e6, 434.375e6, 434.475e6, 434.575e6,
    434.675e6, 434.775e6, 434.875e6, 434.975e6,
];

/// 868 MHz band jamming channels (200 kHz raster).
pub const CHANNELS_868: [f64; 20] = [
    867.1e6, 867.3e6, 867.5e6, 867.7e6, 867.9e6, 868.1e6, 868.3e6, 868.5e6, 868.7e6, 868.9e6,
    869.1e6, 869.3e6, 869.5e6, 869.7e6, 869.9e6, 870.1e6, 870.3e6, 870.5e6, 870.7e6, 870.9e6,
];

/// 915 MHz band jamming channels (1 MHz raster).
pub const CHANNELS_915: [f64; 24] = [
    902.4e6, 903.4e6, 904.4e6, 905.4e6, 906.4e6, 907.4e6, 908.4e6, 909.4e6, 910.4e6, 911.4e6,
    912.4e6, 913.4e6, 914.4e6, 915.4e6, 916.4e6, 917.4e6, 918.4e6, 919.4e6, 920.4e6, 921.4e6,
    922.4e6, 923.4e6, 924.4e6, 925.4e6,
];

/// 2.4 GHz band jamming channels (5 MHz raster).
pub const CHANNELS_2400: [f64; 20] = [
    2400e6, 2405e6, 2410e6, 2415e6, 2420e6, 2425e6, 2430e6, 2435e6, 2440e6, 2445e6, 2450e6,
    2455e6, 2460e6, 2465e6, 2470e6, 2475e6, 2480e6, 2485e6, 2490e6, 2495e6,
];

/// Channel list for a band name ("433", "868", "915", "2400").
pub fn band_channels(band: &str) -> SignalResult<&'static [f64]> {
    match band {
        "433" => Ok(&CHANNELS_433),
        "868" => Ok(&CHANNELS_868),
        "915" => Ok(&CHANNELS_915),
        "2400" => Ok(&CHANNELS_2400),
        other => Err(SignalError::UnknownProtocol(format!("band {}", other))),
    }
}

/// Per-band channel bandwidth in Hz.
pub fn band_channel_bandwidth(band: &str) -> SignalResult<f64> {
    match band {
        "433" | "868" => Ok(250e3),
        "915" => Ok(500e3),
        "2400" => Ok(2e6),
        other => Err(SignalError::UnknownProtocol(format!("band {}", other))),
    }
}

/// Hop ordering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopPattern {
    /// Identity channel order
    Sequential,
    /// Fixed-seed shuffle of the channel list
    Pseudorandom,
    /// Weighted toward the band's hot center channels
    Adaptive,
    /// Interleaved coprime strides covering the band quickly
    Burst,
    /// Every channel in order with a short fixed dwell
    Barrage,
}

impl HopPattern {
    /// Parse a wire-format pattern name.
    pub fn parse(name: &str) -> SignalResult<Self> {
        match name {
            "sequential" => Ok(HopPattern::Sequential),
            "pseudorandom" => Ok(HopPattern::Pseudorandom),
            "adaptive" | "race_focus" => Ok(HopPattern::Adaptive),
            "burst" => Ok(HopPattern::Burst),
            "barrage" => Ok(HopPattern::Barrage),
            other => Err(SignalError::UnknownWaveform(other.to_string())),
        }
    }
}

/// Deterministic hop sequence generator over a channel count.
#[derive(Debug, Clone)]
pub struct HopSequenceGenerator {
    num_channels: usize,
    seed: u32,
}

impl HopSequenceGenerator {
    /// Generator over `num_channels` with the fixed default seed.
    pub fn new(num_channels: usize) -> Self {
        Self::with_seed(num_channels, DEFAULT_SEED)
    }

    /// Generator with an explicit seed.
    pub fn with_seed(num_channels: usize, seed: u32) -> Self {
        Self { num_channels, seed }
    }

    /// The hop sequence for a pattern.
    pub fn sequence(&self, pattern: HopPattern) -> Vec<usize> {
        let n = self.num_channels;
        match pattern {
            HopPattern::Sequential | HopPattern::Barrage => (0..n).collect(),
            HopPattern::Pseudorandom => shuffled_indices(n, self.seed),
            HopPattern::Adaptive => {
                // Duplicate channels near the band center where traffic
                // concentrates; truncated to twice the channel count.
                let center = n / 2;
                let mut sequence = Vec::new();
                for i in 0..n {
                    let weight = 1.0 / (1.0 + (i as f64 - center as f64).abs() * 0.1);
                    let repeats = (weight * 3.0) as usize;
                    sequence.extend(std::iter::repeat(i).take(repeats));
                }
                sequence.truncate(n * 2);
                sequence
            }
            HopPattern::Burst => {
                let mut sequence = Vec::new();
                for step in [1, 3, 5, 7, 2, 4, 6, 8] {
                    for start in 0..step {
                        let mut i = start;
                        while i < n {
                            sequence.push(i);
                            i += step;
                        }
                    }
                }
                sequence
            }
        }
    }

    /// Dwell time per hop for a pattern at the given hop rate.
    pub fn dwell_secs(&self, pattern: HopPattern, hop_rate: f64) -> f64 {
        match pattern {
            HopPattern::Barrage => BARRAGE_DWELL_SECS,
            _ if hop_rate > 0.0 => 1.0 / hop_rate,
            _ => BARRAGE_DWELL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_channel_counts() {
        assert_eq!(band_channels("433").unwrap().len(), 20);
        assert_eq!(band_channels("868").unwrap().len(), 20);
        assert_eq!(band_channels("915").unwrap().len(), 24);
        assert_eq!(band_channels("2400").unwrap().len(), 20);
        assert!(band_channels("5800").is_err());
    }

    #[test]
    fn test_sequential_is_identity() {
        let gen = HopSequenceGenerator::new(10);
        assert_eq!(gen.sequence(HopPattern::Sequential), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_pseudorandom_is_reproducible_permutation() {
        let gen = HopSequenceGenerator::new(24);
        let seq = gen.sequence(HopPattern::Pseudorandom);
        assert_eq!(seq, gen.sequence(HopPattern::Pseudorandom));

        let mut sorted = seq.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..24).collect::<Vec<_>>());
        assert_ne!(seq, (0..24).collect::<Vec<_>>());
    }

    #[test]
    fn test_adaptive_favors_center_channels() {
        let gen = HopSequenceGenerator::new(20);
        let seq = gen.sequence(HopPattern::Adaptive);
        assert!(!seq.is_empty() && seq.len() <= 40);
        let center_hits = seq.iter().filter(|&&i| i == 10).count();
        let edge_hits = seq.iter().filter(|&&i| i == 0).count();
        assert!(center_hits > edge_hits);
        assert!(seq.iter().all(|&i| i < 20));
    }

    #[test]
    fn test_burst_covers_every_channel() {
        let gen = HopSequenceGenerator::new(24);
        let seq = gen.sequence(HopPattern::Burst);
        for channel in 0..24 {
            assert!(seq.contains(&channel), "burst must visit channel {}", channel);
        }
    }

    #[test]
    fn test_barrage_visits_all_with_short_dwell() {
        let gen = HopSequenceGenerator::new(20);
        let seq = gen.sequence(HopPattern::Barrage);
        assert_eq!(seq, (0..20).collect::<Vec<_>>());
        assert_eq!(gen.dwell_secs(HopPattern::Barrage, 100.0), BARRAGE_DWELL_SECS);
        assert_eq!(gen.dwell_secs(HopPattern::Pseudorandom, 100.0), 0.01);
    }

    #[test]
    fn test_pattern_parsing() {
        assert_eq!(HopPattern::parse("sequential").unwrap(), HopPattern::Sequential);
        assert_eq!(HopPattern::parse("race_focus").unwrap(), HopPattern::Adaptive);
        assert!(HopPattern::parse("zigzag").is_err());
    }
}
