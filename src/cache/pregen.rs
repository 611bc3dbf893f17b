//! Cache warm-up.
//!
//! The pre-generator walks a fixed catalog of signal configurations at
//! process start so every first live request is a cache hit. The catalog is
//! configuration data; it is not part of the runtime request contract.

use super::key::Params;
use super::SignalCache;
use crate::rng::{derive_stream_seed, DEFAULT_SEED};
use crate::types::{CancelToken, SignalError, SignalResult};
use crate::waveform::adsb::AdsbEncoder;
use crate::waveform::elrs::ElrsEncoder;
use crate::waveform::gps::GpsEncoder;
use crate::waveform::jamming;
use crate::waveform::EncoderOutput;
use tracing::{debug, info, warn};

/// One warm-up configuration.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Signal type ("gps", "adsb", "elrs", "jamming", "raw_energy")
    pub signal_type: String,
    /// Protocol identifier
    pub protocol: String,
    /// Request parameters
    pub params: Params,
}

impl CatalogEntry {
    fn new(signal_type: &str, protocol: impl Into<String>, params: Params) -> Self {
        Self {
            signal_type: signal_type.to_string(),
            protocol: protocol.into(),
            params,
        }
    }
}

/// Outcome of one pre-generation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PregenReport {
    /// Entries synthesized this pass
    pub generated: usize,
    /// Entries already cached
    pub skipped: usize,
    /// Entries whose encoder failed
    pub failed: usize,
}

/// Walks the warm-up catalog against a [`SignalCache`].
pub struct PreGenerator {
    catalog: Vec<CatalogEntry>,
    seed: u32,
}

impl PreGenerator {
    /// Pre-generator over the built-in catalog.
    pub fn new() -> Self {
        Self::with_catalog(Self::default_catalog(), DEFAULT_SEED)
    }

    /// Pre-generator over an explicit catalog (used by tests and operators
    /// with custom warm-up sets).
    pub fn with_catalog(catalog: Vec<CatalogEntry>, seed: u32) -> Self {
        Self { catalog, seed }
    }

    /// The catalog this pre-generator walks.
    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    /// The built-in warm-up catalog.
    pub fn default_catalog() -> Vec<CatalogEntry> {
        let mut configs = Vec::new();

        // Wideband video jamming
        for bandwidth in [5e6, 10e6, 20e6] {
            for duration in [5.0, 10.0, 30.0] {
                configs.push(CatalogEntry::new(
                    "jamming",
                    "drone_video",
                    Params::new()
                        .with("bandwidth", bandwidth)
                        .with("duration", duration)
                        .with("jamming_type", "video_noise"),
                ));
            }
        }

        // ELRS control-link transmissions, most common rates and durations
        for band in ["433", "868", "915", "2400"] {
            for packet_rate in [100_i64, 200, 333] {
                for duration in [10.0, 30.0] {
                    configs.push(CatalogEntry::new(
                        "elrs",
                        format!("elrs_{}", band),
                        Params::new()
                            .with("band", band)
                            .with("packet_rate", packet_rate)
                            .with("duration", duration)
                            .with("flight_mode", "manual"),
                    ));
                }
            }
        }

        // ELRS jammers, the two most effective waveforms per band
        for band in ["433", "868", "915", "2400"] {
            let bandwidth = crate::waveform::hopping::band_channel_bandwidth(band)
                .expect("catalog bands are known");
            for jamming_type in ["broadband_noise", "chirp_sweep"] {
                for duration in [10.0, 30.0] {
                    configs.push(CatalogEntry::new(
                        "jamming",
                        format!("elrs_{}_jammer", band),
                        Params::new()
                            .with("band", band)
                            .with("jamming_type", jamming_type)
                            .with("duration", duration)
                            .with("bandwidth", bandwidth),
                    ));
                }
            }
        }

        // GPS constellations
        for band in ["L1", "L2", "L5"] {
            for num_satellites in [8_i64, 12] {
                for duration in [30.0, 60.0] {
                    configs.push(CatalogEntry::new(
                        "gps",
                        format!("gps_{}", band.to_ascii_lowercase()),
                        Params::new()
                            .with("band", band)
                            .with("num_satellites", num_satellites)
                            .with("duration", duration),
                    ));
                }
            }
        }

        // ADS-B scenes
        for num_aircraft in [5_i64, 10] {
            for duration in [30.0, 60.0] {
                configs.push(CatalogEntry::new(
                    "adsb",
                    "adsb_1090",
                    Params::new()
                        .with("num_aircraft", num_aircraft)
                        .with("duration", duration),
                ));
            }
        }

        // Raw energy at the essential tuning targets
        for (name, frequency) in [
            ("vhf_low", 100e6),
            ("uhf_mid", 600e6),
            ("gps_l1", 1575.42e6),
            ("adsb", 1090e6),
        ] {
            for bandwidth in [5e6, 10e6] {
                for noise_type in ["white", "chirp"] {
                    for duration in [10.0, 30.0] {
                        configs.push(CatalogEntry::new(
                            "raw_energy",
                            format!("raw_{}", name),
                            Params::new()
                                .with("frequency", frequency)
                                .with("bandwidth", bandwidth)
                                .with("noise_type", noise_type)
                                .with("duration", duration),
                        ));
                    }
                }
            }
        }

        configs
    }

    /// Route a catalog entry to its encoder.
    fn dispatch(
        signal_type: &str,
        protocol: &str,
        params: &Params,
        seed: u32,
    ) -> SignalResult<EncoderOutput> {
        match signal_type {
            "jamming" if protocol == "drone_video" => {
                jamming::encode_params_drone_video(params, seed)
            }
            "jamming" => jamming::encode_params_elrs_jammer(params, seed),
            "raw_energy" => jamming::encode_params_raw_energy(params, seed),
            "elrs" => ElrsEncoder::encode_params(protocol, params, seed),
            "gps" => GpsEncoder::encode_params(protocol, params, seed),
            "adsb" => AdsbEncoder::encode_params(params, seed),
            other => Err(SignalError::UnknownProtocol(format!(
                "{}/{}",
                other, protocol
            ))),
        }
    }

    /// Walk the catalog sequentially, warming `cache`.
    ///
    /// Entries already cached are skipped, failures are logged and counted
    /// without aborting the walk, and a cancelled token stops the walk
    /// before the next entry starts (never mid-synthesis).
    pub fn run(&self, cache: &SignalCache, token: &CancelToken) -> PregenReport {
        let total = self.catalog.len();
        info!(total, "pre-generating signal catalog");
        let mut report = PregenReport::default();

        for (i, entry) in self.catalog.iter().enumerate() {
            if token.is_cancelled() {
                info!(done = i, total, "pre-generation cancelled");
                break;
            }

            let key = cache.cache_key(&entry.signal_type, &entry.protocol, &entry.params);
            if cache.lookup(&key).is_some() {
                debug!(
                    entry = i + 1,
                    total,
                    protocol = %entry.protocol,
                    "already cached, skipping"
                );
                report.skipped += 1;
                continue;
            }

            let seed = derive_stream_seed(self.seed, &entry.protocol);
            let outcome = cache.get_or_generate(
                &entry.signal_type,
                &entry.protocol,
                &entry.params,
                |params| Self::dispatch(&entry.signal_type, &entry.protocol, params, seed),
            );
            match outcome {
                Ok(_) => {
                    debug!(entry = i + 1, total, protocol = %entry.protocol, "generated");
                    report.generated += 1;
                }
                Err(err) => {
                    warn!(
                        protocol = %entry.protocol,
                        %err,
                        "pre-generation entry failed"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            generated = report.generated,
            skipped = report.skipped,
            failed = report.failed,
            "pre-generation pass complete"
        );
        report
    }
}

impl Default for PreGenerator {
    fn default() -> Self {
        Self::new()
    }
}
