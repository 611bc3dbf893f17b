//! # Sigforge
//!
//! Baseband waveform synthesis for real-world wire protocols — ADS-B Mode S
//! extended squitter, GPS L1/L2/L5 constellations, ExpressLRS LoRa-chirp RC
//! links and a family of jamming waveforms — memoized in a
//! content-addressable on-disk signal cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        SignalCache                         │
//! │  canonical keys · atomic persistence · per-key exclusivity │
//! └───────┬──────────────┬──────────────┬──────────────┬───────┘
//!         ▼              ▼              ▼              ▼
//!  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐
//!  │ AdsbEncoder│ │ GpsEncoder │ │ ElrsEncoder│ │  jamming   │
//!  │  (Mode S)  │ │ (C/A, LNAV)│ │ (LoRa CSS) │ │ (+hopping) │
//!  └────────────┘ └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! Encoders are pure: parameters in, `(SampleBuffer, sample_rate)` out. The
//! cache owns everything stateful — the canonical key derivation, the JSON
//! metadata index, the raw signed 8-bit sample files and the per-key
//! generate-once guarantee. Repeated requests for an identical
//! protocol+parameter combination are served from disk instead of
//! re-synthesized.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sigforge::cache::key::Params;
//! use sigforge::cache::SignalCache;
//! use sigforge::waveform::gps::GpsEncoder;
//!
//! let cache = SignalCache::open("signal_cache")?;
//! let params = Params::new()
//!     .with("band", "L1")
//!     .with("num_satellites", 8_i64)
//!     .with("duration", 30.0);
//!
//! let (path, sample_rate) = cache.get_or_generate("gps", "gps_l1", &params, |p| {
//!     GpsEncoder::encode_params("gps_l1", p, sigforge::rng::DEFAULT_SEED)
//! })?;
//! println!("cached at {} ({} S/s)", path.display(), sample_rate);
//! # Ok::<(), sigforge::types::SignalError>(())
//! ```

pub mod cache;
pub mod crc;
pub mod iir;
pub mod rng;
pub mod types;
pub mod waveform;

pub use cache::key::{ParamKind, ParamSchema, ParamValue, Params};
pub use cache::pregen::{CatalogEntry, PreGenerator, PregenReport};
pub use cache::{CacheEntry, CacheStatus, SignalCache};
pub use types::{CancelToken, Complex, IQSample, Sample, SampleBuffer, SignalError, SignalResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::key::Params;
    pub use crate::cache::pregen::PreGenerator;
    pub use crate::cache::SignalCache;
    pub use crate::types::{CancelToken, SampleBuffer, SignalError, SignalResult};
    pub use crate::waveform::adsb::{Aircraft, AdsbEncoder};
    pub use crate::waveform::elrs::{ElrsBand, ElrsEncoder, FlightMode};
    pub use crate::waveform::gps::{GpsBand, GpsEncoder};
    pub use crate::waveform::hopping::{HopPattern, HopSequenceGenerator};
    pub use crate::waveform::jamming::JammingKind;
}
