//! Protocol encoders.
//!
//! Each encoder is a pure function from request parameters to a sample
//! buffer and its sample rate; the signal cache drives them through the
//! `EncoderOutput` contract and never needs to know protocol internals.
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐
//! │   ADS-B   │   │    GPS    │   │   ELRS    │   │  Jamming  │
//! │ (Mode S)  │   │ (L1/L2/L5)│   │ (LoRa CSS)│   │ (+ hops)  │
//! └─────┬─────┘   └─────┬─────┘   └─────┬─────┘   └─────┬─────┘
//!       └───────────────┴───────┬───────┴───────────────┘
//!                               ▼
//!              (SampleBuffer, sample_rate) → SignalCache
//! ```

pub mod adsb;
pub mod elrs;
pub mod gps;
pub mod hopping;
pub mod jamming;

use crate::types::SampleBuffer;

/// What every encoder hands back to the cache.
pub type EncoderOutput = (SampleBuffer, f64);

/// Default baseband sample rate shared by the narrowband encoders, in Hz.
pub const DEFAULT_SAMPLE_RATE: f64 = 2_000_000.0;
