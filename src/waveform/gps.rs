//! GPS constellation encoder (L1 / L2 / L5).
//!
//! Synthesizes a composite multi-satellite baseband: each satellite's C/A
//! spreading code is BPSK-mixed with 50 bps navigation filler bits, carried
//! on a phase-accumulated complex exponential at the band frequency plus a
//! per-satellite Doppler, then summed with the rest of the constellation.
//!
//! ## C/A code structure
//!
//! ```text
//! G1 LFSR (10-bit): x^10 + x^3 + 1          feedback taps 3, 10
//! G2 LFSR (10-bit): x^10 + x^9 + x^8 +
//!                   x^6 + x^3 + x^2 + 1     feedback taps 2,3,6,8,9,10
//!
//! chip = G1[10] ⊕ G2[tap_a] ⊕ G2[tap_b]    (tap pair selects the PRN)
//! ```
//!
//! Navigation-message semantics are not reproduced: subframes carry the
//! correct 8-bit preamble and bit counts, the rest is pseudorandom filler.

use crate::cache::key::Params;
use crate::rng::{create_stream_rng, gaussian_pair};
use crate::types::{Complex, SampleBuffer, SignalError, SignalResult};
use crate::waveform::{EncoderOutput, DEFAULT_SAMPLE_RATE};
use rand::Rng;
use rand_pcg::Pcg32;
use std::f64::consts::PI;

/// C/A chipping rate, chips per second.
pub const CA_CODE_RATE: f64 = 1.023e6;
/// C/A code length in chips.
pub const CA_CODE_LENGTH: usize = 1023;
/// Navigation data rate, bits per second.
pub const NAV_DATA_RATE: f64 = 50.0;
/// Navigation bit duration, seconds.
pub const NAV_BIT_DURATION: f64 = 0.02;
/// LNAV subframe preamble.
const SUBFRAME_PREAMBLE: [u8; 8] = [1, 0, 0, 0, 1, 0, 1, 1];

/// G2 output tap pairs for PRN 1-32 (1-based positions).
const CA_CODE_TAPS: [(usize, usize); 32] = [
    (2, 6),
    (3, 7),
    (4, 8),
    (5, 9),
    (1, 9),
    (2, 10),
    (1, 8),
    (2, 9),
    (3, 10),
    (2, 3),
    (3, 4),
    (5, 6),
    (6, 7),
    (7, 8),
    (8, 9),
    (9, 10),
    (1, 4),
    (2, 5),
    (3, 6),
    (4, 7),
    (5, 8),
    (6, 9),
    (1, 3),
    (4, 6),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (1, 6),
    (2, 7),
    (3, 8),
    (4, 9),
];

/// GPS frequency band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsBand {
    /// L1, 1575.42 MHz
    L1,
    /// L2, 1227.60 MHz
    L2,
    /// L5, 1176.45 MHz
    L5,
}

impl GpsBand {
    /// Carrier frequency in Hz.
    pub fn carrier_hz(&self) -> f64 {
        match self {
            GpsBand::L1 => 1575.42e6,
            GpsBand::L2 => 1227.60e6,
            GpsBand::L5 => 1176.45e6,
        }
    }

    /// Parse a band name ("L1", "l2", "gps_l5", ...).
    pub fn parse(name: &str) -> SignalResult<Self> {
        match name.to_ascii_lowercase().trim_start_matches("gps_") {
            "l1" => Ok(GpsBand::L1),
            "l2" => Ok(GpsBand::L2),
            "l5" => Ok(GpsBand::L5),
            other => Err(SignalError::UnknownProtocol(other.to_string())),
        }
    }
}

/// Generate the 1023-chip C/A code for a PRN as 0/1 bits.
pub fn ca_code_bits(svid: u8) -> SignalResult<Vec<u8>> {
    if !(1..=32).contains(&svid) {
        return Err(SignalError::invalid(
            "svid",
            format!("satellite id must be 1-32, got {}", svid),
        ));
    }
    let (tap_a, tap_b) = CA_CODE_TAPS[(svid - 1) as usize];

    let mut g1 = [1u8; 10];
    let mut g2 = [1u8; 10];
    let mut code = Vec::with_capacity(CA_CODE_LENGTH);

    for _ in 0..CA_CODE_LENGTH {
        code.push(g1[9] ^ g2[tap_a - 1] ^ g2[tap_b - 1]);

        let g1_feedback = g1[2] ^ g1[9];
        g1.copy_within(0..9, 1);
        g1[0] = g1_feedback;

        let g2_feedback = g2[1] ^ g2[2] ^ g2[5] ^ g2[7] ^ g2[8] ^ g2[9];
        g2.copy_within(0..9, 1);
        g2[0] = g2_feedback;
    }
    Ok(code)
}

/// Generate the C/A code in bipolar form (bit 0 → +1, bit 1 → -1).
pub fn ca_code(svid: u8) -> SignalResult<Vec<i8>> {
    Ok(ca_code_bits(svid)?
        .into_iter()
        .map(|bit| if bit == 0 { 1 } else { -1 })
        .collect())
}

/// Per-satellite channel state, randomly initialized once per encoder.
#[derive(Debug, Clone)]
pub struct GpsSatellite {
    /// Satellite vehicle id (1-32)
    pub svid: u8,
    /// Elevation above the horizon, degrees
    pub elevation: f64,
    /// Azimuth, degrees
    pub azimuth: f64,
    /// Received signal strength, dBm
    pub signal_strength: f64,
    /// Doppler shift, Hz
    pub doppler: f64,
    /// Initial code phase, chips
    pub code_phase: f64,
    /// Initial carrier phase, radians
    pub carrier_phase: f64,
}

/// Orbital parameter set. Pads subframe bit counts; no orbit propagation.
#[derive(Debug, Clone)]
pub struct GpsEphemeris {
    pub svid: u8,
    pub toe: f64,
    pub m0: f64,
    pub delta_n: f64,
    pub eccentricity: f64,
    pub sqrt_a: f64,
    pub omega0: f64,
    pub i0: f64,
    pub omega: f64,
    pub omega_dot: f64,
    pub idot: f64,
    pub cuc: f64,
    pub cus: f64,
    pub crc: f64,
    pub crs: f64,
    pub cic: f64,
    pub cis: f64,
}

/// Multi-satellite GPS signal encoder.
pub struct GpsEncoder {
    band: GpsBand,
    satellites: Vec<GpsSatellite>,
    ephemeris: Vec<GpsEphemeris>,
    seed: u32,
}

/// Visible-constellation SVIDs the encoder simulates, strongest first.
const VISIBLE_SVIDS: [u8; 12] = [1, 3, 6, 11, 14, 18, 22, 25, 28, 30, 5, 9];

impl GpsEncoder {
    /// Build an encoder with a randomly initialized visible constellation.
    pub fn new(band: GpsBand, seed: u32) -> Self {
        let mut rng = create_stream_rng(seed, "gps-constellation");
        let satellites: Vec<GpsSatellite> = VISIBLE_SVIDS
            .iter()
            .enumerate()
            .map(|(i, &svid)| {
                let elevation = 15.0 + 70.0 * rng.gen::<f64>();
                let (az_jitter, doppler_z) = gaussian_pair(&mut rng);
                GpsSatellite {
                    svid,
                    elevation,
                    azimuth: (i as f64 * 30.0 + az_jitter * 10.0).rem_euclid(360.0),
                    signal_strength: -140.0 + 20.0 * (elevation / 90.0),
                    doppler: doppler_z * 2000.0,
                    code_phase: rng.gen::<f64>() * CA_CODE_LENGTH as f64,
                    carrier_phase: rng.gen::<f64>() * 2.0 * PI,
                }
            })
            .collect();

        let ephemeris = satellites
            .iter()
            .map(|sat| GpsEphemeris {
                svid: sat.svid,
                toe: 0.0,
                m0: rng.gen::<f64>() * 2.0 * PI,
                delta_n: 4.8e-9,
                eccentricity: 0.01,
                sqrt_a: 5153.7,
                omega0: rng.gen::<f64>() * 2.0 * PI,
                i0: 55.0_f64.to_radians(),
                omega: rng.gen::<f64>() * 2.0 * PI,
                omega_dot: -2.6e-9,
                idot: 0.0,
                cuc: 1e-6,
                cus: 1e-6,
                crc: 300.0,
                crs: 50.0,
                cic: 1e-7,
                cis: 1e-7,
            })
            .collect();

        Self {
            band,
            satellites,
            ephemeris,
            seed,
        }
    }

    /// The simulated constellation.
    pub fn satellites(&self) -> &[GpsSatellite] {
        &self.satellites
    }

    /// Ephemeris records backing the nav-message padding.
    pub fn ephemeris(&self) -> &[GpsEphemeris] {
        &self.ephemeris
    }

    /// One 1500-bit LNAV frame: five 300-bit subframes, each led by the
    /// 8-bit preamble, the remaining 292 bits pseudorandom filler.
    fn nav_frame(rng: &mut Pcg32) -> Vec<u8> {
        let mut frame = Vec::with_capacity(1500);
        for _ in 0..5 {
            frame.extend_from_slice(&SUBFRAME_PREAMBLE);
            for _ in 0..292 {
                frame.push(rng.gen_range(0..2u8));
            }
        }
        frame
    }

    /// Navigation bits covering `duration` seconds at 50 bps.
    fn nav_bits(&self, svid: u8, duration: f64) -> Vec<u8> {
        let num_bits = ((duration * NAV_DATA_RATE) as usize).max(1);
        let mut rng = create_stream_rng(self.seed, &format!("gps-nav-{}", svid));
        let mut bits = Vec::with_capacity(num_bits);
        while bits.len() < num_bits {
            bits.extend(Self::nav_frame(&mut rng));
        }
        bits.truncate(num_bits);
        bits
    }

    /// Synthesize the composite constellation signal.
    ///
    /// Satellites are summed as complex baseband, thermal noise is added,
    /// the real part is taken and the result is peak-normalized.
    pub fn generate(
        &self,
        duration: f64,
        sample_rate: f64,
        num_satellites: usize,
    ) -> SignalResult<SampleBuffer> {
        if duration <= 0.0 {
            return Err(SignalError::invalid("duration", "must be positive"));
        }
        let total_samples = (duration * sample_rate) as usize;
        let mut composite = vec![Complex::new(0.0, 0.0); total_samples];
        let selected = num_satellites.min(self.satellites.len());

        for satellite in &self.satellites[..selected] {
            let code = ca_code(satellite.svid)?;
            let nav = self.nav_bits(satellite.svid, duration);

            // Phase-accumulated carrier: avoids the precision loss of
            // evaluating 2π·f·t directly at GHz carriers.
            let phase_inc = 2.0 * PI * (self.band.carrier_hz() + satellite.doppler) / sample_rate;
            let mut phase = satellite.carrier_phase;

            for (i, out) in composite.iter_mut().enumerate() {
                let t = i as f64 / sample_rate;
                let chip = code[(t * CA_CODE_RATE) as usize % CA_CODE_LENGTH] as f64;
                let nav_bit = if nav[(t / NAV_BIT_DURATION) as usize % nav.len()] == 0 {
                    1.0
                } else {
                    -1.0
                };
                *out += chip * nav_bit * Complex::from_polar(1.0, phase);
                phase = (phase + phase_inc).rem_euclid(2.0 * PI);
            }
        }

        // Thermal noise floor
        let mut noise_rng = create_stream_rng(self.seed, "gps-noise");
        let noise_sigma = 1e-6;
        for out in composite.iter_mut() {
            let (re, im) = gaussian_pair(&mut noise_rng);
            *out += Complex::new(re * noise_sigma, im * noise_sigma);
        }

        let mut buffer = SampleBuffer::Real(composite.into_iter().map(|c| c.re).collect());
        buffer.normalize();
        Ok(buffer)
    }

    /// Cache-facing entry point: band from `band` parameter or protocol
    /// name, `duration` required, `num_satellites` defaults to the full
    /// visible constellation.
    pub fn encode_params(protocol: &str, params: &Params, seed: u32) -> SignalResult<EncoderOutput> {
        let band = match params.get_str("band") {
            Some(name) => GpsBand::parse(name)?,
            None => GpsBand::parse(protocol)?,
        };
        let duration = params.require_f64("duration")?;
        let encoder = GpsEncoder::new(band, seed);
        let num_satellites = params
            .get_i64("num_satellites")
            .map(|n| n.max(0) as usize)
            .unwrap_or(encoder.satellites.len());
        let buffer = encoder.generate(duration, DEFAULT_SAMPLE_RATE, num_satellites)?;
        Ok((buffer, DEFAULT_SAMPLE_RATE))
    }
}
