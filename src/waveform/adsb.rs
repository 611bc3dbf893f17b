//! ADS-B Mode S Extended Squitter encoder (1090 MHz).
//!
//! Builds bit-exact 112-bit DF17 frames for a simulated set of aircraft and
//! modulates them with Mode S pulse position modulation:
//!
//! ```text
//! ┌────────┬────────┬──────────┬──────────┬───────────────┬────────┐
//! │ DF(5)  │ CA(3)  │ ICAO(24) │ TC(5)    │ payload(51)   │ CRC(24)│
//! └────────┴────────┴──────────┴──────────┴───────────────┴────────┘
//! ```
//!
//! Each tracked aircraft cycles identification → even position → odd
//! position → velocity at the transmission interval while a simple movement
//! model perturbs its state every 100 ms of simulated time.

use crate::crc::crc24_mode_s;
use crate::rng::{create_stream_rng, gaussian};
use crate::types::{SampleBuffer, SignalResult};
use crate::waveform::{EncoderOutput, DEFAULT_SAMPLE_RATE};
use crate::cache::key::Params;
use rand_pcg::Pcg32;

/// Bit duration at the 1 Mbps Mode S rate, seconds.
const BIT_DURATION: f64 = 1e-6;
/// Frame length in bits.
const MESSAGE_BITS: usize = 112;
/// Mode S preamble pulse pattern (16 half-microsecond slots).
const PREAMBLE_BITS: [u8; 16] = [1, 0, 1, 0, 0, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0];
/// Downlink format for extended squitter.
const DF_EXTENDED_SQUITTER: u32 = 17;
/// Capability: level 2+ transponder.
const CAPABILITY: u32 = 5;
/// Simulated movement tick, seconds.
const MOVEMENT_TICK: f64 = 0.1;

/// Aircraft state fed to the encoder.
///
/// Instances live for one encoder invocation; the movement model mutates
/// them per tick and they are discarded with the encoder.
#[derive(Debug, Clone)]
pub struct Aircraft {
    /// 24-bit ICAO address
    pub icao: u32,
    /// Up to 8 characters, A-Z / 0-9 / space
    pub callsign: String,
    /// Emitter category (1-7)
    pub category: u8,
    /// Latitude, degrees
    pub latitude: f64,
    /// Longitude, degrees
    pub longitude: f64,
    /// Barometric altitude, feet
    pub altitude_ft: i32,
    /// Ground speed, knots
    pub velocity_kts: f64,
    /// Track, degrees 0-359
    pub heading_deg: f64,
    /// Vertical rate, feet per minute
    pub vertical_rate_fpm: i32,
    /// Transponder squawk code
    pub squawk: u16,
    /// Surface flag
    pub on_ground: bool,
    /// Airframe type code
    pub aircraft_type: String,
}

impl Aircraft {
    /// The built-in three-aircraft demonstration fleet.
    pub fn default_fleet() -> Vec<Aircraft> {
        vec![
            Aircraft {
                icao: 0xA12345,
                callsign: "UAL123".into(),
                category: 3,
                latitude: 37.7749,
                longitude: -122.4194,
                altitude_ft: 35_000,
                velocity_kts: 450.0,
                heading_deg: 90.0,
                vertical_rate_fpm: 0,
                squawk: 1200,
                on_ground: false,
                aircraft_type: "B738".into(),
            },
            Aircraft {
                icao: 0xB67890,
                callsign: "DAL456".into(),
                category: 3,
                latitude: 40.7128,
                longitude: -74.0060,
                altitude_ft: 28_000,
                velocity_kts: 420.0,
                heading_deg: 270.0,
                vertical_rate_fpm: -500,
                squawk: 1200,
                on_ground: false,
                aircraft_type: "A320".into(),
            },
            Aircraft {
                icao: 0xC11111,
                callsign: "SWA789".into(),
                category: 3,
                latitude: 34.0522,
                longitude: -118.2437,
                altitude_ft: 15_000,
                velocity_kts: 380.0,
                heading_deg: 45.0,
                vertical_rate_fpm: 1200,
                squawk: 1200,
                on_ground: false,
                aircraft_type: "B737".into(),
            },
        ]
    }

    /// Synthetic fleet of `n` aircraft spread over a grid.
    pub fn fleet(n: usize) -> Vec<Aircraft> {
        (0..n)
            .map(|i| Aircraft {
                icao: (0xABC000 + i as u32) & 0xFF_FFFF,
                callsign: format!("TEST{:03}", i),
                category: 3,
                latitude: 40.0 + i as f64 * 0.1,
                longitude: -74.0 + i as f64 * 0.1,
                altitude_ft: 10_000 + i as i32 * 1000,
                velocity_kts: 250.0,
                heading_deg: (i as f64 * 45.0) % 360.0,
                vertical_rate_fpm: 0,
                squawk: 1200,
                on_ground: false,
                aircraft_type: "B737".into(),
            })
            .collect()
    }
}

/// Per-aircraft transmission bookkeeping.
#[derive(Debug, Clone)]
struct TrackedAircraft {
    aircraft: Aircraft,
    last_transmission: f64,
    message_sequence: u32,
}

/// Write `width` bits of `value` MSB-first at `start`.
fn write_bits(bits: &mut [u8], start: usize, width: usize, value: u32) {
    for i in 0..width {
        bits[start + i] = ((value >> (width - 1 - i)) & 1) as u8;
    }
}

/// Six-bit ADS-B character set: A-Z → 1..26, 0-9 → 48..57, space → 32.
fn encode_char(c: char) -> u32 {
    match c {
        'A'..='Z' => c as u32 - 'A' as u32 + 1,
        '0'..='9' => c as u32 - '0' as u32 + 48,
        _ => 32,
    }
}

/// Altitude code: 25-foot increments with a 1000 ft offset, saturating into
/// the 12-bit field (never wrapping).
fn encode_altitude(altitude_ft: i32) -> u32 {
    ((altitude_ft + 1000).div_euclid(25)).clamp(0, 0xFFF) as u32
}

/// 17-bit CPR latitude for the given frame parity.
fn encode_cpr_latitude(latitude: f64) -> u32 {
    let norm = (latitude + 90.0) / 180.0;
    ((norm * (1 << 17) as f64).floor() as i64 & 0x1FFFF) as u32
}

/// 17-bit CPR longitude for the given frame parity.
fn encode_cpr_longitude(longitude: f64) -> u32 {
    let norm = (longitude + 180.0) / 360.0;
    ((norm * (1 << 17) as f64).floor() as i64 & 0x1FFFF) as u32
}

/// Common DF17 header: DF, CA, ICAO, type code.
fn frame_header(bits: &mut [u8], icao: u32, type_code: u32) {
    write_bits(bits, 0, 5, DF_EXTENDED_SQUITTER);
    write_bits(bits, 5, 3, CAPABILITY);
    write_bits(bits, 8, 24, icao & 0xFF_FFFF);
    write_bits(bits, 32, 5, type_code);
}

/// Fill bits 88..112 with the Mode S CRC over bits 0..88.
fn seal_frame(bits: &mut [u8]) {
    let crc = crc24_mode_s(&bits[..88]);
    write_bits(bits, 88, 24, crc);
}

/// Aircraft identification frame (type code 4).
fn encode_identification(aircraft: &Aircraft) -> Vec<u8> {
    let mut bits = vec![0u8; MESSAGE_BITS];
    frame_header(&mut bits, aircraft.icao, 4);
    write_bits(&mut bits, 37, 3, aircraft.category as u32);

    let padded: Vec<char> = format!("{:<8}", aircraft.callsign).chars().take(8).collect();
    for (i, &c) in padded.iter().enumerate() {
        write_bits(&mut bits, 40 + i * 6, 6, encode_char(c));
    }

    seal_frame(&mut bits);
    bits
}

/// Airborne position frame (type code 11), even or odd CPR parity.
fn encode_airborne_position(aircraft: &Aircraft, odd: bool) -> Vec<u8> {
    let mut bits = vec![0u8; MESSAGE_BITS];
    frame_header(&mut bits, aircraft.icao, 11);
    // Surveillance status (2) and single antenna flag (1) stay zero.
    write_bits(&mut bits, 40, 12, encode_altitude(aircraft.altitude_ft));
    bits[52] = 0; // time synchronization
    bits[53] = odd as u8; // CPR format
    write_bits(&mut bits, 54, 17, encode_cpr_latitude(aircraft.latitude));
    write_bits(&mut bits, 71, 17, encode_cpr_longitude(aircraft.longitude));
    seal_frame(&mut bits);
    bits
}

/// Airborne velocity frame (type code 19, subtype 1).
fn encode_velocity(aircraft: &Aircraft) -> Vec<u8> {
    let mut bits = vec![0u8; MESSAGE_BITS];
    frame_header(&mut bits, aircraft.icao, 19);
    write_bits(&mut bits, 37, 3, 1); // subtype: ground speed
    // Intent change (40) and reserved (41) stay zero.

    let heading = aircraft.heading_deg.to_radians();
    let vel_ew = (aircraft.velocity_kts * heading.sin()).round() as i32;
    let vel_ns = (aircraft.velocity_kts * heading.cos()).round() as i32;

    bits[42] = (vel_ew < 0) as u8; // 0 = east
    write_bits(&mut bits, 43, 10, vel_ew.unsigned_abs().min(1023));
    bits[53] = (vel_ns < 0) as u8; // 0 = north
    write_bits(&mut bits, 54, 10, vel_ns.unsigned_abs().min(1023));

    bits[64] = 0; // barometric vertical rate source
    bits[65] = (aircraft.vertical_rate_fpm < 0) as u8; // 0 = climbing
    let vr_mag = (aircraft.vertical_rate_fpm.unsigned_abs() / 64).min(511);
    write_bits(&mut bits, 66, 9, vr_mag);
    // Remaining difference/reserved bits stay zero.

    seal_frame(&mut bits);
    bits
}

/// Mode S extended squitter encoder.
pub struct AdsbEncoder {
    tracked: Vec<TrackedAircraft>,
    /// Seconds between transmissions per aircraft.
    pub transmission_interval: f64,
    rng: Pcg32,
}

impl AdsbEncoder {
    /// Encoder over an explicit aircraft list; an empty list selects the
    /// built-in three-aircraft fleet.
    pub fn new(aircraft: Vec<Aircraft>, seed: u32) -> Self {
        let aircraft = if aircraft.is_empty() {
            Aircraft::default_fleet()
        } else {
            aircraft
        };
        Self {
            tracked: aircraft
                .into_iter()
                .map(|aircraft| TrackedAircraft {
                    aircraft,
                    last_transmission: 0.0,
                    message_sequence: 0,
                })
                .collect(),
            transmission_interval: 0.5,
            rng: create_stream_rng(seed, "adsb-movement"),
        }
    }

    /// Number of tracked aircraft.
    pub fn aircraft_count(&self) -> usize {
        self.tracked.len()
    }

    /// Random-walk movement over one tick: small heading jitter, flat-earth
    /// great-circle advance, altitude and vertical-rate perturbation.
    fn simulate_movement(rng: &mut Pcg32, aircraft: &mut Aircraft, dt: f64) {
        aircraft.heading_deg = (aircraft.heading_deg + gaussian(rng, 0.0, 2.0)).rem_euclid(360.0);

        let distance_nm = aircraft.velocity_kts * dt / 3600.0;
        let heading = aircraft.heading_deg.to_radians();
        aircraft.latitude += distance_nm * heading.cos() / 60.0;
        aircraft.longitude +=
            distance_nm * heading.sin() / (60.0 * aircraft.latitude.to_radians().cos());

        aircraft.altitude_ft =
            (aircraft.altitude_ft + gaussian(rng, 0.0, 100.0).round() as i32).max(0);
        aircraft.vertical_rate_fpm = gaussian(rng, 0.0, 500.0).round() as i32;
    }

    /// PPM-modulate preamble + message bits: a 0.25 µs pulse sits at the
    /// start of a 0-bit's period and at the midpoint of a 1-bit's period.
    fn modulate(bits: &[u8], sample_rate: f64) -> Vec<f64> {
        let samples_per_bit = (BIT_DURATION * sample_rate) as usize;
        let pulse_width = (samples_per_bit / 4).max(1);
        let mut signal = vec![0.0; bits.len() * samples_per_bit];

        for (i, &bit) in bits.iter().enumerate() {
            let bit_start = i * samples_per_bit;
            let pulse_start = if bit == 0 {
                bit_start
            } else {
                bit_start + samples_per_bit / 2
            };
            let pulse_end = (pulse_start + pulse_width).min(signal.len());
            for sample in &mut signal[pulse_start..pulse_end] {
                *sample = 1.0;
            }
        }
        signal
    }

    /// Synthesize the full scene.
    ///
    /// Frames land at their scheduled offsets in a zero buffer of
    /// `duration * sample_rate` samples, a low noise floor is added, and the
    /// result is peak-normalized to full scale.
    pub fn generate(&mut self, duration: f64, sample_rate: f64) -> SampleBuffer {
        let total_samples = (duration * sample_rate) as usize;
        let mut signal = vec![0.0_f64; total_samples];

        let mut current_time = 0.0;
        while current_time < duration {
            for tracked in &mut self.tracked {
                Self::simulate_movement(&mut self.rng, &mut tracked.aircraft, MOVEMENT_TICK);

                if current_time - tracked.last_transmission < self.transmission_interval {
                    continue;
                }

                let message = match tracked.message_sequence % 4 {
                    0 => encode_identification(&tracked.aircraft),
                    1 => encode_airborne_position(&tracked.aircraft, false),
                    2 => encode_airborne_position(&tracked.aircraft, true),
                    _ => encode_velocity(&tracked.aircraft),
                };

                let mut frame_bits = PREAMBLE_BITS.to_vec();
                frame_bits.extend_from_slice(&message);
                let modulated = Self::modulate(&frame_bits, sample_rate);

                let start = (current_time * sample_rate) as usize;
                let end = (start + modulated.len()).min(total_samples);
                if start < total_samples {
                    for (dst, src) in signal[start..end].iter_mut().zip(&modulated) {
                        *dst += src;
                    }
                }

                tracked.last_transmission = current_time;
                tracked.message_sequence += 1;
            }
            current_time += MOVEMENT_TICK;
        }

        for sample in &mut signal {
            *sample += gaussian(&mut self.rng, 0.0, 0.01);
        }

        let mut buffer = SampleBuffer::Real(signal);
        buffer.normalize();
        buffer
    }

    /// Cache-facing entry point: `duration` required, optional
    /// `num_aircraft` selects a synthetic fleet.
    pub fn encode_params(params: &Params, seed: u32) -> SignalResult<EncoderOutput> {
        let duration = params.require_f64("duration")?;
        let aircraft = match params.get_i64("num_aircraft") {
            Some(n) => Aircraft::fleet(n.max(0) as usize),
            None => Vec::new(),
        };
        let mut encoder = AdsbEncoder::new(aircraft, seed);
        let buffer = encoder.generate(duration, DEFAULT_SAMPLE_RATE);
        Ok((buffer, DEFAULT_SAMPLE_RATE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::DEFAULT_SEED;
    use approx::assert_relative_eq;

    fn read_bits(bits: &[u8], start: usize, width: usize) -> u32 {
        bits[start..start + width]
            .iter()
            .fold(0, |acc, &b| (acc << 1) | b as u32)
    }

    #[test]
    fn test_identification_frame_structure() {
        let aircraft = &Aircraft::default_fleet()[0];
        let bits = encode_identification(aircraft);
        assert_eq!(bits.len(), 112);
        assert_eq!(read_bits(&bits, 0, 5), 17, "downlink format");
        assert_eq!(read_bits(&bits, 5, 3), 5, "capability");
        assert_eq!(read_bits(&bits, 8, 24), 0xA12345, "ICAO address");
        assert_eq!(read_bits(&bits, 32, 5), 4, "type code");
    }

    #[test]
    fn test_frames_carry_valid_crc() {
        let aircraft = &Aircraft::default_fleet()[1];
        for bits in [
            encode_identification(aircraft),
            encode_airborne_position(aircraft, false),
            encode_airborne_position(aircraft, true),
            encode_velocity(aircraft),
        ] {
            let expected = crc24_mode_s(&bits[..88]);
            assert_eq!(read_bits(&bits, 88, 24), expected);
        }
    }

    #[test]
    fn test_position_frames_differ_by_parity_bit() {
        let aircraft = &Aircraft::default_fleet()[0];
        let even = encode_airborne_position(aircraft, false);
        let odd = encode_airborne_position(aircraft, true);
        assert_eq!(even[53], 0);
        assert_eq!(odd[53], 1);
        assert_eq!(read_bits(&even, 32, 5), 11);
    }

    #[test]
    fn test_callsign_character_codes() {
        assert_eq!(encode_char('A'), 1);
        assert_eq!(encode_char('Z'), 26);
        assert_eq!(encode_char('0'), 48);
        assert_eq!(encode_char('9'), 57);
        assert_eq!(encode_char(' '), 32);
        assert_eq!(encode_char('#'), 32);
    }

    #[test]
    fn test_altitude_saturates_not_wraps() {
        assert_eq!(encode_altitude(-5000), 0, "below -1000 ft clamps to 0");
        assert_eq!(encode_altitude(-1000), 0);
        assert_eq!(encode_altitude(0), 40);
        assert_eq!(encode_altitude(35_000), 1440);
        assert_eq!(encode_altitude(1_000_000), 0xFFF, "ceiling clamps to max code");
    }

    #[test]
    fn test_cpr_encoding_range() {
        assert_eq!(encode_cpr_latitude(0.0), 1 << 16);
        assert_eq!(encode_cpr_longitude(0.0), 1 << 16);
        assert!(encode_cpr_latitude(89.9) < (1 << 17));
        assert!(encode_cpr_longitude(-179.9) < (1 << 17));
    }

    #[test]
    fn test_ppm_pulse_positions() {
        // 2 MHz → 2 samples per half-bit, pulse width = spb/4 = 0 → min 1.
        let sample_rate = 8_000_000.0;
        let signal = AdsbEncoder::modulate(&[0, 1], sample_rate);
        let spb = 8;
        assert_eq!(signal.len(), 2 * spb);
        // Bit 0: pulse at slot start
        assert_eq!(signal[0], 1.0);
        assert_eq!(signal[spb / 2], 0.0);
        // Bit 1: pulse at slot midpoint
        assert_eq!(signal[spb], 0.0);
        assert_eq!(signal[spb + spb / 2], 1.0);
    }

    #[test]
    fn test_generate_scene_length_and_scale() {
        // Scenario A (scaled down): default fleet, fixed duration.
        let mut encoder = AdsbEncoder::new(Vec::new(), DEFAULT_SEED);
        assert_eq!(encoder.aircraft_count(), 3);

        let duration = 1.0;
        let sample_rate = 2_000_000.0;
        let buffer = encoder.generate(duration, sample_rate);
        assert_eq!(buffer.len(), (duration * sample_rate) as usize);
        assert_relative_eq!(buffer.peak(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_generate_deterministic_for_seed() {
        let run = || {
            let mut encoder = AdsbEncoder::new(Vec::new(), 99);
            encoder.generate(0.25, 1_000_000.0)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_encode_params_requires_duration() {
        let params = Params::new().with("num_aircraft", 2_i64);
        assert!(AdsbEncoder::encode_params(&params, DEFAULT_SEED).is_err());
    }

    #[test]
    fn test_encode_params_builds_fleet() {
        let params = Params::new()
            .with("num_aircraft", 5_i64)
            .with("duration", 0.1);
        let (buffer, rate) = AdsbEncoder::encode_params(&params, DEFAULT_SEED).unwrap();
        assert_eq!(rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(buffer.len(), (0.1 * DEFAULT_SAMPLE_RATE) as usize);
    }
}
