//! ExpressLRS RC-link encoder (LoRa chirp spread spectrum).
//!
//! Synthesizes an ELRS control-link transmission: packets of RC channel data
//! framed with a CRC-16, modulated as LoRa-style chirps and emitted at the
//! configured packet rate. The band's frequency-hop plan advances once per
//! packet; applying the actual RF retune belongs to the transmission layer,
//! so the baseband here stays centered.
//!
//! ```text
//! Frequency                        Packet
//!  +BW/2 ┤      /|  /|  /|       ┌────────────────────────────┐
//!        │     / | / | / |  ...  │ preamble │ symbol chirps    │
//!  -BW/2 ┤    /  |/  |/  |       └────────────────────────────┘
//!        └── 8 upchirps + 2.25 downchirps, then data symbols
//! ```

use crate::cache::key::Params;
use crate::crc::Crc16Ccitt;
use crate::rng::create_stream_rng;
use crate::types::{SampleBuffer, SignalError, SignalResult};
use crate::waveform::hopping::{HopPattern, HopSequenceGenerator};
use crate::waveform::{EncoderOutput, DEFAULT_SAMPLE_RATE};
use rand_pcg::Pcg32;
use std::f64::consts::PI;

/// Preamble length in upchirps.
const PREAMBLE_UPCHIRPS: usize = 8;
/// RC stick update rate used for synthetic control data, Hz.
const CONTROL_RATE: f64 = 50.0;

/// RF plan for one ELRS band.
#[derive(Debug, Clone, Copy)]
pub struct ElrsBand {
    /// Band name ("433", "868", "915", "2400")
    pub name: &'static str,
    /// Band center frequency, Hz
    pub center_freq: f64,
    /// RC-link channel frequencies, Hz
    pub channels: &'static [f64],
    /// Channel bandwidth, Hz
    pub bandwidth: f64,
    /// Regulatory maximum power, mW
    pub max_power_mw: f64,
}

const BAND_433: ElrsBand = ElrsBand {
    name: "433",
    center_freq: 433.42e6,
    channels: &[433.42e6, 434.42e6, 435.42e6],
    bandwidth: 250e3,
    max_power_mw: 100.0,
};

const BAND_868: ElrsBand = ElrsBand {
    name: "868",
    center_freq: 868.4e6,
    channels: &[868.1e6, 868.3e6, 868.5e6, 868.7e6, 868.9e6],
    bandwidth: 250e3,
    max_power_mw: 25.0,
};

const BAND_915: ElrsBand = ElrsBand {
    name: "915",
    center_freq: 915.5e6,
    channels: &[
        903.4e6, 905.4e6, 907.4e6, 909.4e6, 911.4e6, 913.4e6, 915.4e6, 917.4e6, 919.4e6, 921.4e6,
    ],
    bandwidth: 500e3,
    max_power_mw: 1000.0,
};

const BAND_2400: ElrsBand = ElrsBand {
    name: "2400",
    center_freq: 2440e6,
    channels: &[
        2400e6, 2410e6, 2420e6, 2430e6, 2440e6, 2450e6, 2460e6, 2470e6, 2480e6,
    ],
    bandwidth: 2e6,
    max_power_mw: 250.0,
};

impl ElrsBand {
    /// Look up a band by name ("433") or protocol string ("elrs_433").
    pub fn parse(name: &str) -> SignalResult<Self> {
        match name.trim_start_matches("elrs_") {
            "433" => Ok(BAND_433),
            "868" => Ok(BAND_868),
            "915" => Ok(BAND_915),
            "2400" => Ok(BAND_2400),
            other => Err(SignalError::UnknownProtocol(format!("elrs band {}", other))),
        }
    }
}

/// Modulation tuple behind one packet-rate preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateConfig {
    /// LoRa spreading factor
    pub spreading_factor: u8,
    /// Chirp bandwidth, Hz
    pub bandwidth: f64,
    /// Coding rate label
    pub coding_rate: &'static str,
    /// Inter-packet interval, seconds
    pub interval: f64,
}

/// Preset for a packet rate in Hz; rates outside the table are an error.
pub fn rate_config(packet_rate: u32) -> SignalResult<RateConfig> {
    let (spreading_factor, bandwidth, interval) = match packet_rate {
        25 => (12, 250e3, 0.04),
        50 => (11, 250e3, 0.02),
        100 => (10, 250e3, 0.01),
        200 => (9, 250e3, 0.005),
        333 => (8, 500e3, 0.003),
        500 => (7, 500e3, 0.002),
        other => {
            return Err(SignalError::invalid(
                "packet_rate",
                format!("{} Hz is not an ELRS rate preset", other),
            ))
        }
    };
    Ok(RateConfig {
        spreading_factor,
        bandwidth,
        coding_rate: "4/5",
        interval,
    })
}

/// One RC control packet.
#[derive(Debug, Clone, PartialEq)]
pub struct ElrsPacket {
    /// Packet type nibble (0 = RC data)
    pub packet_type: u8,
    /// Sequence number (wraps at 16)
    pub sequence: u8,
    /// Primary stick channels in microseconds (1000-2000)
    pub channels_us: [u16; 4],
    /// Auxiliary channels in microseconds
    pub aux_us: [u16; 4],
    /// Telemetry request flag
    pub telemetry_request: bool,
}

impl ElrsPacket {
    /// Serialize to the wire format: header, 4 x 11-bit channels packed into
    /// 6 bytes, 4 x 8-bit aux, telemetry flag, CRC-16 little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(14);
        packet.push((self.packet_type << 4) | (self.sequence & 0x0F));

        let mut channel_data: u64 = 0;
        for (i, &us) in self.channels_us.iter().enumerate() {
            let value = (((us as i32 - 1000) * 2047) / 1000).clamp(0, 2047) as u64;
            channel_data |= value << (i * 11);
        }
        for i in 0..6 {
            packet.push(((channel_data >> (i * 8)) & 0xFF) as u8);
        }

        for &us in &self.aux_us {
            let value = (((us as i32 - 1000) * 255) / 1000).clamp(0, 255) as u8;
            packet.push(value);
        }

        packet.push(if self.telemetry_request { 0x01 } else { 0x00 });

        let crc = Crc16Ccitt::compute(&packet);
        packet.push((crc & 0xFF) as u8);
        packet.push((crc >> 8) as u8);
        packet
    }
}

/// Flight profile shaping the synthetic stick inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightMode {
    /// Pilot inputs with moderate sinusoidal activity
    Manual,
    /// Aggressive acrobatic stick movement
    Acro,
    /// Gentle stabilized cruising
    Stabilized,
    /// Hovering with small corrections
    Hover,
}

impl FlightMode {
    /// Parse a wire-format mode name.
    pub fn parse(name: &str) -> SignalResult<Self> {
        match name {
            "manual" => Ok(FlightMode::Manual),
            "acro" => Ok(FlightMode::Acro),
            "stabilized" => Ok(FlightMode::Stabilized),
            "hover" => Ok(FlightMode::Hover),
            other => Err(SignalError::invalid(
                "flight_mode",
                format!("unknown mode {}", other),
            )),
        }
    }
}

/// Synthetic stick waveforms at the 50 Hz control rate.
struct ControlWaveforms {
    roll: Vec<u16>,
    pitch: Vec<u16>,
    throttle: Vec<u16>,
    yaw: Vec<u16>,
}

impl ControlWaveforms {
    fn generate(duration: f64, mode: FlightMode, rng: &mut Pcg32) -> Self {
        let n = ((duration * CONTROL_RATE) as usize).max(1);
        let mut roll = Vec::with_capacity(n);
        let mut pitch = Vec::with_capacity(n);
        let mut throttle = Vec::with_capacity(n);
        let mut yaw = Vec::with_capacity(n);

        let mut noise = |std: f64| crate::rng::gaussian(rng, 0.0, std);
        for i in 0..n {
            let t = i as f64 / CONTROL_RATE;
            let (r, p, th, y) = match mode {
                FlightMode::Manual => (
                    1500.0 + 200.0 * (2.0 * PI * 0.5 * t).sin() + noise(50.0),
                    1500.0 + 150.0 * (2.0 * PI * 0.3 * t).sin() + noise(30.0),
                    1300.0 + 200.0 * (2.0 * PI * 0.1 * t).sin() + noise(20.0),
                    1500.0 + 100.0 * (2.0 * PI * 0.7 * t).sin() + noise(40.0),
                ),
                FlightMode::Acro => (
                    1500.0 + 400.0 * (2.0 * PI * 2.0 * t).sin() * (2.0 * PI * 0.1 * t).sin(),
                    1500.0 + 300.0 * (2.0 * PI * 1.5 * t).sin() * (2.0 * PI * 0.15 * t).cos(),
                    1000.0 + 800.0 * (0.5 + 0.5 * (2.0 * PI * 0.2 * t).sin()),
                    1500.0 + 300.0 * (2.0 * PI * 3.0 * t).sin(),
                ),
                FlightMode::Stabilized => (
                    1500.0 + 100.0 * (2.0 * PI * 0.2 * t).sin() + noise(20.0),
                    1500.0 + 80.0 * (2.0 * PI * 0.25 * t).sin() + noise(15.0),
                    1400.0 + 100.0 * (2.0 * PI * 0.05 * t).sin() + noise(10.0),
                    1500.0 + 50.0 * (2.0 * PI * 0.1 * t).sin() + noise(25.0),
                ),
                FlightMode::Hover => (
                    1500.0 + noise(30.0),
                    1500.0 + noise(30.0),
                    1500.0 + noise(50.0),
                    1500.0 + noise(20.0),
                ),
            };
            roll.push(r.clamp(1000.0, 2000.0) as u16);
            pitch.push(p.clamp(1000.0, 2000.0) as u16);
            throttle.push(th.clamp(1000.0, 2000.0) as u16);
            yaw.push(y.clamp(1000.0, 2000.0) as u16);
        }

        Self {
            roll,
            pitch,
            throttle,
            yaw,
        }
    }
}

/// Real cosine chirp sweeping linearly between two frequencies.
fn chirp(duration: f64, f_start: f64, f_end: f64, sample_rate: f64) -> Vec<f64> {
    let n = (duration * sample_rate) as usize;
    let slope = (f_end - f_start) / duration;
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * PI * (f_start * t + 0.5 * slope * t * t)).cos()
        })
        .collect()
}

/// ExpressLRS transmission encoder for one band.
pub struct ElrsEncoder {
    band: ElrsBand,
    seed: u32,
}

impl ElrsEncoder {
    /// Encoder for a band.
    pub fn new(band: ElrsBand, seed: u32) -> Self {
        Self { band, seed }
    }

    /// The band plan.
    pub fn band(&self) -> &ElrsBand {
        &self.band
    }

    /// Preamble: 8 upchirps followed by 2.25 downchirps (sync).
    fn preamble(&self, config: &RateConfig, sample_rate: f64) -> Vec<f64> {
        let symbol_duration = (1u64 << config.spreading_factor) as f64 / config.bandwidth;
        let bw = config.bandwidth;
        let up = chirp(symbol_duration, -bw / 2.0, bw / 2.0, sample_rate);
        let down = chirp(symbol_duration, bw / 2.0, -bw / 2.0, sample_rate);

        let mut preamble = Vec::with_capacity(up.len() * (PREAMBLE_UPCHIRPS + 3));
        for _ in 0..PREAMBLE_UPCHIRPS {
            preamble.extend_from_slice(&up);
        }
        preamble.extend_from_slice(&down);
        preamble.extend_from_slice(&down);
        preamble.extend_from_slice(&down[..down.len() / 4]);
        preamble
    }

    /// Packet bytes → SF-bit symbols, MSB first, zero-padded tail.
    fn bytes_to_symbols(data: &[u8], spreading_factor: u8) -> Vec<u16> {
        let sf = spreading_factor as usize;
        let total_bits = data.len() * 8;
        let mut symbols = Vec::with_capacity(total_bits / sf + 1);
        let mut acc: u32 = 0;
        let mut acc_bits = 0;

        for &byte in data {
            acc = (acc << 8) | byte as u32;
            acc_bits += 8;
            while acc_bits >= sf {
                symbols.push(((acc >> (acc_bits - sf)) & ((1 << sf) - 1)) as u16);
                acc_bits -= sf;
            }
        }
        if acc_bits > 0 {
            symbols.push(((acc << (sf - acc_bits)) & ((1 << sf) - 1)) as u16);
        }
        symbols
    }

    /// Modulate one symbol: a chirp whose start frequency is offset by
    /// `symbol * BW / 2^SF`, with the instantaneous frequency wrapped back
    /// into the band when the sweep crosses +BW/2.
    fn symbol_chirp(symbol: u16, config: &RateConfig, sample_rate: f64) -> Vec<f64> {
        let bw = config.bandwidth;
        let chips = (1u64 << config.spreading_factor) as f64;
        let symbol_duration = chips / bw;
        let start_freq = -bw / 2.0 + symbol as f64 * bw / chips;
        let slope = bw / symbol_duration;

        let n = (symbol_duration * sample_rate) as usize;
        let mut phase = 0.0_f64;
        (0..n)
            .map(|i| {
                let t = i as f64 / sample_rate;
                let freq = start_freq + slope * t;
                let wrapped = (freq + bw / 2.0).rem_euclid(bw) - bw / 2.0;
                phase += 2.0 * PI * wrapped / sample_rate;
                phase.cos()
            })
            .collect()
    }

    /// Modulate a serialized packet into chirp symbols.
    fn modulate_packet(&self, data: &[u8], config: &RateConfig, sample_rate: f64) -> Vec<f64> {
        let symbols = Self::bytes_to_symbols(data, config.spreading_factor);
        let mut signal = Vec::new();
        for symbol in symbols {
            signal.extend(Self::symbol_chirp(symbol, config, sample_rate));
        }
        signal
    }

    /// Channel indices the hop plan visits, one entry per packet.
    pub fn hop_plan(&self, num_packets: usize) -> Vec<usize> {
        let sequence = HopSequenceGenerator::with_seed(self.band.channels.len(), self.seed)
            .sequence(HopPattern::Pseudorandom);
        (0..num_packets).map(|i| sequence[i % sequence.len()]).collect()
    }

    /// Synthesize a full transmission.
    ///
    /// Packets are written at the preset interval; each packet is preamble
    /// plus data chirps, clipped at the buffer end. The hop plan advances
    /// per packet but the baseband stays centered; retuning is the
    /// transmission layer's job.
    pub fn generate(
        &self,
        duration: f64,
        packet_rate: u32,
        flight_mode: FlightMode,
        sample_rate: f64,
    ) -> SignalResult<SampleBuffer> {
        let config = rate_config(packet_rate)?;
        let packet_interval = 1.0 / packet_rate as f64;
        let num_packets = (duration / packet_interval) as usize;
        let total_samples = (duration * sample_rate) as usize;
        let mut signal = vec![0.0_f64; total_samples];

        let mut control_rng = create_stream_rng(self.seed, "elrs-sticks");
        let controls = ControlWaveforms::generate(duration, flight_mode, &mut control_rng);
        let control_len = controls.roll.len();

        let preamble = self.preamble(&config, sample_rate);

        for packet_num in 0..num_packets {
            let idx = packet_num % control_len;
            let packet = ElrsPacket {
                packet_type: 0,
                sequence: (packet_num % 16) as u8,
                channels_us: [
                    controls.roll[idx],
                    controls.pitch[idx],
                    controls.throttle[idx],
                    controls.yaw[idx],
                ],
                aux_us: [1500, 1200, 1800, 1500],
                telemetry_request: packet_num % 10 == 0,
            };

            let mut packet_signal = preamble.clone();
            packet_signal.extend(self.modulate_packet(&packet.to_bytes(), &config, sample_rate));

            let start = (packet_num as f64 * packet_interval * sample_rate) as usize;
            let end = (start + packet_signal.len()).min(total_samples);
            if start < total_samples {
                signal[start..end].copy_from_slice(&packet_signal[..end - start]);
            }
        }

        Ok(SampleBuffer::Real(signal))
    }

    /// Cache-facing entry point: band from `band` or the protocol string,
    /// `packet_rate` and `duration` required, `flight_mode` defaults to
    /// manual.
    pub fn encode_params(protocol: &str, params: &Params, seed: u32) -> SignalResult<EncoderOutput> {
        let band = match params.get_str("band") {
            Some(name) => ElrsBand::parse(name)?,
            None => ElrsBand::parse(protocol)?,
        };
        let packet_rate = params.require_i64("packet_rate")? as u32;
        let duration = params.require_f64("duration")?;
        let flight_mode = match params.get_str("flight_mode") {
            Some(name) => FlightMode::parse(name)?,
            None => FlightMode::Manual,
        };

        let encoder = ElrsEncoder::new(band, seed);
        let buffer = encoder.generate(duration, packet_rate, flight_mode, DEFAULT_SAMPLE_RATE)?;
        Ok((buffer, DEFAULT_SAMPLE_RATE))
    }
}
