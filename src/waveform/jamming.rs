//! Jamming waveform synthesis.
//!
//! Five waveform kinds cover the denial toolbox: broadband gaussian noise, a
//! linear chirp sweep, a multitone comb, pulsed noise bursts and wideband
//! "video noise" (independent gaussian I/Q shaped by a Butterworth
//! band-pass). Every waveform is peak-normalized to full scale — the design
//! intentionally maximizes transmitted energy and performs no power
//! limiting.
//!
//! The hop-driven composite generators bake a band's hop plan into a single
//! baseband buffer: each dwell carries noise mixed to its channel's offset
//! from the band center, and the barrage pattern emits repeated full-band
//! sweeps instead.

use crate::cache::key::Params;
use crate::iir::IirFilter;
use crate::rng::{create_stream_rng, gaussian, gaussian_pair};
use crate::types::{IQSample, SampleBuffer, SignalError, SignalResult};
use crate::waveform::hopping::{band_channels, HopPattern, HopSequenceGenerator};
use crate::waveform::{EncoderOutput, DEFAULT_SAMPLE_RATE};
use std::f64::consts::PI;

/// Pulse on-time for pulsed noise, seconds.
const PULSE_ON_SECS: f64 = 0.001;
/// Pulse repetition period for pulsed noise, seconds (1 ms on, 4 ms off).
const PULSE_PERIOD_SECS: f64 = 0.005;
/// Tone spacing for the multitone comb, Hz.
const TONE_SPACING_HZ: f64 = 50e3;
/// Barrage composite sweep period, seconds.
const BARRAGE_SWEEP_SECS: f64 = 0.5;

/// Jamming waveform kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JammingKind {
    /// White gaussian noise across the bandwidth
    BroadbandNoise,
    /// Linear frequency sweep across the bandwidth
    ChirpSweep,
    /// One strong tone per 50 kHz
    Multitone,
    /// 1 ms noise bursts every 5 ms
    PulsedNoise,
    /// Band-pass-shaped gaussian I/Q for analog video receivers
    VideoNoise,
}

impl JammingKind {
    /// Parse a wire-format kind name. `white` and `chirp` are the raw-energy
    /// aliases for noise and sweep.
    pub fn parse(name: &str) -> SignalResult<Self> {
        match name {
            "broadband_noise" | "white" => Ok(JammingKind::BroadbandNoise),
            "chirp_sweep" | "chirp" => Ok(JammingKind::ChirpSweep),
            "multitone" => Ok(JammingKind::Multitone),
            "pulsed_noise" => Ok(JammingKind::PulsedNoise),
            "video_noise" => Ok(JammingKind::VideoNoise),
            other => Err(SignalError::UnknownWaveform(other.to_string())),
        }
    }
}

/// Sample rate for wideband video noise: 2.5x the bandwidth (Nyquist plus
/// margin).
pub fn wideband_sample_rate(bandwidth: f64) -> f64 {
    bandwidth * 2.5
}

/// Synthesize one jamming waveform.
///
/// Real-valued kinds come back as `Real`; video noise is complex `Iq`. The
/// result is always peak-normalized to full scale.
pub fn generate_waveform(
    kind: JammingKind,
    bandwidth: f64,
    duration: f64,
    sample_rate: f64,
    seed: u32,
) -> SignalResult<SampleBuffer> {
    if bandwidth <= 0.0 {
        return Err(SignalError::invalid("bandwidth", "must be positive"));
    }
    if duration <= 0.0 {
        return Err(SignalError::invalid("duration", "must be positive"));
    }

    let num_samples = (duration * sample_rate) as usize;
    let mut rng = create_stream_rng(seed, "jamming");

    let mut buffer = match kind {
        JammingKind::BroadbandNoise => {
            let samples = (0..num_samples).map(|_| gaussian(&mut rng, 0.0, 1.0)).collect();
            SampleBuffer::Real(samples)
        }
        JammingKind::ChirpSweep => {
            let f_start = -bandwidth / 2.0;
            let rate = bandwidth / duration;
            let samples = (0..num_samples)
                .map(|i| {
                    let t = i as f64 / sample_rate;
                    (2.0 * PI * (f_start * t + 0.5 * rate * t * t)).cos()
                })
                .collect();
            SampleBuffer::Real(samples)
        }
        JammingKind::Multitone => {
            let num_tones = ((bandwidth / TONE_SPACING_HZ) as usize).max(1);
            let samples = (0..num_samples)
                .map(|i| {
                    let t = i as f64 / sample_rate;
                    (0..num_tones)
                        .map(|k| {
                            let tone = -bandwidth / 2.0 + k as f64 * bandwidth / num_tones as f64;
                            (2.0 * PI * tone * t).cos()
                        })
                        .sum()
                })
                .collect();
            SampleBuffer::Real(samples)
        }
        JammingKind::PulsedNoise => {
            let mut samples = vec![0.0_f64; num_samples];
            let pulse_samples = (PULSE_ON_SECS * sample_rate) as usize;
            let period_samples = ((PULSE_PERIOD_SECS * sample_rate) as usize).max(1);
            let mut start = 0;
            while start < num_samples {
                let end = (start + pulse_samples).min(num_samples);
                for sample in &mut samples[start..end] {
                    *sample = gaussian(&mut rng, 0.0, 2.0);
                }
                start += period_samples;
            }
            SampleBuffer::Real(samples)
        }
        JammingKind::VideoNoise => {
            let mut samples: Vec<IQSample> = (0..num_samples)
                .map(|_| {
                    let (re, im) = gaussian_pair(&mut rng);
                    IQSample::new(re * 0.8, im * 0.8)
                })
                .collect();

            // Spectral shaping over 10-90% of the target bandwidth
            let nyquist = sample_rate / 2.0;
            let low = (bandwidth * 0.1).max(100e3);
            let high = (bandwidth * 0.9).min(nyquist - 100e3);
            if low < high {
                let mut filter = IirFilter::butterworth_bandpass(2, low, high, sample_rate);
                samples = filter.process_complex_block(&samples);
            }
            SampleBuffer::Iq(samples)
        }
    };

    buffer.normalize();
    Ok(buffer)
}

/// Full-duration baseband with a band's hop plan baked in.
///
/// Non-barrage patterns fill each dwell with broadband noise mixed to the
/// hop channel's offset from the band center. The barrage pattern emits
/// repeated 500 ms noise-modulated sweeps across the whole band (rapid
/// sequential coverage, not simultaneous transmission).
pub fn generate_hop_sequence_signal(
    band: &str,
    pattern: HopPattern,
    dwell_secs: f64,
    duration: f64,
    seed: u32,
) -> SignalResult<SampleBuffer> {
    let channels = band_channels(band)?;
    if dwell_secs <= 0.0 {
        return Err(SignalError::invalid("dwell", "must be positive"));
    }

    let sample_rate = DEFAULT_SAMPLE_RATE;
    let total_samples = (duration * sample_rate) as usize;
    let mut signal = vec![0.0_f64; total_samples];
    let center = channels.iter().sum::<f64>() / channels.len() as f64;
    let mut rng = create_stream_rng(seed, "hop-jamming");

    if pattern == HopPattern::Barrage {
        let f_start = channels.iter().cloned().fold(f64::INFINITY, f64::min);
        let f_end = channels.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let sweep_samples = ((BARRAGE_SWEEP_SECS * sample_rate) as usize).max(1);

        let mut start = 0;
        while start < total_samples {
            let end = (start + sweep_samples).min(total_samples);
            let mut phase = 0.0_f64;
            for (offset, sample) in signal[start..end].iter_mut().enumerate() {
                let t = offset as f64 / sample_rate;
                let sweep_freq = f_start + (f_end - f_start) * t / BARRAGE_SWEEP_SECS;
                phase = (phase + 2.0 * PI * (sweep_freq - center) / sample_rate).rem_euclid(2.0 * PI);
                *sample = gaussian(&mut rng, 0.0, 1.0) * phase.cos();
            }
            start += sweep_samples;
        }
    } else {
        let sequence = HopSequenceGenerator::with_seed(channels.len(), seed).sequence(pattern);
        let hop_samples = ((dwell_secs * sample_rate) as usize).max(1);

        let mut hop_count = 0;
        let mut start = 0;
        while start < total_samples {
            let end = (start + hop_samples).min(total_samples);
            let channel = channels[sequence[hop_count % sequence.len()]];
            let freq_offset = channel - center;

            for (offset, sample) in signal[start..end].iter_mut().enumerate() {
                let t = offset as f64 / sample_rate;
                *sample = gaussian(&mut rng, 0.0, 1.0) * (2.0 * PI * freq_offset * t).cos();
            }

            hop_count += 1;
            start += hop_samples;
        }
    }

    let mut buffer = SampleBuffer::Real(signal);
    buffer.normalize();
    Ok(buffer)
}

/// Cache-facing entry for the per-band ELRS jammers: `jamming_type`,
/// `bandwidth` and `duration` required, baseband at the default rate.
pub fn encode_params_elrs_jammer(params: &Params, seed: u32) -> SignalResult<EncoderOutput> {
    let kind = JammingKind::parse(params.require_str("jamming_type")?)?;
    let bandwidth = params.require_f64("bandwidth")?;
    let duration = params.require_f64("duration")?;
    let buffer = generate_waveform(kind, bandwidth, duration, DEFAULT_SAMPLE_RATE, seed)?;
    Ok((buffer, DEFAULT_SAMPLE_RATE))
}

/// Cache-facing entry for wideband drone-video jamming: complex video noise
/// at 2.5x bandwidth.
pub fn encode_params_drone_video(params: &Params, seed: u32) -> SignalResult<EncoderOutput> {
    let bandwidth = params.require_f64("bandwidth")?;
    let duration = params.require_f64("duration")?;
    let kind = match params.get_str("jamming_type") {
        Some(name) => JammingKind::parse(name)?,
        None => JammingKind::VideoNoise,
    };
    let sample_rate = wideband_sample_rate(bandwidth);
    let buffer = generate_waveform(kind, bandwidth, duration, sample_rate, seed)?;
    Ok((buffer, sample_rate))
}

/// Cache-facing entry for raw-energy bursts: `frequency` names the tuning
/// target for the transmission layer and is required even though the
/// baseband itself stays centered.
pub fn encode_params_raw_energy(params: &Params, seed: u32) -> SignalResult<EncoderOutput> {
    let _frequency = params.require_f64("frequency")?;
    let bandwidth = params.require_f64("bandwidth")?;
    let duration = params.require_f64("duration")?;
    let kind = JammingKind::parse(params.require_str("noise_type")?)?;
    let sample_rate = wideband_sample_rate(bandwidth);
    let buffer = generate_waveform(kind, bandwidth, duration, sample_rate, seed)?;
    Ok((buffer, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::DEFAULT_SEED;
    use approx::assert_relative_eq;

    #[test]
    fn test_broadband_noise_full_scale() {
        let buf =
            generate_waveform(JammingKind::BroadbandNoise, 500e3, 0.01, 2e6, DEFAULT_SEED).unwrap();
        assert_eq!(buf.len(), 20_000);
        assert_relative_eq!(buf.peak(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_chirp_sweep_full_scale() {
        let buf =
            generate_waveform(JammingKind::ChirpSweep, 500e3, 0.01, 2e6, DEFAULT_SEED).unwrap();
        assert_relative_eq!(buf.peak(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_multitone_tone_count_scales_with_bandwidth() {
        // 500 kHz → 10 tones; peak of the comb normalizes to 1.0
        let buf =
            generate_waveform(JammingKind::Multitone, 500e3, 0.005, 2e6, DEFAULT_SEED).unwrap();
        assert_relative_eq!(buf.peak(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pulsed_noise_duty_cycle() {
        let sample_rate = 2e6;
        let buf =
            generate_waveform(JammingKind::PulsedNoise, 500e3, 0.01, sample_rate, DEFAULT_SEED)
                .unwrap();
        let samples = match buf {
            SampleBuffer::Real(v) => v,
            _ => panic!("pulsed noise is real-valued"),
        };
        // On during the first 1 ms...
        let on = &samples[..(0.001 * sample_rate) as usize];
        assert!(on.iter().any(|&x| x != 0.0));
        // ...silent from 1 ms to 5 ms
        let off = &samples[(0.0015 * sample_rate) as usize..(0.005 * sample_rate) as usize];
        assert!(off.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_video_noise_is_complex_at_wideband_rate() {
        let bandwidth = 5e6;
        let sample_rate = wideband_sample_rate(bandwidth);
        let buf = generate_waveform(
            JammingKind::VideoNoise,
            bandwidth,
            0.002,
            sample_rate,
            DEFAULT_SEED,
        )
        .unwrap();
        assert!(matches!(buf, SampleBuffer::Iq(_)));
        assert_eq!(buf.len(), (0.002 * sample_rate) as usize);
        assert_relative_eq!(buf.peak(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_waveform_determinism() {
        let a = generate_waveform(JammingKind::BroadbandNoise, 1e6, 0.005, 2e6, 3).unwrap();
        let b = generate_waveform(JammingKind::BroadbandNoise, 1e6, 0.005, 2e6, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kind_parsing_and_aliases() {
        assert_eq!(JammingKind::parse("broadband_noise").unwrap(), JammingKind::BroadbandNoise);
        assert_eq!(JammingKind::parse("white").unwrap(), JammingKind::BroadbandNoise);
        assert_eq!(JammingKind::parse("chirp").unwrap(), JammingKind::ChirpSweep);
        assert_eq!(JammingKind::parse("video_noise").unwrap(), JammingKind::VideoNoise);
        assert!(JammingKind::parse("sparkle").is_err());
    }

    #[test]
    fn test_hop_sequence_signal_shape() {
        let buf = generate_hop_sequence_signal("915", HopPattern::Pseudorandom, 0.002, 0.02, 1)
            .unwrap();
        assert_eq!(buf.len(), 40_000);
        assert_relative_eq!(buf.peak(), 1.0, epsilon = 1e-9);
        let again = generate_hop_sequence_signal("915", HopPattern::Pseudorandom, 0.002, 0.02, 1)
            .unwrap();
        assert_eq!(buf, again);
    }

    #[test]
    fn test_barrage_composite_sweeps() {
        let buf = generate_hop_sequence_signal("433", HopPattern::Barrage, 0.15, 0.01, 1).unwrap();
        assert_eq!(buf.len(), 20_000);
        assert_relative_eq!(buf.peak(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_elrs_jammer_params() {
        let params = Params::new()
            .with("band", "915")
            .with("jamming_type", "broadband_noise")
            .with("duration", 0.01)
            .with("bandwidth", 500e3);
        let (buf, rate) = encode_params_elrs_jammer(&params, DEFAULT_SEED).unwrap();
        assert_eq!(rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(buf.len(), 20_000);
    }

    #[test]
    fn test_raw_energy_requires_frequency() {
        let params = Params::new()
            .with("bandwidth", 5e6)
            .with("noise_type", "white")
            .with("duration", 0.001);
        let err = encode_params_raw_energy(&params, DEFAULT_SEED).unwrap_err();
        assert!(matches!(
            err,
            SignalError::MissingParameter(ref name) if name == "frequency"
        ));
    }

    #[test]
    fn test_drone_video_uses_wideband_rate() {
        let params = Params::new()
            .with("bandwidth", 5e6)
            .with("duration", 0.001)
            .with("jamming_type", "video_noise");
        let (buf, rate) = encode_params_drone_video(&params, DEFAULT_SEED).unwrap();
        assert_eq!(rate, 12.5e6);
        assert!(matches!(buf, SampleBuffer::Iq(_)));
    }
}
