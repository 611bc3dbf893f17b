//! IIR filters built from cascaded biquad sections.
//!
//! The jamming encoder shapes its wideband video noise with a Butterworth
//! band-pass; the design here follows the classic recipe: analog Butterworth
//! prototype poles, lowpass-to-bandpass transform, bilinear transform into
//! second-order sections, unity gain at the geometric center frequency.

use num_complex::Complex64;
use std::f64::consts::PI;

/// A single biquad (second-order section).
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
///
/// Direct Form II Transposed for numerical robustness.
#[derive(Debug, Clone)]
pub struct Biquad {
    /// Numerator coefficients [b0, b1, b2]
    b: [f64; 3],
    /// Denominator coefficients [a1, a2] (a0 normalized to 1)
    a: [f64; 2],
    /// Real-path state
    state: [f64; 2],
    /// Complex-path state
    state_complex: [Complex64; 2],
}

impl Biquad {
    /// Create a biquad from coefficients (a0 assumed normalized to 1).
    pub fn new(b: [f64; 3], a: [f64; 2]) -> Self {
        Self {
            b,
            a,
            state: [0.0; 2],
            state_complex: [Complex64::new(0.0, 0.0); 2],
        }
    }

    /// Process one real sample.
    #[inline]
    pub fn process_real(&mut self, input: f64) -> f64 {
        let output = self.b[0] * input + self.state[0];
        self.state[0] = self.b[1] * input - self.a[0] * output + self.state[1];
        self.state[1] = self.b[2] * input - self.a[1] * output;
        output
    }

    /// Process one complex sample.
    #[inline]
    pub fn process_complex(&mut self, input: Complex64) -> Complex64 {
        let output = self.b[0] * input + self.state_complex[0];
        self.state_complex[0] = self.b[1] * input - self.a[0] * output + self.state_complex[1];
        self.state_complex[1] = self.b[2] * input - self.a[1] * output;
        output
    }

    /// Reset both state paths.
    pub fn reset(&mut self) {
        self.state = [0.0; 2];
        self.state_complex = [Complex64::new(0.0, 0.0); 2];
    }

    /// Poles inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.a[1].abs() < 1.0 && self.a[0].abs() < 1.0 + self.a[1]
    }

    /// Frequency response at normalized angular frequency `w` (rad/sample).
    fn response(&self, w: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = Complex64::from_polar(1.0, -2.0 * w);
        let num = self.b[0] + self.b[1] * z1 + self.b[2] * z2;
        let den = Complex64::new(1.0, 0.0) + self.a[0] * z1 + self.a[1] * z2;
        num / den
    }
}

/// Cascade of biquad sections with an overall gain factor.
#[derive(Debug, Clone)]
pub struct IirFilter {
    sections: Vec<Biquad>,
    gain: f64,
}

impl IirFilter {
    /// Design a Butterworth band-pass filter.
    ///
    /// `order` is the order per band edge; the realized filter order is
    /// `2 * order` (so `order = 2` gives the 4th-order shaper).
    ///
    /// # Panics
    /// Panics when the edges are not `0 < low < high < fs/2`.
    pub fn butterworth_bandpass(order: usize, low_hz: f64, high_hz: f64, sample_rate: f64) -> Self {
        assert!(order >= 1 && order <= 10, "order must be 1-10");
        assert!(
            low_hz > 0.0 && low_hz < high_hz && high_hz < sample_rate / 2.0,
            "band edges must satisfy 0 < low < high < fs/2"
        );

        let sections = design_butterworth_bandpass(order, low_hz, high_hz, sample_rate);
        let mut filter = Self {
            sections,
            gain: 1.0,
        };

        // Normalize to unity gain at the geometric center frequency.
        let center = (low_hz * high_hz).sqrt();
        let mag = filter.magnitude_at(center, sample_rate);
        if mag > 0.0 {
            filter.gain = 1.0 / mag;
        }
        filter
    }

    /// Filter a block of real samples.
    pub fn process_real_block(&mut self, input: &[f64]) -> Vec<f64> {
        input
            .iter()
            .map(|&x| {
                let mut y = x * self.gain;
                for section in &mut self.sections {
                    y = section.process_real(y);
                }
                y
            })
            .collect()
    }

    /// Filter a block of complex samples.
    pub fn process_complex_block(&mut self, input: &[Complex64]) -> Vec<Complex64> {
        input
            .iter()
            .map(|&x| {
                let mut y = x * self.gain;
                for section in &mut self.sections {
                    y = section.process_complex(y);
                }
                y
            })
            .collect()
    }

    /// Reset all section state.
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    /// Magnitude response at `freq_hz`.
    pub fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq_hz / sample_rate;
        let mut h = Complex64::new(self.gain, 0.0);
        for section in &self.sections {
            h *= section.response(w);
        }
        h.norm()
    }

    /// All sections stable.
    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(|s| s.is_stable())
    }
}

/// Analog prototype → band-pass transform → bilinear transform.
fn design_butterworth_bandpass(
    order: usize,
    low_hz: f64,
    high_hz: f64,
    sample_rate: f64,
) -> Vec<Biquad> {
    let k = 2.0 * sample_rate;
    // Prewarped analog edge frequencies
    let wl = k * (PI * low_hz / sample_rate).tan();
    let wh = k * (PI * high_hz / sample_rate).tan();
    let bw = wh - wl;
    let w0_sq = wl * wh;

    // Pole pairs of the band-pass: each prototype pole maps to two analog
    // poles via s^2 - p*B*s + w0^2 = 0; conjugate-symmetric pairs become one
    // real-coefficient section each.
    let mut pole_pairs: Vec<(Complex64, Complex64)> = Vec::new();
    for m in 0..order {
        let theta = PI * (2 * m + 1) as f64 / (2 * order) as f64;
        let p = Complex64::new(-theta.sin(), theta.cos());
        if p.im < -1e-12 {
            continue; // the conjugate prototype pole covers this one
        }
        let pb = p * bw;
        let disc = (pb * pb - Complex64::new(4.0 * w0_sq, 0.0)).sqrt();
        let s1 = (pb + disc) / 2.0;
        let s2 = (pb - disc) / 2.0;
        if p.im.abs() < 1e-12 {
            // Real prototype pole (odd order): its two band-pass poles form
            // one section together.
            pole_pairs.push((s1, s2));
        } else {
            pole_pairs.push((s1, s1.conj()));
            pole_pairs.push((s2, s2.conj()));
        }
    }

    // Bilinear transform each pair. Band-pass zeros sit at z = ±1, giving
    // every section the numerator (1 - z^-2); absolute gain is fixed by the
    // caller at the center frequency.
    pole_pairs
        .into_iter()
        .map(|(sa, sb)| {
            let sum = (sa + sb).re;
            let prod = (sa * sb).re;
            let a0 = k * k - sum * k + prod;
            let a1 = 2.0 * (prod - k * k);
            let a2 = k * k + sum * k + prod;
            Biquad::new([1.0 / a0, 0.0, -1.0 / a0], [a1 / a0, a2 / a0])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bandpass_unity_center_gain() {
        let fs = 1_000_000.0;
        let filter = IirFilter::butterworth_bandpass(2, 50_000.0, 200_000.0, fs);
        let center = (50_000.0_f64 * 200_000.0).sqrt();
        assert_relative_eq!(filter.magnitude_at(center, fs), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bandpass_rejects_dc_and_nyquist() {
        let fs = 1_000_000.0;
        let filter = IirFilter::butterworth_bandpass(2, 50_000.0, 200_000.0, fs);
        assert!(filter.magnitude_at(100.0, fs) < 0.05);
        assert!(filter.magnitude_at(fs / 2.0 * 0.99, fs) < 0.05);
    }

    #[test]
    fn test_bandpass_stable() {
        let fs = 25_000_000.0;
        let filter = IirFilter::butterworth_bandpass(2, 1_000_000.0, 9_000_000.0, fs);
        assert!(filter.is_stable());
    }

    #[test]
    fn test_bandpass_attenuates_out_of_band_tone() {
        let fs = 1_000_000.0;
        let mut filter = IirFilter::butterworth_bandpass(2, 50_000.0, 200_000.0, fs);

        // In-band tone passes with much more energy than an out-of-band tone.
        let mut tone = |f: f64| -> f64 {
            let samples: Vec<f64> = (0..4096)
                .map(|i| (2.0 * PI * f * i as f64 / fs).cos())
                .collect();
            let out = filter.process_real_block(&samples);
            filter.reset();
            out[2048..].iter().map(|x| x * x).sum::<f64>()
        };

        let in_band = tone(100_000.0);
        let below = tone(5_000.0);
        let above = tone(450_000.0);
        assert!(in_band > 20.0 * below);
        assert!(in_band > 20.0 * above);
    }

    #[test]
    fn test_biquad_unity_passthrough() {
        let mut bq = Biquad::new([1.0, 0.0, 0.0], [0.0, 0.0]);
        assert_relative_eq!(bq.process_real(0.5), 0.5, epsilon = 1e-15);
        let y = bq.process_complex(Complex64::new(0.25, -0.5));
        assert_relative_eq!(y.re, 0.25, epsilon = 1e-15);
        assert_relative_eq!(y.im, -0.5, epsilon = 1e-15);
    }
}
