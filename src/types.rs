//! Core types shared across the synthesis engine.
//!
//! Signals move through the crate in one of two shapes: real-valued baseband
//! (ADS-B pulse trains, summed GPS constellations, ELRS chirps) or complex
//! I/Q baseband (wideband video noise). `SampleBuffer` carries both so the
//! cache can serialize either into the raw signed 8-bit format hardware
//! front-ends consume.
//!
//! ## I/Q representation
//!
//! ```text
//!            Q (Imaginary)
//!            ^
//!            |     * (I=0.7, Q=0.7)
//!            |    /
//!            |   /  magnitude = 1.0
//!            |  /   phase = 45°
//!   ---------+---------> I (Real)
//! ```

use num_complex::Complex64;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Type alias for complex numbers using f64 precision
pub type Complex = Complex64;

/// A single I/Q sample point
pub type IQSample = Complex64;

/// A floating point sample (for real-valued signals)
pub type Sample = f64;

/// Result type for synthesis and cache operations
pub type SignalResult<T> = Result<T, SignalError>;

/// Errors surfaced by the encoders and the signal cache
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("unknown waveform kind: {0}")]
    UnknownWaveform(String),

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache metadata error: {0}")]
    Metadata(String),
}

impl SignalError {
    /// Convenience constructor for invalid-parameter errors.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        SignalError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// A synthesized sample buffer, either real-valued or complex I/Q.
///
/// The on-disk form is raw signed 8-bit: one byte per sample for `Real`,
/// interleaved I then Q bytes for `Iq`. Values are scaled so amplitude 1.0
/// maps to 127.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    /// Single-channel real baseband
    Real(Vec<Sample>),
    /// Complex I/Q baseband
    Iq(Vec<IQSample>),
}

impl SampleBuffer {
    /// Number of samples (complex samples count once).
    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::Real(v) => v.len(),
            SampleBuffer::Iq(v) => v.len(),
        }
    }

    /// True when the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Peak absolute amplitude across all components.
    pub fn peak(&self) -> f64 {
        match self {
            SampleBuffer::Real(v) => v.iter().fold(0.0_f64, |m, &x| m.max(x.abs())),
            SampleBuffer::Iq(v) => v
                .iter()
                .fold(0.0_f64, |m, s| m.max(s.re.abs()).max(s.im.abs())),
        }
    }

    /// Scale the buffer so its peak amplitude is exactly 1.0.
    ///
    /// Silent buffers are left untouched.
    pub fn normalize(&mut self) {
        let peak = self.peak();
        if peak <= 0.0 {
            return;
        }
        let scale = 1.0 / peak;
        match self {
            SampleBuffer::Real(v) => {
                for x in v.iter_mut() {
                    *x *= scale;
                }
            }
            SampleBuffer::Iq(v) => {
                for s in v.iter_mut() {
                    *s *= scale;
                }
            }
        }
    }

    /// Quantize to the raw signed 8-bit wire format.
    ///
    /// Amplitude [-1.0, 1.0] maps to [-127, 127]; values outside the range
    /// saturate. `Iq` buffers interleave I then Q.
    pub fn to_i8_bytes(&self) -> Vec<u8> {
        fn quantize(x: f64) -> u8 {
            ((x * 127.0).round().clamp(-127.0, 127.0) as i8) as u8
        }

        match self {
            SampleBuffer::Real(v) => v.iter().map(|&x| quantize(x)).collect(),
            SampleBuffer::Iq(v) => {
                let mut bytes = Vec::with_capacity(v.len() * 2);
                for s in v {
                    bytes.push(quantize(s.re));
                    bytes.push(quantize(s.im));
                }
                bytes
            }
        }
    }
}

/// Cooperative cancellation token.
///
/// Long-running work (the pre-generation walk) checks the token before
/// starting each unit; synthesis itself is never interrupted mid-call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, non-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once `cancel` has been called on any clone of this token.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_real_buffer_quantization() {
        let buf = SampleBuffer::Real(vec![0.0, 1.0, -1.0, 0.5]);
        let bytes = buf.to_i8_bytes();
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes[0] as i8, 0);
        assert_eq!(bytes[1] as i8, 127);
        assert_eq!(bytes[2] as i8, -127);
        assert_eq!(bytes[3] as i8, 64);
    }

    #[test]
    fn test_iq_buffer_interleaves() {
        let buf = SampleBuffer::Iq(vec![
            IQSample::new(1.0, -1.0),
            IQSample::new(0.0, 0.5),
        ]);
        let bytes = buf.to_i8_bytes();
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes[0] as i8, 127);
        assert_eq!(bytes[1] as i8, -127);
        assert_eq!(bytes[2] as i8, 0);
        assert_eq!(bytes[3] as i8, 64);
    }

    #[test]
    fn test_quantization_saturates() {
        let buf = SampleBuffer::Real(vec![2.0, -3.0]);
        let bytes = buf.to_i8_bytes();
        assert_eq!(bytes[0] as i8, 127);
        assert_eq!(bytes[1] as i8, -127);
    }

    #[test]
    fn test_normalize_to_full_scale() {
        let mut buf = SampleBuffer::Real(vec![0.1, -0.4, 0.2]);
        buf.normalize();
        assert_relative_eq!(buf.peak(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_silent_buffer_is_noop() {
        let mut buf = SampleBuffer::Real(vec![0.0; 16]);
        buf.normalize();
        assert_eq!(buf.peak(), 0.0);
    }

    #[test]
    fn test_cancel_token_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
