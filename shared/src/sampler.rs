//! Collector-side trace sampling.
//!
//! The decision depends only on the trace ID, so every span of a trace gets
//! the same answer on every collector instance.

use crate::models::Span;
use thiserror::Error;

/// Errors that can occur when configuring a sampler.
#[derive(Debug, Error, PartialEq)]
pub enum SamplerError {
    /// The rate is outside `[0, 1]`.
    #[error("sample rate must be between 0.0 and 1.0, got {0}")]
    InvalidRate(f32),
}

/// Retains traces whose ID falls under a rate-derived boundary.
///
/// A trace is kept when `|low 64 bits of trace ID| <= rate * i64::MAX`.
/// Debug spans are always kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSampler {
    boundary: i64,
}

impl CollectorSampler {
    /// A sampler that keeps every trace.
    pub const ALWAYS_SAMPLE: Self = Self { boundary: i64::MAX };

    /// Creates a sampler for the given rate.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::InvalidRate`] if the rate is not in `[0, 1]`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn create(rate: f32) -> Result<Self, SamplerError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(SamplerError::InvalidRate(rate));
        }
        let boundary = (i64::MAX as f64 * f64::from(rate)) as i64;
        Ok(Self { boundary })
    }

    /// Returns true if the span's trace should be stored.
    #[must_use]
    pub fn is_sampled(&self, span: &Span) -> bool {
        if span.debug || self.boundary == i64::MAX {
            return true;
        }
        match span.trace_id_low64() {
            // i64::MIN has no positive counterpart; treat it as the largest magnitude.
            Some(i64::MIN) => false,
            Some(id) => id.abs() <= self.boundary,
            None => true,
        }
    }
}

impl Default for CollectorSampler {
    fn default() -> Self {
        Self::ALWAYS_SAMPLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_with_trace_id(trace_id: &str) -> Span {
        Span::new(trace_id, "a2fb4a1d1a96d312", "op", "svc")
    }

    #[test]
    fn test_rate_out_of_range() {
        assert_eq!(
            CollectorSampler::create(1.5),
            Err(SamplerError::InvalidRate(1.5))
        );
        assert!(CollectorSampler::create(-0.1).is_err());
        assert!(CollectorSampler::create(f32::NAN).is_err());
    }

    #[test]
    fn test_full_rate_keeps_everything() {
        let sampler = CollectorSampler::create(1.0).unwrap();
        assert_eq!(sampler, CollectorSampler::ALWAYS_SAMPLE);
        assert!(sampler.is_sampled(&span_with_trace_id("8000000000000000")));
        assert!(sampler.is_sampled(&span_with_trace_id("ffffffffffffffff")));
    }

    #[test]
    fn test_zero_rate_drops_everything_but_debug() {
        let sampler = CollectorSampler::create(0.0).unwrap();

        assert!(!sampler.is_sampled(&span_with_trace_id("0000000000000001")));
        assert!(!sampler.is_sampled(&span_with_trace_id("7fffffffffffffff")));
        assert!(sampler.is_sampled(&span_with_trace_id("0000000000000001").with_debug(true)));
    }

    #[test]
    fn test_half_rate_uses_magnitude_of_low_bits() {
        let sampler = CollectorSampler::create(0.5).unwrap();

        // Small magnitudes, positive or negative, fall under the boundary.
        assert!(sampler.is_sampled(&span_with_trace_id("0000000000000010")));
        assert!(sampler.is_sampled(&span_with_trace_id("fffffffffffffff0")));
        // Magnitudes near i64::MAX do not.
        assert!(!sampler.is_sampled(&span_with_trace_id("7ffffffffffffff0")));
        assert!(!sampler.is_sampled(&span_with_trace_id("8000000000000000")));
    }

    #[test]
    fn test_decision_ignores_high_bits() {
        let sampler = CollectorSampler::create(0.5).unwrap();

        let low = span_with_trace_id("ffffffffffffffff0000000000000010");
        let high = span_with_trace_id("00000000000000000000000000000010");

        assert_eq!(sampler.is_sampled(&low), sampler.is_sampled(&high));
    }
}
