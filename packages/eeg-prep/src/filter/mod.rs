//! Frequency filtering of recordings
//!
//! Provides zero-phase filters for EEG data:
//! - Butterworth lowpass/highpass/bandpass (IIR, forward-backward)
//! - Hamming-windowed sinc lowpass/highpass/bandpass (FIR, centred FFT convolution)
//! - Notch filters for power line noise removal (50/60 Hz)
//!
//! Channels are filtered independently and in parallel.

pub mod apply;
pub mod design;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::recording::Recording;

pub use apply::{filtfilt, odd_extend, FirConvolver};
pub use design::{Band, BiquadCoeffs, ButterworthFilter, NotchFilter, SosFilter};

/// Default Butterworth order when none is requested
pub const DEFAULT_IIR_ORDER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMethod {
    Iir,
    Fir,
}

/// Serializable filter request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default = "default_method")]
    pub method: FilterMethod,
    /// High-pass edge in Hz (None or 0 = no high-pass)
    #[serde(default)]
    pub low_freq: Option<f64>,
    /// Low-pass edge in Hz (None = no low-pass)
    #[serde(default)]
    pub high_freq: Option<f64>,
    /// IIR: Butterworth order. FIR: order + 1 taps. None = automatic.
    #[serde(default)]
    pub order: Option<usize>,
}

fn default_method() -> FilterMethod {
    FilterMethod::Iir
}

impl FilterSpec {
    pub fn apply(&self, recording: &Recording) -> Result<Recording> {
        filter(
            recording,
            self.method,
            self.low_freq,
            self.high_freq,
            self.order,
        )
    }

    /// Check the request against a sample rate without touching data.
    pub fn validate(&self, sample_rate: f64) -> Result<Band> {
        if self.order == Some(0) {
            return Err(PrepError::InvalidFilterSpec(
                "Filter order must be positive".to_string(),
            ));
        }
        resolve_band(self.low_freq, self.high_freq, sample_rate)
    }
}

/// Filter every channel of `recording`, keeping only content inside
/// `[low_freq, high_freq]`. Either edge may be omitted.
pub fn filter(
    recording: &Recording,
    method: FilterMethod,
    low_freq: Option<f64>,
    high_freq: Option<f64>,
    order: Option<usize>,
) -> Result<Recording> {
    let spec = FilterSpec {
        method,
        low_freq,
        high_freq,
        order,
    };
    let band = spec.validate(recording.sample_rate())?;
    let sample_rate = recording.sample_rate();

    let filtered = match method {
        FilterMethod::Iir => {
            let order = order.unwrap_or(DEFAULT_IIR_ORDER);
            let sos = match band {
                Band::Lowpass(high) => ButterworthFilter::lowpass(high, sample_rate, order),
                Band::Highpass(low) => ButterworthFilter::highpass(low, sample_rate, order),
                Band::Bandpass(low, high) => {
                    ButterworthFilter::bandpass(low, high, sample_rate, order)
                }
            };
            log::info!(
                "[FILTER] IIR Butterworth {:?}, order {}, {} sections",
                band,
                order,
                sos.num_sections()
            );
            map_channels(recording, |channel| filtfilt(&sos, channel))
        }
        FilterMethod::Fir => {
            let num_taps = match order {
                Some(order) => design::taps_for_order(order),
                None => design::auto_num_taps(band, sample_rate),
            };
            let kernel = design::firwin(num_taps, band, sample_rate);
            log::info!("[FILTER] FIR Hamming {:?}, {} taps", band, num_taps);
            let convolver = FirConvolver::new(&kernel, recording.n_samples());
            map_channels(recording, |channel| convolver.apply(channel))
        }
    };

    recording.with_samples(filtered)
}

/// Remove `freq` and its harmonics (`harmonics` = 1 keeps only the
/// fundamental) with a zero-phase notch of quality factor `q`.
pub fn notch(recording: &Recording, freq: f64, q: f64, harmonics: usize) -> Result<Recording> {
    let nyquist = recording.nyquist();
    if !freq.is_finite() || freq <= 0.0 || freq >= nyquist {
        return Err(PrepError::InvalidFilterSpec(format!(
            "Notch frequency ({} Hz) must be between 0 and Nyquist ({} Hz)",
            freq, nyquist
        )));
    }
    if !q.is_finite() || q <= 0.0 {
        return Err(PrepError::InvalidFilterSpec(format!(
            "Notch quality factor must be positive, got {}",
            q
        )));
    }
    if harmonics == 0 {
        return Err(PrepError::InvalidFilterSpec(
            "Notch needs at least one harmonic".to_string(),
        ));
    }

    let sos = NotchFilter::design_with_harmonics(freq, recording.sample_rate(), q, harmonics);
    log::info!(
        "[FILTER] Notch at {} Hz (Q = {}), {} harmonic(s) below Nyquist",
        freq,
        q,
        sos.num_sections()
    );
    let filtered = map_channels(recording, |channel| filtfilt(&sos, channel));
    recording.with_samples(filtered)
}

/// Validate cutoffs and turn them into a pass band.
fn resolve_band(low_freq: Option<f64>, high_freq: Option<f64>, sample_rate: f64) -> Result<Band> {
    let nyquist = sample_rate / 2.0;

    let check = |name: &str, freq: f64| -> Result<()> {
        if !freq.is_finite() || freq < 0.0 {
            return Err(PrepError::InvalidFilterSpec(format!(
                "{} ({} Hz) must be a non-negative frequency",
                name, freq
            )));
        }
        if freq >= nyquist {
            return Err(PrepError::InvalidFilterSpec(format!(
                "{} ({} Hz) must be less than Nyquist ({} Hz)",
                name, freq, nyquist
            )));
        }
        Ok(())
    };

    if let Some(low) = low_freq {
        check("Low cutoff", low)?;
    }
    if let Some(high) = high_freq {
        check("High cutoff", high)?;
    }
    if let (Some(low), Some(high)) = (low_freq, high_freq) {
        if low >= high {
            return Err(PrepError::InvalidFilterSpec(format!(
                "Low cutoff ({} Hz) must be less than high cutoff ({} Hz)",
                low, high
            )));
        }
    }

    match (low_freq.filter(|&low| low > 0.0), high_freq) {
        (Some(low), Some(high)) => Ok(Band::Bandpass(low, high)),
        (Some(low), None) => Ok(Band::Highpass(low)),
        (None, Some(high)) if high > 0.0 => Ok(Band::Lowpass(high)),
        _ => Err(PrepError::InvalidFilterSpec(
            "At least one positive cutoff frequency is required".to_string(),
        )),
    }
}

/// Apply `f` to every channel in parallel and reassemble `[time, channel]`.
fn map_channels<F>(recording: &Recording, f: F) -> Array2<f64>
where
    F: Fn(&[f64]) -> Vec<f64> + Sync,
{
    let samples = recording.samples();
    let columns: Vec<Vec<f64>> = (0..recording.n_channels())
        .into_par_iter()
        .map(|idx| f(&samples.column(idx).to_vec()))
        .collect();

    Array2::from_shape_fn(samples.dim(), |(t, c)| columns[c][t])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine_recording(freqs: &[f64], fs: f64, n: usize) -> Recording {
        let samples = Array2::from_shape_fn((n, freqs.len()), |(t, c)| {
            (2.0 * PI * freqs[c] * t as f64 / fs).sin()
        });
        let labels = (0..freqs.len()).map(|i| format!("Ch{}", i)).collect();
        Recording::new(samples, fs, labels, vec![]).unwrap()
    }

    fn rms(x: impl Iterator<Item = f64>) -> f64 {
        let values: Vec<f64> = x.collect();
        (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
    }

    #[test]
    fn test_resolve_band() {
        assert_eq!(resolve_band(Some(1.0), Some(30.0), 256.0).unwrap(), Band::Bandpass(1.0, 30.0));
        assert_eq!(resolve_band(Some(0.0), Some(30.0), 256.0).unwrap(), Band::Lowpass(30.0));
        assert_eq!(resolve_band(Some(0.5), None, 256.0).unwrap(), Band::Highpass(0.5));
        assert!(resolve_band(None, None, 256.0).is_err());
        assert!(resolve_band(Some(0.0), None, 256.0).is_err());
        assert!(resolve_band(Some(-1.0), Some(30.0), 256.0).is_err());
        assert!(resolve_band(Some(30.0), Some(30.0), 256.0).is_err());
        assert!(resolve_band(None, Some(128.0), 256.0).is_err());
        assert!(resolve_band(Some(f64::NAN), None, 256.0).is_err());
    }

    #[test]
    fn test_nyquist_cutoff_rejected() {
        let rec = sine_recording(&[10.0], 256.0, 512);
        let result = filter(&rec, FilterMethod::Iir, Some(0.0), Some(256.0), None);
        assert!(matches!(result, Err(PrepError::InvalidFilterSpec(_))));
        let result = filter(&rec, FilterMethod::Fir, None, Some(128.0), None);
        assert!(matches!(result, Err(PrepError::InvalidFilterSpec(_))));
    }

    #[test]
    fn test_zero_order_rejected() {
        let rec = sine_recording(&[10.0], 256.0, 512);
        let result = filter(&rec, FilterMethod::Iir, Some(1.0), Some(30.0), Some(0));
        assert!(matches!(result, Err(PrepError::InvalidFilterSpec(_))));
    }

    #[test]
    fn test_lowpass_attenuates_high_channel_only() {
        // channel 0 at 5 Hz, channel 1 at 80 Hz
        let rec = sine_recording(&[5.0, 80.0], 256.0, 2048);
        for method in [FilterMethod::Iir, FilterMethod::Fir] {
            let out = filter(&rec, method, None, Some(30.0), None).unwrap();
            assert_eq!(out.samples().dim(), rec.samples().dim());

            let kept = rms(out.samples().column(0).iter().copied().skip(256).take(1536));
            let removed = rms(out.samples().column(1).iter().copied().skip(256).take(1536));
            assert!(
                (kept - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.02,
                "{:?}: {}",
                method,
                kept
            );
            assert!(removed < 0.01, "{:?}: {}", method, removed);
        }
    }

    #[test]
    fn test_highpass_removes_offset() {
        let n = 2048;
        let samples = Array2::from_shape_fn((n, 1), |(t, _)| {
            100.0 + (2.0 * PI * 10.0 * t as f64 / 256.0).sin()
        });
        let rec = Recording::new(samples, 256.0, vec!["Cz".into()], vec![]).unwrap();
        for method in [FilterMethod::Iir, FilterMethod::Fir] {
            let out = filter(&rec, method, Some(1.0), None, None).unwrap();
            let mean = out.samples().column(0).iter().skip(512).take(1024).sum::<f64>() / 1024.0;
            assert!(mean.abs() < 0.05, "{:?}: mean {}", method, mean);
        }
    }

    #[test]
    fn test_notch_removes_line_noise() {
        let rec = sine_recording(&[50.0, 10.0], 500.0, 4000);
        let out = notch(&rec, 50.0, 30.0, 1).unwrap();
        let line = rms(out.samples().column(0).iter().copied().skip(1000).take(2000));
        let alpha = rms(out.samples().column(1).iter().copied().skip(1000).take(2000));
        assert!(line < 0.05);
        assert!((alpha - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.01);

        assert!(notch(&rec, 250.0, 30.0, 1).is_err());
        assert!(notch(&rec, 50.0, 0.0, 1).is_err());
    }

    #[test]
    fn test_filter_spec_serde_defaults() {
        let spec: FilterSpec =
            serde_json::from_str(r#"{"low_freq": 0.1, "high_freq": 40}"#).unwrap();
        assert_eq!(spec.method, FilterMethod::Iir);
        assert_eq!(spec.order, None);
        let fir: FilterSpec =
            serde_json::from_str(r#"{"method": "fir", "high_freq": 40}"#).unwrap();
        assert_eq!(fir.method, FilterMethod::Fir);
    }
}
