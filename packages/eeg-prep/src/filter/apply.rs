//! Zero-phase filter application
//!
//! IIR: forward-backward filtering over an odd-extended signal, each pass
//! started from the steady state of its first sample.
//! FIR: symmetric kernel convolved through the FFT and read out around the
//! centre tap, over the same kind of extension.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::design::SosFilter;

/// Point-symmetric extension of `signal` by `pad` samples on each side:
/// `2*x[0] - x[pad..1]` before and `2*x[n-1] - x[n-2..n-1-pad]` after.
/// `pad` must be smaller than the signal length.
pub fn odd_extend(signal: &[f64], pad: usize) -> Vec<f64> {
    let n = signal.len();
    debug_assert!(pad < n.max(1));
    if n == 0 {
        return Vec::new();
    }

    let first = signal[0];
    let last = signal[n - 1];
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
    out.extend_from_slice(signal);
    out.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));
    out
}

/// Pad length used for forward-backward IIR filtering
pub fn iir_pad_len(filter: &SosFilter, n: usize) -> usize {
    (3 * (2 * filter.num_sections() + 1)).min(n.saturating_sub(1))
}

/// Forward-backward filtering: zero phase, squared magnitude response.
pub fn filtfilt(filter: &SosFilter, signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n < 2 {
        return signal.to_vec();
    }

    let pad = iir_pad_len(filter, n);
    let extended = odd_extend(signal, pad);
    let mut filter = filter.clone();

    filter.reset();
    filter.settle(extended[0]);
    let mut forward = filter.filter(&extended);
    forward.reverse();

    filter.reset();
    filter.settle(forward[0]);
    let mut backward = filter.filter(&forward);
    backward.reverse();

    backward[pad..pad + n].to_vec()
}

/// FFT convolution of a fixed symmetric kernel with signals of one length.
///
/// Built once per recording and shared read-only across channels.
pub struct FirConvolver {
    kernel_len: usize,
    signal_len: usize,
    pad: usize,
    fft_len: usize,
    kernel_spectrum: Vec<Complex<f64>>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl FirConvolver {
    pub fn new(kernel: &[f64], signal_len: usize) -> Self {
        let kernel_len = kernel.len();
        let pad = kernel_len.min(signal_len.saturating_sub(1));
        let fft_len = (signal_len + 2 * pad + kernel_len)
            .saturating_sub(1)
            .max(1)
            .next_power_of_two();

        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);

        let mut kernel_spectrum: Vec<Complex<f64>> =
            kernel.iter().map(|&h| Complex::new(h, 0.0)).collect();
        kernel_spectrum.resize(fft_len, Complex::new(0.0, 0.0));
        forward.process(&mut kernel_spectrum);

        log::debug!(
            "[FIR] {} taps, signal {} samples, pad {}, FFT size {}",
            kernel_len,
            signal_len,
            pad,
            fft_len
        );

        Self {
            kernel_len,
            signal_len,
            pad,
            fft_len,
            kernel_spectrum,
            forward,
            inverse,
        }
    }

    /// Zero-phase filtered copy of `signal`, same length.
    pub fn apply(&self, signal: &[f64]) -> Vec<f64> {
        debug_assert_eq!(signal.len(), self.signal_len);
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }

        let extended = odd_extend(signal, self.pad);
        let mut buffer: Vec<Complex<f64>> =
            extended.iter().map(|&x| Complex::new(x, 0.0)).collect();
        buffer.resize(self.fft_len, Complex::new(0.0, 0.0));

        self.forward.process(&mut buffer);
        for (x, h) in buffer.iter_mut().zip(&self.kernel_spectrum) {
            *x *= *h;
        }
        self.inverse.process(&mut buffer);

        // full convolution index of input sample i is i + pad + centre tap
        let offset = self.pad + self.kernel_len / 2;
        let scale = 1.0 / self.fft_len as f64;
        buffer[offset..offset + n]
            .iter()
            .map(|c| c.re * scale)
            .collect()
    }
}
