//! Digital filter design
//!
//! IIR filters are cascaded second-order sections (biquads) obtained from the
//! analog Butterworth prototype through the bilinear transform with
//! pre-warping. FIR filters are Hamming-windowed sinc kernels.

use std::f64::consts::PI;

/// Second-order section (biquad) coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Gain at DC (z = 1)
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }
}

/// State for a single biquad section (Direct Form II Transposed)
#[derive(Debug, Clone, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

/// Single biquad filter section
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Process a single sample using Direct Form II Transposed
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.state = BiquadState::default();
    }

    /// Load the state this section settles into under a constant `input`,
    /// returning the constant output.
    fn settle(&mut self, input: f64) -> f64 {
        let c = &self.coeffs;
        let output = c.dc_gain() * input;
        self.state.z2 = c.b2 * input - c.a2 * output;
        self.state.z1 = c.b1 * input - c.a1 * output + self.state.z2;
        output
    }
}

/// Cascaded second-order sections filter
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<BiquadFilter>,
    gain: f64,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>, gain: f64) -> Self {
        Self {
            sections: sections.into_iter().map(BiquadFilter::new).collect(),
            gain,
        }
    }

    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    pub fn sections(&self) -> impl Iterator<Item = &BiquadCoeffs> {
        self.sections.iter().map(BiquadFilter::coeffs)
    }

    /// Chain another filter after this one.
    pub fn then(mut self, other: SosFilter) -> Self {
        let leading = other.gain;
        self.sections.extend(other.sections);
        self.gain *= leading;
        self
    }

    /// Process a single sample through all sections
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let mut output = input * self.gain;
        for section in &mut self.sections {
            output = section.process(output);
        }
        output
    }

    /// Process a signal and return a new array (original unchanged)
    pub fn filter(&mut self, signal: &[f64]) -> Vec<f64> {
        signal.iter().map(|&s| self.process(s)).collect()
    }

    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    /// Initialise every section to its steady state for a signal that has
    /// been constant at `level`, so filtering starts without a step transient.
    pub fn settle(&mut self, level: f64) {
        let mut input = level * self.gain;
        for section in &mut self.sections {
            input = section.settle(input);
        }
    }

    /// Magnitude response at `freq` Hz
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let (c1, s1) = (w.cos(), -w.sin());
        let (c2, s2) = ((2.0 * w).cos(), -(2.0 * w).sin());

        self.sections().fold(self.gain.abs(), |acc, c| {
            let num_re = c.b0 + c.b1 * c1 + c.b2 * c2;
            let num_im = c.b1 * s1 + c.b2 * s2;
            let den_re = 1.0 + c.a1 * c1 + c.a2 * c2;
            let den_im = c.a1 * s1 + c.a2 * s2;
            acc * (num_re.hypot(num_im) / den_re.hypot(den_im))
        })
    }
}

/// Butterworth filter designer
pub struct ButterworthFilter;

impl ButterworthFilter {
    /// Design a Butterworth lowpass filter
    pub fn lowpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff, sample_rate);
        SosFilter::new(Self::design_lowpass(wn, order), 1.0)
    }

    /// Design a Butterworth highpass filter
    pub fn highpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff, sample_rate);
        SosFilter::new(Self::design_highpass(wn, order), 1.0)
    }

    /// Bandpass as a highpass at `low` cascaded with a lowpass at `high`
    pub fn bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> SosFilter {
        Self::highpass(low, sample_rate, order).then(Self::lowpass(high, sample_rate, order))
    }

    /// Prewarp frequency for bilinear transform
    fn prewarp(freq: f64, sample_rate: f64) -> f64 {
        (PI * freq / sample_rate).tan()
    }

    /// Damping of the k-th conjugate pole pair of an order-`order`
    /// prototype: s^2 + damping*s + 1
    fn pole_damping(k: usize, order: usize) -> f64 {
        let theta = PI * (2.0 * k as f64 + 1.0) / (2.0 * order as f64);
        2.0 * theta.sin()
    }

    fn design_lowpass(wn: f64, order: usize) -> Vec<BiquadCoeffs> {
        let num_sections = (order + 1) / 2;
        let mut sections = Vec::with_capacity(num_sections);

        for k in 0..num_sections {
            // For odd order, last section is first-order: H(s) = wn / (s + wn)
            if order % 2 == 1 && k == num_sections - 1 {
                let k_coeff = wn / (1.0 + wn);
                sections.push(BiquadCoeffs {
                    b0: k_coeff,
                    b1: k_coeff,
                    b2: 0.0,
                    a1: (wn - 1.0) / (wn + 1.0),
                    a2: 0.0,
                });
            } else {
                let damping = Self::pole_damping(k, order);
                let wn2 = wn * wn;
                let denom = 1.0 + damping * wn + wn2;

                sections.push(BiquadCoeffs {
                    b0: wn2 / denom,
                    b1: 2.0 * wn2 / denom,
                    b2: wn2 / denom,
                    a1: 2.0 * (wn2 - 1.0) / denom,
                    a2: (1.0 - damping * wn + wn2) / denom,
                });
            }
        }

        sections
    }

    fn design_highpass(wn: f64, order: usize) -> Vec<BiquadCoeffs> {
        let num_sections = (order + 1) / 2;
        let mut sections = Vec::with_capacity(num_sections);

        for k in 0..num_sections {
            if order % 2 == 1 && k == num_sections - 1 {
                // First-order highpass: H(s) = s / (s + wn)
                let k_coeff = 1.0 / (1.0 + wn);
                sections.push(BiquadCoeffs {
                    b0: k_coeff,
                    b1: -k_coeff,
                    b2: 0.0,
                    a1: (wn - 1.0) / (wn + 1.0),
                    a2: 0.0,
                });
            } else {
                let damping = Self::pole_damping(k, order);
                let wn2 = wn * wn;
                let denom = 1.0 + damping * wn + wn2;

                sections.push(BiquadCoeffs {
                    b0: 1.0 / denom,
                    b1: -2.0 / denom,
                    b2: 1.0 / denom,
                    a1: 2.0 * (wn2 - 1.0) / denom,
                    a2: (1.0 - damping * wn + wn2) / denom,
                });
            }
        }

        sections
    }
}

/// Notch (band-reject) filter for removing specific frequencies
pub struct NotchFilter;

impl NotchFilter {
    /// Design a notch filter to remove a specific frequency
    ///
    /// # Arguments
    /// * `center_freq` - Frequency to remove (Hz)
    /// * `sample_rate` - Sampling rate (Hz)
    /// * `q_factor` - Quality factor (higher = narrower notch, typical: 30-50)
    pub fn design(center_freq: f64, sample_rate: f64, q_factor: f64) -> SosFilter {
        SosFilter::new(vec![Self::section(center_freq, sample_rate, q_factor)], 1.0)
    }

    /// Notch at `fundamental` and its multiples up to `num_harmonics`,
    /// skipping any at or above Nyquist.
    pub fn design_with_harmonics(
        fundamental: f64,
        sample_rate: f64,
        q_factor: f64,
        num_harmonics: usize,
    ) -> SosFilter {
        let nyquist = sample_rate / 2.0;
        let sections = (1..=num_harmonics)
            .map(|h| fundamental * h as f64)
            .take_while(|&freq| freq < nyquist)
            .map(|freq| Self::section(freq, sample_rate, q_factor))
            .collect();
        SosFilter::new(sections, 1.0)
    }

    fn section(center_freq: f64, sample_rate: f64, q_factor: f64) -> BiquadCoeffs {
        let w0 = 2.0 * PI * center_freq / sample_rate;
        let alpha = w0.sin() / (2.0 * q_factor);
        let cos_w0 = w0.cos();
        let a0 = 1.0 + alpha;

        BiquadCoeffs {
            b0: 1.0 / a0,
            b1: -2.0 * cos_w0 / a0,
            b2: 1.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Pass band of a filter, in Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Band {
    Lowpass(f64),
    Highpass(f64),
    Bandpass(f64, f64),
}

/// Transition bandwidth factor for the Hamming window: taps = 3.3 / (tbw / fs)
const HAMMING_LENGTH_FACTOR: f64 = 3.3;

/// Automatic transition bandwidth (Hz) for the narrowest edge of `band`.
pub fn auto_transition_bandwidth(band: Band, sample_rate: f64) -> f64 {
    let nyquist = sample_rate / 2.0;
    let low_tbw = |low: f64| (0.25 * low).max(2.0).min(low);
    let high_tbw = |high: f64| (0.25 * high).max(2.0).min(nyquist - high);

    match band {
        Band::Highpass(low) => low_tbw(low),
        Band::Lowpass(high) => high_tbw(high),
        Band::Bandpass(low, high) => low_tbw(low).min(high_tbw(high)),
    }
}

/// Kernel length derived from the transition bandwidth, always odd.
pub fn auto_num_taps(band: Band, sample_rate: f64) -> usize {
    let tbw = auto_transition_bandwidth(band, sample_rate);
    let taps = (HAMMING_LENGTH_FACTOR * sample_rate / tbw).ceil() as usize;
    make_odd(taps.max(3))
}

/// Number of taps for a given filter order (order + 1, at least 3, odd).
pub fn taps_for_order(order: usize) -> usize {
    make_odd((order + 1).max(3))
}

fn make_odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Hamming window of length `n`
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    let m = (n - 1) as f64;
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / m).cos())
        .collect()
}

/// Hamming-windowed sinc lowpass with unit DC gain. `cutoff` is in Hz.
fn windowed_sinc_lowpass(num_taps: usize, cutoff: f64, sample_rate: f64) -> Vec<f64> {
    let fc = cutoff / sample_rate;
    let centre = (num_taps - 1) as f64 / 2.0;
    let window = hamming(num_taps);

    let mut kernel: Vec<f64> = window
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let x = i as f64 - centre;
            let sinc = if x == 0.0 {
                2.0 * fc
            } else {
                (2.0 * PI * fc * x).sin() / (PI * x)
            };
            sinc * w
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    if sum.abs() > f64::EPSILON {
        kernel.iter_mut().for_each(|h| *h /= sum);
    }
    kernel
}

/// Linear-phase FIR kernel for `band`. `num_taps` must be odd so the
/// kernel is symmetric about its centre tap.
pub fn firwin(num_taps: usize, band: Band, sample_rate: f64) -> Vec<f64> {
    debug_assert!(num_taps % 2 == 1);
    let centre = num_taps / 2;

    match band {
        Band::Lowpass(high) => windowed_sinc_lowpass(num_taps, high, sample_rate),
        Band::Highpass(low) => {
            let mut kernel = windowed_sinc_lowpass(num_taps, low, sample_rate);
            kernel.iter_mut().for_each(|h| *h = -*h);
            kernel[centre] += 1.0;
            kernel
        }
        Band::Bandpass(low, high) => {
            let upper = windowed_sinc_lowpass(num_taps, high, sample_rate);
            let lower = windowed_sinc_lowpass(num_taps, low, sample_rate);
            upper.iter().zip(&lower).map(|(u, l)| u - l).collect()
        }
    }
}

/// Magnitude response of an FIR kernel at `freq` Hz
pub fn fir_magnitude_at(kernel: &[f64], freq: f64, sample_rate: f64) -> f64 {
    let w = 2.0 * PI * freq / sample_rate;
    let (re, im) = kernel
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(re, im), (n, h)| {
            let phase = w * n as f64;
            (re + h * phase.cos(), im - h * phase.sin())
        });
    re.hypot(im)
}
