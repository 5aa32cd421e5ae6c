//! Per-channel deviation statistics and z-scoring

use serde::{Deserialize, Serialize};

/// Statistic computed over one channel of one epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationStatistic {
    /// Population variance
    Variance,
    /// Peak-to-peak amplitude
    Range,
    /// Excess kurtosis (0 for a Gaussian)
    Kurtosis,
    /// Median of the first differences
    MedianGradient,
}

impl DeviationStatistic {
    pub fn compute(self, data: &[f64]) -> f64 {
        match self {
            DeviationStatistic::Variance => variance(data),
            DeviationStatistic::Range => peak_to_peak(data),
            DeviationStatistic::Kurtosis => kurtosis(data),
            DeviationStatistic::MedianGradient => median_gradient(data),
        }
    }
}

fn mean(data: &[f64]) -> f64 {
    data.iter().sum::<f64>() / data.len() as f64
}

pub fn variance(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mu = mean(data);
    data.iter().map(|&x| (x - mu).powi(2)).sum::<f64>() / data.len() as f64
}

pub fn peak_to_peak(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let min_val = data.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_val = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    max_val - min_val
}

/// Excess kurtosis: E[(X-μ)^4] / σ^4 - 3.
/// Flat or very short segments score 0.
pub fn kurtosis(data: &[f64]) -> f64 {
    if data.len() < 4 || peak_to_peak(data) == 0.0 {
        return 0.0;
    }

    let n = data.len() as f64;
    let mu = mean(data);
    let m2: f64 = data.iter().map(|&x| (x - mu).powi(2)).sum::<f64>() / n;
    let m4: f64 = data.iter().map(|&x| (x - mu).powi(4)).sum::<f64>() / n;

    m4 / m2.powi(2) - 3.0
}

pub fn median_gradient(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let mut diffs: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    diffs.sort_by(f64::total_cmp);

    let mid = diffs.len() / 2;
    if diffs.len() % 2 == 0 {
        (diffs[mid - 1] + diffs[mid]) / 2.0
    } else {
        diffs[mid]
    }
}

/// Population z-scores. A zero spread gives all zeros.
pub fn zscores(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mu = mean(values);
    let sd = variance(values).sqrt();
    if sd == 0.0 || !sd.is_finite() {
        return vec![0.0; values.len()];
    }
    values.iter().map(|&v| (v - mu) / sd).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_variance_and_range() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(variance(&x), 1.25);
        assert_eq!(peak_to_peak(&x), 3.0);
        assert_eq!(variance(&[]), 0.0);
    }

    #[test]
    fn test_kurtosis() {
        // two-point distribution has the minimum excess kurtosis of -2
        let x = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        assert_abs_diff_eq!(kurtosis(&x), -2.0, epsilon = 1e-12);

        let flat = [3.0; 10];
        assert_eq!(kurtosis(&flat), 0.0);

        let mut spike = vec![0.0; 100];
        spike[50] = 10.0;
        assert!(kurtosis(&spike) > 50.0);
    }

    #[test]
    fn test_median_gradient() {
        assert_eq!(median_gradient(&[0.0, 1.0, 3.0, 6.0]), 2.0);
        assert_eq!(median_gradient(&[0.0, 1.0, 3.0, 6.0, 10.0]), 2.5);
        assert_eq!(median_gradient(&[5.0]), 0.0);
    }

    #[test]
    fn test_zscores() {
        let z = zscores(&[1.0, 2.0, 3.0]);
        let sd = (2.0f64 / 3.0).sqrt();
        assert_abs_diff_eq!(z[0], -1.0 / sd, epsilon = 1e-12);
        assert_abs_diff_eq!(z[1], 0.0, epsilon = 1e-12);

        assert_eq!(zscores(&[4.0, 4.0, 4.0]), vec![0.0; 3]);
        assert!(zscores(&[]).is_empty());
    }

    #[test]
    fn test_statistic_serde_names() {
        let stat: DeviationStatistic = serde_json::from_str("\"median_gradient\"").unwrap();
        assert_eq!(stat, DeviationStatistic::MedianGradient);
    }
}
