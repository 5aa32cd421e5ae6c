//! Statistical artifact screening of epochs
//!
//! Deviation statistics are computed per epoch and channel, then
//! standardised at three levels:
//! - epochs, from each epoch's mean over scored channels
//! - channels, from each channel's mean over epochs
//! - channels within a single epoch
//!
//! Anything beyond the z-score threshold is flagged. Data is never modified.

pub mod stats;

use std::collections::BTreeMap;

use ndarray::Axis;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::epochs::{ChannelStatus, EpochSet};
use crate::error::{PrepError, Result};

pub use stats::DeviationStatistic;

fn default_z_threshold() -> f64 {
    3.0
}

fn default_statistics() -> Vec<DeviationStatistic> {
    vec![
        DeviationStatistic::Variance,
        DeviationStatistic::Range,
        DeviationStatistic::Kurtosis,
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactThresholds {
    /// Absolute z-score above which an epoch or channel is flagged
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,
    #[serde(default = "default_statistics")]
    pub statistics: Vec<DeviationStatistic>,
}

impl Default for ArtifactThresholds {
    fn default() -> Self {
        Self {
            z_threshold: default_z_threshold(),
            statistics: default_statistics(),
        }
    }
}

impl ArtifactThresholds {
    pub fn validate(&self) -> Result<()> {
        if !self.z_threshold.is_finite() || self.z_threshold <= 0.0 {
            return Err(PrepError::InvalidParameter(format!(
                "z_threshold must be a positive number, got {}",
                self.z_threshold
            )));
        }
        if self.statistics.is_empty() {
            return Err(PrepError::InvalidParameter(
                "At least one deviation statistic is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// What one screening pass found
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArtifactReport {
    pub z_threshold: f64,
    pub scored_channels: Vec<String>,
    pub excluded_channels: Vec<String>,
    /// Epochs flagged by this pass (indices into the set)
    pub rejected_epochs: Vec<usize>,
    /// Channels flagged by this pass
    pub rejected_channels: Vec<String>,
    /// Channel outliers per epoch index, only epochs with any
    pub bad_channels: BTreeMap<usize, Vec<String>>,
    /// Per statistic, one z-score per epoch
    pub epoch_z: BTreeMap<DeviationStatistic, Vec<f64>>,
    /// Per statistic, one z-score per scored channel
    pub channel_z: BTreeMap<DeviationStatistic, Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct Screened {
    pub epochs: EpochSet,
    pub report: ArtifactReport,
}

/// Flag outlier epochs and channels in `epoch_set`.
///
/// Channels in `exclude_channels` are neither scored nor flagged. Existing
/// rejection flags are kept; this pass can only add to them.
pub fn detect_artifacts<S: AsRef<str>>(
    epoch_set: &EpochSet,
    exclude_channels: &[S],
    thresholds: &ArtifactThresholds,
) -> Result<Screened> {
    thresholds.validate()?;

    let labels = epoch_set.channel_labels();
    let mut excluded = Vec::with_capacity(exclude_channels.len());
    for name in exclude_channels {
        let name = name.as_ref();
        let idx = labels
            .iter()
            .position(|l| l == name)
            .ok_or_else(|| PrepError::UnknownChannel(name.to_string()))?;
        excluded.push(idx);
    }
    let scored: Vec<usize> = (0..epoch_set.n_channels())
        .filter(|idx| !excluded.contains(idx))
        .collect();

    let mut report = ArtifactReport {
        z_threshold: thresholds.z_threshold,
        scored_channels: scored.iter().map(|&c| labels[c].clone()).collect(),
        excluded_channels: excluded.iter().map(|&c| labels[c].clone()).collect(),
        ..Default::default()
    };

    let mut screened = epoch_set.clone();
    if epoch_set.n_epochs() == 0 || scored.is_empty() {
        log::info!("[ARTIFACT] Nothing to score");
        return Ok(Screened {
            epochs: screened,
            report,
        });
    }

    let statistics = &thresholds.statistics;
    let threshold = thresholds.z_threshold;

    // values[epoch][statistic][scored channel]
    let data = epoch_set.data();
    let values: Vec<Vec<Vec<f64>>> = (0..epoch_set.n_epochs())
        .into_par_iter()
        .map(|e| {
            let epoch = data.index_axis(Axis(0), e);
            let columns: Vec<Vec<f64>> = scored
                .iter()
                .map(|&c| epoch.column(c).to_vec())
                .collect();
            statistics
                .iter()
                .map(|stat| columns.iter().map(|col| stat.compute(col)).collect())
                .collect()
        })
        .collect();

    let n_epochs = values.len();
    let n_scored = scored.len();
    let mut epoch_flags = vec![false; n_epochs];
    let mut channel_flags = vec![false; n_scored];
    let mut within_flags = vec![vec![false; n_scored]; n_epochs];

    for (s, &stat) in statistics.iter().enumerate() {
        let epoch_means: Vec<f64> = values
            .iter()
            .map(|per_stat| per_stat[s].iter().sum::<f64>() / n_scored as f64)
            .collect();
        let epoch_z = stats::zscores(&epoch_means);
        for (flag, z) in epoch_flags.iter_mut().zip(&epoch_z) {
            *flag |= z.abs() > threshold;
        }

        let channel_means: Vec<f64> = (0..n_scored)
            .map(|c| values.iter().map(|per_stat| per_stat[s][c]).sum::<f64>() / n_epochs as f64)
            .collect();
        let channel_z = stats::zscores(&channel_means);
        for (flag, z) in channel_flags.iter_mut().zip(&channel_z) {
            *flag |= z.abs() > threshold;
        }

        for (flags, per_stat) in within_flags.iter_mut().zip(&values) {
            for (flag, z) in flags.iter_mut().zip(stats::zscores(&per_stat[s])) {
                *flag |= z.abs() > threshold;
            }
        }

        report.epoch_z.insert(stat, epoch_z);
        report.channel_z.insert(stat, channel_z);
    }

    for (e, meta) in screened.epoch_meta_mut().iter_mut().enumerate() {
        if epoch_flags[e] {
            meta.rejected = true;
            report.rejected_epochs.push(e);
        }

        let bad: Vec<String> = within_flags[e]
            .iter()
            .zip(&scored)
            .filter(|(flag, _)| **flag)
            .map(|(_, &c)| labels[c].clone())
            .collect();
        for label in &bad {
            if !meta.bad_channels.contains(label) {
                meta.bad_channels.push(label.clone());
            }
        }
        if !bad.is_empty() {
            report.bad_channels.insert(e, bad);
        }
    }

    let status = screened.channel_status_mut();
    for (&flag, &c) in channel_flags.iter().zip(&scored) {
        if flag {
            status[c] = ChannelStatus::Rejected;
            report.rejected_channels.push(labels[c].clone());
        }
    }

    log::info!(
        "[ARTIFACT] {} of {} epoch(s) and {} of {} channel(s) beyond |z| > {} ({:?})",
        report.rejected_epochs.len(),
        n_epochs,
        report.rejected_channels.len(),
        n_scored,
        threshold,
        statistics
    );
    log::debug!(
        "[ARTIFACT] {} epoch(s) with channel outliers",
        report.bad_channels.len()
    );

    Ok(Screened {
        epochs: screened,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epochs::EpochMeta;
    use ndarray::Array3;

    /// Deterministic pseudo-noise so tests need no RNG
    fn noise(e: usize, t: usize, c: usize) -> f64 {
        let x = (e * 7919 + t * 104_729 + c * 1_299_709) as f64;
        (x * 0.618_033_988_7).fract() - 0.5
    }

    fn make_set(n_epochs: usize, n_channels: usize) -> Array3<f64> {
        Array3::from_shape_fn((n_epochs, 64, n_channels), |(e, t, c)| noise(e, t, c))
    }

    fn amplitude_only() -> ArtifactThresholds {
        ArtifactThresholds {
            statistics: vec![DeviationStatistic::Variance, DeviationStatistic::Range],
            ..Default::default()
        }
    }

    fn to_set(data: Array3<f64>) -> EpochSet {
        let (n_epochs, n_times, n_channels) = data.dim();
        let times = (0..n_times).map(|i| i as f64 / 100.0).collect();
        let meta = (0..n_epochs).map(|e| EpochMeta::new(1, "1", e * 100)).collect();
        let labels = (0..n_channels).map(|c| format!("E{}", c + 1)).collect();
        EpochSet::new(data, times, meta, labels, None, 100.0, None).unwrap()
    }

    #[test]
    fn test_outlier_epoch_flagged() {
        let mut data = make_set(30, 8);
        for t in 0..64 {
            for c in 0..8 {
                data[[12, t, c]] *= 40.0;
            }
        }
        let set = to_set(data);
        let out = detect_artifacts::<&str>(&set, &[], &amplitude_only()).unwrap();

        assert_eq!(out.report.rejected_epochs, vec![12]);
        assert!(out.epochs.epoch_meta()[12].rejected);
        assert_eq!(out.epochs.rejected_count(), 1);
        // data untouched, nothing purged
        assert_eq!(out.epochs.data(), set.data());
    }

    #[test]
    fn test_outlier_channel_flagged_unless_excluded() {
        let mut data = make_set(20, 20);
        for e in 0..20 {
            for t in 0..64 {
                data[[e, t, 3]] *= 50.0;
            }
        }
        let set = to_set(data);
        let thresholds = amplitude_only();

        let out = detect_artifacts::<&str>(&set, &[], &thresholds).unwrap();
        assert_eq!(out.report.rejected_channels, vec!["E4".to_string()]);
        assert_eq!(out.epochs.channel_status()[3], ChannelStatus::Rejected);
        assert!(out.epochs.epoch_meta()[0].bad_channels.contains(&"E4".to_string()));

        let e4 = "E4".to_string();
        let out = detect_artifacts(&set, &["E4"], &thresholds).unwrap();
        assert!(!out.report.rejected_channels.contains(&e4));
        assert_eq!(out.epochs.channel_status()[3], ChannelStatus::Accepted);
        assert!(out.epochs.epoch_meta().iter().all(|m| !m.bad_channels.contains(&e4)));
        assert_eq!(out.report.excluded_channels, vec!["E4".to_string()]);
    }

    #[test]
    fn test_deterministic() {
        let set = to_set(make_set(25, 6));
        let thresholds = ArtifactThresholds {
            z_threshold: 1.5,
            statistics: vec![
                DeviationStatistic::Variance,
                DeviationStatistic::MedianGradient,
            ],
        };
        let a = detect_artifacts::<&str>(&set, &[], &thresholds).unwrap();
        let b = detect_artifacts::<&str>(&set, &[], &thresholds).unwrap();
        assert_eq!(a.report, b.report);
        assert_eq!(a.epochs.epoch_meta(), b.epochs.epoch_meta());
    }

    #[test]
    fn test_existing_flags_kept() {
        let mut set = to_set(make_set(10, 4));
        set.epoch_meta_mut()[2].rejected = true;
        let out = detect_artifacts::<&str>(&set, &[], &ArtifactThresholds::default()).unwrap();
        assert!(out.epochs.epoch_meta()[2].rejected);
    }

    #[test]
    fn test_constant_data_flags_nothing() {
        let set = to_set(Array3::from_elem((5, 64, 3), 1.0));
        let out = detect_artifacts::<&str>(&set, &[], &ArtifactThresholds::default()).unwrap();
        assert_eq!(out.epochs.rejected_count(), 0);
        assert!(out.report.rejected_channels.is_empty());
    }

    #[test]
    fn test_unknown_exclude_channel() {
        let set = to_set(make_set(5, 3));
        let result = detect_artifacts(&set, &["Oz"], &ArtifactThresholds::default());
        assert!(matches!(result, Err(PrepError::UnknownChannel(ref c)) if c == "Oz"));
    }

    #[test]
    fn test_threshold_validation() {
        let set = to_set(make_set(5, 3));
        let bad = ArtifactThresholds {
            z_threshold: 0.0,
            ..Default::default()
        };
        assert!(detect_artifacts::<&str>(&set, &[], &bad).is_err());

        let parsed: ArtifactThresholds = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, ArtifactThresholds::default());
    }
}
