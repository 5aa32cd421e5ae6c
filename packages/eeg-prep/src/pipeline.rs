//! Preprocessing pipeline
//!
//! Chains the preprocessing stages over one recording:
//! 1. Re-reference
//! 2. Notch filter (power line noise removal)
//! 3. Band filter
//! 4. Epoching with baseline correction
//! 5. Artifact screening
//!
//! Every stage except epoching is optional.

use std::borrow::Cow;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifacts::{detect_artifacts, ArtifactReport, ArtifactThresholds};
use crate::epoching::{EpochReport, EpochSpec};
use crate::epochs::EpochSet;
use crate::error::{PrepError, Result};
use crate::filter::{self, FilterMethod, FilterSpec};
use crate::profile_scope;
use crate::recording::Recording;
use crate::reference::{reference, RefChannels};

/// Power line notch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotchSpec {
    /// Notch frequency (typically 50 or 60 Hz)
    #[serde(default = "default_notch_freq")]
    pub frequency: f64,

    /// Q factor (higher = narrower, typical: 30-50)
    #[serde(default = "default_notch_q")]
    pub q: f64,

    /// Number of harmonics to filter (1 = just fundamental, 3 = 50, 100, 150 Hz)
    #[serde(default = "default_notch_harmonics")]
    pub harmonics: usize,
}

fn default_notch_freq() -> f64 {
    60.0
}
fn default_notch_q() -> f64 {
    30.0
}
fn default_notch_harmonics() -> usize {
    1
}

impl Default for NotchSpec {
    fn default() -> Self {
        Self {
            frequency: default_notch_freq(),
            q: default_notch_q(),
            harmonics: default_notch_harmonics(),
        }
    }
}

impl NotchSpec {
    pub fn apply(&self, recording: &Recording) -> Result<Recording> {
        filter::notch(recording, self.frequency, self.q, self.harmonics)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Channels left out of scoring (EOG, reference electrodes)
    #[serde(default)]
    pub exclude_channels: Vec<String>,

    #[serde(default)]
    pub thresholds: ArtifactThresholds,

    /// Drop flagged epochs from the output instead of only flagging them
    #[serde(default)]
    pub purge_rejected: bool,
}

/// Full preprocessing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<RefChannels>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notch: Option<NotchSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSpec>,

    #[serde(default)]
    pub epoch: EpochSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference: Some(RefChannels::Average),
            notch: None,
            filter: Some(FilterSpec {
                method: FilterMethod::Iir,
                low_freq: Some(0.1),
                high_freq: Some(40.0),
                order: None,
            }),
            epoch: EpochSpec::default(),
            artifacts: Some(ArtifactConfig::default()),
        }
    }
}

impl PipelineConfig {
    /// Average reference, line noise notch, 0.5-40 Hz band for ERP work
    pub fn standard_eeg(powerline_freq: f64, event_codes: Vec<i32>) -> Self {
        Self {
            notch: Some(NotchSpec {
                frequency: powerline_freq,
                harmonics: 2,
                ..Default::default()
            }),
            filter: Some(FilterSpec {
                method: FilterMethod::Iir,
                low_freq: Some(0.5),
                high_freq: Some(40.0),
                order: Some(4),
            }),
            epoch: EpochSpec {
                event_codes,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check everything that can be checked before a recording is seen.
    /// Cutoffs against Nyquist are checked when the filter runs.
    pub fn validate(&self) -> Result<()> {
        if let Some(RefChannels::Channels(labels)) = &self.reference {
            if labels.is_empty() {
                return Err(PrepError::InvalidParameter(
                    "Reference channel list is empty".to_string(),
                ));
            }
        }

        if let Some(notch) = &self.notch {
            if !notch.frequency.is_finite() || notch.frequency <= 0.0 {
                return Err(PrepError::InvalidFilterSpec(format!(
                    "Notch frequency must be positive, got {}",
                    notch.frequency
                )));
            }
            if !notch.q.is_finite() || notch.q <= 0.0 {
                return Err(PrepError::InvalidFilterSpec(format!(
                    "Notch quality factor must be positive, got {}",
                    notch.q
                )));
            }
            if notch.harmonics == 0 {
                return Err(PrepError::InvalidFilterSpec(
                    "Notch needs at least one harmonic".to_string(),
                ));
            }
        }

        if let Some(spec) = &self.filter {
            // no sample rate yet, so no upper bound
            spec.validate(f64::INFINITY)?;
        }

        self.epoch.validate()?;

        if let Some(artifacts) = &self.artifacts {
            artifacts.thresholds.validate()?;
        }

        Ok(())
    }
}

/// Everything a pipeline run produces
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub epochs: EpochSet,
    pub epoch_report: EpochReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_report: Option<ArtifactReport>,
}

/// Run every configured stage over `recording`.
pub fn run_pipeline(recording: &Recording, config: &PipelineConfig) -> Result<PipelineOutput> {
    profile_scope!("pipeline");
    config.validate()?;

    log::info!(
        "Preprocessing {} channel(s), {} samples at {} Hz",
        recording.n_channels(),
        recording.n_samples(),
        recording.sample_rate()
    );

    let mut current = Cow::Borrowed(recording);

    if let Some(ref_channels) = &config.reference {
        profile_scope!("reference");
        current = Cow::Owned(reference(&current, ref_channels)?);
    }

    if let Some(notch) = &config.notch {
        profile_scope!("notch");
        current = Cow::Owned(notch.apply(&current)?);
    }

    if let Some(spec) = &config.filter {
        profile_scope!("filter");
        current = Cow::Owned(spec.apply(&current)?);
    }

    let epoched = {
        profile_scope!("epoch");
        config.epoch.apply(&current)?
    };

    let (epochs, artifact_report) = match &config.artifacts {
        Some(artifacts) => {
            profile_scope!("artifacts");
            let screened = detect_artifacts(
                &epoched.epochs,
                &artifacts.exclude_channels,
                &artifacts.thresholds,
            )?;
            let epochs = if artifacts.purge_rejected {
                screened.epochs.purge_rejected()
            } else {
                screened.epochs
            };
            (epochs, Some(screened.report))
        }
        None => (epoched.epochs, None),
    };

    Ok(PipelineOutput {
        epochs,
        epoch_report: epoched.report,
        artifact_report,
    })
}
