//! Event-locked epoch extraction with optional baseline correction.

use ndarray::{s, Array2, Array3, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::epochs::{window_indices, EpochMeta, EpochSet};
use crate::error::{PrepError, Result};
use crate::recording::{Event, Recording};

/// Event whose window fell outside the recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEvent {
    /// Position in `Recording::events`
    pub event_index: usize,
    pub code: i32,
    pub sample_index: usize,
}

/// Diagnostics from one `epoch` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    /// Events that matched a requested code
    pub matched: usize,
    pub skipped: Vec<SkippedEvent>,
}

impl EpochReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

#[derive(Debug, Clone)]
pub struct Epoched {
    pub epochs: EpochSet,
    pub report: EpochReport,
}

/// Serializable epoching request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSpec {
    pub event_codes: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch_labels: Option<Vec<String>>,
    /// Window relative to each event, in seconds
    #[serde(default = "default_time_lim")]
    pub time_lim: (f64, f64),
    /// Baseline window in seconds (null = no correction)
    #[serde(default = "default_baseline")]
    pub baseline: Option<(f64, f64)>,
}

fn default_time_lim() -> (f64, f64) {
    (-0.2, 0.8)
}

fn default_baseline() -> Option<(f64, f64)> {
    Some((-0.2, 0.0))
}

impl Default for EpochSpec {
    fn default() -> Self {
        Self {
            event_codes: vec![1],
            epoch_labels: None,
            time_lim: default_time_lim(),
            baseline: default_baseline(),
        }
    }
}

impl EpochSpec {
    pub fn apply(&self, recording: &Recording) -> Result<Epoched> {
        epoch(
            recording,
            &self.event_codes,
            self.epoch_labels.as_deref(),
            self.time_lim,
            self.baseline,
        )
    }

    /// Checks that need no recording: window order, labels, baseline inside window.
    pub fn validate(&self) -> Result<()> {
        if self.event_codes.is_empty() {
            return Err(PrepError::InvalidParameter(
                "At least one event code is required".to_string(),
            ));
        }
        check_labels(&self.event_codes, self.epoch_labels.as_deref())?;
        check_time_lim(self.time_lim)?;
        if let Some((b0, b1)) = self.baseline {
            let (t0, t1) = self.time_lim;
            if !b0.is_finite() || !b1.is_finite() || b0 > b1 || b0 < t0 || b1 > t1 {
                return Err(PrepError::InvalidParameter(format!(
                    "Baseline ({}, {}) must lie within the epoch window ({}, {})",
                    b0, b1, t0, t1
                )));
            }
        }
        Ok(())
    }
}

/// Cut `recording` into epochs around every event whose code is in
/// `event_codes`.
///
/// `epoch_labels` names each code positionally; without it the code itself
/// is the label. Events whose window does not fit inside the recording are
/// skipped and listed in the report.
pub fn epoch(
    recording: &Recording,
    event_codes: &[i32],
    epoch_labels: Option<&[String]>,
    time_lim: (f64, f64),
    baseline: Option<(f64, f64)>,
) -> Result<Epoched> {
    check_labels(event_codes, epoch_labels)?;
    check_time_lim(time_lim)?;

    let fs = recording.sample_rate();
    let n_times = window_len(time_lim, fs, recording.n_samples())?;
    let start_offset = (time_lim.0 * fs).round() as i64;
    let times: Vec<f64> = (0..n_times)
        .map(|i| (start_offset as f64 + i as f64) / fs)
        .collect();

    let baseline_range = baseline
        .map(|window| window_indices(window, start_offset, n_times, fs))
        .transpose()?;

    let label_for = |code: i32| -> String {
        let position = event_codes.iter().position(|&c| c == code);
        match (epoch_labels, position) {
            (Some(labels), Some(idx)) => labels[idx].clone(),
            _ => code.to_string(),
        }
    };

    let matching: Vec<(usize, &Event)> = recording
        .events()
        .iter()
        .enumerate()
        .filter(|(_, event)| event_codes.contains(&event.code))
        .collect();

    if matching.is_empty() {
        return Err(PrepError::NoMatchingEvents {
            codes: event_codes.to_vec(),
        });
    }

    let n_samples = recording.n_samples() as i64;
    let mut report = EpochReport {
        matched: matching.len(),
        skipped: Vec::new(),
    };
    let mut accepted = Vec::with_capacity(matching.len());
    for (event_index, event) in matching {
        let first = (event.sample_index as i64).saturating_add(start_offset);
        let last = first.saturating_add(n_times as i64 - 1);
        if first < 0 || last >= n_samples {
            report.skipped.push(SkippedEvent {
                event_index,
                code: event.code,
                sample_index: event.sample_index,
            });
        } else {
            accepted.push((first as usize, event));
        }
    }

    if !report.skipped.is_empty() {
        log::warn!(
            "Skipped {} of {} event(s) whose window leaves the recording",
            report.skipped_count(),
            report.matched
        );
    }

    let samples = recording.samples();
    let segments: Vec<Array2<f64>> = accepted
        .par_iter()
        .map(|&(first, _)| {
            let mut segment = samples.slice(s![first..first + n_times, ..]).to_owned();
            if let Some(range) = &baseline_range {
                subtract_baseline(&mut segment, range.clone());
            }
            segment
        })
        .collect();

    let n_channels = recording.n_channels();
    let mut data = Array3::zeros((segments.len(), n_times, n_channels));
    for (mut slot, segment) in data.axis_iter_mut(Axis(0)).zip(&segments) {
        slot.assign(segment);
    }

    let epoch_meta = accepted
        .iter()
        .map(|&(_, event)| EpochMeta::new(event.code, label_for(event.code), event.sample_index))
        .collect();

    log::info!(
        "Extracted {} epoch(s) of {} samples ({:.3} to {:.3} s), baseline {:?}",
        segments.len(),
        n_times,
        times[0],
        times[n_times - 1],
        baseline
    );

    let epochs = EpochSet::new(
        data,
        times,
        epoch_meta,
        recording.channel_labels().to_vec(),
        recording.channel_locations().cloned(),
        fs,
        baseline,
    )?;

    Ok(Epoched { epochs, report })
}

/// Subtract each channel's mean over `range` from the whole segment.
fn subtract_baseline(segment: &mut Array2<f64>, range: std::ops::RangeInclusive<usize>) {
    if let Some(means) = segment.slice(s![range, ..]).mean_axis(Axis(0)) {
        *segment -= &means.insert_axis(Axis(0));
    }
}

/// Samples per epoch on the `time_lim` grid. A window with more samples
/// than the recording can never fit around an event.
fn window_len((t0, t1): (f64, f64), fs: f64, n_samples: usize) -> Result<usize> {
    let span = ((t1 - t0) * fs).round();
    if span >= n_samples as f64 {
        return Err(PrepError::InvalidParameter(format!(
            "Epoch window ({}, {}) s spans more samples than the recording ({})",
            t0, t1, n_samples
        )));
    }
    Ok(span as usize + 1)
}

fn check_labels(event_codes: &[i32], epoch_labels: Option<&[String]>) -> Result<()> {
    match epoch_labels {
        Some(labels) if labels.len() != event_codes.len() => Err(PrepError::InvalidParameter(
            format!(
                "{} epoch label(s) given for {} event code(s)",
                labels.len(),
                event_codes.len()
            ),
        )),
        _ => Ok(()),
    }
}

fn check_time_lim((t0, t1): (f64, f64)) -> Result<()> {
    if !t0.is_finite() || !t1.is_finite() || t0 >= t1 {
        return Err(PrepError::InvalidParameter(format!(
            "Epoch window start ({}) must be before its end ({})",
            t0, t1
        )));
    }
    Ok(())
}
