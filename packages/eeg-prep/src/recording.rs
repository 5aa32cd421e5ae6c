//! Continuous multichannel recording: the sample matrix, its event timeline
//! and channel metadata.
//!
//! Samples are stored as `[time, channel]`. Every transform in this crate
//! takes a `&Recording` and returns a new, fully validated `Recording`.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

/// A marker on the recording timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Sample at which the event occurred (0-based)
    pub sample_index: usize,
    /// Trigger code
    pub code: i32,
    /// Free-form description, may be empty
    #[serde(default)]
    pub label: String,
}

impl Event {
    pub fn new(sample_index: usize, code: i32, label: impl Into<String>) -> Self {
        Self {
            sample_index,
            code,
            label: label.into(),
        }
    }
}

/// Electrode position, 2-D or 3-D
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelLocation {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl ChannelLocation {
    pub fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn spatial(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }
}

pub type ChannelLocations = BTreeMap<String, ChannelLocation>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RecordingData", into = "RecordingData")]
pub struct Recording {
    samples: Array2<f64>,
    sample_rate: f64,
    channel_labels: Vec<String>,
    channel_locations: Option<ChannelLocations>,
    events: Vec<Event>,
}

impl Recording {
    /// Build a recording, checking the data-model invariants.
    ///
    /// Events are stably sorted by sample index; events outside the sample
    /// range, duplicate channel labels and a non-positive sample rate are
    /// rejected.
    pub fn new(
        samples: Array2<f64>,
        sample_rate: f64,
        channel_labels: Vec<String>,
        mut events: Vec<Event>,
    ) -> Result<Self> {
        if channel_labels.len() != samples.ncols() {
            return Err(PrepError::shape(
                format!("{} channel columns", channel_labels.len()),
                format!("{} columns", samples.ncols()),
            ));
        }

        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(PrepError::InvalidParameter(format!(
                "Sample rate must be positive, got {}",
                sample_rate
            )));
        }

        let mut seen = HashSet::with_capacity(channel_labels.len());
        for label in &channel_labels {
            if !seen.insert(label.as_str()) {
                return Err(PrepError::InvalidParameter(format!(
                    "Duplicate channel label '{}'",
                    label
                )));
            }
        }

        let n_samples = samples.nrows();
        if let Some(event) = events.iter().find(|e| e.sample_index >= n_samples) {
            return Err(PrepError::InvalidParameter(format!(
                "Event with code {} at sample {} lies outside the recording ({} samples)",
                event.code, event.sample_index, n_samples
            )));
        }
        events.sort_by_key(|e| e.sample_index);

        Ok(Self {
            samples,
            sample_rate,
            channel_labels,
            channel_locations: None,
            events,
        })
    }

    /// Attach electrode positions. Every key must name an existing channel.
    pub fn with_channel_locations(mut self, locations: ChannelLocations) -> Result<Self> {
        if let Some(unknown) = locations.keys().find(|k| self.channel_index(k).is_none()) {
            return Err(PrepError::UnknownChannel(unknown.clone()));
        }
        self.channel_locations = Some(locations);
        Ok(self)
    }

    pub fn samples(&self) -> &Array2<f64> {
        &self.samples
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    pub fn channel_labels(&self) -> &[String] {
        &self.channel_labels
    }

    pub fn channel_locations(&self) -> Option<&ChannelLocations> {
        self.channel_locations.as_ref()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn n_samples(&self) -> usize {
        self.samples.nrows()
    }

    pub fn n_channels(&self) -> usize {
        self.samples.ncols()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.n_samples() as f64 / self.sample_rate
    }

    pub fn channel_index(&self, label: &str) -> Option<usize> {
        self.channel_labels.iter().position(|l| l == label)
    }

    /// Column of samples for one channel
    pub fn channel(&self, label: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self
            .channel_index(label)
            .ok_or_else(|| PrepError::UnknownChannel(label.to_string()))?;
        Ok(self.samples.column(idx))
    }

    /// Resolve labels to column indices, failing on the first unknown label.
    pub fn resolve_channels<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                self.channel_index(label)
                    .ok_or_else(|| PrepError::UnknownChannel(label.to_string()))
            })
            .collect()
    }

    /// New recording without the named channels.
    pub fn drop_channels<S: AsRef<str>>(&self, labels: &[S]) -> Result<Self> {
        let dropped = self.resolve_channels(labels)?;
        let keep: Vec<usize> = (0..self.n_channels())
            .filter(|idx| !dropped.contains(idx))
            .collect();

        let channel_labels: Vec<String> = keep
            .iter()
            .map(|&idx| self.channel_labels[idx].clone())
            .collect();
        let channel_locations = self.channel_locations.as_ref().map(|locations| {
            locations
                .iter()
                .filter(|(label, _)| channel_labels.contains(label))
                .map(|(label, loc)| (label.clone(), *loc))
                .collect()
        });

        log::debug!(
            "Dropping {} channel(s), {} remain",
            dropped.len(),
            channel_labels.len()
        );

        Ok(Self {
            samples: self.samples.select(Axis(1), &keep),
            sample_rate: self.sample_rate,
            channel_labels,
            channel_locations,
            events: self.events.clone(),
        })
    }

    /// Parse the JSON exchange form.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Same metadata, new sample matrix of identical shape.
    pub(crate) fn with_samples(&self, samples: Array2<f64>) -> Result<Self> {
        if samples.dim() != self.samples.dim() {
            return Err(PrepError::shape(
                format!("{:?}", self.samples.dim()),
                format!("{:?}", samples.dim()),
            ));
        }
        Ok(Self {
            samples,
            sample_rate: self.sample_rate,
            channel_labels: self.channel_labels.clone(),
            channel_locations: self.channel_locations.clone(),
            events: self.events.clone(),
        })
    }
}

/// Interchange form used for JSON input and output.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordingData {
    sample_rate: f64,
    channel_labels: Vec<String>,
    /// One row per time sample
    samples: Vec<Vec<f64>>,
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel_locations: Option<ChannelLocations>,
}

impl TryFrom<RecordingData> for Recording {
    type Error = PrepError;

    fn try_from(data: RecordingData) -> Result<Self> {
        let n_channels = data.channel_labels.len();
        let n_samples = data.samples.len();

        let mut flat = Vec::with_capacity(n_samples * n_channels);
        for (row_idx, row) in data.samples.into_iter().enumerate() {
            if row.len() != n_channels {
                return Err(PrepError::shape(
                    format!("{} values in sample row {}", n_channels, row_idx),
                    row.len(),
                ));
            }
            flat.extend(row);
        }

        let samples = Array2::from_shape_vec((n_samples, n_channels), flat)
            .map_err(|e| PrepError::shape(format!("({}, {})", n_samples, n_channels), e))?;

        let recording =
            Recording::new(samples, data.sample_rate, data.channel_labels, data.events)?;
        match data.channel_locations {
            Some(locations) => recording.with_channel_locations(locations),
            None => Ok(recording),
        }
    }
}

impl From<Recording> for RecordingData {
    fn from(recording: Recording) -> Self {
        Self {
            sample_rate: recording.sample_rate,
            samples: recording
                .samples
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
            channel_labels: recording.channel_labels,
            events: recording.events,
            channel_locations: recording.channel_locations,
        }
    }
}
