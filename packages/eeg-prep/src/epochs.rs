//! Event-locked epochs sharing one time grid.
//!
//! Data is `[epoch, timepoint, channel]`. Rejection is a soft flag on the
//! epoch metadata; rejected epochs stay in the set until
//! [`EpochSet::purge_rejected`] is called.

use std::collections::BTreeMap;

use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::recording::ChannelLocations;

/// Per-epoch bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMeta {
    pub event_code: i32,
    pub event_label: String,
    /// Sample of the originating event in the source recording
    pub onset_sample: usize,
    pub rejected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Channels flagged as outliers within this epoch only
    #[serde(default)]
    pub bad_channels: Vec<String>,
}

impl EpochMeta {
    pub fn new(event_code: i32, event_label: impl Into<String>, onset_sample: usize) -> Self {
        Self {
            event_code,
            event_label: event_label.into(),
            onset_sample,
            rejected: false,
            tag: None,
            bad_channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct EpochSet {
    data: Array3<f64>,
    times: Vec<f64>,
    epoch_meta: Vec<EpochMeta>,
    channel_labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_locations: Option<ChannelLocations>,
    channel_status: Vec<ChannelStatus>,
    sample_rate: f64,
    baseline: Option<(f64, f64)>,
}

impl EpochSet {
    pub(crate) fn new(
        data: Array3<f64>,
        times: Vec<f64>,
        epoch_meta: Vec<EpochMeta>,
        channel_labels: Vec<String>,
        channel_locations: Option<ChannelLocations>,
        sample_rate: f64,
        baseline: Option<(f64, f64)>,
    ) -> Result<Self> {
        let (n_epochs, n_times, n_channels) = data.dim();
        if times.len() != n_times {
            return Err(PrepError::shape(
                format!("{} timepoints", n_times),
                format!("{} time values", times.len()),
            ));
        }
        if epoch_meta.len() != n_epochs {
            return Err(PrepError::shape(
                format!("{} epochs", n_epochs),
                format!("{} metadata records", epoch_meta.len()),
            ));
        }
        if channel_labels.len() != n_channels {
            return Err(PrepError::shape(
                format!("{} channels", n_channels),
                format!("{} labels", channel_labels.len()),
            ));
        }

        Ok(Self {
            data,
            times,
            epoch_meta,
            channel_status: vec![ChannelStatus::Accepted; n_channels],
            channel_labels,
            channel_locations,
            sample_rate,
            baseline,
        })
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn epoch_meta(&self) -> &[EpochMeta] {
        &self.epoch_meta
    }

    pub fn channel_labels(&self) -> &[String] {
        &self.channel_labels
    }

    pub fn channel_locations(&self) -> Option<&ChannelLocations> {
        self.channel_locations.as_ref()
    }

    pub fn channel_status(&self) -> &[ChannelStatus] {
        &self.channel_status
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn baseline(&self) -> Option<(f64, f64)> {
        self.baseline
    }

    pub fn n_epochs(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn n_times(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn n_channels(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// `[timepoint, channel]` view of one epoch
    pub fn epoch(&self, index: usize) -> Option<ArrayView2<'_, f64>> {
        (index < self.n_epochs()).then(|| self.data.index_axis(Axis(0), index))
    }

    pub fn rejected_count(&self) -> usize {
        self.epoch_meta.iter().filter(|m| m.rejected).count()
    }

    pub fn rejected_channels(&self) -> Vec<&str> {
        self.channel_labels
            .iter()
            .zip(&self.channel_status)
            .filter(|(_, status)| **status == ChannelStatus::Rejected)
            .map(|(label, _)| label.as_str())
            .collect()
    }

    /// Indices into `times` covered by a `(start, end)` window in seconds,
    /// using the same sample rounding as epoch extraction.
    pub fn time_window_indices(
        &self,
        window: (f64, f64),
    ) -> Result<std::ops::RangeInclusive<usize>> {
        let first = self.times.first().copied().unwrap_or(0.0);
        let start_offset = (first * self.sample_rate).round() as i64;
        window_indices(window, start_offset, self.n_times(), self.sample_rate)
    }

    pub fn set_tag(&mut self, index: usize, tag: impl Into<String>) -> Result<()> {
        let n_epochs = self.n_epochs();
        let meta = self.epoch_meta.get_mut(index).ok_or_else(|| {
            PrepError::InvalidParameter(format!(
                "Epoch index {} out of range ({} epochs)",
                index, n_epochs
            ))
        })?;
        meta.tag = Some(tag.into());
        Ok(())
    }

    /// New set containing only epochs that are not flagged as rejected.
    pub fn purge_rejected(&self) -> Self {
        let keep: Vec<usize> = self
            .epoch_meta
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.rejected)
            .map(|(idx, _)| idx)
            .collect();

        log::info!(
            "Purging {} rejected epoch(s), {} remain",
            self.n_epochs() - keep.len(),
            keep.len()
        );

        Self {
            data: self.data.select(Axis(0), &keep),
            epoch_meta: keep.iter().map(|&idx| self.epoch_meta[idx].clone()).collect(),
            ..self.clone_metadata()
        }
    }

    /// New set without the named channels.
    pub fn drop_channels<S: AsRef<str>>(&self, labels: &[S]) -> Result<Self> {
        let mut dropped = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label.as_ref();
            let idx = self
                .channel_labels
                .iter()
                .position(|l| l == label)
                .ok_or_else(|| PrepError::UnknownChannel(label.to_string()))?;
            dropped.push(idx);
        }
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
        let epoch_meta = self
            .epoch_meta
            .iter()
            .map(|meta| {
                let mut meta = meta.clone();
                meta.bad_channels.retain(|c| channel_labels.contains(c));
                meta
            })
            .collect();

        Ok(Self {
            data: self.data.select(Axis(2), &keep),
            times: self.times.clone(),
            epoch_meta,
            channel_status: keep.iter().map(|&idx| self.channel_status[idx]).collect(),
            channel_labels,
            channel_locations,
            sample_rate: self.sample_rate,
            baseline: self.baseline,
        })
    }

    /// Event-related average per label over the non-rejected epochs,
    /// each `[timepoint, channel]`. Labels whose epochs are all rejected are
    /// left out.
    pub fn average_by_label(&self) -> BTreeMap<String, Array2<f64>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, meta) in self.epoch_meta.iter().enumerate() {
            if !meta.rejected {
                groups.entry(meta.event_label.clone()).or_default().push(idx);
            }
        }

        groups
            .into_iter()
            .filter_map(|(label, indices)| {
                let subset = self.data.select(Axis(0), &indices);
                subset.mean_axis(Axis(0)).map(|mean| (label, mean))
            })
            .collect()
    }

    pub(crate) fn epoch_meta_mut(&mut self) -> &mut [EpochMeta] {
        &mut self.epoch_meta
    }

    pub(crate) fn channel_status_mut(&mut self) -> &mut [ChannelStatus] {
        &mut self.channel_status
    }

    fn clone_metadata(&self) -> Self {
        Self {
            data: Array3::zeros((0, self.n_times(), self.n_channels())),
            times: self.times.clone(),
            epoch_meta: Vec::new(),
            channel_labels: self.channel_labels.clone(),
            channel_locations: self.channel_locations.clone(),
            channel_status: self.channel_status.clone(),
            sample_rate: self.sample_rate,
            baseline: self.baseline,
        }
    }
}

/// Map a time window onto indices of a grid starting at `start_offset`
/// samples with `n_times` points.
pub(crate) fn window_indices(
    window: (f64, f64),
    start_offset: i64,
    n_times: usize,
    sample_rate: f64,
) -> Result<std::ops::RangeInclusive<usize>> {
    let (start, end) = window;
    if !start.is_finite() || !end.is_finite() || start > end {
        return Err(PrepError::InvalidParameter(format!(
            "Invalid time window ({}, {})",
            start, end
        )));
    }

    let first = ((start * sample_rate).round() as i64).saturating_sub(start_offset);
    let last = ((end * sample_rate).round() as i64).saturating_sub(start_offset);
    if first < 0 || last >= n_times as i64 {
        return Err(PrepError::InvalidParameter(format!(
            "Window ({}, {}) s lies outside the epoch time range",
            start, end
        )));
    }
    Ok(first as usize..=last as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_set() -> EpochSet {
        // 3 epochs, 4 timepoints, 2 channels; value = epoch index
        let data = Array3::from_shape_fn((3, 4, 2), |(e, _, _)| e as f64);
        let times = vec![-0.01, 0.0, 0.01, 0.02];
        let meta = vec![
            EpochMeta::new(1, "a", 100),
            EpochMeta::new(2, "b", 200),
            EpochMeta::new(1, "a", 300),
        ];
        EpochSet::new(
            data,
            times,
            meta,
            vec!["Cz".into(), "Pz".into()],
            None,
            100.0,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_shape_checks() {
        let result = EpochSet::new(
            Array3::zeros((1, 4, 2)),
            vec![0.0; 3],
            vec![EpochMeta::new(1, "a", 0)],
            vec!["Cz".into(), "Pz".into()],
            None,
            100.0,
            None,
        );
        assert!(matches!(result, Err(PrepError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_purge_rejected() {
        let mut set = make_set();
        set.epoch_meta_mut()[1].rejected = true;
        assert_eq!(set.rejected_count(), 1);

        let purged = set.purge_rejected();
        assert_eq!(purged.n_epochs(), 2);
        assert_eq!(purged.times(), set.times());
        assert_eq!(purged.data()[[1, 0, 0]], 2.0);
        assert!(purged.epoch_meta().iter().all(|m| !m.rejected));
        // the source is untouched
        assert_eq!(set.n_epochs(), 3);
    }

    #[test]
    fn test_average_by_label_skips_rejected() {
        let mut set = make_set();
        set.epoch_meta_mut()[2].rejected = true;
        let averages = set.average_by_label();
        assert_eq!(averages.len(), 2);
        assert_eq!(averages["a"][[0, 0]], 0.0);
        assert_eq!(averages["b"][[3, 1]], 1.0);
    }

    #[test]
    fn test_drop_channels_keeps_labels() {
        let set = make_set();
        let dropped = set.drop_channels(&["Cz"]).unwrap();
        assert_eq!(dropped.channel_labels(), &["Pz"]);
        assert_eq!(dropped.n_channels(), 1);
        assert!(set.drop_channels(&["Fz"]).is_err());
    }

    #[test]
    fn test_time_window_indices() {
        let set = make_set();
        assert_eq!(set.time_window_indices((-0.01, 0.0)).unwrap(), 0..=1);
        assert!(set.time_window_indices((-0.05, 0.0)).is_err());
    }

    #[test]
    fn test_set_tag() {
        let mut set = make_set();
        set.set_tag(0, "practice").unwrap();
        assert_eq!(set.epoch_meta()[0].tag.as_deref(), Some("practice"));
        assert!(set.set_tag(9, "x").is_err());
    }
}
