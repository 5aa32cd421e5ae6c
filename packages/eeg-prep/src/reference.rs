//! Re-referencing
//!
//! Each channel is expressed relative to the per-sample mean of a reference
//! set. The reference channels stay in the output.

use ndarray::Axis;
use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::recording::Recording;

/// Reference set selection, `"average"` or `{"channels": ["M1", "M2"]}` in JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefChannels {
    /// Mean of every channel present at call time
    Average,
    /// Mean of the named channels
    Channels(Vec<String>),
}

impl RefChannels {
    pub fn channels<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        RefChannels::Channels(labels.into_iter().map(Into::into).collect())
    }
}

/// Re-reference `recording` to `ref_channels`.
pub fn reference(recording: &Recording, ref_channels: &RefChannels) -> Result<Recording> {
    let indices: Vec<usize> = match ref_channels {
        RefChannels::Average => (0..recording.n_channels()).collect(),
        RefChannels::Channels(labels) => {
            if labels.is_empty() {
                return Err(PrepError::InvalidParameter(
                    "Reference channel list is empty".to_string(),
                ));
            }
            recording.resolve_channels(labels)?
        }
    };

    let reference_signal = recording
        .samples()
        .select(Axis(1), &indices)
        .mean_axis(Axis(1))
        .ok_or_else(|| {
            PrepError::InvalidParameter("Cannot reference a recording without channels".to_string())
        })?;

    log::info!(
        "Re-referencing {} channel(s) to {}",
        recording.n_channels(),
        match ref_channels {
            RefChannels::Average => "average".to_string(),
            RefChannels::Channels(labels) => labels.join(", "),
        }
    );

    let referenced = recording.samples() - &reference_signal.insert_axis(Axis(1));
    recording.with_samples(referenced)
}
