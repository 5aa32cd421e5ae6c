//! EEG preprocessing: re-referencing, zero-phase filtering, epoching and
//! statistical artifact detection over in-memory recordings.

pub mod artifacts;
pub mod epoching;
pub mod epochs;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod profiling;
pub mod recording;
pub mod reference;

pub use artifacts::{
    detect_artifacts, ArtifactReport, ArtifactThresholds, DeviationStatistic, Screened,
};
pub use epoching::{epoch, EpochReport, EpochSpec, Epoched, SkippedEvent};
pub use epochs::{ChannelStatus, EpochMeta, EpochSet};
pub use error::{PrepError, Result};
pub use filter::{filter, notch, FilterMethod, FilterSpec};
pub use pipeline::{run_pipeline, ArtifactConfig, NotchSpec, PipelineConfig, PipelineOutput};
pub use recording::{ChannelLocation, ChannelLocations, Event, Recording};
pub use reference::{reference, RefChannels};
