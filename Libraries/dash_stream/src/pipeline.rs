//! Boundary to the per-category media pipelines.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use crate::types::{MediaCategory, StreamDescriptor, TrackDescriptor};

/// Opaque handle to the media buffer a pipeline appends into. It outlives a pipeline
/// when the pipeline is replaced by a track switch.
pub type SharedBuffer = Arc<dyn Any + Send + Sync>;

/// The rendering target a stream is activated against (a media source, a sink, ...).
pub trait RenderTarget: Send + Sync + Debug {
    fn name(&self) -> &str;
}

/// One processing pipeline, turning track data of a single category into buffered media.
pub trait MediaPipeline: Send {
    fn category(&self) -> MediaCategory;

    /// Adopt (or, for text pipelines, add) a track.
    fn update_track(&mut self, track: &TrackDescriptor);

    /// The track the pipeline currently plays.
    fn track(&self) -> Option<&TrackDescriptor>;

    fn is_updating(&self) -> bool;

    fn is_buffering_completed(&self) -> bool;

    fn create_buffer(&mut self);

    fn buffer(&self) -> Option<SharedBuffer>;

    /// Tear the pipeline down. With `retain_buffer` the underlying buffer is left intact
    /// for a replacement pipeline.
    fn reset(&mut self, retain_buffer: bool);
}

/// State carried from a torn down pipeline into its replacement.
#[derive(Clone)]
pub struct PipelineSeed {
    pub buffer: Option<SharedBuffer>,
    /// Playback position segment indexing resumes from, in seconds.
    pub start_time: f64,
}

/// Everything a factory needs to build a pipeline.
#[derive(Clone)]
pub struct PipelineRequest {
    pub category: MediaCategory,
    pub stream: StreamDescriptor,
    pub target: Arc<dyn RenderTarget>,
    pub seed: Option<PipelineSeed>,
}

pub trait PipelineFactory: Send + Sync {
    fn create(&self, request: PipelineRequest) -> Box<dyn MediaPipeline>;
}
