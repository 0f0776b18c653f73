//! Collaborator boundaries injected into the orchestrator and the event timer.

use std::sync::Arc;

use crate::error::ManifestErrorKind;
use crate::pipeline::{PipelineFactory, RenderTarget};
use crate::types::{MediaCategory, ScheduledEvent, StreamDescriptor, TrackDescriptor};

/// Derives tracks and inline events from the current manifest.
pub trait ManifestAdapter: Send + Sync {
    /// Every candidate track of `category` in `stream`.
    fn tracks_for(&self, stream: &StreamDescriptor, category: MediaCategory) -> Vec<TrackDescriptor>;

    /// The track of `category` a refreshed manifest resolves to, matched against the
    /// track currently in use when there is one.
    fn track_for(
        &self,
        stream: &StreamDescriptor,
        category: MediaCategory,
        current: Option<&TrackDescriptor>,
    ) -> Option<TrackDescriptor>;

    /// Inline scheduled events declared for `stream`.
    fn events_for(&self, stream: &StreamDescriptor) -> Vec<ScheduledEvent>;
}

/// The loaded manifest's addresses.
pub trait ManifestModel: Send + Sync {
    fn url(&self) -> String;

    /// Redirect target declared by the manifest itself.
    fn location(&self) -> Option<String>;

    /// URL a reload should be issued against.
    fn reload_url(&self) -> String {
        self.location().unwrap_or_else(|| self.url())
    }
}

/// Loads a manifest. Failures are the loader's concern.
pub trait ManifestLoader: Send + Sync {
    fn load(&self, url: &str);
}

pub trait Capabilities: Send + Sync {
    fn supports_encrypted_media(&self) -> bool;
    fn supports_codec(&self, target: &dyn RenderTarget, codec: &str) -> bool;
}

/// Track registration and initial-track policy.
pub trait TrackSelector: Send + Sync {
    fn is_multi_track_supported(&self, category: MediaCategory) -> bool;
    fn add_track(&self, track: &TrackDescriptor);
    fn check_initial_settings(&self, stream: &StreamDescriptor);
    fn current_track_for(&self, category: MediaCategory, stream: &StreamDescriptor) -> Option<TrackDescriptor>;
}

/// Bitrate decision collaborator.
pub trait AbrController: Send + Sync {
    fn update_top_quality_index(&self, track: &TrackDescriptor);
    fn bitrate_list(&self, track: &TrackDescriptor) -> Vec<u64>;
}

/// Playback clock and transport.
pub trait PlaybackController: Send + Sync {
    /// Current playback position in seconds.
    fn time(&self) -> f64;
    fn pause(&self);
    fn seek(&self, time: f64);
}

pub trait ProtectionController: Send + Sync {
    fn init(&self, audio: Option<&TrackDescriptor>, video: Option<&TrackDescriptor>);
}

pub trait ErrorSink: Send + Sync {
    fn manifest_error(&self, message: &str, kind: ManifestErrorKind);
    fn capability_error(&self, capability: &str);
    fn media_key_session_error(&self, message: &str);
}

pub trait LiveEdgeFinder: Send + Sync {
    /// Start searching the live edge using the given pipeline's track.
    fn initialize(&self, category: MediaCategory, track: Option<&TrackDescriptor>);
    fn abort_search(&self);
}

/// Fragment acquisition collaborator, torn down on a full reset.
pub trait FragmentController: Send + Sync {
    fn reset(&self);
}

/// Collaborators a stream is constructed with.
#[derive(Clone)]
pub struct Collaborators {
    pub manifest: Arc<dyn ManifestAdapter>,
    pub manifest_model: Arc<dyn ManifestModel>,
    pub loader: Arc<dyn ManifestLoader>,
    pub capabilities: Arc<dyn Capabilities>,
    pub tracks: Arc<dyn TrackSelector>,
    pub abr: Arc<dyn AbrController>,
    pub playback: Arc<dyn PlaybackController>,
    pub pipelines: Arc<dyn PipelineFactory>,
    pub errors: Arc<dyn ErrorSink>,
    pub live_edge: Arc<dyn LiveEdgeFinder>,
    pub fragments: Option<Arc<dyn FragmentController>>,
}
