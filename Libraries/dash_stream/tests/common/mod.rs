#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dash_stream::collab::{
    AbrController, Capabilities, Collaborators, ErrorSink, FragmentController, LiveEdgeFinder,
    ManifestAdapter, ManifestLoader, ManifestModel, PlaybackController, ProtectionController,
};
use dash_stream::error::ManifestErrorKind;
use dash_stream::pipeline::{
    MediaPipeline, PipelineFactory, PipelineRequest, RenderTarget, SharedBuffer,
};
use dash_stream::selection::TrackRegistry;
use dash_stream::{
    EventStreamKey, MediaCategory, ScheduledEvent, StreamConfig, StreamDescriptor,
    StreamOrchestrator, TrackDescriptor,
};
use parking_lot::Mutex;

pub fn stream(id: &str) -> StreamDescriptor {
    StreamDescriptor {
        id: id.to_string(),
        index: 0,
        start: 0.0,
        duration: 60.0,
    }
}

pub fn codec_for(category: MediaCategory) -> &'static str {
    match category {
        MediaCategory::Video => "video/mp4;codecs=\"avc1.4d401f\"",
        MediaCategory::Audio => "audio/mp4;codecs=\"mp4a.40.2\"",
        MediaCategory::Text => "text/vtt",
        MediaCategory::FragmentedText => "application/mp4;codecs=\"stpp\"",
        MediaCategory::Muxed => "video/mp4;codecs=\"avc1.4d401f,mp4a.40.2\"",
    }
}

pub fn track(stream_id: &str, id: &str, category: MediaCategory, index: usize) -> TrackDescriptor {
    let codec = codec_for(category);
    TrackDescriptor {
        id: id.to_string(),
        category,
        codec: codec.to_string(),
        mime_type: codec.split(';').next().unwrap_or_default().to_string(),
        content_protection: false,
        index,
        bitrates: vec![500_000, 1_000_000],
        stream: stream(stream_id),
    }
}

pub fn event(id: u64, presentation_time: u64, duration: u64) -> ScheduledEvent {
    ScheduledEvent {
        id,
        presentation_time,
        duration,
        stream: EventStreamKey {
            scheme_id_uri: "urn:example:ad".to_string(),
            value: "1".to_string(),
            timescale: 1,
        },
    }
}

pub fn reload_event(id: u64, presentation_time: u64) -> ScheduledEvent {
    ScheduledEvent {
        id,
        presentation_time,
        duration: 0,
        stream: EventStreamKey {
            scheme_id_uri: "urn:mpeg:dash:event:2012".to_string(),
            value: "1".to_string(),
            timescale: 1,
        },
    }
}

/// Tracks and events served to the orchestrator; editable between calls.
#[derive(Default)]
pub struct StaticManifest {
    pub tracks: Mutex<Vec<TrackDescriptor>>,
    pub events: Mutex<Vec<ScheduledEvent>>,
    pub url: Mutex<String>,
    pub location: Mutex<Option<String>>,
}

impl StaticManifest {
    pub fn with_tracks(tracks: Vec<TrackDescriptor>) -> Self {
        Self {
            tracks: Mutex::new(tracks),
            url: Mutex::new("http://cdn.test/stream.mpd".to_string()),
            ..Default::default()
        }
    }
}

impl ManifestAdapter for StaticManifest {
    fn tracks_for(&self, stream: &StreamDescriptor, category: MediaCategory) -> Vec<TrackDescriptor> {
        self.tracks
            .lock()
            .iter()
            .filter(|t| t.category == category && t.stream.id == stream.id)
            .cloned()
            .collect()
    }

    fn track_for(
        &self,
        stream: &StreamDescriptor,
        category: MediaCategory,
        current: Option<&TrackDescriptor>,
    ) -> Option<TrackDescriptor> {
        let tracks = self.tracks_for(stream, category);
        current
            .and_then(|c| tracks.iter().find(|t| t.id == c.id).cloned())
            .or_else(|| tracks.into_iter().next())
    }

    fn events_for(&self, _stream: &StreamDescriptor) -> Vec<ScheduledEvent> {
        self.events.lock().clone()
    }
}

impl ManifestModel for StaticManifest {
    fn url(&self) -> String {
        self.url.lock().clone()
    }

    fn location(&self) -> Option<String> {
        self.location.lock().clone()
    }
}

#[derive(Default)]
pub struct RecordingLoader {
    pub urls: Mutex<Vec<String>>,
}

impl ManifestLoader for RecordingLoader {
    fn load(&self, url: &str) {
        self.urls.lock().push(url.to_string());
    }
}

#[derive(Default)]
pub struct Caps {
    pub encrypted: AtomicBool,
    pub unsupported: Mutex<Vec<String>>,
}

impl Capabilities for Caps {
    fn supports_encrypted_media(&self) -> bool {
        self.encrypted.load(Ordering::SeqCst)
    }

    fn supports_codec(&self, _target: &dyn RenderTarget, codec: &str) -> bool {
        !self.unsupported.lock().iter().any(|c| c == codec)
    }
}

#[derive(Default)]
pub struct Abr {
    pub top_quality_updates: Mutex<Vec<String>>,
}

impl AbrController for Abr {
    fn update_top_quality_index(&self, track: &TrackDescriptor) {
        self.top_quality_updates.lock().push(track.id.clone());
    }

    fn bitrate_list(&self, track: &TrackDescriptor) -> Vec<u64> {
        track.bitrates.clone()
    }
}

/// Manually driven playback clock.
#[derive(Default)]
pub struct Clock {
    pub now: Mutex<f64>,
    pub paused: AtomicBool,
    pub seeks: Mutex<Vec<f64>>,
}

impl Clock {
    pub fn set(&self, time: f64) {
        *self.now.lock() = time;
    }
}

impl PlaybackController for Clock {
    fn time(&self) -> f64 {
        *self.now.lock()
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn seek(&self, time: f64) {
        self.seeks.lock().push(time);
        self.set(time);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Created {
        category: MediaCategory,
        start_time: Option<f64>,
        seeded_buffer: bool,
    },
    Track {
        category: MediaCategory,
        id: String,
    },
    Buffer {
        category: MediaCategory,
    },
    Reset {
        category: MediaCategory,
        retain_buffer: bool,
    },
}

/// Shared by every pipeline the factory hands out.
#[derive(Default)]
pub struct PipelineState {
    pub calls: Vec<Call>,
    pub updating: HashSet<MediaCategory>,
    pub buffered: HashSet<MediaCategory>,
}

pub struct RecordingPipeline {
    category: MediaCategory,
    track: Option<TrackDescriptor>,
    buffer: Option<SharedBuffer>,
    state: Arc<Mutex<PipelineState>>,
}

impl MediaPipeline for RecordingPipeline {
    fn category(&self) -> MediaCategory {
        self.category
    }

    fn update_track(&mut self, track: &TrackDescriptor) {
        self.track = Some(track.clone());
        self.state.lock().calls.push(Call::Track {
            category: self.category,
            id: track.id.clone(),
        });
    }

    fn track(&self) -> Option<&TrackDescriptor> {
        self.track.as_ref()
    }

    fn is_updating(&self) -> bool {
        self.state.lock().updating.contains(&self.category)
    }

    fn is_buffering_completed(&self) -> bool {
        self.state.lock().buffered.contains(&self.category)
    }

    fn create_buffer(&mut self) {
        if self.buffer.is_none() {
            self.buffer = Some(Arc::new(self.category.as_str()));
        }
        self.state.lock().calls.push(Call::Buffer {
            category: self.category,
        });
    }

    fn buffer(&self) -> Option<SharedBuffer> {
        self.buffer.clone()
    }

    fn reset(&mut self, retain_buffer: bool) {
        if !retain_buffer {
            self.buffer = None;
        }
        self.state.lock().calls.push(Call::Reset {
            category: self.category,
            retain_buffer,
        });
    }
}

#[derive(Default)]
pub struct RecordingFactory {
    pub state: Arc<Mutex<PipelineState>>,
}

impl RecordingFactory {
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn set_updating(&self, category: MediaCategory, updating: bool) {
        let mut state = self.state.lock();
        if updating {
            state.updating.insert(category);
        } else {
            state.updating.remove(&category);
        }
    }

    pub fn set_buffered(&self, category: MediaCategory) {
        self.state.lock().buffered.insert(category);
    }

    pub fn tracks_given(&self, category: MediaCategory) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Track { category: c, id } if c == category => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl PipelineFactory for RecordingFactory {
    fn create(&self, request: PipelineRequest) -> Box<dyn MediaPipeline> {
        let (buffer, start_time) = match request.seed {
            Some(seed) => (seed.buffer, Some(seed.start_time)),
            None => (None, None),
        };
        self.state.lock().calls.push(Call::Created {
            category: request.category,
            start_time,
            seeded_buffer: buffer.is_some(),
        });
        Box::new(RecordingPipeline {
            category: request.category,
            track: None,
            buffer,
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Default)]
pub struct RecordingErrors {
    pub manifest: Mutex<Vec<(String, ManifestErrorKind)>>,
    pub capability: Mutex<Vec<String>>,
    pub key_session: Mutex<Vec<String>>,
}

impl RecordingErrors {
    pub fn manifest_kinds(&self) -> Vec<ManifestErrorKind> {
        self.manifest.lock().iter().map(|(_, kind)| *kind).collect()
    }
}

impl ErrorSink for RecordingErrors {
    fn manifest_error(&self, message: &str, kind: ManifestErrorKind) {
        self.manifest.lock().push((message.to_string(), kind));
    }

    fn capability_error(&self, capability: &str) {
        self.capability.lock().push(capability.to_string());
    }

    fn media_key_session_error(&self, message: &str) {
        self.key_session.lock().push(message.to_string());
    }
}

#[derive(Default)]
pub struct Protection {
    pub inits: Mutex<Vec<(Option<String>, Option<String>)>>,
}

impl ProtectionController for Protection {
    fn init(&self, audio: Option<&TrackDescriptor>, video: Option<&TrackDescriptor>) {
        self.inits
            .lock()
            .push((audio.map(|t| t.id.clone()), video.map(|t| t.id.clone())));
    }
}

#[derive(Default)]
pub struct LiveEdge {
    pub seeded_with: Mutex<Vec<MediaCategory>>,
    pub aborts: AtomicUsize,
}

impl LiveEdgeFinder for LiveEdge {
    fn initialize(&self, category: MediaCategory, _track: Option<&TrackDescriptor>) {
        self.seeded_with.lock().push(category);
    }

    fn abort_search(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct Fragments {
    pub resets: AtomicUsize,
}

impl FragmentController for Fragments {
    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct Screen;

impl RenderTarget for Screen {
    fn name(&self) -> &str {
        "screen"
    }
}

pub fn screen() -> Arc<dyn RenderTarget> {
    Arc::new(Screen)
}

/// Every collaborator as a concrete recording double.
pub struct Harness {
    pub manifest: Arc<StaticManifest>,
    pub loader: Arc<RecordingLoader>,
    pub caps: Arc<Caps>,
    pub tracks: Arc<TrackRegistry>,
    pub abr: Arc<Abr>,
    pub clock: Arc<Clock>,
    pub pipelines: Arc<RecordingFactory>,
    pub errors: Arc<RecordingErrors>,
    pub live_edge: Arc<LiveEdge>,
    pub fragments: Arc<Fragments>,
    pub protection: Arc<Protection>,
}

impl Harness {
    pub fn new(tracks: Vec<TrackDescriptor>) -> Self {
        Self {
            manifest: Arc::new(StaticManifest::with_tracks(tracks)),
            loader: Arc::default(),
            caps: Arc::default(),
            tracks: Arc::default(),
            abr: Arc::default(),
            clock: Arc::default(),
            pipelines: Arc::default(),
            errors: Arc::default(),
            live_edge: Arc::default(),
            fragments: Arc::default(),
            protection: Arc::default(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            manifest: self.manifest.clone(),
            manifest_model: self.manifest.clone(),
            loader: self.loader.clone(),
            capabilities: self.caps.clone(),
            tracks: self.tracks.clone(),
            abr: self.abr.clone(),
            playback: self.clock.clone(),
            pipelines: self.pipelines.clone(),
            errors: self.errors.clone(),
            live_edge: self.live_edge.clone(),
            fragments: Some(self.fragments.clone()),
        }
    }

    pub fn orchestrator(&self) -> StreamOrchestrator {
        StreamOrchestrator::new(&StreamConfig::default(), self.collaborators())
    }

    /// An orchestrator initialized on `stream_id` with the recording protection controller.
    pub fn initialized(&self, stream_id: &str) -> StreamOrchestrator {
        let mut orchestrator = self.orchestrator();
        let protection: Arc<dyn ProtectionController> = self.protection.clone();
        orchestrator.initialize(stream(stream_id), Some(protection));
        orchestrator
    }
}
