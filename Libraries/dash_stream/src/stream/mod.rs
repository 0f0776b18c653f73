//! Life cycle of one stream segment: track discovery, one pipeline per category,
//! completion aggregation, track switches and manifest refreshes.

pub mod slots;
pub mod update_errors;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::bus::{
    Notification, NotificationBus, ProtectionErrorKind, StreamEvent, SubscriptionHandle,
    SubscriptionRegistry, Topic,
};
use crate::collab::{Collaborators, ProtectionController};
use crate::config::StreamConfig;
use crate::error::{ManifestErrorKind, StreamError};
use crate::events::EventTimer;
use crate::pipeline::{MediaPipeline, PipelineRequest, PipelineSeed, RenderTarget};
use crate::types::{MediaCategory, ScheduledEvent, StreamDescriptor, StreamState, TrackDescriptor};

pub use slots::PipelineSlots;
pub use update_errors::UpdateErrorMap;

/// Owns the pipelines of one stream segment and keeps them in a consistent state.
pub struct StreamOrchestrator {
    deps: Collaborators,
    bus: NotificationBus,
    event_timer: EventTimer,
    subscriptions: SubscriptionRegistry,
    track_change: Option<SubscriptionHandle>,
    stream: Option<StreamDescriptor>,
    protection: Option<Arc<dyn ProtectionController>>,
    target: Option<Arc<dyn RenderTarget>>,
    slots: PipelineSlots,
    update_errors: UpdateErrorMap,
    state: StreamState,
    activated: bool,
    media_initialized: bool,
    protection_activated: bool,
    updating: bool,
    initialized: bool,
}

impl StreamOrchestrator {
    pub fn new(config: &StreamConfig, deps: Collaborators) -> Self {
        let bus = NotificationBus::new(config.notification_capacity);
        let event_timer = EventTimer::new(
            config.event_tick_ms,
            Arc::clone(&deps.playback),
            Arc::clone(&deps.manifest_model),
            Arc::clone(&deps.loader),
            bus.clone(),
        );
        let mut subscriptions = SubscriptionRegistry::default();
        subscriptions.subscribe(Topic::BufferingCompleted);
        subscriptions.subscribe(Topic::DataUpdateCompleted);

        Self {
            deps,
            bus,
            event_timer,
            subscriptions,
            track_change: None,
            stream: None,
            protection: None,
            target: None,
            slots: PipelineSlots::default(),
            update_errors: UpdateErrorMap::default(),
            state: StreamState::Uninitialized,
            activated: false,
            media_initialized: false,
            protection_activated: false,
            updating: false,
            initialized: false,
        }
    }

    /// Binds the stream identity and the content-protection collaborator.
    #[instrument(skip_all, fields(stream = %stream.id))]
    pub fn initialize(
        &mut self,
        stream: StreamDescriptor,
        protection: Option<Arc<dyn ProtectionController>>,
    ) {
        self.stream = Some(stream);
        self.protection = protection;

        // Completion topics are dropped by a full reset; bring them back for a reused stream.
        self.ensure_subscribed(Topic::BufferingCompleted);
        self.ensure_subscribed(Topic::DataUpdateCompleted);
        for kind in ProtectionErrorKind::ALL {
            self.ensure_subscribed(Topic::Protection(kind));
        }
    }

    /// Initializes media against `target`, or only re-creates buffers when the stream has
    /// already been activated.
    #[instrument(skip_all)]
    pub fn activate(&mut self, target: Arc<dyn RenderTarget>) {
        if self.activated {
            self.create_buffers();
            return;
        }
        if self.stream.is_none() {
            warn!("Stream activated before it was initialized, ignoring");
            return;
        }

        self.activated = true;
        self.track_change = Some(self.subscriptions.subscribe(Topic::TrackChanged));
        self.target = Some(Arc::clone(&target));
        self.initialize_media(target);
    }

    /// Routes a notification to its handler. Returns `false` when the stream holds no
    /// subscription for it.
    pub fn handle(&mut self, notification: Notification) -> bool {
        if !self.subscriptions.is_subscribed(notification.topic()) {
            debug!("Dropping {:?} notification, not subscribed", notification.topic());
            return false;
        }

        match notification {
            Notification::TrackChanged { old, new } => self.on_track_changed(&old, &new),
            Notification::DataUpdateCompleted {
                stream_id,
                category,
                error,
            } => self.on_data_update_completed(&stream_id, category, error),
            Notification::BufferingCompleted {
                stream_id,
                category,
            } => self.on_buffering_completed(&stream_id, category),
            Notification::Protection { kind, message } => self.on_protection_error(kind, &message),
        }
        true
    }

    /// Applies a refreshed manifest to the existing pipelines.
    #[instrument(skip_all, fields(stream = %stream.id))]
    pub fn update_data(&mut self, stream: StreamDescriptor) {
        info!("Manifest updated... set new data on buffers.");
        let events = self.deps.manifest.events_for(&stream);
        self.event_timer.add_inline_events(events);
        self.stream = Some(stream.clone());

        self.updating = true;
        self.initialized = false;
        self.state = StreamState::Updating;

        for category in self.slots.categories() {
            let current = self.current_track(category).cloned();
            let Some(track) = self.deps.manifest.track_for(&stream, category, current.as_ref()) else {
                warn!("Refreshed manifest has no {} track for stream {}", category, stream.id);
                continue;
            };
            self.deps.abr.update_top_quality_index(&track);
            if let Some(pipeline) = self.slots.get_mut(category) {
                pipeline.update_track(&track);
            }
        }

        self.updating = false;
        self.check_if_initialization_completed();
    }

    /// Tears down every pipeline and the event timer, keeping the completion and
    /// protection subscriptions.
    #[instrument(skip_all)]
    pub fn deactivate(&mut self) {
        self.slots.reset_all();
        self.activated = false;
        self.media_initialized = false;
        self.protection_activated = false;
        self.event_timer.reset();
        if let Some(handle) = self.track_change.take() {
            self.subscriptions.unsubscribe(handle);
        }
        self.state = StreamState::Deactivated;
    }

    /// Full reset. Safe at any point of the life cycle.
    #[instrument(skip_all, fields(errored = errored))]
    pub fn reset(&mut self, errored: bool) {
        if errored {
            warn!("Resetting stream after an error");
        }
        self.deps.playback.pause();
        self.deactivate();

        self.updating = false;
        self.initialized = false;

        if let Some(fragments) = self.deps.fragments.take() {
            fragments.reset();
        }
        self.deps.live_edge.abort_search();

        self.subscriptions.unsubscribe_all();
        self.update_errors.clear();
    }

    pub fn start_event_timer(&mut self) {
        self.event_timer.start();
    }

    pub fn reset_event_timer(&mut self) {
        self.event_timer.reset();
    }

    /// Hands inband events found in segment data to the event timer.
    pub fn add_inband_events(&self, events: Vec<ScheduledEvent>) -> usize {
        self.event_timer.add_inband_events(events)
    }

    pub fn event_timer(&self) -> &EventTimer {
        &self.event_timer
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StreamEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn stream_descriptor(&self) -> Option<&StreamDescriptor> {
        self.stream.as_ref()
    }

    pub fn id(&self) -> Option<&str> {
        self.stream.as_ref().map(|s| s.id.as_str())
    }

    pub fn duration(&self) -> Option<f64> {
        self.stream.as_ref().map(|s| s.duration)
    }

    pub fn start_time(&self) -> Option<f64> {
        self.stream.as_ref().map(|s| s.start)
    }

    pub fn stream_index(&self) -> Option<usize> {
        self.stream.as_ref().map(|s| s.index)
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_protection_activated(&self) -> bool {
        self.protection_activated
    }

    pub fn has_media(&self, category: MediaCategory) -> bool {
        self.slots.get(category).and_then(|p| p.track()).is_some()
    }

    pub fn bitrate_list_for(&self, category: MediaCategory) -> Vec<u64> {
        match self.current_track(category) {
            Some(track) => self.deps.abr.bitrate_list(track),
            None => Vec::new(),
        }
    }

    pub fn slots(&self) -> &PipelineSlots {
        &self.slots
    }

    pub fn update_errors(&self) -> &UpdateErrorMap {
        &self.update_errors
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn ensure_subscribed(&mut self, topic: Topic) {
        if !self.subscriptions.is_subscribed(topic) {
            self.subscriptions.subscribe(topic);
        }
    }

    fn current_track(&self, category: MediaCategory) -> Option<&TrackDescriptor> {
        self.slots.get(category).and_then(|p| p.track())
    }

    fn initialize_media(&mut self, target: Arc<dyn RenderTarget>) {
        let Some(stream) = self.stream.clone() else {
            return;
        };
        self.state = StreamState::Activating;

        let events = self.deps.manifest.events_for(&stream);
        self.event_timer.add_inline_events(events);

        self.updating = true;
        for category in MediaCategory::INIT_ORDER {
            self.initialize_media_for(category, &stream, &target);
        }
        self.create_buffers();
        self.media_initialized = true;
        self.updating = false;

        let Some(first) = self.slots.first() else {
            let message = StreamError::NoStreams.to_string();
            self.deps.errors.manifest_error(&message, ManifestErrorKind::NoStreams);
            error!("{}", message);
            return;
        };
        self.deps.live_edge.initialize(first.category(), first.track());
        self.state = StreamState::Updating;
        self.check_if_initialization_completed();
    }

    fn initialize_media_for(
        &mut self,
        category: MediaCategory,
        stream: &StreamDescriptor,
        target: &Arc<dyn RenderTarget>,
    ) {
        let candidates = self.deps.manifest.tracks_for(stream, category);
        if candidates.is_empty() {
            debug!("No {} data.", category);
            return;
        }

        let survivors: Vec<TrackDescriptor> = candidates
            .into_iter()
            .filter(|track| self.is_media_supported(track, target.as_ref()))
            .collect();

        if !category.is_text() && self.deps.tracks.is_multi_track_supported(category) {
            for track in &survivors {
                self.deps.tracks.add_track(track);
            }
        }

        if survivors.is_empty() {
            debug!("No supported {} tracks.", category);
            return;
        }

        self.deps.tracks.check_initial_settings(stream);
        let initial = self
            .deps
            .tracks
            .current_track_for(category, stream)
            .unwrap_or_else(|| survivors[0].clone());

        let pipeline = self.create_pipeline(category, Arc::clone(target), &initial, &survivors, None);
        self.slots.insert(pipeline);
    }

    fn is_media_supported(&self, track: &TrackDescriptor, target: &dyn RenderTarget) -> bool {
        match track.category {
            MediaCategory::Muxed => {
                let message = StreamError::MultiplexedRepresentation.to_string();
                info!("{}", message);
                self.deps.errors.manifest_error(&message, ManifestErrorKind::Multiplexed);
                false
            }
            MediaCategory::Text | MediaCategory::FragmentedText => true,
            category => {
                debug!("{} codec: {}", category, track.codec);
                if track.content_protection && !self.deps.capabilities.supports_encrypted_media() {
                    warn!("Encrypted {} track {} is not supported", category, track.id);
                    self.deps.errors.capability_error("encryptedmedia");
                    return false;
                }
                if !self.deps.capabilities.supports_codec(target, &track.codec) {
                    let message = StreamError::UnsupportedCodec {
                        category,
                        codec: track.codec.clone(),
                    }
                    .to_string();
                    info!("{}", message);
                    self.deps.errors.manifest_error(&message, ManifestErrorKind::Codec);
                    return false;
                }
                true
            }
        }
    }

    /// Builds a pipeline for `category` and hands it its tracks. Text pipelines receive
    /// every track of the category.
    fn create_pipeline(
        &self,
        category: MediaCategory,
        target: Arc<dyn RenderTarget>,
        initial: &TrackDescriptor,
        all: &[TrackDescriptor],
        seed: Option<PipelineSeed>,
    ) -> Box<dyn MediaPipeline> {
        let request = PipelineRequest {
            category,
            stream: initial.stream.clone(),
            target,
            seed,
        };
        let mut pipeline = self.deps.pipelines.create(request);
        self.deps.abr.update_top_quality_index(initial);

        if category.is_text() {
            for track in all {
                pipeline.update_track(track);
            }
            if category == MediaCategory::FragmentedText {
                pipeline.update_track(initial);
            }
        } else {
            pipeline.update_track(initial);
        }
        pipeline
    }

    fn create_buffers(&mut self) {
        for pipeline in self.slots.iter_mut() {
            pipeline.create_buffer();
        }
    }

    fn on_track_changed(&mut self, old: &TrackDescriptor, new: &TrackDescriptor) {
        let Some(stream) = self.stream.clone() else {
            return;
        };
        if new.stream.id != stream.id {
            return;
        }
        let category = old.category;
        let Some(target) = self.target.clone() else {
            return;
        };
        let Some(pipeline) = self.slots.get_mut(category) else {
            return;
        };

        if category == MediaCategory::FragmentedText {
            pipeline.update_track(new);
            return;
        }

        let current_time = self.deps.playback.time();
        let buffer = pipeline.buffer();
        pipeline.reset(true);

        let all = self.deps.manifest.tracks_for(&stream, category);
        let seed = PipelineSeed {
            buffer,
            start_time: current_time,
        };
        let replacement = self.create_pipeline(category, target, new, &all, Some(seed));
        self.slots.replace(category, replacement);
        debug!("Replaced {} pipeline at {:.3}s", category, current_time);

        let playback = Arc::clone(&self.deps.playback);
        playback.seek(playback.time());
    }

    fn on_data_update_completed(
        &mut self,
        stream_id: &str,
        category: MediaCategory,
        error: Option<String>,
    ) {
        if self.id() != Some(stream_id) {
            return;
        }
        if let Some(e) = &error {
            warn!("Data update for {} failed: {}", category, e);
        }
        self.update_errors.record(category, error);
        self.check_if_initialization_completed();
    }

    fn check_if_initialization_completed(&mut self) {
        if self.updating || self.slots.any_updating() {
            return;
        }
        let Some(stream) = self.stream.clone() else {
            return;
        };

        self.initialized = true;
        self.state = StreamState::Initialized;
        self.bus.publish(StreamEvent::StreamInitialized {
            stream,
            error: self.update_errors.aggregate(),
        });

        if !self.media_initialized || self.protection_activated {
            return;
        }
        if let Some(protection) = &self.protection {
            protection.init(
                self.current_track(MediaCategory::Audio),
                self.current_track(MediaCategory::Video),
            );
        }
        self.protection_activated = true;
    }

    fn on_buffering_completed(&mut self, stream_id: &str, category: MediaCategory) {
        if self.id() != Some(stream_id) {
            return;
        }
        debug!("Buffering completed for {}", category);

        let all_completed = self
            .slots
            .iter()
            .filter(|p| p.category().counts_for_buffering())
            .all(|p| p.is_buffering_completed());
        if !all_completed {
            return;
        }

        if let Some(stream) = self.stream.clone() {
            self.bus.publish(StreamEvent::StreamBufferingCompleted { stream });
        }
    }

    fn on_protection_error(&mut self, kind: ProtectionErrorKind, message: &str) {
        self.deps.errors.media_key_session_error(message);
        error!("Content protection error ({:?}): {}", kind, message);
        self.reset(true);
    }
}
