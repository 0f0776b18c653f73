use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use dash_stream::collab::{
    AbrController, Capabilities, Collaborators, ErrorSink, LiveEdgeFinder, PlaybackController,
    ProtectionController,
};
use dash_stream::error::ManifestErrorKind;
use dash_stream::loader::{load_manifest, HttpManifestLoader};
use dash_stream::mpd::MpdAdapter;
use dash_stream::pipeline::{
    MediaPipeline, PipelineFactory, PipelineRequest, RenderTarget, SharedBuffer,
};
use dash_stream::selection::TrackRegistry;
use dash_stream::{
    MediaCategory, Notification, StreamConfig, StreamEvent, StreamOrchestrator, StreamSession,
    TrackDescriptor,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
enum LogLevel {
    Trace = 0, // Designates very fine-grained informational events, extremely verbose.
    Debug = 1, // Designates fine-grained informational events.
    Info = 2, // Designates informational messages.
    Warn = 3, // Designates hazardous situations.
    Error = 4, // Designates very serious errors.
}

#[derive(Parser, Debug)]
#[command(author, version, about = "dash_stream")]
struct Args {
    /// MPD URL or local path
    #[arg(short, long)]
    manifest: String,
    // Set the log level (possible values: error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: LogLevel,
    /// Event timer period in milliseconds, overrides the config file
    #[arg(long)]
    tick_ms: Option<f64>,
    /// How long to run the stream for
    #[arg(short, long, default_value_t = 30)]
    seconds: u64,
    /// JSON stream configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Settles immediately and reports back through the session channel.
struct LoggingPipeline {
    category: MediaCategory,
    stream_id: String,
    track: Option<TrackDescriptor>,
    buffer: Option<SharedBuffer>,
    start_time: f64,
    notify: mpsc::UnboundedSender<Notification>,
}

impl MediaPipeline for LoggingPipeline {
    fn category(&self) -> MediaCategory {
        self.category
    }

    fn update_track(&mut self, track: &TrackDescriptor) {
        info!("[{}] using track {} ({}) from {:.2}s", self.category, track.id, track.codec, self.start_time);
        self.track = Some(track.clone());
        let _ = self.notify.send(Notification::DataUpdateCompleted {
            stream_id: self.stream_id.clone(),
            category: self.category,
            error: None,
        });
    }

    fn track(&self) -> Option<&TrackDescriptor> {
        self.track.as_ref()
    }

    fn is_updating(&self) -> bool {
        false
    }

    fn is_buffering_completed(&self) -> bool {
        self.buffer.is_some()
    }

    fn create_buffer(&mut self) {
        if self.buffer.is_none() {
            self.buffer = Some(Arc::new(format!("{}-buffer", self.category)));
        }
        let _ = self.notify.send(Notification::BufferingCompleted {
            stream_id: self.stream_id.clone(),
            category: self.category,
        });
    }

    fn buffer(&self) -> Option<SharedBuffer> {
        self.buffer.clone()
    }

    fn reset(&mut self, retain_buffer: bool) {
        debug!("[{}] reset (retain buffer: {})", self.category, retain_buffer);
        if !retain_buffer {
            self.buffer = None;
        }
    }
}

struct LoggingFactory {
    notify: mpsc::UnboundedSender<Notification>,
}

impl PipelineFactory for LoggingFactory {
    fn create(&self, request: PipelineRequest) -> Box<dyn MediaPipeline> {
        let (buffer, start_time) = match request.seed {
            Some(seed) => (seed.buffer, seed.start_time),
            None => (None, request.stream.start),
        };
        Box::new(LoggingPipeline {
            category: request.category,
            stream_id: request.stream.id,
            track: None,
            buffer,
            start_time,
            notify: self.notify.clone(),
        })
    }
}

/// Wall-clock playback position.
struct WallClock {
    state: Mutex<(f64, Option<Instant>)>,
}

impl WallClock {
    fn playing_from(position: f64) -> Self {
        Self {
            state: Mutex::new((position, Some(Instant::now()))),
        }
    }
}

impl PlaybackController for WallClock {
    fn time(&self) -> f64 {
        let (offset, started) = *self.state.lock();
        offset + started.map(|s| s.elapsed().as_secs_f64()).unwrap_or(0.0)
    }

    fn pause(&self) {
        let now = self.time();
        *self.state.lock() = (now, None);
    }

    fn seek(&self, time: f64) {
        let mut state = self.state.lock();
        let playing = state.1.is_some();
        *state = (time, playing.then(Instant::now));
    }
}

#[derive(Debug)]
struct Sink;

impl RenderTarget for Sink {
    fn name(&self) -> &str {
        "log"
    }
}

struct Mp4Only;

impl Capabilities for Mp4Only {
    fn supports_encrypted_media(&self) -> bool {
        false
    }

    fn supports_codec(&self, _target: &dyn RenderTarget, codec: &str) -> bool {
        codec.starts_with("video/mp4") || codec.starts_with("audio/mp4")
    }
}

struct LogErrors;

impl ErrorSink for LogErrors {
    fn manifest_error(&self, message: &str, kind: ManifestErrorKind) {
        warn!("Manifest error ({}): {}", kind.as_str(), message);
    }

    fn capability_error(&self, capability: &str) {
        warn!("Capability error: {}", capability);
    }

    fn media_key_session_error(&self, message: &str) {
        error!("Media key session error: {}", message);
    }
}

struct LogCollaborators;

impl LiveEdgeFinder for LogCollaborators {
    fn initialize(&self, category: MediaCategory, _track: Option<&TrackDescriptor>) {
        debug!("Live edge search seeded with {}", category);
    }

    fn abort_search(&self) {
        debug!("Live edge search aborted");
    }
}

impl AbrController for LogCollaborators {
    fn update_top_quality_index(&self, track: &TrackDescriptor) {
        debug!("Top quality for {} is {}", track.id, track.bitrates.len().saturating_sub(1));
    }

    fn bitrate_list(&self, track: &TrackDescriptor) -> Vec<u64> {
        track.bitrates.clone()
    }
}

impl ProtectionController for LogCollaborators {
    fn init(&self, audio: Option<&TrackDescriptor>, video: Option<&TrackDescriptor>) {
        info!(
            "Content protection initialized (audio: {:?}, video: {:?})",
            audio.map(|t| &t.id),
            video.map(|t| &t.id)
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(match args.log_level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        });
    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(fmt_layer))?;

    info!("{:?}", args);

    let mut config = match &args.config {
        Some(path) => StreamConfig::from_json(&tokio::fs::read_to_string(path).await?)?,
        None => StreamConfig::default(),
    };
    if let Some(ms) = args.tick_ms {
        config = config.with_event_tick_ms(ms);
    }

    let client = reqwest::Client::new();
    let manifest = load_manifest(&client, &args.manifest).await?;
    let adapter = Arc::new(MpdAdapter::new(manifest));
    let stream = adapter
        .streams()
        .into_iter()
        .next()
        .ok_or("manifest has no periods")?;

    let (loader, manifest_updates) = HttpManifestLoader::new(client);
    let (notify, notifications) = mpsc::unbounded_channel();
    let common = Arc::new(LogCollaborators);
    let deps = Collaborators {
        manifest: adapter.clone(),
        manifest_model: adapter.clone(),
        loader: Arc::new(loader),
        capabilities: Arc::new(Mp4Only),
        tracks: Arc::new(TrackRegistry::default()),
        abr: common.clone(),
        playback: Arc::new(WallClock::playing_from(stream.start)),
        pipelines: Arc::new(LoggingFactory { notify }),
        errors: Arc::new(LogErrors),
        live_edge: common.clone(),
        fragments: None,
    };

    let mut orchestrator = StreamOrchestrator::new(&config, deps);
    let mut events = orchestrator.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                StreamEvent::StreamInitialized { stream, error: None } => {
                    info!("Stream {} initialized", stream.id)
                }
                StreamEvent::StreamInitialized { stream, error: Some(e) } => {
                    warn!("Stream {} initialized with error: {}", stream.id, e)
                }
                StreamEvent::StreamBufferingCompleted { stream } => {
                    info!("Stream {} buffering completed", stream.id)
                }
                StreamEvent::ManifestReloadRequested { url } => info!("Manifest reload requested: {}", url),
            }
        }
    });

    orchestrator.initialize(stream, Some(common as Arc<dyn ProtectionController>));
    orchestrator.activate(Arc::new(Sink));
    orchestrator.start_event_timer();
    info!("Stream activated");

    let cancel = CancellationToken::new();
    let session = StreamSession::new(orchestrator, adapter, notifications, manifest_updates);
    let session_task = tokio::spawn(session.run(cancel.clone()));

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.seconds)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
    cancel.cancel();

    let orchestrator = session_task.await?;
    info!("Stream stopped in state {:?}", orchestrator.state());
    Ok(())
}
