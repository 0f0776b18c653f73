//! Core data model shared by the orchestrator, the event timer and the MPD adapter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Media categories handled by a stream, in the order they are initialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaCategory {
    Video,
    Audio,
    Text,
    FragmentedText,
    Muxed,
}

impl MediaCategory {
    /// Initialization order used when a stream is activated.
    pub const INIT_ORDER: [MediaCategory; 5] = [
        MediaCategory::Video,
        MediaCategory::Audio,
        MediaCategory::Text,
        MediaCategory::FragmentedText,
        MediaCategory::Muxed,
    ];

    /// Text categories aggregate every candidate into a single pipeline.
    pub fn is_text(self) -> bool {
        matches!(self, MediaCategory::Text | MediaCategory::FragmentedText)
    }

    /// Only audio and video update errors are tracked.
    pub fn tracks_update_errors(self) -> bool {
        matches!(self, MediaCategory::Audio | MediaCategory::Video)
    }

    /// Categories whose pipelines take part in buffering-completed aggregation.
    pub fn counts_for_buffering(self) -> bool {
        matches!(
            self,
            MediaCategory::Audio | MediaCategory::Video | MediaCategory::FragmentedText
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaCategory::Video => "video",
            MediaCategory::Audio => "audio",
            MediaCategory::Text => "text",
            MediaCategory::FragmentedText => "fragmentedText",
            MediaCategory::Muxed => "muxed",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and timing of one stream segment (an MPD period).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub id: String,
    pub index: usize,
    /// Start of the segment in seconds.
    pub start: f64,
    /// Duration in seconds. Infinite for open-ended live periods.
    pub duration: f64,
}

/// One candidate track within a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Adaptation set id, or a generated one when the manifest has none.
    pub id: String,
    pub category: MediaCategory,
    /// Full codec string, e.g. `video/mp4;codecs="avc1.4d401f"`.
    pub codec: String,
    pub mime_type: String,
    pub content_protection: bool,
    /// Position of the track within its stream.
    pub index: usize,
    /// Bandwidth of every representation, in bits per second.
    pub bitrates: Vec<u64>,
    pub stream: StreamDescriptor,
}

impl TrackDescriptor {
    pub fn stream_id(&self) -> &str {
        &self.stream.id
    }
}

/// Identifies the event stream a scheduled event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventStreamKey {
    pub scheme_id_uri: String,
    pub value: String,
    pub timescale: u64,
}

/// A presentation-time scheduled event, declared inline in the manifest or inband in
/// segment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: u64,
    /// Raw presentation time in `stream.timescale` units.
    pub presentation_time: u64,
    /// Raw duration in `stream.timescale` units.
    pub duration: u64,
    pub stream: EventStreamKey,
}

impl ScheduledEvent {
    fn timescale(&self) -> f64 {
        // A zero timescale is treated as one unit per second.
        self.stream.timescale.max(1) as f64
    }

    /// Presentation time in seconds.
    pub fn presentation_seconds(&self) -> f64 {
        self.presentation_time as f64 / self.timescale()
    }

    /// End of the event in seconds.
    pub fn end_seconds(&self) -> f64 {
        self.presentation_time.saturating_add(self.duration) as f64 / self.timescale()
    }
}

/// Life-cycle state of a stream instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Uninitialized,
    Activating,
    Updating,
    Initialized,
    Deactivated,
}
