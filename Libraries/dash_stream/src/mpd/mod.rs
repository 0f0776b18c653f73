//! DASH manifest data structures (MPD and related types).
//! These hold the parts of an MPD a stream needs: periods, adaptation sets and inline
//! event streams.

pub mod adapter;
pub mod builder;
pub mod parser;

use chrono::{DateTime, Utc};

use crate::types::{EventStreamKey, MediaCategory, ScheduledEvent, StreamDescriptor};

pub use adapter::MpdAdapter;
pub use builder::MpdBuilder;
pub use parser::parse_mpd;

/// Whether the presentation is on-demand or live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationType {
    Static,
    Dynamic,
}

/// A single representation within an adaptation set.
#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    pub id: String,
    /// Average bandwidth in bits per second (bps).
    pub bandwidth: u64,
    pub codecs: Option<String>,
    pub mime_type: Option<String>,
}

/// An adaptation set groups representations of the same content (one track).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdaptationSet {
    pub id: Option<String>,
    /// Content type attribute, when the manifest declares one.
    pub content_type: Option<String>,
    /// MIME type of the media (e.g., "video/mp4").
    pub mime_type: String,
    pub codecs: Option<String>,
    /// True when a ContentProtection descriptor is present.
    pub content_protection: bool,
    /// Content types of ContentComponent children; more than one kind means multiplexed.
    pub component_types: Vec<String>,
    pub representations: Vec<Representation>,
}

impl AdaptationSet {
    /// Media category of the set, or `None` for content a stream cannot handle at all.
    pub fn category(&self) -> Option<MediaCategory> {
        let has = |kind: &str| self.component_types.iter().any(|c| c == kind);
        if has("video") && has("audio") {
            return Some(MediaCategory::Muxed);
        }

        let mime = self.mime_type.as_str();
        let codecs = self.codecs().unwrap_or_default();
        let fragmented_text_codec = codecs.starts_with("stpp") || codecs.starts_with("wvtt");
        let content = self.content_type.as_deref().unwrap_or_else(|| infer_content_type(mime));

        match content {
            "video" => Some(MediaCategory::Video),
            "audio" => Some(MediaCategory::Audio),
            "text" if mime == "application/mp4" || fragmented_text_codec => {
                Some(MediaCategory::FragmentedText)
            }
            "text" => Some(MediaCategory::Text),
            _ if mime == "application/mp4" && fragmented_text_codec => {
                Some(MediaCategory::FragmentedText)
            }
            _ => None,
        }
    }

    /// Codecs declared on the set, falling back to its first representation.
    pub fn codecs(&self) -> Option<&str> {
        self.codecs
            .as_deref()
            .or_else(|| self.representations.iter().find_map(|r| r.codecs.as_deref()))
    }

    /// Codec string in the `mime;codecs="..."` form capability checks expect.
    pub fn codec_string(&self) -> String {
        match self.codecs() {
            Some(codecs) => format!("{};codecs=\"{}\"", self.mime_type, codecs),
            None => self.mime_type.clone(),
        }
    }
}

fn infer_content_type(mime_type: &str) -> &str {
    if mime_type.contains("audio") {
        "audio"
    } else if mime_type.contains("video") {
        "video"
    } else if mime_type.starts_with("text/") || mime_type.contains("ttml") {
        "text"
    } else {
        ""
    }
}

/// One Event element of an inline event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineEvent {
    pub id: u64,
    pub presentation_time: u64,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventStream {
    pub scheme_id_uri: String,
    pub value: String,
    pub timescale: u64,
    pub events: Vec<InlineEvent>,
}

impl EventStream {
    pub fn scheduled_events(&self) -> impl Iterator<Item = ScheduledEvent> + '_ {
        let key = EventStreamKey {
            scheme_id_uri: self.scheme_id_uri.clone(),
            value: self.value.clone(),
            timescale: self.timescale,
        };
        self.events.iter().map(move |e| ScheduledEvent {
            id: e.id,
            presentation_time: e.presentation_time,
            duration: e.duration,
            stream: key.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Period {
    pub id: Option<String>,
    /// Start in seconds.
    pub start: Option<f64>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    pub adaptation_sets: Vec<AdaptationSet>,
    pub event_streams: Vec<EventStream>,
}

/// Top-level metadata parsed from an MPD file.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Address the manifest was loaded from.
    pub url: String,
    /// Redirect target declared by a Location element.
    pub location: Option<String>,
    pub presentation_type: PresentationType,
    pub availability_start_time: Option<DateTime<Utc>>,
    pub media_presentation_duration: Option<f64>,
    pub minimum_update_period: Option<f64>,
    pub periods: Vec<Period>,
}

impl Manifest {
    /// Stream descriptors for every period. Missing starts follow the previous period,
    /// missing durations run to the next period or to the end of the presentation.
    pub fn streams(&self) -> Vec<StreamDescriptor> {
        let mut starts = Vec::with_capacity(self.periods.len());
        let mut next_start = 0.0;
        for period in &self.periods {
            let start = period.start.unwrap_or(next_start);
            starts.push(start);
            next_start = period.duration.map(|d| start + d).unwrap_or(f64::INFINITY);
        }

        self.periods
            .iter()
            .enumerate()
            .map(|(index, period)| {
                let start = starts[index];
                let duration = period.duration.unwrap_or_else(|| {
                    match starts.get(index + 1) {
                        Some(next) => next - start,
                        None => self
                            .media_presentation_duration
                            .map(|total| total - start)
                            .unwrap_or(f64::INFINITY),
                    }
                });
                StreamDescriptor {
                    id: period
                        .id
                        .clone()
                        .unwrap_or_else(|| format!("defaultId_{}", index)),
                    index,
                    start,
                    duration,
                }
            })
            .collect()
    }

    pub fn period_for(&self, stream: &StreamDescriptor) -> Option<&Period> {
        self.periods
            .iter()
            .enumerate()
            .find(|(index, period)| match &period.id {
                Some(id) => *id == stream.id,
                None => *index == stream.index,
            })
            .map(|(_, period)| period)
    }
}
