use parking_lot::RwLock;
use tracing::debug;

use crate::collab::{ManifestAdapter, ManifestModel};
use crate::mpd::Manifest;
use crate::types::{MediaCategory, ScheduledEvent, StreamDescriptor, TrackDescriptor};

/// Serves tracks and inline events from the most recently loaded MPD.
pub struct MpdAdapter {
    manifest: RwLock<Manifest>,
}

impl MpdAdapter {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest: RwLock::new(manifest),
        }
    }

    /// Swaps in a refreshed manifest.
    pub fn replace(&self, manifest: Manifest) {
        debug!("Replacing manifest loaded from {}", manifest.url);
        *self.manifest.write() = manifest;
    }

    pub fn manifest(&self) -> Manifest {
        self.manifest.read().clone()
    }

    pub fn streams(&self) -> Vec<StreamDescriptor> {
        self.manifest.read().streams()
    }

    /// The stream with the given id in the current manifest.
    pub fn stream(&self, id: &str) -> Option<StreamDescriptor> {
        self.streams().into_iter().find(|s| s.id == id)
    }
}

impl ManifestAdapter for MpdAdapter {
    fn tracks_for(&self, stream: &StreamDescriptor, category: MediaCategory) -> Vec<TrackDescriptor> {
        let manifest = self.manifest.read();
        let Some(period) = manifest.period_for(stream) else {
            return vec![];
        };

        period
            .adaptation_sets
            .iter()
            .enumerate()
            .filter(|(_, set)| set.category() == Some(category))
            .map(|(index, set)| TrackDescriptor {
                id: set
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("{}_{}", stream.id, index)),
                category,
                codec: set.codec_string(),
                mime_type: set.mime_type.clone(),
                content_protection: set.content_protection,
                index,
                bitrates: set.representations.iter().map(|r| r.bandwidth).collect(),
                stream: stream.clone(),
            })
            .collect()
    }

    fn track_for(
        &self,
        stream: &StreamDescriptor,
        category: MediaCategory,
        current: Option<&TrackDescriptor>,
    ) -> Option<TrackDescriptor> {
        let tracks = self.tracks_for(stream, category);
        if let Some(current) = current {
            let same = tracks
                .iter()
                .position(|t| t.id == current.id)
                .or_else(|| tracks.iter().position(|t| t.index == current.index));
            if let Some(position) = same {
                return tracks.into_iter().nth(position);
            }
        }
        tracks.into_iter().next()
    }

    fn events_for(&self, stream: &StreamDescriptor) -> Vec<ScheduledEvent> {
        let manifest = self.manifest.read();
        manifest
            .period_for(stream)
            .map(|period| {
                period
                    .event_streams
                    .iter()
                    .flat_map(|es| es.scheduled_events())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ManifestModel for MpdAdapter {
    fn url(&self) -> String {
        self.manifest.read().url.clone()
    }

    fn location(&self) -> Option<String> {
        self.manifest.read().location.clone()
    }
}
