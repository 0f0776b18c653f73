use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::bus::Notification;
use crate::collab::TrackSelector;
use crate::types::{MediaCategory, StreamDescriptor, TrackDescriptor};

/// Registration-order track policy: the first registered track of a category is the
/// initial one until another is selected.
#[derive(Default)]
pub struct TrackRegistry {
    inner: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    tracks: HashMap<(String, MediaCategory), Vec<TrackDescriptor>>,
    current: HashMap<(String, MediaCategory), TrackDescriptor>,
}

impl TrackRegistry {
    pub fn tracks_for(&self, category: MediaCategory, stream: &StreamDescriptor) -> Vec<TrackDescriptor> {
        self.inner
            .lock()
            .tracks
            .get(&(stream.id.clone(), category))
            .cloned()
            .unwrap_or_default()
    }

    /// Makes `track` current. Returns the track-change notification to deliver, or
    /// `None` when it already was current.
    pub fn select(&self, track: TrackDescriptor) -> Option<Notification> {
        let mut inner = self.inner.lock();
        let key = (track.stream.id.clone(), track.category);
        let old = inner.current.insert(key, track.clone());
        match old {
            Some(old) if old.id == track.id => None,
            Some(old) => {
                debug!("Track for {} changed from {} to {}", track.category, old.id, track.id);
                Some(Notification::TrackChanged { old, new: track })
            }
            None => None,
        }
    }
}

impl TrackSelector for TrackRegistry {
    fn is_multi_track_supported(&self, category: MediaCategory) -> bool {
        !matches!(category, MediaCategory::Muxed)
    }

    fn add_track(&self, track: &TrackDescriptor) {
        let mut inner = self.inner.lock();
        let list = inner
            .tracks
            .entry((track.stream.id.clone(), track.category))
            .or_default();
        if !list.iter().any(|t| t.id == track.id) {
            list.push(track.clone());
        }
    }

    fn check_initial_settings(&self, stream: &StreamDescriptor) {
        let mut inner = self.inner.lock();
        let Registry { tracks, current } = &mut *inner;
        for ((stream_id, category), list) in tracks.iter() {
            if stream_id != &stream.id {
                continue;
            }
            if let Some(first) = list.first() {
                current
                    .entry((stream_id.clone(), *category))
                    .or_insert_with(|| first.clone());
            }
        }
    }

    fn current_track_for(&self, category: MediaCategory, stream: &StreamDescriptor) -> Option<TrackDescriptor> {
        self.inner.lock().current.get(&(stream.id.clone(), category)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> StreamDescriptor {
        StreamDescriptor { id: "p0".into(), index: 0, start: 0.0, duration: 10.0 }
    }

    fn track(id: &str) -> TrackDescriptor {
        TrackDescriptor {
            id: id.into(),
            category: MediaCategory::Audio,
            codec: "audio/mp4;codecs=\"mp4a.40.2\"".into(),
            mime_type: "audio/mp4".into(),
            content_protection: false,
            index: 0,
            bitrates: vec![],
            stream: stream(),
        }
    }

    #[test]
    fn first_registered_track_is_initial() {
        let registry = TrackRegistry::default();
        registry.add_track(&track("en"));
        registry.add_track(&track("fr"));
        registry.add_track(&track("en"));
        registry.check_initial_settings(&stream());

        assert_eq!(registry.tracks_for(MediaCategory::Audio, &stream()).len(), 2);
        let current = registry.current_track_for(MediaCategory::Audio, &stream()).unwrap();
        assert_eq!(current.id, "en");
    }

    #[test]
    fn selecting_another_track_yields_a_change() {
        let registry = TrackRegistry::default();
        registry.add_track(&track("en"));
        registry.check_initial_settings(&stream());

        assert!(registry.select(track("en")).is_none());
        match registry.select(track("fr")) {
            Some(Notification::TrackChanged { old, new }) => {
                assert_eq!(old.id, "en");
                assert_eq!(new.id, "fr");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
