pub mod bus;
pub mod collab;
pub mod config;
pub mod error;
pub mod events;
pub mod loader;
pub mod mpd;
pub mod pipeline;
pub mod selection;
pub mod session;
pub mod stream;
pub mod types;

pub use bus::{Notification, NotificationBus, ProtectionErrorKind, StreamEvent};
pub use collab::Collaborators;
pub use config::StreamConfig;
pub use error::{ManifestErrorKind, StreamError};
pub use events::EventTimer;
pub use session::StreamSession;
pub use stream::StreamOrchestrator;
pub use types::{
    EventStreamKey, MediaCategory, ScheduledEvent, StreamDescriptor, StreamState, TrackDescriptor,
};
