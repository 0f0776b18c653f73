use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bus::Notification;
use crate::loader::ManifestUpdate;
use crate::mpd::MpdAdapter;
use crate::stream::StreamOrchestrator;

/// Serializes notifications and manifest refreshes onto a single control loop that owns
/// the orchestrator.
pub struct StreamSession {
    orchestrator: StreamOrchestrator,
    adapter: Arc<MpdAdapter>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    manifests: mpsc::UnboundedReceiver<ManifestUpdate>,
}

impl StreamSession {
    pub fn new(
        orchestrator: StreamOrchestrator,
        adapter: Arc<MpdAdapter>,
        notifications: mpsc::UnboundedReceiver<Notification>,
        manifests: mpsc::UnboundedReceiver<ManifestUpdate>,
    ) -> Self {
        Self {
            orchestrator,
            adapter,
            notifications,
            manifests,
        }
    }

    pub fn orchestrator(&self) -> &StreamOrchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut StreamOrchestrator {
        &mut self.orchestrator
    }

    /// Runs until cancelled or until both inbound channels close, then resets the stream
    /// and hands the orchestrator back.
    pub async fn run(mut self, cancel: CancellationToken) -> StreamOrchestrator {
        let mut notifications_open = true;
        let mut manifests_open = true;
        while notifications_open || manifests_open {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Stream session stopped.");
                    break;
                }
                notification = self.notifications.recv(), if notifications_open => match notification {
                    Some(notification) => {
                        self.orchestrator.handle(notification);
                    }
                    None => notifications_open = false,
                },
                update = self.manifests.recv(), if manifests_open => match update {
                    Some(update) => self.apply_manifest(update),
                    None => manifests_open = false,
                },
            }
        }
        self.orchestrator.reset(false);
        self.orchestrator
    }

    /// Installs a refreshed manifest and pushes the matching stream into the orchestrator.
    pub fn apply_manifest(&mut self, update: ManifestUpdate) {
        let manifest = match update {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("Keeping current manifest: {}", e);
                return;
            }
        };
        self.adapter.replace(manifest);

        let Some(id) = self.orchestrator.id().map(str::to_string) else {
            return;
        };
        match self.adapter.stream(&id) {
            Some(stream) => self.orchestrator.update_data(stream),
            None => warn!("Stream {} is no longer in the manifest", id),
        }
    }
}
