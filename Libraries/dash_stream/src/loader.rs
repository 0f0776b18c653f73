use std::path::Path;

use reqwest::Client;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::collab::ManifestLoader;
use crate::error::StreamError;
use crate::mpd::{parse_mpd, Manifest};

/// Outcome of a manifest load, delivered to the control loop.
pub type ManifestUpdate = Result<Manifest, StreamError>;

/// Fetches a manifest over HTTP and parses it.
pub async fn fetch_manifest(client: &Client, url: &str) -> ManifestUpdate {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| StreamError::ManifestFetch(format!("Failed to fetch MPD: {e}")))?;
    if !response.status().is_success() {
        return Err(StreamError::ManifestFetch(format!(
            "Received {} from {}",
            response.status(),
            url
        )));
    }
    let text = response
        .text()
        .await
        .map_err(|e| StreamError::ManifestFetch(format!("Failed to read MPD: {e}")))?;
    parse_mpd(&text, url).map_err(|e| StreamError::ManifestParse(format!("MPD parse error: {e}")))
}

/// Loads a manifest from an `http(s)` URL or a local path.
pub async fn load_manifest(client: &Client, source: &str) -> ManifestUpdate {
    if source.starts_with("http://") || source.starts_with("https://") {
        return fetch_manifest(client, source).await;
    }
    let text = tokio::fs::read_to_string(Path::new(source))
        .await
        .map_err(|e| StreamError::ManifestFetch(format!("Failed to read {source}: {e}")))?;
    parse_mpd(&text, source).map_err(|e| StreamError::ManifestParse(format!("MPD parse error: {e}")))
}

/// Reloads manifests in the background and hands every outcome to a channel.
pub struct HttpManifestLoader {
    client: Client,
    runtime: Handle,
    updates: mpsc::UnboundedSender<ManifestUpdate>,
}

impl HttpManifestLoader {
    /// Must be called from within a tokio runtime.
    pub fn new(client: Client) -> (Self, mpsc::UnboundedReceiver<ManifestUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                client,
                runtime: Handle::current(),
                updates: tx,
            },
            rx,
        )
    }
}

impl ManifestLoader for HttpManifestLoader {
    fn load(&self, url: &str) {
        let client = self.client.clone();
        let updates = self.updates.clone();
        let url = url.to_string();
        self.runtime.spawn(async move {
            let update = load_manifest(&client, &url).await;
            match &update {
                Ok(_) => info!("MPD refreshed from {}", url),
                Err(e) => warn!("{}", e),
            }
            let _ = updates.send(update);
        });
    }
}
