use thiserror::Error;

use crate::types::MediaCategory;

/// Errors surfaced by the stream orchestrator and the manifest boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    #[error("data update failed for {categories:?}")]
    DataUpdateFailed { categories: Vec<MediaCategory> },

    #[error("No streams to play.")]
    NoStreams,

    #[error("Multiplexed representations are intentionally not supported, as they are not compliant with the DASH-AVC/264 guidelines")]
    MultiplexedRepresentation,

    #[error("{category}Codec ({codec}) is not supported.")]
    UnsupportedCodec {
        category: MediaCategory,
        codec: String,
    },

    #[error("encrypted media is not supported")]
    EncryptedMediaUnsupported,

    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    #[error("manifest fetch error: {0}")]
    ManifestFetch(String),
}

impl StreamError {
    /// Numeric code carried by the aggregated initialization error.
    pub const DATA_UPDATE_FAILED_CODE: u32 = 1;

    pub fn code(&self) -> Option<u32> {
        match self {
            StreamError::DataUpdateFailed { .. } => Some(Self::DATA_UPDATE_FAILED_CODE),
            _ => None,
        }
    }
}

/// Category reported to the error sink for manifest-shape problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestErrorKind {
    Multiplexed,
    Codec,
    NoStreams,
}

impl ManifestErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ManifestErrorKind::Multiplexed => "multiplexedrep",
            ManifestErrorKind::Codec => "codec",
            ManifestErrorKind::NoStreams => "nostreams",
        }
    }
}
