use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::episode::EpisodeId;
use crate::playback::{PlaybackRequest, StateKind};

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Episode '{title}' has no enclosure (audio file)")]
    MissingEnclosure { title: String },
}

/// Failures inside the playback core.
///
/// None of these cross a public call: load failures are reported to the
/// observer, everything else is logged and absorbed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("Episode {episode} failed to load: {reason}")]
    LoadFailed { episode: EpisodeId, reason: String },

    #[error("Seek to {target:?} failed: {reason}")]
    SeekFailed { target: Duration, reason: String },

    #[error("{request:?} has no effect while {state:?}")]
    InvalidTransition {
        state: StateKind,
        request: PlaybackRequest,
    },
}

/// Errors returned by [`crate::PlayerHandle`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerError {
    #[error("Playback service has stopped")]
    ServiceStopped,
}
