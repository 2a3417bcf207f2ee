pub mod engine;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod observer;
pub mod playback;

// Re-export main types for convenience
pub use engine::{EngineEvent, EngineEventSender, MediaEngine, RequestToken, SimulatedEngine};
pub use episode::{Episode, EpisodeId};
pub use error::{FeedError, PlaybackError, PlayerError};
pub use feed::{Podcast, fetch_feed, is_url, load_feed, parse_duration, parse_feed, parse_feed_file};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use observer::{NoopObserver, PlaybackObserver, PlayerEvent, SharedObserver};
pub use playback::{
    PlaybackController, PlaybackRequest, PlaybackState, PlayerHandle, PlayerOptions, PlayerService,
    ProgressSnapshot, StateKind, format_time,
};
