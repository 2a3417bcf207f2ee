use std::sync::Arc;
#[cfg(test)]
use std::sync::Mutex;

use serde::Serialize;

use crate::episode::Episode;
use crate::playback::{PlaybackState, ProgressSnapshot};

/// Notifications published by the playback core to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// A transition was committed; the state is already current
    StateChanged { state: PlaybackState },

    /// Latest playback position
    Progress { snapshot: ProgressSnapshot },

    /// The selected episode could not be loaded; the session is `Stopped`
    LoadFailed { episode: Episode, reason: String },
}

/// Sink for playback notifications.
///
/// Called from the playback control task, strictly in the order the
/// transitions happened. Implementations must be cheap and must not call
/// back into the player synchronously.
pub trait PlaybackObserver: Send + Sync {
    fn notify(&self, event: PlayerEvent);
}

/// A shared reference to an observer
pub type SharedObserver = Arc<dyn PlaybackObserver>;

/// An observer that silently ignores all events.
/// Useful for tests or headless use through the watch channels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PlaybackObserver for NoopObserver {
    fn notify(&self, _event: PlayerEvent) {}
}

impl NoopObserver {
    pub fn shared() -> SharedObserver {
        Arc::new(Self)
    }
}

/// An observer that keeps every event in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<PlayerEvent>>,
}

#[cfg(test)]
impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Only the committed states, in notification order
    pub fn states(&self) -> Vec<PlaybackState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PlayerEvent::StateChanged { state } => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PlayerEvent::Progress { snapshot } => Some(snapshot),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

#[cfg(test)]
impl PlaybackObserver for RecordingObserver {
    fn notify(&self, event: PlayerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::episode::Episode;
    use url::Url;

    fn episode() -> Episode {
        Episode::new("ep-1", "Episode 1", Url::parse("https://example.com/1.mp3").unwrap())
    }

    #[test]
    fn noop_observer_handles_all_events() {
        let observer = NoopObserver;

        observer.notify(PlayerEvent::StateChanged {
            state: PlaybackState::Playing(episode()),
        });
        observer.notify(PlayerEvent::Progress {
            snapshot: ProgressSnapshot::empty(),
        });
        observer.notify(PlayerEvent::LoadFailed {
            episode: episode(),
            reason: "Connection timeout".to_string(),
        });
    }

    #[test]
    fn recording_observer_splits_streams() {
        let observer = RecordingObserver::new();

        observer.notify(PlayerEvent::StateChanged {
            state: PlaybackState::Ready(episode()),
        });
        observer.notify(PlayerEvent::Progress {
            snapshot: ProgressSnapshot::empty(),
        });
        observer.notify(PlayerEvent::StateChanged {
            state: PlaybackState::Stopped,
        });

        assert_eq!(
            observer.states(),
            vec![PlaybackState::Ready(episode()), PlaybackState::Stopped]
        );
        assert_eq!(observer.snapshots().len(), 1);

        observer.clear();
        assert!(observer.events().is_empty());
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(PlayerEvent::StateChanged {
            state: PlaybackState::Stopped,
        })
        .unwrap();

        assert_eq!(json["event"], "state_changed");
        assert_eq!(json["state"]["state"], "stopped");
    }
}
