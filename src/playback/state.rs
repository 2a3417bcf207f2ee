// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Serialize;

use crate::episode::Episode;
use crate::error::PlaybackError;

/// Lifecycle state of the player. Exactly one is active at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "episode", rename_all = "snake_case")]
pub enum PlaybackState {
    /// No asset loaded, engine idle
    #[default]
    Stopped,
    /// Asset loaded, playback never started
    Ready(Episode),
    Playing(Episode),
    /// Explicitly paused by the user
    Paused(Episode),
}

/// Discriminant of [`PlaybackState`], for logging and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Stopped,
    Ready,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Stopped => StateKind::Stopped,
            Self::Ready(_) => StateKind::Ready,
            Self::Playing(_) => StateKind::Playing,
            Self::Paused(_) => StateKind::Paused,
        }
    }

    /// The episode this state applies to
    pub fn episode(&self) -> Option<&Episode> {
        match self {
            Self::Stopped => None,
            Self::Ready(episode) | Self::Playing(episode) | Self::Paused(episode) => Some(episode),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing(_))
    }

    /// Whether an episode's asset is loaded in the engine
    pub fn is_loaded(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// User intents handled by the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackRequest {
    Play,
    Pause,
    Stop,
}

/// What the controller has to do to honour a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Stopped + Play: load the last selected episode with autoplay intent
    Prepare,
    /// Ready/Paused + Play: `engine.play()`, enter `Playing`
    Start(Episode),
    /// Playing + Pause: `engine.pause()`, enter `Paused`
    Suspend(Episode),
    /// Ready/Playing/Paused + Stop: pause, unload, enter `Stopped`
    Teardown,
}

/// The single transition table of the player.
///
/// Requests that have no effect in the current state come back as
/// [`PlaybackError::InvalidTransition`]; callers log them and move on.
pub(crate) fn plan(
    state: &PlaybackState,
    request: PlaybackRequest,
) -> Result<Transition, PlaybackError> {
    use PlaybackRequest::*;

    match (state, request) {
        (PlaybackState::Stopped, Play) => Ok(Transition::Prepare),
        (PlaybackState::Ready(episode) | PlaybackState::Paused(episode), Play) => {
            Ok(Transition::Start(episode.clone()))
        }
        (PlaybackState::Playing(episode), Pause) => Ok(Transition::Suspend(episode.clone())),
        (
            PlaybackState::Ready(_) | PlaybackState::Playing(_) | PlaybackState::Paused(_),
            Stop,
        ) => Ok(Transition::Teardown),
        (state, request) => Err(PlaybackError::InvalidTransition {
            state: state.kind(),
            request,
        }),
    }
}
