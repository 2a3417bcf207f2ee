// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::engine::RequestToken;
use crate::episode::Episode;

use super::state::PlaybackState;

/// Hands out strictly increasing request tokens
#[derive(Debug, Default)]
pub(crate) struct TokenSource {
    last: u64,
}

impl TokenSource {
    pub fn next(&mut self) -> RequestToken {
        self.last += 1;
        RequestToken::new(self.last)
    }
}

/// A load that has been handed to the engine and not yet answered
#[derive(Debug, Clone)]
pub(crate) struct PendingLoad {
    pub episode: Episode,
    pub token: RequestToken,
}

/// The aggregate owned by the playback core.
///
/// Only the controller mutates it, and only from the control task.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub state: PlaybackState,
    /// Episode whose asset the engine holds or is loading.
    /// Leads `state` while a load is in flight.
    pub loaded: Option<Episode>,
    pub pending_load: Option<PendingLoad>,
    /// Single-use intent to start playback once the pending load is ready
    pub auto_play_requested: bool,
    /// Last episode the user selected, kept across Stop for a later Play
    pub last_selected: Option<Episode>,
    pub tokens: TokenSource,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the autoplay intent, clearing it
    pub fn take_auto_play(&mut self) -> bool {
        std::mem::take(&mut self.auto_play_requested)
    }

    pub fn is_loading(&self) -> bool {
        self.pending_load.is_some()
    }

    /// Whether `episode` is the one the engine holds or is loading
    pub fn holds(&self, episode: &Episode) -> bool {
        self.loaded.as_ref() == Some(episode)
    }

    /// Forget the engine-side item; state is left to the caller
    pub fn clear_loaded(&mut self) {
        self.loaded = None;
        self.pending_load = None;
        self.auto_play_requested = false;
    }
}
