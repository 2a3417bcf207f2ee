// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The audio backend seam.
//!
//! The playback core drives a [`MediaEngine`] through plain method calls and
//! learns about asynchronous outcomes (asset ready, asset failed, seek
//! finished) through [`EngineEvent`]s pushed into an [`EngineEventSender`].
//! Every asynchronous request carries a [`RequestToken`] so that the core can
//! recognise and drop completions that belong to a superseded request.

mod simulated;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use url::Url;

pub use simulated::SimulatedEngine;

/// Monotonically increasing identifier attached to an asynchronous request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Asynchronous notifications from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The asset requested with `token` is loaded and playable
    Ready {
        token: RequestToken,
        duration: Option<Duration>,
    },

    /// The asset requested with `token` could not be loaded
    Failed { token: RequestToken, reason: String },

    /// The seek requested with `token` has finished.
    ///
    /// `finished` is false when the engine gave up on the seek.
    SeekCompleted { token: RequestToken, finished: bool },
}

/// Thread-safe callback channel handed to an engine.
///
/// Sending never blocks and may be done from any thread, including threads
/// owned by the audio backend. Events are delivered to the control task.
#[derive(Debug, Clone)]
pub struct EngineEventSender {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineEventSender {
    /// Create a sender and the receiving end consumed by the control task
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event; silently dropped if the control task is gone
    pub fn send(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Audio playback backend driven by the playback core.
///
/// The core is the only caller. Implementations must report the outcome of
/// every [`load`](MediaEngine::load) and [`seek`](MediaEngine::seek) through
/// the sender passed to [`attach`](MediaEngine::attach), echoing the token
/// they were given.
pub trait MediaEngine: Send + 'static {
    /// Register the callback channel. Called once before any other method.
    fn attach(&mut self, events: EngineEventSender);

    /// Start loading an asset, replacing whatever is loaded
    fn load(&mut self, source: &Url, token: RequestToken);

    /// Release the loaded asset (if any); the engine becomes idle
    fn unload(&mut self);

    fn play(&mut self);

    fn pause(&mut self);

    /// Start seeking to an absolute position
    fn seek(&mut self, to: Duration, token: RequestToken);

    /// Current playback position of the loaded asset
    fn current_time(&self) -> Duration;

    /// Duration of the loaded asset, if known
    fn duration(&self) -> Option<Duration>;

    /// Whether the engine is actually rendering audio (rate > 0)
    fn is_playing(&self) -> bool;

    /// Pass-through volume in the range `0.0..=1.0`
    fn set_volume(&mut self, volume: f32);
}
