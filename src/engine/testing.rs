// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use url::Url;

use super::{EngineEvent, EngineEventSender, MediaEngine, RequestToken};

/// A call the core made on the engine
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EngineCall {
    Load(Url, RequestToken),
    Unload,
    Play,
    Pause,
    Seek(Duration, RequestToken),
    SetVolume(f32),
}

#[derive(Default)]
struct Recorded {
    calls: Vec<EngineCall>,
    events: Option<EngineEventSender>,
    position: Duration,
    duration: Option<Duration>,
    playing: bool,
}

/// Engine double that records calls and never completes anything by itself.
///
/// Clones share state, so a test keeps one clone while the core owns another
/// and injects callbacks with [`RecordingEngine::emit`].
#[derive(Clone, Default)]
pub(crate) struct RecordingEngine {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingEngine {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<EngineCall> {
        std::mem::take(&mut self.lock().calls)
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Seek(to, _) => Some(to),
                _ => None,
            })
            .collect()
    }

    pub fn last_load_token(&self) -> Option<RequestToken> {
        self.calls().into_iter().rev().find_map(|call| match call {
            EngineCall::Load(_, token) => Some(token),
            _ => None,
        })
    }

    pub fn last_seek_token(&self) -> Option<RequestToken> {
        self.calls().into_iter().rev().find_map(|call| match call {
            EngineCall::Seek(_, token) => Some(token),
            _ => None,
        })
    }

    pub fn set_position(&self, position: Duration) {
        self.lock().position = position;
    }

    pub fn set_duration(&self, duration: Option<Duration>) {
        self.lock().duration = duration;
    }

    /// Force the engine's rate without going through the core
    pub fn set_playing(&self, playing: bool) {
        self.lock().playing = playing;
    }

    /// Deliver a callback through the channel registered by `attach`
    pub fn emit(&self, event: EngineEvent) {
        let sender = self.lock().events.clone();
        sender.expect("engine not attached").send(event);
    }
}

impl MediaEngine for RecordingEngine {
    fn attach(&mut self, events: EngineEventSender) {
        self.lock().events = Some(events);
    }

    fn load(&mut self, source: &Url, token: RequestToken) {
        let mut recorded = self.lock();
        recorded.calls.push(EngineCall::Load(source.clone(), token));
        recorded.position = Duration::ZERO;
        recorded.playing = false;
    }

    fn unload(&mut self) {
        let mut recorded = self.lock();
        recorded.calls.push(EngineCall::Unload);
        recorded.playing = false;
    }

    fn play(&mut self) {
        let mut recorded = self.lock();
        recorded.calls.push(EngineCall::Play);
        recorded.playing = true;
    }

    fn pause(&mut self) {
        let mut recorded = self.lock();
        recorded.calls.push(EngineCall::Pause);
        recorded.playing = false;
    }

    fn seek(&mut self, to: Duration, token: RequestToken) {
        self.lock().calls.push(EngineCall::Seek(to, token));
    }

    fn current_time(&self) -> Duration {
        self.lock().position
    }

    fn duration(&self) -> Option<Duration> {
        self.lock().duration
    }

    fn is_playing(&self) -> bool {
        self.lock().playing
    }

    fn set_volume(&mut self, volume: f32) {
        self.lock().calls.push(EngineCall::SetVolume(volume));
    }
}
