// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::{EngineEvent, EngineEventSender, MediaEngine, RequestToken};
use crate::episode::Episode;
use crate::error::PlaybackError;
use crate::observer::{PlayerEvent, SharedObserver};

use super::progress::ProgressSnapshot;
use super::seek::SeekCoordinator;
use super::session::{PendingLoad, Session};
use super::state::{self, PlaybackRequest, PlaybackState, Transition};

/// Owns the session and the engine, and applies every user intent and
/// engine callback to them.
///
/// Not thread-safe by itself: the service runs it on a single task. All
/// notifications are delivered before the mutating call returns.
pub struct PlaybackController<E: MediaEngine> {
    engine: E,
    observer: SharedObserver,
    session: Session,
    seeks: SeekCoordinator,
    state_tx: watch::Sender<PlaybackState>,
    progress_tx: watch::Sender<ProgressSnapshot>,
}

impl<E: MediaEngine> PlaybackController<E> {
    /// Take ownership of `engine` and route its callbacks into `events`
    pub fn new(
        mut engine: E,
        observer: SharedObserver,
        events: EngineEventSender,
        seek_debounce: Duration,
    ) -> Self {
        engine.attach(events);
        let (state_tx, _) = watch::channel(PlaybackState::Stopped);
        let (progress_tx, _) = watch::channel(ProgressSnapshot::empty());

        Self {
            engine,
            observer,
            session: Session::new(),
            seeks: SeekCoordinator::new(seek_debounce),
            state_tx,
            progress_tx,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.session.state
    }

    /// Episode held by the engine, including one still loading
    pub fn loaded_episode(&self) -> Option<&Episode> {
        self.session.loaded.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.session.is_loading()
    }

    pub fn auto_play_requested(&self) -> bool {
        self.session.auto_play_requested
    }

    pub fn is_scrubbing(&self) -> bool {
        self.seeks.is_scrubbing()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }

    /// Make `episode` the current one.
    ///
    /// Re-selecting the loaded episode never restarts it; it only resumes a
    /// paused episode when `auto_play` is set. A different episode tears the
    /// current one down completely before its own load starts.
    pub fn select_episode(&mut self, episode: Episode, auto_play: bool) {
        self.session.last_selected = Some(episode.clone());

        if self.session.holds(&episode) {
            if self.session.is_loading() {
                if auto_play {
                    info!(episode = %episode.id, "queueing autoplay for episode still loading");
                    self.session.auto_play_requested = true;
                }
                return;
            }

            if auto_play && matches!(self.session.state, PlaybackState::Paused(_)) {
                self.request(PlaybackRequest::Play);
            } else {
                info!(episode = %episode.id, state = ?self.session.state.kind(), "episode already loaded");
            }
            return;
        }

        self.teardown();
        self.begin_load(episode, auto_play);
    }

    /// Apply a user intent through the transition table
    pub fn request(&mut self, request: PlaybackRequest) {
        if self.session.is_loading() {
            self.queue_while_loading(request);
            return;
        }

        match state::plan(&self.session.state, request) {
            Ok(Transition::Prepare) => match self.session.last_selected.clone() {
                Some(episode) => self.begin_load(episode, true),
                None => info!("play requested with no episode selected"),
            },
            Ok(Transition::Start(episode)) => {
                self.engine.play();
                self.commit(PlaybackState::Playing(episode));
                self.refresh_progress();
            }
            Ok(Transition::Suspend(episode)) => {
                self.engine.pause();
                self.commit(PlaybackState::Paused(episode));
                self.refresh_progress();
            }
            Ok(Transition::Teardown) => self.teardown(),
            Err(err) => info!("ignoring request: {err}"),
        }
    }

    /// Play when not playing, pause when playing
    pub fn toggle(&mut self) {
        let request = if self.session.is_loading() {
            if self.session.auto_play_requested {
                PlaybackRequest::Pause
            } else {
                PlaybackRequest::Play
            }
        } else if self.session.state.is_playing() {
            PlaybackRequest::Pause
        } else {
            PlaybackRequest::Play
        };
        self.request(request);
    }

    /// Until the engine answers a load, Play and Pause only set the intent
    fn queue_while_loading(&mut self, request: PlaybackRequest) {
        match request {
            PlaybackRequest::Play => {
                info!("load in flight, play will start once ready");
                self.session.auto_play_requested = true;
            }
            PlaybackRequest::Pause => {
                info!("load in flight, cancelling autoplay");
                self.session.auto_play_requested = false;
            }
            PlaybackRequest::Stop => self.teardown(),
        }
    }

    /// Apply an engine callback. Callbacks for superseded requests are dropped.
    pub fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Ready { token, duration } => self.on_ready(token, duration),
            EngineEvent::Failed { token, reason } => self.on_failed(token, reason),
            EngineEvent::SeekCompleted { token, finished } => self.on_seek_completed(token, finished),
        }
    }

    fn take_pending_load(&mut self, token: RequestToken) -> Option<PendingLoad> {
        let current = self
            .session
            .pending_load
            .as_ref()
            .is_some_and(|pending| pending.token == token);
        if !current {
            debug!(%token, "discarding stale load callback");
            return None;
        }
        self.session.pending_load.take()
    }

    fn on_ready(&mut self, token: RequestToken, duration: Option<Duration>) {
        let Some(PendingLoad { episode, .. }) = self.take_pending_load(token) else {
            return;
        };
        debug!(episode = %episode.id, ?duration, "engine ready");

        if self.session.take_auto_play() {
            self.engine.play();
            self.commit(PlaybackState::Playing(episode));
        } else {
            self.commit(PlaybackState::Ready(episode));
        }
        self.refresh_progress();
    }

    fn on_failed(&mut self, token: RequestToken, reason: String) {
        let Some(PendingLoad { episode, .. }) = self.take_pending_load(token) else {
            return;
        };
        let err = PlaybackError::LoadFailed {
            episode: episode.id.clone(),
            reason: reason.clone(),
        };
        warn!("{err}");

        self.engine.unload();
        self.session.clear_loaded();
        self.seeks.reset();
        self.commit(PlaybackState::Stopped);
        self.observer
            .notify(PlayerEvent::LoadFailed { episode, reason });
    }

    fn on_seek_completed(&mut self, token: RequestToken, finished: bool) {
        let Some(seek) = self.seeks.complete(token) else {
            debug!(%token, "discarding stale seek completion");
            return;
        };

        if !finished {
            let err = PlaybackError::SeekFailed {
                target: seek.target,
                reason: "engine did not finish the seek".to_string(),
            };
            warn!("{err}");
        } else if self.session.state.is_playing() && !self.engine.is_playing() {
            self.engine.play();
        }
        self.refresh_progress();
    }

    /// Track a drag on the progress bar without touching the engine
    pub fn request_seek(&mut self, fraction: f64) {
        if !self.session.state.is_loaded() {
            info!("ignoring scrub with no episode loaded");
            return;
        }
        self.seeks.scrub(fraction);
        self.refresh_progress();
    }

    /// Commit a drag release; the engine seek follows after the debounce window
    pub fn commit_seek(&mut self, fraction: f64, now: Instant) {
        if !self.session.state.is_loaded() {
            info!("ignoring seek with no episode loaded");
            return;
        }
        self.seeks.commit(fraction, now);
    }

    /// When a debounced seek becomes due
    pub fn seek_deadline(&self) -> Option<Instant> {
        self.seeks.deadline()
    }

    /// Send the pending seek to the engine if its window has passed
    pub fn dispatch_due_seek(&mut self, now: Instant) {
        let Some(fraction) = self.seeks.take_due(now) else {
            return;
        };
        if !self.session.state.is_loaded() {
            return;
        }

        match self.known_duration() {
            Some(duration) => self.dispatch_seek(duration.mul_f64(fraction)),
            None => {
                let err = PlaybackError::SeekFailed {
                    target: Duration::ZERO,
                    reason: "duration is not known yet".to_string(),
                };
                warn!("{err}");
                self.refresh_progress();
            }
        }
    }

    /// Jump relative to the current position, clamped to the episode
    pub fn skip(&mut self, seconds: f64) {
        if !self.session.state.is_loaded() {
            info!("ignoring skip with no episode loaded");
            return;
        }

        let current = self.engine.current_time().as_secs_f64();
        let mut target = (current + seconds).max(0.0);
        if let Some(duration) = self.known_duration() {
            target = target.min(duration.as_secs_f64());
        }

        self.seeks.reset();
        self.dispatch_seek(Duration::try_from_secs_f64(target).unwrap_or_default());
    }

    fn dispatch_seek(&mut self, target: Duration) {
        let token = self.session.tokens.next();
        debug!(%token, ?target, "seeking");
        self.seeks.dispatched(token, target);
        self.engine.seek(target, token);
    }

    fn known_duration(&self) -> Option<Duration> {
        self.engine.duration().filter(|d| !d.is_zero())
    }

    /// One sampling step of the progress synchronizer.
    ///
    /// Only samples while `Playing`. If the engine stopped rendering on its
    /// own, the player either reached the end (committed as `Paused`) or
    /// diverged, in which case `play()` is issued again.
    pub fn tick(&mut self) {
        let PlaybackState::Playing(episode) = &self.session.state else {
            return;
        };

        if !self.engine.is_playing() {
            let at_end = self
                .known_duration()
                .is_some_and(|duration| self.engine.current_time() >= duration);
            if at_end {
                info!(episode = %episode.id, "reached end of episode");
                let episode = episode.clone();
                self.engine.pause();
                self.commit(PlaybackState::Paused(episode));
            } else {
                warn!(episode = %episode.id, "engine stopped while playing, resuming");
                self.engine.play();
            }
        }
        self.refresh_progress();
    }

    /// Publish a snapshot right away instead of waiting for the next tick.
    ///
    /// While a drag or seek is unresolved the user's position is shown, not
    /// the engine's stale one.
    pub fn refresh_progress(&mut self) {
        let duration = self.engine.duration();
        let snapshot = if !self.session.state.is_loaded() {
            ProgressSnapshot::empty()
        } else if let Some(fraction) = self.seeks.held_fraction() {
            ProgressSnapshot::scrubbing(fraction, duration)
        } else if let Some(target) = self.seeks.in_flight_target() {
            ProgressSnapshot::at(target, duration)
        } else {
            ProgressSnapshot::at(self.engine.current_time(), duration)
        };
        self.publish_progress(snapshot);
    }

    fn publish_progress(&self, snapshot: ProgressSnapshot) {
        self.progress_tx.send_replace(snapshot.clone());
        self.observer.notify(PlayerEvent::Progress { snapshot });
    }

    /// Pass-through volume; no state involvement
    pub fn set_volume(&mut self, volume: f32) {
        self.engine.set_volume(volume.clamp(0.0, 1.0));
    }

    /// Release the engine's asset and end in `Stopped`
    pub fn shutdown(&mut self) {
        self.teardown();
    }

    /// Pause and unload whatever the engine holds, then commit `Stopped`
    fn teardown(&mut self) {
        if self.session.loaded.is_some() || self.session.state.is_loaded() {
            self.engine.pause();
            self.engine.unload();
        }
        self.session.clear_loaded();
        self.seeks.reset();
        self.commit(PlaybackState::Stopped);
    }

    fn begin_load(&mut self, episode: Episode, auto_play: bool) {
        let token = self.session.tokens.next();
        info!(episode = %episode.id, title = %episode.title, %token, auto_play, "loading episode");

        self.session.loaded = Some(episode.clone());
        self.session.auto_play_requested = auto_play;
        self.engine.load(&episode.source, token);
        self.session.pending_load = Some(PendingLoad { episode, token });
    }

    /// Make `state` current and tell everyone. Re-entering the current state
    /// is silent.
    fn commit(&mut self, state: PlaybackState) {
        if self.session.state == state {
            return;
        }
        info!(
            from = ?self.session.state.kind(),
            to = ?state.kind(),
            episode = state.episode().map(|e| e.id.as_str()),
            "state changed"
        );

        self.session.state = state.clone();
        self.state_tx.send_replace(state.clone());
        let stopped = !state.is_loaded();
        self.observer.notify(PlayerEvent::StateChanged { state });

        if stopped {
            self.publish_progress(ProgressSnapshot::empty());
        }
    }
}
