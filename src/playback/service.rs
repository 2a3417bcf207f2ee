// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::{EngineEvent, EngineEventSender, MediaEngine};
use crate::episode::Episode;
use crate::error::PlayerError;
use crate::observer::SharedObserver;

use super::controller::PlaybackController;
use super::progress::ProgressSnapshot;
use super::state::{PlaybackRequest, PlaybackState};

/// Options for the player service
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    /// How often the position is sampled while playing
    pub tick_interval: Duration,
    /// Quiet period after a committed seek before the engine is asked to seek
    pub seek_debounce: Duration,
    /// Distance of a forward skip
    pub skip_forward: Duration,
    /// Distance of a backward skip
    pub skip_backward: Duration,
    /// Volume applied to the engine at startup (0.0 to 1.0)
    pub initial_volume: f32,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            seek_debounce: Duration::from_millis(100),
            skip_forward: Duration::from_secs(30),
            skip_backward: Duration::from_secs(15),
            initial_volume: 1.0,
        }
    }
}

#[derive(Debug)]
enum Command {
    Select { episode: Episode, auto_play: bool },
    Request(PlaybackRequest),
    Toggle,
    RequestSeek(f64),
    CommitSeek(f64),
    Skip(f64),
    SetVolume(f32),
}

/// What travels over the handle channel
#[derive(Debug)]
enum Message {
    Command(Command),
    Shutdown,
}

/// Handle to a running player.
///
/// Cheap to clone. Every method only enqueues a command for the control
/// task; the state and progress accessors read the latest committed values.
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<PlaybackState>,
    progress: watch::Receiver<ProgressSnapshot>,
    skip_forward: Duration,
    skip_backward: Duration,
}

impl PlayerHandle {
    fn send(&self, command: Command) -> Result<(), PlayerError> {
        self.post(Message::Command(command))
    }

    fn post(&self, message: Message) -> Result<(), PlayerError> {
        self.commands
            .send(message)
            .map_err(|_| PlayerError::ServiceStopped)
    }

    /// Make `episode` current, starting it once loaded if `auto_play` is set
    pub fn select_episode(&self, episode: Episode, auto_play: bool) -> Result<(), PlayerError> {
        self.send(Command::Select { episode, auto_play })
    }

    pub fn play(&self) -> Result<(), PlayerError> {
        self.send(Command::Request(PlaybackRequest::Play))
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        self.send(Command::Request(PlaybackRequest::Pause))
    }

    pub fn stop(&self) -> Result<(), PlayerError> {
        self.send(Command::Request(PlaybackRequest::Stop))
    }

    pub fn toggle(&self) -> Result<(), PlayerError> {
        self.send(Command::Toggle)
    }

    /// Report a drag position (0.0 to 1.0); never reaches the engine
    pub fn request_seek(&self, fraction: f64) -> Result<(), PlayerError> {
        self.send(Command::RequestSeek(fraction))
    }

    /// Report a drag release (0.0 to 1.0); seeks once the debounce window passes
    pub fn commit_seek(&self, fraction: f64) -> Result<(), PlayerError> {
        self.send(Command::CommitSeek(fraction))
    }

    /// Jump by `seconds`, negative values going backwards
    pub fn skip(&self, seconds: f64) -> Result<(), PlayerError> {
        self.send(Command::Skip(seconds))
    }

    pub fn skip_forward(&self) -> Result<(), PlayerError> {
        self.skip(self.skip_forward.as_secs_f64())
    }

    pub fn skip_backward(&self) -> Result<(), PlayerError> {
        self.skip(-self.skip_backward.as_secs_f64())
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), PlayerError> {
        self.send(Command::SetVolume(volume))
    }

    /// Stop playback, release the engine and end the control task
    pub fn shutdown(&self) -> Result<(), PlayerError> {
        self.post(Message::Shutdown)
    }

    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.borrow().clone()
    }

    pub fn is_episode_loaded(&self) -> bool {
        self.state.borrow().is_loaded()
    }

    pub fn is_playing(&self) -> bool {
        self.state.borrow().is_playing()
    }

    /// Receiver that changes whenever a transition is committed
    pub fn watch_state(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Receiver that changes whenever a progress snapshot is published
    pub fn watch_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.clone()
    }
}

/// The control task.
///
/// User commands, engine callbacks, ticks and seek deadlines are all handled
/// here one at a time, so the controller never sees concurrent mutation.
pub struct PlayerService<E: MediaEngine> {
    controller: PlaybackController<E>,
    commands: mpsc::UnboundedReceiver<Message>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    tick_interval: Duration,
}

impl<E: MediaEngine> PlayerService<E> {
    /// Spawn the control task on the current runtime
    pub fn start(
        engine: E,
        observer: SharedObserver,
        options: PlayerOptions,
    ) -> (PlayerHandle, JoinHandle<()>) {
        let (events, engine_events) = EngineEventSender::channel();
        let (command_tx, commands) = mpsc::unbounded_channel();

        let mut controller =
            PlaybackController::new(engine, observer, events, options.seek_debounce);
        controller.set_volume(options.initial_volume);

        let handle = PlayerHandle {
            commands: command_tx,
            state: controller.subscribe_state(),
            progress: controller.subscribe_progress(),
            skip_forward: options.skip_forward,
            skip_backward: options.skip_backward,
        };

        let service = Self {
            controller,
            commands,
            engine_events,
            tick_interval: options.tick_interval,
        };
        let task = tokio::spawn(service.run());

        (handle, task)
    }

    async fn run(mut self) {
        info!("player started");

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let playing = self.controller.state().is_playing();
            let seek_deadline = self.controller.seek_deadline();

            tokio::select! {
                message = self.commands.recv() => match message {
                    Some(Message::Command(command)) => self.handle(command),
                    Some(Message::Shutdown) | None => break,
                },
                Some(event) = self.engine_events.recv() => {
                    self.controller.on_engine_event(event);
                }
                _ = ticker.tick(), if playing => self.controller.tick(),
                _ = tokio::time::sleep_until(seek_deadline.unwrap_or_else(Instant::now)),
                    if seek_deadline.is_some() =>
                {
                    self.controller.dispatch_due_seek(Instant::now());
                }
            }
        }

        self.controller.shutdown();
        info!("player stopped");
    }

    fn handle(&mut self, command: Command) {
        debug!(?command, "handling command");
        match command {
            Command::Select { episode, auto_play } => {
                self.controller.select_episode(episode, auto_play)
            }
            Command::Request(request) => self.controller.request(request),
            Command::Toggle => self.controller.toggle(),
            Command::RequestSeek(fraction) => self.controller.request_seek(fraction),
            Command::CommitSeek(fraction) => {
                self.controller.commit_seek(fraction, Instant::now())
            }
            Command::Skip(seconds) => self.controller.skip(seconds),
            Command::SetVolume(volume) => self.controller.set_volume(volume),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use url::Url;

    use crate::engine::SimulatedEngine;
    use crate::engine::testing::{EngineCall, RecordingEngine};
    use crate::observer::{PlayerEvent, RecordingObserver};

    fn episode(id: &str) -> Episode {
        Episode::new(
            id,
            format!("Episode {id}"),
            Url::parse(&format!("https://example.com/{id}.mp3")).unwrap(),
        )
    }

    fn start(engine: RecordingEngine) -> (PlayerHandle, JoinHandle<()>, Arc<RecordingObserver>) {
        let observer = RecordingObserver::new();
        let (handle, task) = PlayerService::start(engine, observer.clone(), PlayerOptions::default());
        (handle, task, observer)
    }

    /// Let the control task drain everything queued so far
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn ready(engine: &RecordingEngine, duration: Duration) {
        settle().await;
        engine.set_duration(Some(duration));
        engine.emit(EngineEvent::Ready {
            token: engine.last_load_token().unwrap(),
            duration: Some(duration),
        });
        settle().await;
    }

    #[test]
    fn default_options() {
        let options = PlayerOptions::default();

        assert_eq!(options.tick_interval, Duration::from_millis(500));
        assert_eq!(options.seek_debounce, Duration::from_millis(100));
        assert_eq!(options.skip_forward, Duration::from_secs(30));
        assert_eq!(options.skip_backward, Duration::from_secs(15));
        assert_eq!(options.initial_volume, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn startup_applies_initial_volume() {
        let engine = RecordingEngine::default();
        let (handle, _task, _observer) = start(engine.clone());

        settle().await;

        assert_eq!(engine.calls(), vec![EngineCall::SetVolume(1.0)]);
        assert_eq!(handle.state(), PlaybackState::Stopped);
        assert_eq!(handle.progress(), ProgressSnapshot::empty());
    }

    #[tokio::test(start_paused = true)]
    async fn handle_reflects_committed_state() {
        let engine = RecordingEngine::default();
        let (handle, _task, _observer) = start(engine.clone());

        handle.select_episode(episode("a"), true).unwrap();
        ready(&engine, Duration::from_secs(60)).await;

        assert!(handle.is_episode_loaded());
        assert!(handle.is_playing());

        handle.pause().unwrap();
        settle().await;
        assert_eq!(handle.state(), PlaybackState::Paused(episode("a")));
        assert!(!handle.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_publish_progress_while_playing() {
        let engine = RecordingEngine::default();
        let (handle, _task, observer) = start(engine.clone());
        handle.select_episode(episode("a"), true).unwrap();
        ready(&engine, Duration::from_secs(100)).await;

        engine.set_position(Duration::from_secs(25));
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(handle.progress().progress, 0.25);

        handle.pause().unwrap();
        settle().await;
        observer.clear();
        engine.set_position(Duration::from_secs(50));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(observer.snapshots().is_empty());
        assert_eq!(handle.progress().progress, 0.25);
    }

    #[tokio::test(start_paused = true)]
    async fn seek_burst_converges_to_single_engine_seek() {
        let engine = RecordingEngine::default();
        let (handle, _task, _observer) = start(engine.clone());
        handle.select_episode(episode("a"), true).unwrap();
        ready(&engine, Duration::from_secs(200)).await;

        for fraction in [0.1, 0.2, 0.3, 0.4, 0.5] {
            handle.request_seek(fraction).unwrap();
        }
        settle().await;
        assert!(engine.seeks().is_empty());

        for fraction in [0.2, 0.6, 0.75] {
            handle.commit_seek(fraction).unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        assert!(engine.seeks().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(engine.seeks(), vec![Duration::from_secs(150)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_engine_callbacks_do_not_resurrect_old_episode() {
        let engine = RecordingEngine::default();
        let (handle, _task, observer) = start(engine.clone());

        handle.select_episode(episode("a"), true).unwrap();
        settle().await;
        let stale = engine.last_load_token().unwrap();
        handle.select_episode(episode("b"), false).unwrap();
        settle().await;

        engine.emit(EngineEvent::Ready {
            token: stale,
            duration: None,
        });
        settle().await;
        assert_eq!(handle.state(), PlaybackState::Stopped);

        ready(&engine, Duration::from_secs(10)).await;
        assert_eq!(handle.state(), PlaybackState::Ready(episode("b")));
        assert_eq!(observer.states(), vec![PlaybackState::Ready(episode("b"))]);
    }

    #[tokio::test(start_paused = true)]
    async fn load_failure_is_reported_after_stopped() {
        let engine = RecordingEngine::default();
        let (handle, _task, observer) = start(engine.clone());

        handle.select_episode(episode("a"), true).unwrap();
        settle().await;
        engine.emit(EngineEvent::Failed {
            token: engine.last_load_token().unwrap(),
            reason: "HTTP status 404".to_string(),
        });
        settle().await;

        assert_eq!(handle.state(), PlaybackState::Stopped);
        assert!(observer.events().contains(&PlayerEvent::LoadFailed {
            episode: episode("a"),
            reason: "HTTP status 404".to_string(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn skip_shortcuts_use_configured_distances() {
        let engine = RecordingEngine::default();
        let (handle, _task, _observer) = start(engine.clone());
        handle.select_episode(episode("a"), false).unwrap();
        ready(&engine, Duration::from_secs(3600)).await;
        engine.set_position(Duration::from_secs(100));

        handle.skip_forward().unwrap();
        handle.skip_backward().unwrap();
        settle().await;

        assert_eq!(
            engine.seeks(),
            vec![Duration::from_secs(130), Duration::from_secs(85)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_tears_down_and_closes_handle() {
        let engine = RecordingEngine::default();
        let (handle, task, _observer) = start(engine.clone());
        handle.select_episode(episode("a"), true).unwrap();
        ready(&engine, Duration::from_secs(60)).await;
        engine.take_calls();

        handle.shutdown().unwrap();
        task.await.unwrap();

        assert_eq!(engine.calls(), vec![EngineCall::Pause, EngineCall::Unload]);
        assert_eq!(handle.state(), PlaybackState::Stopped);
        assert_eq!(handle.play(), Err(PlayerError::ServiceStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_all_handles_ends_the_task() {
        let engine = RecordingEngine::default();
        let (handle, task, _observer) = start(engine.clone());
        handle.select_episode(episode("a"), false).unwrap();
        settle().await;

        drop(handle);
        task.await.unwrap();

        assert!(engine.calls().contains(&EngineCall::Unload));
    }

    #[tokio::test(start_paused = true)]
    async fn plays_through_simulated_engine() {
        let engine = SimulatedEngine::new().with_default_duration(Duration::from_secs(90));
        let observer = RecordingObserver::new();
        let (handle, _task) =
            PlayerService::start(engine, observer.clone(), PlayerOptions::default());
        let mut state = handle.watch_state();

        handle.select_episode(episode("a"), true).unwrap();
        state.changed().await.unwrap();
        assert_eq!(*state.borrow(), PlaybackState::Playing(episode("a")));

        tokio::time::sleep(Duration::from_secs(30)).await;
        let progress = handle.progress();
        assert!(progress.current_seconds >= 29.0 && progress.current_seconds <= 30.5);
        assert_eq!(progress.duration_seconds, Some(90.0));

        handle.commit_seek(0.5).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(handle.progress().current_seconds >= 45.0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handle.state(), PlaybackState::Paused(episode("a")));
    }
}
