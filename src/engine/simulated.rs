// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use super::{EngineEvent, EngineEventSender, MediaEngine, RequestToken};
use crate::http::HttpClient;

/// A clock-driven engine that renders no audio.
///
/// Position advances with the tokio clock while playing, so paused-clock
/// tests can drive it deterministically. Loading and seeking complete after
/// a configurable latency on a background task, the way a real backend would
/// answer on its own thread. With a probe client attached, a load first
/// checks that the asset is reachable and starts streaming.
#[derive(Clone)]
pub struct SimulatedEngine {
    shared: Arc<Mutex<Shared>>,
    probe: Option<Arc<dyn HttpClient>>,
    durations: Arc<HashMap<Url, Duration>>,
    default_duration: Option<Duration>,
    load_latency: Duration,
    seek_latency: Duration,
}

#[derive(Default)]
struct Shared {
    events: Option<EngineEventSender>,
    asset: Option<Asset>,
    /// Bumped on every load/unload so late background work can tell it is stale
    generation: u64,
    volume: f32,
}

struct Asset {
    ready: bool,
    duration: Option<Duration>,
    position_base: Duration,
    playing_since: Option<Instant>,
}

impl Asset {
    fn position(&self, now: Instant) -> Duration {
        let elapsed = self
            .playing_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        let position = self.position_base + elapsed;
        match self.duration {
            Some(total) => position.min(total),
            None => position,
        }
    }

    fn at_end(&self, now: Instant) -> bool {
        self.duration
            .is_some_and(|total| self.position(now) >= total)
    }
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                volume: 1.0,
                ..Default::default()
            })),
            probe: None,
            durations: Arc::new(HashMap::new()),
            default_duration: None,
            load_latency: Duration::from_millis(150),
            seek_latency: Duration::from_millis(40),
        }
    }

    /// Check reachability of every asset over HTTP before reporting ready
    pub fn with_probe(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.probe = Some(client);
        self
    }

    /// Durations reported for specific assets once they are loaded
    pub fn with_durations(mut self, durations: HashMap<Url, Duration>) -> Self {
        self.durations = Arc::new(durations);
        self
    }

    /// Duration reported for assets without an entry in the duration table
    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = Some(duration);
        self
    }

    pub fn with_latency(mut self, load: Duration, seek: Duration) -> Self {
        self.load_latency = load;
        self.seek_latency = seek;
        self
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(shared: &Shared, event: EngineEvent) {
        if let Some(events) = &shared.events {
            events.send(event);
        }
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Decide whether an asset can be played, returning the byte size if known
async fn open_asset(probe: Option<&dyn HttpClient>, source: &Url) -> Result<Option<u64>, String> {
    match source.scheme() {
        "http" | "https" => {
            let Some(client) = probe else {
                return Ok(None);
            };
            let mut response = client
                .open_stream(source.as_str())
                .await
                .map_err(|e| e.to_string())?;
            if !response.is_success() {
                return Err(format!("HTTP status {}", response.status));
            }
            match response.body.next().await {
                Some(Ok(_)) => Ok(response.content_length),
                Some(Err(e)) => Err(e.to_string()),
                None => Err("empty response body".to_string()),
            }
        }
        "file" => {
            let path = source
                .to_file_path()
                .map_err(|_| format!("invalid file URL {source}"))?;
            let metadata = tokio::task::spawn_blocking(move || std::fs::metadata(path))
                .await
                .map_err(|e| e.to_string())?
                .map_err(|e| e.to_string())?;
            Ok(Some(metadata.len()))
        }
        scheme => Err(format!("unsupported scheme '{scheme}'")),
    }
}

impl MediaEngine for SimulatedEngine {
    fn attach(&mut self, events: EngineEventSender) {
        self.lock().events = Some(events);
    }

    fn load(&mut self, source: &Url, token: RequestToken) {
        let generation = {
            let mut shared = self.lock();
            shared.generation += 1;
            shared.asset = Some(Asset {
                ready: false,
                duration: None,
                position_base: Duration::ZERO,
                playing_since: None,
            });
            shared.generation
        };

        let engine = self.clone();
        let source = source.clone();
        tokio::spawn(async move {
            tokio::time::sleep(engine.load_latency).await;
            let outcome = open_asset(engine.probe.as_deref(), &source).await;

            let mut shared = engine.lock();
            if shared.generation != generation {
                debug!(%source, %token, "load finished after asset was replaced");
                return;
            }
            match outcome {
                Ok(size) => {
                    let duration = engine
                        .durations
                        .get(&source)
                        .copied()
                        .or(engine.default_duration);
                    debug!(%source, ?size, ?duration, "asset ready");
                    if let Some(asset) = shared.asset.as_mut() {
                        asset.ready = true;
                        asset.duration = duration;
                    }
                    Self::emit(&shared, EngineEvent::Ready { token, duration });
                }
                Err(reason) => {
                    shared.asset = None;
                    Self::emit(&shared, EngineEvent::Failed { token, reason });
                }
            }
        });
    }

    fn unload(&mut self) {
        let mut shared = self.lock();
        shared.generation += 1;
        shared.asset = None;
    }

    fn play(&mut self) {
        let now = Instant::now();
        let mut shared = self.lock();
        if let Some(asset) = shared.asset.as_mut()
            && asset.ready
            && asset.playing_since.is_none()
            && !asset.at_end(now)
        {
            asset.playing_since = Some(now);
        }
    }

    fn pause(&mut self) {
        let now = Instant::now();
        let mut shared = self.lock();
        if let Some(asset) = shared.asset.as_mut()
            && asset.playing_since.is_some()
        {
            asset.position_base = asset.position(now);
            asset.playing_since = None;
        }
    }

    fn seek(&mut self, to: Duration, token: RequestToken) {
        let generation = self.lock().generation;
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(engine.seek_latency).await;

            let now = Instant::now();
            let mut shared = engine.lock();
            let finished = shared.generation == generation
                && match shared.asset.as_mut() {
                    Some(asset) if asset.ready => {
                        asset.position_base = asset.duration.map_or(to, |total| to.min(total));
                        if asset.playing_since.is_some() {
                            asset.playing_since = Some(now);
                        }
                        true
                    }
                    _ => false,
                };
            Self::emit(&shared, EngineEvent::SeekCompleted { token, finished });
        });
    }

    fn current_time(&self) -> Duration {
        let now = Instant::now();
        self.lock()
            .asset
            .as_ref()
            .map(|asset| asset.position(now))
            .unwrap_or_default()
    }

    fn duration(&self) -> Option<Duration> {
        self.lock().asset.as_ref().and_then(|asset| asset.duration)
    }

    fn is_playing(&self) -> bool {
        let now = Instant::now();
        self.lock()
            .asset
            .as_ref()
            .is_some_and(|asset| asset.playing_since.is_some() && !asset.at_end(now))
    }

    fn set_volume(&mut self, volume: f32) {
        self.lock().volume = volume.clamp(0.0, 1.0);
    }
}
