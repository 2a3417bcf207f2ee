// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use tokio::time::Instant;

use crate::engine::RequestToken;

use super::progress::clamp_fraction;

/// A committed seek waiting for the debounce window to pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PendingSeek {
    pub fraction: f64,
    pub due: Instant,
}

/// The one engine seek whose completion still matters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InFlightSeek {
    pub token: RequestToken,
    pub target: Duration,
}

/// Turns a stream of drag positions and commits into few engine seeks.
///
/// Drag updates never reach the engine. Commits are debounced: each commit
/// replaces the pending one and restarts the window, so a burst collapses to
/// its last value. Once dispatched, only the newest seek's completion is
/// accepted.
#[derive(Debug)]
pub(crate) struct SeekCoordinator {
    debounce: Duration,
    scrubbing: bool,
    scrub_position: f64,
    pending: Option<PendingSeek>,
    in_flight: Option<InFlightSeek>,
}

impl SeekCoordinator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            scrubbing: false,
            scrub_position: 0.0,
            pending: None,
            in_flight: None,
        }
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing
    }

    pub fn scrub_position(&self) -> f64 {
        self.scrub_position
    }

    /// Record a drag position
    pub fn scrub(&mut self, fraction: f64) {
        self.scrubbing = true;
        self.scrub_position = clamp_fraction(fraction);
    }

    /// Record a drag release; supersedes any commit not yet dispatched
    pub fn commit(&mut self, fraction: f64, now: Instant) {
        let fraction = clamp_fraction(fraction);
        self.scrubbing = false;
        self.scrub_position = fraction;
        self.pending = Some(PendingSeek {
            fraction,
            due: now + self.debounce,
        });
    }

    /// When the pending commit becomes due, if there is one
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|pending| pending.due)
    }

    /// Take the pending commit if its debounce window has passed
    pub fn take_due(&mut self, now: Instant) -> Option<f64> {
        match self.pending {
            Some(pending) if pending.due <= now => {
                self.pending = None;
                Some(pending.fraction)
            }
            _ => None,
        }
    }

    /// Fraction the user is dragging or has released but not yet dispatched
    pub fn held_fraction(&self) -> Option<f64> {
        (self.scrubbing || self.pending.is_some()).then_some(self.scrub_position)
    }

    /// Target of the seek the engine is still working on
    pub fn in_flight_target(&self) -> Option<Duration> {
        self.in_flight.map(|seek| seek.target)
    }

    /// Remember the seek just handed to the engine; older ones become stale
    pub fn dispatched(&mut self, token: RequestToken, target: Duration) {
        self.in_flight = Some(InFlightSeek { token, target });
    }

    /// Match a completion against the newest dispatched seek.
    ///
    /// Returns `None` for stale or unknown tokens.
    pub fn complete(&mut self, token: RequestToken) -> Option<InFlightSeek> {
        match self.in_flight {
            Some(in_flight) if in_flight.token == token => self.in_flight.take(),
            _ => None,
        }
    }

    /// Forget everything; used when the loaded episode goes away
    pub fn reset(&mut self) {
        self.scrubbing = false;
        self.scrub_position = 0.0;
        self.pending = None;
        self.in_flight = None;
    }
}
