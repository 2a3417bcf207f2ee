// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The playback core: lifecycle state machine, episode switching, seek
//! debouncing and progress sampling, driven from a single control task.

mod controller;
mod progress;
mod seek;
mod service;
mod session;
mod state;

pub use controller::PlaybackController;
pub use progress::{ProgressSnapshot, TIME_PLACEHOLDER, ZERO_TIME, clamp_fraction, format_time};
pub use service::{PlayerHandle, PlayerOptions, PlayerService};
pub use state::{PlaybackRequest, PlaybackState, StateKind};
