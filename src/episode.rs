// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use url::Url;

/// Opaque, stable identifier of an episode
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EpisodeId(String);

impl EpisodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A playable podcast episode.
///
/// Episodes are created once per feed item and never mutated. Two episodes
/// are equal when their ids are equal, regardless of the other fields.
#[derive(Debug, Clone, Serialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub title: String,
    /// Location of the audio asset handed to the engine
    pub source: Url,
    /// Duration announced by the feed; the engine's value wins once loaded
    #[serde(skip_serializing_if = "Option::is_none", with = "duration_secs")]
    pub known_duration: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Episode {
    /// Create an episode with only the fields playback needs
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: Url) -> Self {
        Self {
            id: EpisodeId::new(id),
            title: title.into(),
            source,
            known_duration: None,
            pub_date: None,
            description: None,
            author: None,
        }
    }

    pub fn with_known_duration(mut self, duration: Duration) -> Self {
        self.known_duration = Some(duration);
        self
    }
}

impl PartialEq for Episode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Episode {}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_f64(d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }
}
