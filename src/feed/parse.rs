// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use tracing::debug;
use url::Url;

use crate::episode::Episode;
use crate::error::FeedError;

/// A parsed podcast feed, reduced to what the player shows and plays
#[derive(Debug, Clone)]
pub struct Podcast {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<Url>,
    pub feed_url: Url,
    /// Playable episodes in feed order
    pub episodes: Vec<Episode>,
}

/// Parse RSS feed XML bytes into a Podcast struct
pub fn parse_feed(xml_bytes: &[u8], feed_url: Url) -> Result<Podcast, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let author = channel
        .itunes_ext()
        .and_then(|ext| ext.author().map(String::from))
        .or_else(|| channel.managing_editor().map(String::from));

    let episodes = channel
        .items()
        .iter()
        .filter_map(|item| match parse_episode(item, author.as_deref()) {
            Ok(episode) => Some(episode),
            Err(err) => {
                debug!("skipping feed item: {err}");
                None
            }
        })
        .collect();

    let image_url = channel
        .image()
        .and_then(|img| Url::parse(img.url()).ok())
        .or_else(|| {
            channel
                .itunes_ext()
                .and_then(|ext| ext.image())
                .and_then(|url| Url::parse(url).ok())
        });

    Ok(Podcast {
        title: channel.title().to_string(),
        description: Some(channel.description().to_string()).filter(|s| !s.is_empty()),
        author,
        image_url,
        feed_url,
        episodes,
    })
}

fn parse_episode(item: &rss::Item, channel_author: Option<&str>) -> Result<Episode, FeedError> {
    let title = item
        .title()
        .map(String::from)
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let enclosure = item
        .enclosure()
        .ok_or_else(|| FeedError::MissingEnclosure {
            title: title.clone(),
        })?;
    let source = Url::parse(enclosure.url())?;

    // The GUID is the stable identity; feeds without one fall back to the enclosure
    let id = item
        .guid()
        .map(|g| g.value().to_string())
        .filter(|guid| !guid.is_empty())
        .unwrap_or_else(|| enclosure.url().to_string());

    let itunes = item.itunes_ext();
    let mut episode = Episode::new(id, title, source);
    episode.known_duration = itunes
        .and_then(|ext| ext.duration())
        .and_then(parse_duration);
    episode.pub_date = item.pub_date().and_then(parse_date);
    episode.description = item.description().map(String::from);
    episode.author = itunes
        .and_then(|ext| ext.author().map(String::from))
        .or_else(|| channel_author.map(String::from));

    Ok(episode)
}

/// Parse an `itunes:duration` value.
///
/// Accepts plain seconds (`"1800"`), `MM:SS` and `HH:MM:SS`. Anything else,
/// including an empty or zero duration, is treated as unknown.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut seconds = 0.0_f64;
    for part in &parts {
        let field: f64 = part.trim().parse().ok()?;
        if !field.is_finite() || field < 0.0 {
            return None;
        }
        seconds = seconds * 60.0 + field;
    }

    Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|d| !d.is_zero())
}

/// Parse a `pubDate`, tolerating the usual RFC 2822 deviations
fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    const RELAXED_FORMATS: [&str; 3] = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    DateTime::parse_from_rfc2822(value).ok().or_else(|| {
        RELAXED_FORMATS
            .iter()
            .find_map(|format| DateTime::parse_from_str(value, format).ok())
    })
}
