// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{Podcast, parse_feed};

/// Fetch and parse a podcast feed from a URL
pub async fn fetch_feed<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Podcast, FeedError> {
    let feed_url = Url::parse(url)?;
    let bytes = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;
    parse_feed(&bytes, feed_url)
}

/// Parse a podcast feed from a local file
pub fn parse_feed_file(path: &Path) -> Result<Podcast, FeedError> {
    let read_failed = |source| FeedError::FileReadFailed {
        path: path.to_path_buf(),
        source,
    };
    let absolute = std::fs::canonicalize(path).map_err(read_failed)?;
    let bytes = std::fs::read(&absolute).map_err(read_failed)?;
    let feed_url = Url::from_file_path(&absolute)
        .map_err(|_| url::ParseError::RelativeUrlWithoutBase)?;
    parse_feed(&bytes, feed_url)
}

/// Load a feed from either a URL or a local file path
pub async fn load_feed<C: HttpClient + ?Sized>(client: &C, source: &str) -> Result<Podcast, FeedError> {
    if is_url(source) {
        fetch_feed(client, source).await
    } else {
        parse_feed_file(Path::new(source))
    }
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::http::{ByteStream, HttpResponse};

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Mock Podcast</title>
    <description>Served from memory</description>
    <item>
      <title>Only Episode</title>
      <guid>only</guid>
      <enclosure url="https://example.com/only.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from_static(FEED.as_bytes()))
        }

        async fn open_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let body: ByteStream = Box::pin(futures::stream::empty());
            Ok(HttpResponse {
                status: 200,
                content_length: None,
                body,
            })
        }
    }

    #[test]
    fn is_url_detects_http() {
        assert!(is_url("http://example.com/feed.xml"));
        assert!(is_url("https://example.com/feed.xml"));
    }

    #[test]
    fn is_url_rejects_file_paths() {
        assert!(!is_url("/path/to/feed.xml"));
        assert!(!is_url("./feed.xml"));
        assert!(!is_url("feed.xml"));
    }

    #[tokio::test]
    async fn fetch_feed_parses_response() {
        let podcast = fetch_feed(&MockHttpClient, "https://example.com/feed.xml")
            .await
            .unwrap();

        assert_eq!(podcast.title, "Mock Podcast");
        assert_eq!(podcast.feed_url.as_str(), "https://example.com/feed.xml");
        assert_eq!(podcast.episodes[0].id.as_str(), "only");
    }

    #[tokio::test]
    async fn fetch_feed_rejects_invalid_url() {
        let result = fetch_feed(&MockHttpClient, "https://").await;

        assert!(matches!(result, Err(FeedError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn load_feed_reads_local_files() {
        let path = std::env::temp_dir().join(format!("podplay-feed-{}.xml", std::process::id()));
        std::fs::write(&path, FEED).unwrap();

        let podcast = load_feed(&MockHttpClient, path.to_str().unwrap()).await;
        std::fs::remove_file(&path).unwrap();

        let podcast = podcast.unwrap();
        assert_eq!(podcast.feed_url.scheme(), "file");
        assert_eq!(podcast.episodes.len(), 1);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = parse_feed_file(Path::new("/definitely/not/here.xml"));

        assert!(matches!(result, Err(FeedError::FileReadFailed { .. })));
    }
}
