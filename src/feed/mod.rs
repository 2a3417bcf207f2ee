mod fetch;
mod parse;

pub use fetch::{fetch_feed, is_url, load_feed, parse_feed_file};
pub use parse::{Podcast, parse_duration, parse_feed};
