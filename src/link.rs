//! Link handling for the supported platform.
//!
//! A link is either a full URL or a bare video id. Everything downstream
//! works on the normalized watch URL produced by [`resolve`].

use std::sync::LazyLock;

use regex::Regex;

pub const WATCH_BASE: &str = "https://www.youtube.com/watch?v=";
pub const PLAYLIST_BASE: &str = "https://youtube.com/playlist?list=";

static PLATFORM_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?:youtube\.com|youtu\.be)").unwrap());

static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?:[?&]v=|youtu\.be/|/shorts/|/embed/|/live/)([\w-]{11})(?:$|[^\w-])",
  )
  .unwrap()
});

static LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?:https?://)?(?:[\w-]+\.)*(?:youtube\.com|youtu\.be)/\S*")
    .unwrap()
});

pub fn watch_url(video_id: &str) -> String {
  format!("{WATCH_BASE}{video_id}")
}

pub fn playlist_url(playlist_id: &str) -> String {
  format!("{PLAYLIST_BASE}{playlist_id}")
}

/// Drops every query parameter after the first `&`-separated segment.
pub fn normalize(link: &str) -> &str {
  link.split('&').next().unwrap_or(link)
}

/// Expands a bare id into a watch URL and normalizes the result.
pub fn resolve(link: &str, is_id: bool) -> String {
  if is_id {
    normalize(&watch_url(link)).to_string()
  } else {
    normalize(link).to_string()
  }
}

pub fn validate(link: &str, is_id: bool) -> bool {
  if is_id {
    PLATFORM_REGEX.is_match(&watch_url(link))
  } else {
    PLATFORM_REGEX.is_match(link)
  }
}

/// Video id inferred from the URL shape, without asking the extractor.
pub fn video_id(link: &str) -> Option<&str> {
  VIDEO_ID_REGEX
    .captures(link)
    .and_then(|caps| caps.get(1))
    .map(|m| m.as_str())
}

/// First supported link found in free text, such as a chat message.
pub fn find_link(text: &str) -> Option<&str> {
  LINK_REGEX.find(text).map(|m| m.as_str())
}
