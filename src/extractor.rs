mod ytdlp;

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::Result;

pub use ytdlp::{Ytdlp, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_TIMEOUT};

pub const BEST_AUDIO: &str = "bestaudio/best";
pub const BEST_VIDEO_720: &str =
  "(bestvideo[height<=?720][ext=mp4])+(bestaudio[ext=m4a])";

// the subset of `yt-dlp -J` output we care about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
  pub id: String,
  #[serde(default)]
  pub title: String,
  pub duration: Option<f64>,
  pub thumbnail: Option<String>,
  pub webpage_url: Option<String>,
  // extension of the format selected by `-f`
  pub ext: Option<String>,
  #[serde(default)]
  pub formats: Vec<RawFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
  pub format: Option<String>,
  pub filesize: Option<u64>,
  pub format_id: Option<String>,
  pub ext: Option<String>,
  pub format_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSpec {
  pub format: String,
  pub merge_mp4: bool,
  pub extract_mp3: bool,
}

impl DownloadSpec {
  pub fn new(format: impl Into<String>) -> Self {
    Self {
      format: format.into(),
      merge_mp4: false,
      extract_mp3: false,
    }
  }

  pub fn merge_mp4(mut self) -> Self {
    self.merge_mp4 = true;
    self
  }

  pub fn extract_mp3(mut self) -> Self {
    self.extract_mp3 = true;
    self
  }
}

/// The local extraction tool. Every call receives the cookie jar picked
/// for the current operation.
#[async_trait]
pub trait Extractor: Send + Sync {
  /// Direct URL of the best audio stream, without downloading.
  async fn stream_url(&self, link: &str, cookies: &Path) -> Result<String>;

  /// Metadata-only extraction. With a `format`, `VideoInfo::ext` reflects
  /// the format yt-dlp would pick for it.
  async fn probe(
    &self,
    link: &str,
    cookies: &Path,
    format: Option<&str>,
  ) -> Result<VideoInfo>;

  async fn download(
    &self,
    link: &str,
    cookies: &Path,
    spec: &DownloadSpec,
    output: &Path,
  ) -> Result<()>;

  async fn playlist(
    &self,
    link: &str,
    cookies: &Path,
    limit: usize,
  ) -> Result<Vec<String>>;
}
