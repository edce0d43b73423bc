use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
  pub id: String,
  pub title: String,
  pub duration_secs: Option<u64>,
  // "mm:ss" or "h:mm:ss", "Live" for streams without a duration
  pub duration_text: String,
  pub thumbnail: String,
  pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamFormat {
  pub format: String,
  pub filesize: u64,
  pub format_id: String,
  pub ext: String,
  pub format_note: String,
  pub link: String,
}

/// Result of the remote resolution API. `code == 0` means failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackOutcome {
  #[serde(default)]
  pub code: i64,
  #[serde(default)]
  pub url: String,
}

impl FallbackOutcome {
  pub fn failed() -> Self {
    Self::default()
  }

  pub fn is_success(&self) -> bool {
    self.code != 0
  }
}

/// Where the media ended up: a cached local file or a remote URL to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download {
  Local(PathBuf),
  Remote(String),
}

impl Download {
  pub fn is_local(&self) -> bool {
    matches!(self, Download::Local(_))
  }

  pub fn location(&self) -> String {
    match self {
      Download::Local(path) => path.display().to_string(),
      Download::Remote(url) => url.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadKind {
  /// Resolve a direct stream URL only; nothing is written to disk.
  Stream,
  Audio,
  /// Best video up to 720p in mp4, merged with m4a audio.
  Video,
  SongAudio { format_id: String, title: String },
  SongVideo { format_id: String, title: String },
}

pub fn format_duration(secs: u64) -> String {
  let hours = secs / 3600;
  let minutes = (secs % 3600) / 60;
  let seconds = secs % 60;

  if hours > 0 {
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
  } else {
    format!("{:02}:{:02}", minutes, seconds)
  }
}
