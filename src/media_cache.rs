//! On-disk cache of downloaded media, one file per key.
//!
//! Files are named `<stem>.<ext>`. Writers always go through a staging
//! file that is renamed into place, so readers never observe a partial
//! file. Two concurrent misses on the same key both download and the
//! last rename wins; that costs duplicate work, never a corrupt file.

use std::{
  io,
  path::{Path, PathBuf},
};

use crate::Result;

// leaves room for the staging tag and yt-dlp's `.fNNN.ext.part` suffixes
// under the usual 255-byte file name limit
const MAX_STEM_BYTES: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  stem: String,
  ext: String,
}

impl CacheKey {
  pub fn new(stem: impl Into<String>, ext: impl Into<String>) -> Self {
    Self {
      stem: sanitize(&stem.into()),
      ext: ext.into(),
    }
  }

  pub fn stem(&self) -> &str {
    &self.stem
  }

  pub fn ext(&self) -> &str {
    &self.ext
  }

  fn file_name(&self) -> String {
    format!("{}.{}", self.stem, self.ext)
  }
}

/// Where a writer puts its data before [`MediaCache::adopt`].
#[derive(Debug, Clone)]
pub struct Staging {
  // file name prefix shared by everything this writer creates
  pub prefix: String,
  // yt-dlp output template, `%(ext)s` is filled in by the tool
  pub template: PathBuf,
  pub file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MediaCache {
  dir: PathBuf,
}

impl MediaCache {
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self {
      dir: dir.as_ref().to_owned(),
    }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn path(&self, key: &CacheKey) -> PathBuf {
    self.dir.join(key.file_name())
  }

  pub async fn has(&self, key: &CacheKey) -> bool {
    self.get(key).await.is_some()
  }

  pub async fn get(&self, key: &CacheKey) -> Option<PathBuf> {
    let path = self.path(key);
    is_file(&path).await.then_some(path)
  }

  /// Looks up a stem whose extension is not known yet.
  pub async fn find(&self, stem: &str, exts: &[&str]) -> Option<PathBuf> {
    for ext in exts {
      if let Some(path) = self.get(&CacheKey::new(stem, *ext)).await {
        return Some(path);
      }
    }
    None
  }

  // the random tag keeps concurrent writers of the same key apart
  pub fn staging(&self, key: &CacheKey) -> Staging {
    let tag: u32 = rand::random();
    let prefix = format!(".{}.{:08x}.", key.stem, tag);
    Staging {
      template: self.dir.join(format!("{prefix}%(ext)s")),
      file: self.dir.join(format!("{prefix}{}", key.ext)),
      prefix,
    }
  }

  /// Removes whatever a failed writer left behind: the staged file, `.part`
  /// downloads, per-format merge inputs and pre-conversion audio.
  pub async fn discard(&self, staging: &Staging) -> Result<()> {
    let mut entries = match tokio::fs::read_dir(&self.dir).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
      Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
      if entry.file_name().to_string_lossy().starts_with(&staging.prefix) {
        tokio::fs::remove_file(entry.path()).await.ok();
      }
    }

    Ok(())
  }

  pub async fn ensure_dir(&self) -> Result<()> {
    tokio::fs::create_dir_all(&self.dir).await?;
    Ok(())
  }

  /// Moves a fully written staging file into its cache slot.
  pub async fn adopt(&self, key: &CacheKey, staged: &Path) -> Result<PathBuf> {
    let path = self.path(key);
    tokio::fs::rename(staged, &path).await?;
    Ok(path)
  }

  pub async fn put(&self, key: &CacheKey, bytes: &[u8]) -> Result<PathBuf> {
    self.ensure_dir().await?;
    let staging = self.staging(key);
    if let Err(e) = tokio::fs::write(&staging.file, bytes).await {
      self.discard(&staging).await.ok();
      return Err(e.into());
    }
    self.adopt(key, &staging.file).await
  }
}

pub async fn is_file(path: &Path) -> bool {
  tokio::fs::metadata(path)
    .await
    .is_ok_and(|meta| meta.is_file())
}

// titles end up in file names
fn sanitize(stem: &str) -> String {
  let cleaned: String = stem
    .chars()
    .map(|c| match c {
      '/' | '\\' | '\0' => '_',
      c if c.is_control() => '_',
      c => c,
    })
    .collect();

  let cleaned = cleaned.trim().trim_start_matches('.');
  let mut end = cleaned.len().min(MAX_STEM_BYTES);
  while !cleaned.is_char_boundary(end) {
    end -= 1;
  }
  let cleaned = cleaned[..end].trim_end();

  if cleaned.is_empty() {
    "_".to_string()
  } else {
    cleaned.to_string()
  }
}
