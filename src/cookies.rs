use std::path::{Path, PathBuf};

use rand::{seq::SliceRandom, Rng};

use crate::{Error, Result};

/// Picks one cookie file uniformly at random from a directory listing.
pub fn pick_credential<R: Rng + ?Sized>(
  listing: &[PathBuf],
  rng: &mut R,
) -> Option<PathBuf> {
  listing.choose(rng).cloned()
}

// A directory of Netscape-format cookie jars (`*.txt`). Only ever read.
#[derive(Clone, Debug)]
pub struct CookieDir {
  dir: PathBuf,
}

impl CookieDir {
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self {
      dir: dir.as_ref().to_owned(),
    }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub async fn list(&self) -> Result<Vec<PathBuf>> {
    let unreadable = |e: std::io::Error| {
      Error::Config(format!(
        "cannot read cookie directory {}: {e}",
        self.dir.display()
      ))
    };
    let mut entries =
      tokio::fs::read_dir(&self.dir).await.map_err(unreadable)?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
      let path = entry.path();
      if path.extension().is_some_and(|ext| ext == "txt")
        && crate::media_cache::is_file(&path).await
      {
        files.push(path);
      }
    }

    // read_dir order is platform dependent
    files.sort();
    Ok(files)
  }

  pub async fn pick(&self) -> Result<PathBuf> {
    let files = self.list().await?;
    pick_credential(&files, &mut rand::thread_rng()).ok_or_else(|| {
      Error::Config(format!(
        "no cookie files (*.txt) in {}",
        self.dir.display()
      ))
    })
  }
}
