//! The link resolver every bot command goes through.
//!
//! Each operation makes exactly one attempt with the local extractor
//! (yt-dlp) and, where a remote tier exists, exactly one attempt with the
//! fallback API afterwards. The two tiers never run concurrently.

use std::{path::PathBuf, sync::Arc};

use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};

use crate::{
  config::Config,
  cookies::CookieDir,
  extractor::{
    DownloadSpec, Extractor, RawFormat, VideoInfo, Ytdlp, BEST_AUDIO,
    BEST_VIDEO_720,
  },
  fallback::{Fallback, RemoteApi},
  link,
  media::{
    format_duration, Download, DownloadKind, FallbackOutcome, Metadata,
    StreamFormat,
  },
  media_cache::{self, CacheKey, MediaCache},
  Error, Result,
};

// what an id-keyed audio download may be saved as
const AUDIO_EXTS: &[&str] = &["m4a", "webm", "opus", "mp3", "ogg", "aac"];
const VIDEO_EXTS: &[&str] = &["mp4"];

// youtube's itag for 128k m4a audio
const SONG_AUDIO_ITAG: &str = "140";

#[derive(Clone)]
pub struct LinkResolver {
  extractor: Arc<dyn Extractor>,
  fallback: Arc<dyn Fallback>,
  cookies: CookieDir,
  cache: MediaCache,
}

impl LinkResolver {
  pub fn new(
    extractor: Arc<dyn Extractor>,
    fallback: Arc<dyn Fallback>,
    cookies: CookieDir,
    cache: MediaCache,
  ) -> Self {
    Self {
      extractor,
      fallback,
      cookies,
      cache,
    }
  }

  pub fn from_config(config: &Config) -> Result<Self> {
    let ytdlp = Ytdlp::new(&config.ytdlp_bin)
      .with_timeout(config.ytdlp_timeout)
      .with_download_timeout(config.ytdlp_download_timeout)
      .with_proxy(config.ytdlp_proxy.clone());
    let api = RemoteApi::new(
      config.api_url.clone(),
      config.api_key.clone(),
      config.api_timeout,
    )?;

    Ok(Self::new(
      Arc::new(ytdlp),
      Arc::new(api),
      CookieDir::new(&config.cookies_dir),
      MediaCache::new(&config.downloads_dir),
    ))
  }

  pub fn cookies(&self) -> &CookieDir {
    &self.cookies
  }

  pub fn cache(&self) -> &MediaCache {
    &self.cache
  }

  pub fn exists(&self, link: &str, is_id: bool) -> bool {
    link::validate(link, is_id)
  }

  pub async fn details(&self, link: &str, is_id: bool) -> Result<Metadata> {
    let link = link::resolve(link, is_id);
    let cookies = self.cookies.pick().await?;
    let info = self.extractor.probe(&link, &cookies, None).await?;
    Ok(to_metadata(info, link))
  }

  pub async fn title(&self, link: &str, is_id: bool) -> Result<String> {
    Ok(self.details(link, is_id).await?.title)
  }

  pub async fn duration(&self, link: &str, is_id: bool) -> Result<String> {
    Ok(self.details(link, is_id).await?.duration_text)
  }

  pub async fn thumbnail(&self, link: &str, is_id: bool) -> Result<String> {
    Ok(self.details(link, is_id).await?.thumbnail)
  }

  /// Metadata together with the video id, the shape the play queue keys on.
  pub async fn track(
    &self,
    link: &str,
    is_id: bool,
  ) -> Result<(Metadata, String)> {
    let metadata = self.details(link, is_id).await?;
    let id = metadata.id.clone();
    Ok((metadata, id))
  }

  /// Direct stream URL. Never fails: local errors go to the fallback API
  /// and a failed fallback comes back as `code == 0`.
  pub async fn video(&self, link: &str, is_id: bool) -> FallbackOutcome {
    let link = link::resolve(link, is_id);

    match self.local_stream_url(&link).await {
      Ok(url) => FallbackOutcome { code: 1, url },
      Err(e) => {
        warn!("yt-dlp stream failed for {}: {}. falling back to api", link, e);
        self.fallback.resolve(&link).await
      }
    }
  }

  async fn local_stream_url(&self, link: &str) -> Result<String> {
    let cookies = self.cookies.pick().await?;
    self.extractor.stream_url(link, &cookies).await
  }

  /// Formats usable for direct single-file playback, in extractor order.
  /// There is no remote tier here.
  pub async fn formats(
    &self,
    link: &str,
    is_id: bool,
  ) -> Result<(Vec<StreamFormat>, String)> {
    let link = link::resolve(link, is_id);
    let cookies = self.cookies.pick().await?;

    let info = match self.extractor.probe(&link, &cookies, None).await {
      Ok(info) => info,
      Err(e @ Error::Extraction(_)) => return Err(e),
      Err(e) => return Err(Error::Extraction(e.to_string())),
    };

    let formats = select_formats(info.formats, &link);
    Ok((formats, link))
  }

  pub async fn download(
    &self,
    link: &str,
    is_id: bool,
    kind: DownloadKind,
  ) -> Result<Download> {
    let link = link::resolve(link, is_id);

    let plan = match Plan::for_kind(kind) {
      Some(plan) => plan,
      None => {
        // stream only; the status code is left for the caller to probe
        let outcome = self.video(&link, false).await;
        return Ok(Download::Remote(outcome.url));
      }
    };

    // run the download on its own task; dropping this future aborts it
    let task = AbortOnDropHandle::new(tokio::spawn(fetch_to_cache(
      self.extractor.clone(),
      self.cookies.clone(),
      self.cache.clone(),
      link.clone(),
      plan,
    )));

    let local = match task.await {
      Ok(res) => res,
      Err(e) => Err(Error::Download(format!("download task failed: {e}"))),
    };

    let local_err = match local {
      Ok(path) => return Ok(Download::Local(path)),
      Err(e) => e,
    };

    warn!(
      "yt-dlp download failed for {}: {}. falling back to api",
      link, local_err
    );
    let outcome = self.fallback.resolve(&link).await;
    if outcome.is_success() {
      Ok(Download::Remote(outcome.url))
    } else {
      Err(Error::Download(format!(
        "both yt-dlp and fallback api failed for {link}: {local_err}"
      )))
    }
  }

  /// Video ids of a playlist, at most `limit` of them.
  pub async fn playlist(
    &self,
    link: &str,
    limit: usize,
    is_id: bool,
  ) -> Result<Vec<String>> {
    let link = if is_id {
      link::playlist_url(link)
    } else {
      link.to_string()
    };
    let link = link::normalize(&link);
    let cookies = self.cookies.pick().await?;

    self.extractor.playlist(link, &cookies, limit).await
  }
}

// How one download kind maps onto yt-dlp and the cache.
struct Plan {
  spec: DownloadSpec,
  // fixed cache slot; `None` means keyed by the video id
  key: Option<CacheKey>,
  id_exts: &'static [&'static str],
  // extension of the final file when post-processing decides it
  ext: Option<&'static str>,
}

impl Plan {
  fn for_kind(kind: DownloadKind) -> Option<Self> {
    let plan = match kind {
      DownloadKind::Stream => return None,
      DownloadKind::Audio => Plan {
        spec: DownloadSpec::new(BEST_AUDIO),
        key: None,
        id_exts: AUDIO_EXTS,
        ext: None,
      },
      DownloadKind::Video => Plan {
        spec: DownloadSpec::new(BEST_VIDEO_720).merge_mp4(),
        key: None,
        id_exts: VIDEO_EXTS,
        ext: Some("mp4"),
      },
      DownloadKind::SongAudio { format_id, title } => Plan {
        spec: DownloadSpec::new(format_id).extract_mp3(),
        key: Some(CacheKey::new(title, "mp3")),
        id_exts: &[],
        ext: Some("mp3"),
      },
      DownloadKind::SongVideo { format_id, title } => Plan {
        spec: DownloadSpec::new(format!("{format_id}+{SONG_AUDIO_ITAG}"))
          .merge_mp4(),
        key: Some(CacheKey::new(title, "mp4")),
        id_exts: &[],
        ext: Some("mp4"),
      },
    };

    Some(plan)
  }
}

async fn fetch_to_cache(
  extractor: Arc<dyn Extractor>,
  cookies: CookieDir,
  cache: MediaCache,
  link: String,
  plan: Plan,
) -> Result<PathBuf> {
  // cheap lookups first: no extractor call when the file is already there
  let cached = match (&plan.key, link::video_id(&link)) {
    (Some(key), _) => cache.get(key).await,
    (None, Some(id)) => cache.find(id, plan.id_exts).await,
    (None, None) => None,
  };
  if let Some(path) = cached {
    debug!("cache hit for {}: {}", link, path.display());
    return Ok(path);
  }

  let cookies = cookies.pick().await?;

  let key = match plan.key {
    Some(key) => key,
    None => {
      let info = extractor
        .probe(&link, &cookies, Some(&plan.spec.format))
        .await?;
      let ext = plan
        .ext
        .map(String::from)
        .or(info.ext)
        .ok_or_else(|| {
          Error::Extraction(format!("no file extension reported for {link}"))
        })?;
      let key = CacheKey::new(info.id, ext);

      if let Some(path) = cache.get(&key).await {
        debug!("cache hit for {}: {}", link, path.display());
        return Ok(path);
      }
      key
    }
  };

  cache.ensure_dir().await?;
  let staging = cache.staging(&key);

  info!("downloading {} into {}", link, cache.path(&key).display());
  let downloaded = extractor
    .download(&link, &cookies, &plan.spec, &staging.template)
    .await;

  let adopted = match downloaded {
    Ok(()) => {
      if media_cache::is_file(&staging.file).await {
        cache.adopt(&key, &staging.file).await
      } else {
        Err(Error::Download(format!(
          "yt-dlp reported success but wrote no {}",
          staging.file.display()
        )))
      }
    }
    Err(e) => Err(e),
  };

  if adopted.is_err() {
    if let Err(e) = cache.discard(&staging).await {
      warn!("cannot clean up after failed download of {}: {}", link, e);
    }
  }

  adopted
}

fn to_metadata(info: VideoInfo, link: String) -> Metadata {
  let duration_secs = info
    .duration
    .filter(|secs| *secs > 0.0)
    .map(|secs| secs.round() as u64);
  let duration_text = duration_secs
    .map(format_duration)
    .unwrap_or_else(|| "Live".to_string());
  // drop the cache-busting query string
  let thumbnail = info
    .thumbnail
    .as_deref()
    .map(|url| url.split('?').next().unwrap_or(url).to_string())
    .unwrap_or_default();

  Metadata {
    id: info.id,
    title: info.title,
    duration_secs,
    duration_text,
    thumbnail,
    link: info.webpage_url.unwrap_or(link),
  }
}

fn select_formats(formats: Vec<RawFormat>, link: &str) -> Vec<StreamFormat> {
  formats
    .into_iter()
    // DASH formats are fragmented, useless for single-file playback
    .filter(|f| {
      !f.format
        .as_deref()
        .unwrap_or_default()
        .to_lowercase()
        .contains("dash")
    })
    .filter_map(|f| {
      Some(StreamFormat {
        format: f.format?,
        filesize: f.filesize?,
        format_id: f.format_id?,
        ext: f.ext?,
        format_note: f.format_note?,
        link: link.to_string(),
      })
    })
    .collect()
}
