use std::{
  path::{Path, PathBuf},
  process::{Output, Stdio},
  time::Duration,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::util::{redact_proxy, stderr_summary};
use crate::{Error, Result};

use super::{DownloadSpec, Extractor, VideoInfo};

// yt-dlp messages for videos that are gone or locked
const NOT_FOUND_MARKERS: &[&str] = &[
  "private video",
  "video unavailable",
  "this video has been removed",
  "does not exist",
  "this video is not available",
];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

// run yt-dlp command line for every extraction.
// requires yt-dlp executable to be in PATH, or an explicit binary path.
#[derive(Clone, Debug)]
pub struct Ytdlp {
  bin: PathBuf,
  // lookups: stream url, metadata, playlist
  timeout: Duration,
  download_timeout: Duration,
  proxy: Option<String>,
}

impl Ytdlp {
  pub fn new(bin: impl Into<PathBuf>) -> Self {
    Self {
      bin: bin.into(),
      timeout: DEFAULT_TIMEOUT,
      download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
      proxy: None,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
    self.download_timeout = timeout;
    self
  }

  pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
    self.proxy = proxy;
    self
  }

  fn command(&self, cookies: &Path) -> Command {
    let mut cmd = Command::new(&self.bin);
    cmd
      .arg("--cookies")
      .arg(cookies)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      // dropping the future (timeout or caller cancel) kills yt-dlp
      .kill_on_drop(true);

    if let Some(proxy) = &self.proxy {
      debug!("using proxy: {}", redact_proxy(proxy));
      cmd.arg("--proxy").arg(proxy);
    }

    cmd
  }

  async fn run(
    &self,
    mut cmd: Command,
    timeout: Duration,
    what: &'static str,
  ) -> Result<Output> {
    match tokio::time::timeout(timeout, cmd.output()).await {
      Ok(output) => Ok(output?),
      Err(_) => Err(Error::Timeout(what)),
    }
  }
}

#[async_trait]
impl Extractor for Ytdlp {
  async fn stream_url(&self, link: &str, cookies: &Path) -> Result<String> {
    let mut cmd = self.command(cookies);
    cmd.arg("-g").arg("-f").arg(super::BEST_AUDIO).arg(link);

    let output = self
      .run(cmd, self.timeout, "yt-dlp stream lookup")
      .await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let url = stdout.lines().map(str::trim).find(|line| !line.is_empty());

    match url {
      Some(url) if output.status.success() => Ok(url.to_string()),
      _ => Err(Error::Extraction(stderr_summary(&output.stderr))),
    }
  }

  async fn probe(
    &self,
    link: &str,
    cookies: &Path,
    format: Option<&str>,
  ) -> Result<VideoInfo> {
    let mut cmd = self.command(cookies);
    cmd
      // dump metadata as a single json object, no download
      .arg("-J")
      .arg("--no-playlist")
      .arg("--no-warnings");

    if let Some(format) = format {
      cmd.arg("-f").arg(format);
    }

    cmd.arg(link);

    let output = self
      .run(cmd, self.timeout, "yt-dlp metadata extraction")
      .await?;
    if !output.status.success() {
      return Err(classify_failure(&output.stderr));
    }

    serde_json::from_slice(&output.stdout)
      .map_err(|e| Error::Extraction(format!("unexpected yt-dlp output: {e}")))
  }

  async fn download(
    &self,
    link: &str,
    cookies: &Path,
    spec: &DownloadSpec,
    output: &Path,
  ) -> Result<()> {
    let mut cmd = self.command(cookies);
    cmd
      .arg("--geo-bypass")
      .arg("--no-check-certificates")
      .arg("--no-warnings")
      .arg("--quiet")
      .arg("--no-progress")
      .arg("--no-playlist")
      .arg("--no-mtime")
      .arg("-f")
      .arg(&spec.format)
      .arg("-o")
      .arg(output);

    if spec.merge_mp4 {
      cmd.arg("--merge-output-format").arg("mp4");
    }

    if spec.extract_mp3 {
      cmd
        .arg("-x")
        .arg("--audio-format")
        .arg("mp3")
        .arg("--audio-quality")
        .arg("192K");
    }

    cmd.arg(link);

    debug!("downloading {} with format {}", link, spec.format);
    let output = self
      .run(cmd, self.download_timeout, "yt-dlp download")
      .await?;
    if !output.status.success() {
      return Err(classify_failure(&output.stderr));
    }

    Ok(())
  }

  async fn playlist(
    &self,
    link: &str,
    cookies: &Path,
    limit: usize,
  ) -> Result<Vec<String>> {
    let mut cmd = self.command(cookies);
    cmd
      // don't fetch video pages
      .arg("--flat-playlist")
      .arg("--print")
      .arg("id")
      .arg("--playlist-end")
      .arg(limit.to_string())
      .arg(link);

    let output = self
      .run(cmd, self.timeout, "yt-dlp playlist listing")
      .await?;
    if !output.status.success() {
      return Err(classify_failure(&output.stderr));
    }

    let ids = String::from_utf8_lossy(&output.stdout)
      .lines()
      .map(str::trim)
      .filter(|id| !id.is_empty())
      .map(String::from)
      .collect();

    Ok(ids)
  }
}

fn classify_failure(stderr: &[u8]) -> Error {
  let message = stderr_summary(stderr);
  let lower = message.to_lowercase();

  if NOT_FOUND_MARKERS.iter().any(|marker| lower.contains(marker)) {
    Error::NotFound(message)
  } else {
    Error::Extraction(message)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::util::fake_ytdlp;

  #[test]
  fn test_classify_failure() {
    let err = classify_failure(b"ERROR: [youtube] abc: Private video. Sign in");
    assert!(matches!(err, Error::NotFound(_)));

    let err = classify_failure(b"ERROR: [youtube] abc: Video unavailable");
    assert!(matches!(err, Error::NotFound(_)));

    let err = classify_failure(
      b"ERROR: [youtube] abc: The uploader has not made this video \
        available in your country",
    );
    assert!(matches!(err, Error::Extraction(_)));
  }

  #[tokio::test]
  async fn test_missing_binary_is_io_error() {
    let ytdlp = Ytdlp::new("/nonexistent/yt-dlp");
    let res = ytdlp
      .stream_url("https://youtu.be/dQw4w9WgXcQ", Path::new("c.txt"))
      .await;

    assert!(matches!(res, Err(Error::IO(_))));
  }

  const LINK: &str = "https://youtu.be/dQw4w9WgXcQ";

  async fn stream_url_from(body: &str) -> Result<String> {
    let dir = tempfile::tempdir().unwrap();
    let ytdlp = Ytdlp::new(fake_ytdlp(dir.path(), body))
      .with_timeout(Duration::from_secs(2));
    let cookies = dir.path().join("c.txt");

    ytdlp.stream_url(LINK, &cookies).await
  }

  #[tokio::test]
  async fn test_stream_url_takes_first_line() {
    let res =
      stream_url_from(r"printf '\n  https://rr1/a  \nhttps://rr1/b\n'").await;
    assert_eq!(res.unwrap(), "https://rr1/a");
  }

  #[tokio::test]
  async fn test_stream_url_needs_output_and_success() {
    // exit 0 without printing anything
    match stream_url_from("exit 0").await {
      Err(Error::Extraction(msg)) => {
        assert_eq!(msg, "yt-dlp returned no output")
      }
      res => panic!("unexpected {res:?}"),
    }

    // a url on stdout does not rescue a failed run
    let res = stream_url_from(
      "echo https://rr1/a; echo 'ERROR: [youtube] sign in' >&2; exit 1",
    )
    .await;
    match res {
      Err(Error::Extraction(msg)) => {
        assert_eq!(msg, "ERROR: [youtube] sign in")
      }
      res => panic!("unexpected {res:?}"),
    }
  }

  #[tokio::test]
  async fn test_stream_url_times_out() {
    let res = stream_url_from("exec sleep 5").await;
    assert!(matches!(res, Err(Error::Timeout(_))), "{res:?}");
  }

  #[tokio::test]
  async fn test_slow_download_outlives_lookup_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"
      while [ $# -gt 0 ]; do
        [ "$1" = "-o" ] && out="$2"
        shift
      done
      sleep 1
      printf media > "$(echo "$out" | sed 's/%(ext)s/webm/')"
    "#;
    let ytdlp = Ytdlp::new(fake_ytdlp(dir.path(), script))
      .with_timeout(Duration::from_millis(200))
      .with_download_timeout(Duration::from_secs(30));
    let cookies = dir.path().join("c.txt");
    let output = dir.path().join("out.%(ext)s");
    let spec = DownloadSpec::new(crate::extractor::BEST_AUDIO);

    ytdlp.download(LINK, &cookies, &spec, &output).await.unwrap();

    assert_eq!(std::fs::read(dir.path().join("out.webm")).unwrap(), b"media");
  }

  #[tokio::test]
  async fn test_download_has_its_own_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let ytdlp = Ytdlp::new(fake_ytdlp(dir.path(), "exec sleep 5"))
      .with_timeout(Duration::from_secs(30))
      .with_download_timeout(Duration::from_millis(200));
    let cookies = dir.path().join("c.txt");
    let output = dir.path().join("out.%(ext)s");
    let spec = DownloadSpec::new(crate::extractor::BEST_AUDIO);

    let res = ytdlp.download(LINK, &cookies, &spec, &output).await;

    assert!(matches!(res, Err(Error::Timeout("yt-dlp download"))), "{res:?}");
  }
}
