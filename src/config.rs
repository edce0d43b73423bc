use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::{Error, Result};

/// Everything the resolver reads from its environment, collected once at
/// startup and handed to [`crate::LinkResolver::from_config`].
#[derive(Clone, Debug)]
pub struct Config {
  /// Fallback API endpoint. Without it the remote tier always fails.
  pub api_url: Option<String>,
  pub api_key: String,
  pub api_timeout: Duration,
  pub cookies_dir: PathBuf,
  pub downloads_dir: PathBuf,
  pub ytdlp_bin: PathBuf,
  pub ytdlp_timeout: Duration,
  /// Upper bound for a whole media download, much longer than a lookup.
  pub ytdlp_download_timeout: Duration,
  pub ytdlp_proxy: Option<String>,
  pub listen_addr: SocketAddr,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_url: None,
      api_key: String::new(),
      api_timeout: crate::fallback::DEFAULT_TIMEOUT,
      cookies_dir: PathBuf::from("cookies"),
      downloads_dir: PathBuf::from("downloads"),
      ytdlp_bin: PathBuf::from("yt-dlp"),
      ytdlp_timeout: crate::extractor::DEFAULT_TIMEOUT,
      ytdlp_download_timeout: crate::extractor::DEFAULT_DOWNLOAD_TIMEOUT,
      ytdlp_proxy: None,
      listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
    }
  }
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  pub fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    // empty values count as unset
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let mut config = Config::default();

    config.api_url = var("API_URL");
    if let Some(key) = var("API_KEY") {
      config.api_key = key;
    }
    if let Some(secs) = var("API_TIMEOUT_SECS") {
      config.api_timeout = parse_secs("API_TIMEOUT_SECS", &secs)?;
    }
    if let Some(dir) = var("COOKIES_DIR") {
      config.cookies_dir = dir.into();
    }
    if let Some(dir) = var("DOWNLOADS_DIR") {
      config.downloads_dir = dir.into();
    }
    if let Some(bin) = var("YTDLP_BIN") {
      config.ytdlp_bin = bin.into();
    }
    if let Some(secs) = var("YTDLP_TIMEOUT_SECS") {
      config.ytdlp_timeout = parse_secs("YTDLP_TIMEOUT_SECS", &secs)?;
    }
    if let Some(secs) = var("YTDLP_DOWNLOAD_TIMEOUT_SECS") {
      config.ytdlp_download_timeout =
        parse_secs("YTDLP_DOWNLOAD_TIMEOUT_SECS", &secs)?;
    }
    config.ytdlp_proxy = var("YTDLP_PROXY");
    if let Some(addr) = var("LISTEN_ADDR") {
      config.listen_addr = addr.parse().map_err(|e| {
        Error::Config(format!("invalid LISTEN_ADDR {addr:?}: {e}"))
      })?;
    }

    Ok(config)
  }
}

fn parse_secs(name: &str, value: &str) -> Result<Duration> {
  match value.trim().parse::<u64>() {
    Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
    _ => Err(Error::Config(format!(
      "{name} must be a positive number of seconds, got {value:?}"
    ))),
  }
}

#[cfg(test)]
mod test {
  use std::collections::HashMap;

  use super::*;

  fn lookup(
    vars: &[(&str, &str)],
  ) -> impl Fn(&str) -> Option<String> + 'static {
    let vars: HashMap<String, String> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |name| vars.get(name).cloned()
  }

  #[test]
  fn test_defaults() {
    let config = Config::from_lookup(lookup(&[])).unwrap();

    assert_eq!(config.api_url, None);
    assert_eq!(config.api_timeout, Duration::from_secs(15));
    assert_eq!(config.cookies_dir, PathBuf::from("cookies"));
    assert_eq!(config.downloads_dir, PathBuf::from("downloads"));
    assert_eq!(config.ytdlp_bin, PathBuf::from("yt-dlp"));
    assert_eq!(config.ytdlp_timeout, Duration::from_secs(60));
    assert_eq!(config.ytdlp_download_timeout, Duration::from_secs(1800));
    assert_eq!(config.listen_addr.port(), 8080);
  }

  #[test]
  fn test_overrides() {
    let config = Config::from_lookup(lookup(&[
      ("API_URL", "https://resolver.example/api"),
      ("API_KEY", "k3y"),
      ("COOKIES_DIR", "/srv/cookies"),
      ("YTDLP_TIMEOUT_SECS", "30"),
      ("YTDLP_DOWNLOAD_TIMEOUT_SECS", "600"),
      ("YTDLP_PROXY", ""),
      ("LISTEN_ADDR", "127.0.0.1:9000"),
    ]))
    .unwrap();

    assert_eq!(
      config.api_url.as_deref(),
      Some("https://resolver.example/api")
    );
    assert_eq!(config.api_key, "k3y");
    assert_eq!(config.cookies_dir, PathBuf::from("/srv/cookies"));
    assert_eq!(config.ytdlp_timeout, Duration::from_secs(30));
    assert_eq!(config.ytdlp_download_timeout, Duration::from_secs(600));
    assert_eq!(config.ytdlp_proxy, None);
    assert_eq!(
      config.listen_addr,
      "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
    );
  }

  #[test]
  fn test_invalid_values() {
    let res = Config::from_lookup(lookup(&[("API_TIMEOUT_SECS", "soon")]));
    assert!(matches!(res, Err(Error::Config(_))));

    let res = Config::from_lookup(lookup(&[("YTDLP_TIMEOUT_SECS", "0")]));
    assert!(matches!(res, Err(Error::Config(_))));

    let res = Config::from_lookup(lookup(&[("LISTEN_ADDR", "nowhere")]));
    assert!(matches!(res, Err(Error::Config(_))));
  }
}
