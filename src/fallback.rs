use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::media::FallbackOutcome;
use crate::Result;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Second tier of every resolution: a remote service that turns a link
/// into a playable URL. Implementations never fail; any error becomes
/// [`FallbackOutcome::failed`].
#[async_trait]
pub trait Fallback: Send + Sync {
  async fn resolve(&self, link: &str) -> FallbackOutcome;
}

#[derive(Clone, Debug)]
pub struct RemoteApi {
  client: reqwest::Client,
  url: Option<String>,
  key: String,
}

impl RemoteApi {
  pub fn new(
    url: Option<String>,
    key: String,
    timeout: Duration,
  ) -> Result<Self> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url, key })
  }

  async fn request(&self, url: &str, link: &str) -> Result<FallbackOutcome> {
    let outcome = self
      .client
      .get(url)
      .query(&[("key", self.key.as_str()), ("url", link)])
      .header("User-Agent", "Mozilla/5.0")
      .send()
      .await?
      .json::<FallbackOutcome>()
      .await?;

    Ok(outcome)
  }
}

#[async_trait]
impl Fallback for RemoteApi {
  async fn resolve(&self, link: &str) -> FallbackOutcome {
    let Some(url) = &self.url else {
      info!("no fallback api configured, skipping {}", link);
      return FallbackOutcome::failed();
    };

    match self.request(url, link).await {
      Ok(outcome) => {
        info!("fallback api answered code {} for {}", outcome.code, link);
        outcome
      }
      Err(e) => {
        error!("fallback api error for {}: {}", link, e);
        FallbackOutcome::failed()
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[tokio::test]
  async fn test_unconfigured_api_fails_quietly() {
    let api = RemoteApi::new(None, "key".into(), DEFAULT_TIMEOUT).unwrap();
    let outcome = api.resolve("https://youtu.be/dQw4w9WgXcQ").await;
    assert_eq!(outcome, FallbackOutcome::failed());
  }

  #[tokio::test]
  async fn test_unreachable_api_fails_quietly() {
    // port 9 (discard) on localhost is closed on any sane test box
    let api = RemoteApi::new(
      Some("http://127.0.0.1:9/resolve".into()),
      "key".into(),
      Duration::from_secs(2),
    )
    .unwrap();

    let outcome = api.resolve("https://youtu.be/dQw4w9WgXcQ").await;
    assert_eq!(outcome, FallbackOutcome::failed());
  }

  #[tokio::test]
  async fn test_parses_remote_answer() {
    use std::collections::HashMap;

    use axum::{extract::Query, routing::get, Json, Router};

    async fn answer(
      Query(params): Query<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
      if params.get("key").map(String::as_str) != Some("secret") {
        return Json(serde_json::json!({ "code": 0 }));
      }
      let url = format!("https://cdn.example/{}", params["url"].len());
      Json(serde_json::json!({ "code": 1, "url": url }))
    }

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/resolve", get(answer));
    let server = axum::Server::from_tcp(listener)
      .unwrap()
      .serve(app.into_make_service());
    tokio::spawn(server);

    let api_url = Some(format!("http://{addr}/resolve"));
    let link = "https://youtu.be/dQw4w9WgXcQ";

    let api = RemoteApi::new(api_url.clone(), "secret".into(), DEFAULT_TIMEOUT)
      .unwrap();
    let outcome = api.resolve(link).await;
    assert_eq!(outcome.code, 1);
    assert_eq!(outcome.url, format!("https://cdn.example/{}", link.len()));

    // missing fields fall back to their defaults
    let api = RemoteApi::new(api_url, "wrong".into(), DEFAULT_TIMEOUT).unwrap();
    assert_eq!(api.resolve(link).await, FallbackOutcome::failed());
  }
}
