//! HTTP surface the bot process talks to. Thin wrappers around
//! [`LinkResolver`]; all the behavior lives there.

use std::sync::Arc;

use axum::{
  extract::{Query, State},
  response::IntoResponse,
  routing::get,
  Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
  media::{DownloadKind, FallbackOutcome, Metadata},
  Error, LinkResolver, Result,
};

const DEFAULT_PLAYLIST_LIMIT: usize = 10;

type AppState = State<Arc<LinkResolver>>;

pub fn router(resolver: Arc<LinkResolver>) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/exists", get(exists))
    .route("/details", get(details))
    .route("/stream", get(stream))
    .route("/formats", get(formats))
    .route("/download", get(download))
    .route("/playlist", get(playlist))
    .with_state(resolver)
}

#[derive(Deserialize)]
pub struct LinkQuery {
  link: String,
  #[serde(default)]
  is_id: bool,
}

#[derive(Deserialize, Default, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum KindParam {
  #[default]
  Audio,
  Video,
  Stream,
  SongAudio,
  SongVideo,
}

#[derive(Deserialize)]
pub struct DownloadQuery {
  link: String,
  #[serde(default)]
  is_id: bool,
  #[serde(default)]
  kind: KindParam,
  format_id: Option<String>,
  title: Option<String>,
}

impl DownloadQuery {
  fn download_kind(&self) -> Result<DownloadKind> {
    let song_params = || match (&self.format_id, &self.title) {
      (Some(format_id), Some(title)) => Ok((format_id.clone(), title.clone())),
      _ => Err(Error::InvalidRequest(
        "song downloads need both format_id and title".into(),
      )),
    };

    let kind = match self.kind {
      KindParam::Audio => DownloadKind::Audio,
      KindParam::Video => DownloadKind::Video,
      KindParam::Stream => DownloadKind::Stream,
      KindParam::SongAudio => {
        let (format_id, title) = song_params()?;
        DownloadKind::SongAudio { format_id, title }
      }
      KindParam::SongVideo => {
        let (format_id, title) = song_params()?;
        DownloadKind::SongVideo { format_id, title }
      }
    };

    Ok(kind)
  }
}

#[derive(Deserialize)]
pub struct PlaylistQuery {
  link: String,
  #[serde(default)]
  is_id: bool,
  limit: Option<usize>,
}

async fn health() -> impl IntoResponse {
  "ok".to_owned()
}

async fn exists(
  State(resolver): AppState,
  Query(q): Query<LinkQuery>,
) -> impl IntoResponse {
  Json(json!({ "exists": resolver.exists(&q.link, q.is_id) }))
}

async fn details(
  State(resolver): AppState,
  Query(q): Query<LinkQuery>,
) -> Result<Json<Metadata>> {
  Ok(Json(resolver.details(&q.link, q.is_id).await?))
}

async fn stream(
  State(resolver): AppState,
  Query(q): Query<LinkQuery>,
) -> Json<FallbackOutcome> {
  Json(resolver.video(&q.link, q.is_id).await)
}

async fn formats(
  State(resolver): AppState,
  Query(q): Query<LinkQuery>,
) -> Result<impl IntoResponse> {
  let (formats, link) = resolver.formats(&q.link, q.is_id).await?;
  Ok(Json(json!({ "formats": formats, "link": link })))
}

async fn download(
  State(resolver): AppState,
  Query(q): Query<DownloadQuery>,
) -> Result<impl IntoResponse> {
  let kind = q.download_kind()?;
  let download = resolver.download(&q.link, q.is_id, kind).await?;

  Ok(Json(json!({
    "location": download.location(),
    "local": download.is_local(),
  })))
}

async fn playlist(
  State(resolver): AppState,
  Query(q): Query<PlaylistQuery>,
) -> Result<impl IntoResponse> {
  let limit = q.limit.unwrap_or(DEFAULT_PLAYLIST_LIMIT);
  let ids = resolver.playlist(&q.link, limit, q.is_id).await?;
  Ok(Json(json!({ "ids": ids })))
}
