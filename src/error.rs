use axum::response::{IntoResponse, Response};
use reqwest::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("configuration error: {0}")]
  Config(String),
  #[error("extraction failed: {0}")]
  Extraction(String),
  #[error("download failed: {0}")]
  Download(String),
  #[error("video not found: {0}")]
  NotFound(String),
  #[error("invalid request: {0}")]
  InvalidRequest(String),
  #[error("{0} timed out")]
  Timeout(&'static str),
  #[error(transparent)]
  IO(#[from] std::io::Error),
  #[error(transparent)]
  Http(#[from] reqwest::Error),
}

impl Error {
  pub fn status_code(&self) -> StatusCode {
    match self {
      Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
      Error::Download(_) | Error::Timeout(_) | Error::Http(_) => {
        StatusCode::BAD_GATEWAY
      }
      Error::Config(_) | Error::IO(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    (self.status_code(), self.to_string()).into_response()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_status_codes() {
    assert_eq!(
      Error::NotFound("abc".into()).status_code(),
      StatusCode::NOT_FOUND
    );
    assert_eq!(
      Error::Download("both tiers failed".into()).status_code(),
      StatusCode::BAD_GATEWAY
    );
    assert_eq!(
      Error::Config("no cookies".into()).status_code(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}
