pub mod config;
pub mod cookies;
mod error;
pub mod extractor;
pub mod fallback;
pub mod link;
pub mod media;
pub mod media_cache;
mod resolver;
pub mod routes;
mod util;

pub use config::Config;
pub use error::{Error, Result};
pub use media::{
  Download, DownloadKind, FallbackOutcome, Metadata, StreamFormat,
};
pub use resolver::LinkResolver;
