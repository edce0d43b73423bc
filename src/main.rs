use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use youtube_link_resolver::{routes, Config, LinkResolver, Result};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let config = Config::from_env()?;
  let resolver = LinkResolver::from_config(&config)?;

  let cookies = resolver.cookies().list().await.map(|files| files.len());
  match cookies {
    Ok(count) => info!("{} cookie files available", count),
    Err(e) => warn!("{}", e),
  }
  if config.api_url.is_none() {
    info!("API_URL not set, remote fallback disabled");
  }

  resolver.cache().ensure_dir().await?;
  let app = routes::router(Arc::new(resolver));

  info!("listening on {}", config.listen_addr);

  axum::Server::bind(&config.listen_addr)
    .serve(app.into_make_service())
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
    })
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

  Ok(())
}
