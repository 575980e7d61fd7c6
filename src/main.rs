use anyhow::{Context, Result};
use ratescraper::{
    api::{self, AppState, ResultCache},
    config::Settings,
    Extractor, HttpFetcher,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use warp::Filter;

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) settings + registry ──────────────────────────────────────
    let settings = Settings::from_env().context("reading settings")?;
    let registry = settings.registry()?;
    info!(
        sources = registry.len(),
        timeout = ?settings.timeout,
        concurrency = settings.concurrency,
        "registry loaded"
    );
    if settings.allowed_origins.is_empty() {
        warn!("no CORS origins configured; browsers will be refused");
    }

    // ─── 3) extractor + caller-owned cache ───────────────────────────
    let fetcher = HttpFetcher::new(&settings.fetch_config()).context("building HTTP client")?;
    let extractor = Extractor::new(registry, fetcher).with_concurrency(settings.concurrency);
    let state = AppState::new(extractor, ResultCache::new());

    // ─── 4) serve ────────────────────────────────────────────────────
    let routes = api::routes(state)
        .with(api::cors(&settings.allowed_origins))
        .with(warp::trace::request());

    info!("Server starting on port {}", settings.port);
    info!("Health check: http://localhost:{}/health", settings.port);
    warp::serve(routes).run(([0, 0, 0, 0], settings.port)).await;

    Ok(())
}
