use anyhow::Result;
use footprint_planner::{HttpFootprintEngine, PlannerConfig};
use sensor_tree::{loader, TreeSelectionModel};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod routes;
mod sessions;

use sessions::{SessionStore, SharedEngine};

/// Interval between engine health checks
const ENGINE_PROBE_INTERVAL: Duration = Duration::from_secs(5);

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub engine: SharedEngine,
    /// Hierarchy every new session starts from
    pub tree: Arc<TreeSelectionModel>,
    pub config: Arc<PlannerConfig>,
    pub http: reqwest::Client,
    /// Element feeds used when a request names none
    pub feed_urls: Arc<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "planning_gateway=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var("PLANNER_CONFIG") {
        Ok(path) => PlannerConfig::load(&path)?,
        Err(_) => PlannerConfig::default(),
    };
    tracing::info!("   Horizon default: {} days", config.horizon_days);

    let tree_path = std::env::var("PLANNING_TREE_PATH")
        .unwrap_or_else(|_| "data/sensor_tree.json".to_string());
    let tree = loader::load_tree(&tree_path)?;
    tracing::info!(
        "   Loaded sensor tree from {} ({} satellites)",
        tree_path,
        tree.satellites().count()
    );

    let engine_url = std::env::var("FOOTPRINT_ENGINE_URL")
        .unwrap_or_else(|_| "http://localhost:8090".to_string());
    let engine = Arc::new(HttpFootprintEngine::new(&engine_url));
    engine.clone().spawn_health_checks(ENGINE_PROBE_INTERVAL);

    let feed_urls: Vec<String> = std::env::var("ELEMENT_FEED_URLS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(String::from)
        .collect();
    tracing::info!("   Element feeds: {}", feed_urls.len());

    let session_ttl = std::env::var("PLANNING_SESSION_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_SESSION_TTL_SECS);
    let sessions = Arc::new(SessionStore::new());
    sessions
        .clone()
        .start_sweeper(Duration::from_secs(session_ttl), SESSION_SWEEP_INTERVAL);
    tracing::info!("   Session idle TTL: {}s", session_ttl);

    let state = AppState {
        sessions,
        engine,
        tree: Arc::new(tree),
        config: Arc::new(config),
        http: reqwest::Client::new(),
        feed_urls: Arc::new(feed_urls),
    };

    let app = routes::router(state);

    let port = std::env::var("PLANNING_GATEWAY_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "18610".to_string());
    let addr = format!("0.0.0.0:{}", port);

    tracing::info!("Planning Gateway starting on {}", addr);
    tracing::info!("   Footprint engine: {}", engine_url);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
