// Copyright (C) 2025 Matías Salinas (support@fenden.com)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{net::SocketAddr, process::exit, sync::Arc};

use axum::{
    routing::{delete, get, post},
    Router,
};
use hyper::Server;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rag_orchestrator::admin::invalidate::invalidate_handler;
use rag_orchestrator::admin::status::get_status;
use rag_orchestrator::cache::ResponseCache;
use rag_orchestrator::config::{Config, CONFIG};
use rag_orchestrator::health::{HealthMonitor, ProbeTarget};
use rag_orchestrator::http_pool::HttpPool;
use rag_orchestrator::ingress::{query_handler, AppState};
use rag_orchestrator::metrics::Metrics;
use rag_orchestrator::models::ModelRegistry;
use rag_orchestrator::pipeline::Orchestrator;

use hyper::http::{header, HeaderValue, Method};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::cors::CorsLayer;

/// ----------------------------
/// CLI ARGUMENT STRUCTURE
/// ----------------------------
/// Defines CLI arguments that can be passed to the binary, such as the
/// path to the configuration file. Defaults to "config.yaml" if not
/// provided.
#[derive(Parser, Debug)]
#[command(
    name = "rag-orchestrator",
    version = "0.1.0",
    author = "Matías Salinas Contreras <support@fenden.com>",
    about = "Orchestrates retrieval-augmented generation over a vector store and an LLM runtime",
    long_about = Some(
        "rag-orchestrator fronts a vector store and an LLM runtime with a \
        single query API: it classifies each question, routes it to a \
        quality-appropriate model, retrieves grounding context, caches \
        repeat answers, and reports health and performance over its own \
        admin surface.\n\n\
        Author: Matías Salinas Contreras <support@fenden.com>\n\
        Version: 0.1.0"
    )
)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    config: String,
}

/// ----------------------------
/// LOGGING INITIALIZATION
/// ----------------------------
/// Initializes structured logging using the `LOG_LEVEL` environment
/// variable. Falls back to "info" if not set.
fn init_logging(app_id: &str) {
    let filter = EnvFilter::try_new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("logging initialized for app_id: {app_id}");
}

/// Resolves on SIGINT (Ctrl-C) or SIGTERM, whichever arrives first,
/// letting `with_graceful_shutdown` drain in-flight requests before the
/// server future completes. SIGTERM is the signal container/orchestration
/// runtimes send on `docker stop` / `kubectl delete pod`, so it must be
/// handled alongside Ctrl-C for shutdown to trigger there.
async fn wait_for_shutdown_signal() {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

fn now_unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// ---------------------------
/// APPLICATION ENTRY POINT
/// ---------------------------
/// Starts the orchestrator using Axum and initializes all required
/// components: config loading, the downstream HTTP pools, the response
/// cache, the model registry, the health monitor, and both the ingress
/// and admin HTTP servers.
#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() {
    // 1. Parse CLI arguments (e.g., --config=config.prod.yaml)
    let args = Args::parse();

    // 2. Load configuration from YAML file
    let config = match Config::from_file(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load config from '{}': {e}", args.config);
            exit(1);
        }
    };

    // 3. Initialize the logger using app_id for context
    init_logging(&config.app_id);

    let builder = PrometheusBuilder::new();
    let prometheus_handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Set global CONFIG (OnceCell) for use across modules
    CONFIG.set(config).expect("CONFIG was already initialized");
    let config = CONFIG.get().expect("CONFIG must be initialized");

    // 5. Build the downstream HTTP pools, the response cache, the model
    //    registry, and the live metrics counters.
    let vector_store_pool = HttpPool::new(config.max_concurrent_requests, config.pool_max_idle_per_host);
    let llm_pool = HttpPool::new(config.max_concurrent_requests, config.pool_max_idle_per_host);
    let cache = ResponseCache::new(config.cache.capacity);
    let models = ModelRegistry::new(
        &config.models.ultra_fast,
        &config.models.fast,
        &config.models.quality,
        &config.models.ultra_quality,
    );
    let metrics = Arc::new(Metrics::new(now_unix_ms()));

    let orchestrator = Arc::new(Orchestrator {
        cache,
        models,
        metrics: metrics.clone(),
        vector_store_pool,
        llm_pool,
        config: Arc::new(config.clone()),
    });

    // 6. Start the background health-check loop against both downstreams.
    let health = Arc::new(HealthMonitor::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let probe_targets = vec![
        ProbeTarget {
            name: "vector_store".to_string(),
            base_url: config.vector_store.base_url.clone(),
            health_path: config.vector_store.health_path.clone(),
        },
        ProbeTarget {
            name: "llm".to_string(),
            base_url: config.llm.base_url.clone(),
            health_path: config.llm.health_path.clone(),
        },
    ];
    health.clone().spawn(
        orchestrator.vector_store_pool.client().clone(),
        probe_targets,
        config.health_check_interval_secs,
        metrics,
        shutdown_rx,
    );

    let state = Arc::new(AppState {
        app_id: config.app_id.clone(),
        orchestrator,
        health,
    });

    // 7. Build the ingress and admin routers.
    let cors = CorsLayer::new()
        .allow_origin("http://localhost:4321".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let ingress_router = Router::new()
        .route("/query", post(query_handler))
        .layer(cors.clone())
        .with_state(state.clone());

    let admin_router = Router::new()
        .route("/admin/api/cache", delete(invalidate_handler))
        .route("/admin/api/status", get(get_status))
        .route(
            "/metrics",
            get(move || {
                let handle = prometheus_handle.clone();
                async move { handle.render() }
            }),
        )
        .layer(cors)
        .with_state(state);

    // 8. Bind and serve both surfaces concurrently.
    let ingress_addr = SocketAddr::from(([0, 0, 0, 0], config.ingress_port));
    let admin_addr = SocketAddr::from(([0, 0, 0, 0], config.admin_port));

    info!("query ingress listening at http://{}/query", ingress_addr);
    info!(
        "admin status at http://{}/admin/api/status | metrics at http://{}/metrics",
        admin_addr, admin_addr
    );

    let ingress_server = Server::bind(&ingress_addr)
        .serve(ingress_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown_signal());
    let admin_server = Server::bind(&admin_addr)
        .serve(admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown_signal());

    let (ingress_result, admin_result) = tokio::join!(ingress_server, admin_server);

    if let Err(e) = ingress_result {
        error!("ingress server exited with error: {}", e);
    }
    if let Err(e) = admin_result {
        error!("admin server exited with error: {}", e);
    }

    // Both HTTP surfaces have drained their in-flight requests by now;
    // tell the health monitor to stop probing before the process exits.
    info!("shutting down health monitor");
    let _ = shutdown_tx.send(true);
}
