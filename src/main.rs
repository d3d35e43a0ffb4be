use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use capao_quest::{
    AppState,
    ai::OpenAiProvider,
    config::Config,
    middleware::{RateLimiter, rate_limit},
    router,
    store::{GameStore, MemoryStore, PgStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration (is JWT_SECRET set?)");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let store: Arc<dyn GameStore> = match &config.database_url {
        Some(url) => Arc::new(
            PgStore::connect(url)
                .await
                .expect("Failed to connect to Postgres"),
        ),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store with demo data");
            Arc::new(MemoryStore::seeded())
        }
    };

    if config.llm_api_key.is_none() {
        tracing::warn!("LLM_API_KEY not set, AI enhancement will be unavailable");
    }
    let provider = Arc::new(OpenAiProvider::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    ));

    let state = AppState::new(config.clone(), store, provider);
    state.jobs.start();

    let router = router::app(state.clone());

    // 设置限流器
    let router = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).expect("Failed to create Redis client");
            let limiter = Arc::new(RateLimiter::new(
                client,
                config.rate_limit_window(),
                config.rate_limit_requests,
            ));
            router.layer(axum::middleware::from_fn_with_state(limiter, rate_limit))
        }
        None => {
            tracing::info!("REDIS_URL not set, rate limiting disabled");
            router
        }
    };

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");

    state.jobs.stop();
}
