use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use auth_cell::{AuthService, SessionEvent};
use doctor_cell::{generate_doctors, seed_doctors};
use shared_config::AppConfig;
use shared_utils::AppState;

const DEMO_SEED: u64 = 42;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting doctor booking API server");

    // Load configuration
    let config = AppConfig::from_env();
    let port = config.server_port;
    let seed_count = config.seed_demo_data.then_some(config.seed_doctor_count);

    // Create shared state
    let state = Arc::new(AppState::from_config(config));
    let auth = Arc::new(AuthService::new(&state));

    if let Some(count) = seed_count {
        let doctors = generate_doctors(count, DEMO_SEED, Utc::now().date_naive());
        let written = seed_doctors(&state.store, &doctors).await?;
        info!("Demo directory ready ({} new doctors)", written);
    }

    // Session changes are observed here and nowhere else
    let mut sessions = auth.sessions().subscribe();
    tokio::spawn(async move {
        while let Some(event) = sessions.next().await {
            match event {
                SessionEvent::LoggedIn(session) => {
                    info!("Session started for {} ({:?})", session.user_id, session.role)
                }
                SessionEvent::LoggedOut => info!("Session ended"),
            }
        }
        warn!("Session stream closed");
    });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state, auth)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
