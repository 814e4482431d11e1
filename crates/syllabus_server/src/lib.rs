//! HTTP surface for the Syllabus content admin.
//!
//! # Responsibility
//! - Expose hierarchy CRUD, reorder and slug checks over JSON.
//! - Enforce the role headers on every content route.
//!
//! # Invariants
//! - Business rules live in `syllabus_core`; handlers only translate
//!   requests and errors.

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use auth::{USER_ID_HEADER, USER_ROLE_HEADER};
use config::Config;
use error::StartupError;
use routes::{
    create_node, delete_node, get_node, health_handler, list_nodes, move_node, slug_check,
    update_node,
};
use state::AppState;

/// Builds the router; used by the binary and by HTTP tests.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_ROLE_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/:level", get(list_nodes).post(create_node))
        .route("/:level/slug-check", get(slug_check))
        .route(
            "/:level/:id",
            get(get_node).put(update_node).delete(delete_node),
        )
        .route("/:level/:id/move", post(move_node))
        .layer(cors)
        .with_state(state)
}

/// Opens storage, binds the listener and serves until a shutdown signal.
pub async fn start_server(config: Config) -> Result<(), StartupError> {
    let log_dir = config.log_dir.to_string_lossy().into_owned();
    syllabus_core::init_logging(&config.log_level, &log_dir)?;

    info!(
        "event=server_start module=server status=start db_path={}",
        config.db_path.display()
    );
    let state = AppState::open(&config.db_path)?;
    let app = build_app(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("event=server_start module=server status=ok address={address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("event=server_stop module=server status=ok");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("event=shutdown_signal module=server status=error signal=ctrl_c error={err}");
            std::future::pending::<()>().await;
        }
        info!("event=shutdown_signal module=server status=ok signal=ctrl_c");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("event=shutdown_signal module=server status=ok signal=terminate");
            }
            Err(err) => {
                warn!("event=shutdown_signal module=server status=error signal=terminate error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
