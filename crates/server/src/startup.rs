use std::net::SocketAddr;

use axum::Router;
use common::utils::logging::init_logging_from_env;
use configs::{AppConfig, ServerConfig};
use dotenvy::dotenv;
use service::google::{self, ServiceAccount};
use service::records::{RecordService, RecordSettings};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use crate::routes;
use crate::state::AppState;

/// Initialize logging via shared common utils
fn init_logging() {
    init_logging_from_env();
}

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(server: &ServerConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", server.host, server.port).parse()?)
}

/// Load credentials and build the record service around the Google clients.
async fn build_state(cfg: &AppConfig) -> Result<AppState, StartupError> {
    let google_cfg = &cfg.google;
    common::env::ensure_credentials(&google_cfg.credentials_path)
        .await
        .map_err(StartupError::Runtime)?;
    let account = ServiceAccount::load(&google_cfg.credentials_path)
        .await
        .map_err(|e| StartupError::Runtime(e.to_string()))?;
    info!(client_email = %account.client_email, "service account loaded");

    let (sheets, drive) = google::build_clients(account, &google_cfg.spreadsheet_id);
    let settings = RecordSettings {
        default_sheet: google_cfg.default_sheet.clone(),
        default_range: google_cfg.default_range.clone(),
        drive_folder_id: google_cfg.drive_folder_id.clone(),
    };
    Ok(AppState::new(RecordService::new(sheets, drive, settings)))
}

/// Public entry: build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    let cfg = AppConfig::load_and_validate().map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    let state = build_state(&cfg).await?;

    let app: Router = routes::build_router(state, build_cors(), cfg.server.max_upload_bytes());

    let addr = bind_addr(&cfg.server)?;
    info!(
        %addr,
        spreadsheet_id = %cfg.google.spreadsheet_id,
        drive_folder = ?cfg.google.drive_folder_id,
        "starting record server"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
