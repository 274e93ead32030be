use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use log::info;
use tokio::net::TcpListener;

use crate::collector::{self, CONTENT_TYPE};
use crate::state::MeterState;

#[derive(Clone)]
pub struct AppState {
    pub meter: Arc<MeterState>,
    pub telemetry_path: String,
}

pub fn build_router(meter: Arc<MeterState>, telemetry_path: &str) -> Router {
    let app_state = AppState {
        meter,
        telemetry_path: telemetry_path.to_string(),
    };

    let router = Router::new().route(telemetry_path, get(metrics));
    let router = if telemetry_path == "/" {
        router
    } else {
        router.route("/", get(landing))
    };
    router.with_state(app_state)
}

pub async fn serve(listen_address: &str, router: Router) -> Result<()> {
    let listener = TcpListener::bind(listen_address)
        .await
        .with_context(|| format!("Failed to listen on {}", listen_address))?;
    info!("Listening on {}", listen_address);
    axum::serve(listener, router)
        .await
        .context("HTTP server failed")
}

// GET <telemetry path>
async fn metrics(State(app): State<AppState>) -> impl IntoResponse {
    let body = collector::render(&app.meter.snapshot(), Utc::now());
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

// GET /
async fn landing(State(app): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>P1 Exporter</title></head>\n\
         <body>\n\
         <h1>P1 Exporter</h1>\n\
         <p><a href='{}'>Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        app.telemetry_path
    ))
}
