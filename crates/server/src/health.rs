use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use paybot_core::config::DeliveryMode;
use paybot_core::SessionStore;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub csv_path: PathBuf,
    pub sessions: Arc<SessionStore>,
    pub mode: DeliveryMode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub storage: HealthCheck,
    pub delivery_mode: DeliveryMode,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = storage_check(&state.csv_path);
    let ready = storage.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck { status: "ready", detail: "paybot-server running".to_owned() },
        storage,
        delivery_mode: state.mode,
        active_sessions: state.sessions.active_sessions(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn storage_check(csv_path: &Path) -> HealthCheck {
    if csv_path.is_file() {
        return HealthCheck { status: "ready", detail: format!("{} exists", csv_path.display()) };
    }
    if csv_path.exists() {
        return HealthCheck {
            status: "degraded",
            detail: format!("{} is not a regular file", csv_path.display()),
        };
    }

    // the first append creates the file; only the directory has to be there
    let parent = csv_path.parent().filter(|parent| !parent.as_os_str().is_empty());
    match parent {
        Some(dir) if !dir.is_dir() => HealthCheck {
            status: "degraded",
            detail: format!("directory {} does not exist", dir.display()),
        },
        _ => HealthCheck {
            status: "ready",
            detail: format!("{} will be created on first submission", csv_path.display()),
        },
    }
}
