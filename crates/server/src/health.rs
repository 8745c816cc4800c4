use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};
use yaruki_slack::ConnectionStatus;

#[derive(Clone)]
pub struct HealthState {
    connection_status: ConnectionStatus,
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
    pub slack_socket: HealthCheck,
    pub checked_at: String,
}

pub fn router(connection_status: ConnectionStatus) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { connection_status })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    connection_status: ConnectionStatus,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(connection_status)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let slack_socket = if state.connection_status.is_connected() {
        HealthCheck { status: "ready", detail: "socket mode connection open".to_string() }
    } else {
        HealthCheck { status: "degraded", detail: "socket mode connection is not open".to_string() }
    };
    let ready = slack_socket.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "yaruki-server runtime initialized".to_string(),
        },
        slack_socket,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
