//! Optional read-only HTTP dashboard (§6.4): one HTML page and one JSON
//! endpoint, both backed by a fresh `StatusReader` query per request. No
//! caching, no background task, no authentication — by design this is a
//! thin polling shell over the Store, not a second source of truth.

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use queuectl_core::StatusReader;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
struct AppState {
    reader: Arc<StatusReader>,
}

/// Serves the dashboard until the process is killed. Refuses to bind to a
/// non-loopback address (§6.4: "bind to loopback only").
pub async fn serve(reader: StatusReader, bind: SocketAddr) -> anyhow::Result<()> {
    if !bind.ip().is_loopback() {
        anyhow::bail!("dashboard must bind to a loopback address, got {}", bind.ip());
    }

    let state = AppState {
        reader: Arc::new(reader),
    };
    let app = Router::new()
        .route("/", get(index))
        .route("/api/status", get(api_status))
        .with_state(state);

    let listener = TcpListener::bind(bind).await?;
    info!(%bind, "dashboard listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head><title>QueueCTL</title></head>
<body>
<h1>QueueCTL</h1>
<pre id="status">loading...</pre>
<script>
async function refresh() {
  const res = await fetch('/api/status');
  const data = await res.json();
  document.getElementById('status').textContent = JSON.stringify(data, null, 2);
}
refresh();
setInterval(refresh, 3000);
</script>
</body>
</html>"#,
    )
}

async fn api_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.reader.status().await;
    let jobs = state.reader.list(None, 50).await;

    match (status, jobs) {
        (Ok(status), Ok(jobs)) => Json(serde_json::json!({ "status": status, "list": jobs })).into_response(),
        (Err(e), _) | (_, Err(e)) => {
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
