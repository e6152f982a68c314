//! Keep-alive HTTP server.
//!
//! Runs on a separate tokio task so hosting platforms and uptime monitors can
//! see the bot is alive. Also serves `/metrics` for Prometheus scraping.

use crate::state::UptimeStats;
use crate::state::stats::format_uptime;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::{HOST, USER_AGENT};
use axum::response::Html;
use axum::{Json, Router, routing::get};
use chrono::Utc;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;

const BOT_NAME: &str = "Thread Lock Bot";

/// Build the keep-alive router.
pub fn router(stats: Arc<UptimeStats>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/status", get(status))
        .route("/ping", get(ping))
        .route("/health", get(health))
        .route("/uptime", get(uptime))
        .route("/metrics", get(metrics_handler))
        .with_state(stats)
}

/// Handler for GET / - human-readable status page.
async fn home() -> Html<String> {
    let now = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    Html(format!(
        r#"<html>
<head>
    <title>{BOT_NAME}</title>
    <style>
        body {{ font-family: Arial; margin: 40px; background: #f0f0f0; }}
        .container {{ background: white; padding: 30px; border-radius: 10px; max-width: 600px; margin: auto; }}
        .status {{ color: #28a745; font-weight: bold; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>🤖 {BOT_NAME}</h1>
        <p class="status">✅ Bot is running and active!</p>
        <p><strong>Status:</strong> Online<br><strong>Checked:</strong> {now}</p>
        <h3>Features:</h3>
        <ul>
            <li>Thread locking with "lock" or "lna" commands</li>
            <li>Delete/Keep buttons after locking</li>
            <li>Auto-delete for specific channels</li>
            <li>Role-based permission system</li>
        </ul>
        <p><a href="/status">Check API Status</a> | <a href="/ping">Ping Bot</a></p>
    </div>
</body>
</html>"#
    ))
}

/// Handler for GET /status.
async fn status() -> Json<Value> {
    Json(json!({
        "status": "online",
        "bot": BOT_NAME,
        "uptime": true,
        "timestamp": Utc::now().to_rfc3339(),
        "features": ["thread_locking", "auto_delete", "role_permissions", "keep_alive"],
    }))
}

/// Handler for GET /ping - counts pings and spots external monitors.
async fn ping(State(stats): State<Arc<UptimeStats>>, headers: HeaderMap) -> Json<Value> {
    let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
    let count = stats.record_ping(user_agent);
    Json(json!({
        "response": "pong",
        "status": "alive",
        "timestamp": Utc::now().to_rfc3339(),
        "message": "Bot is responding to ping!",
        "uptime_seconds": stats.uptime_seconds(),
        "ping_count": count,
    }))
}

/// Handler for GET /health.
async fn health() -> Json<Value> {
    Json(json!({
        "health": "ok",
        "service": "discord_bot",
        "status": "running",
    }))
}

/// Handler for GET /uptime - detailed statistics for external monitoring.
async fn uptime(State(stats): State<Arc<UptimeStats>>, headers: HeaderMap) -> Json<Value> {
    stats.record_uptime_check();
    let seconds = stats.uptime_seconds();
    let hours = seconds / 3600;
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    Json(json!({
        "uptime": {
            "seconds": seconds,
            "hours": hours,
            "days": hours / 24,
            "formatted": format_uptime(seconds),
        },
        "statistics": stats.snapshot(),
        "monitoring": {
            "recommended_interval": "5 minutes",
            "ping_url": format!("http://{host}/ping"),
            "status_url": format!("http://{host}/status"),
        },
    }))
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Run the keep-alive HTTP server.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background; bind failures are logged, not fatal.
pub async fn run_keepalive_server(port: u16, stats: Arc<UptimeStats>) {
    let app = router(stats);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Keep-alive HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind keep-alive server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Keep-alive server error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_ping_counts_monitors() {
        let stats = Arc::new(UptimeStats::new());

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("UptimeRobot/2.0"));
        let Json(first) = ping(State(Arc::clone(&stats)), headers).await;
        assert_eq!(first["response"], "pong");
        assert_eq!(first["ping_count"], 1);

        let Json(second) = ping(State(Arc::clone(&stats)), HeaderMap::new()).await;
        assert_eq!(second["ping_count"], 2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_pings, 2);
        assert_eq!(snapshot.external_pings, 1);
    }

    #[tokio::test]
    async fn test_uptime_report() {
        let stats = Arc::new(UptimeStats::new());
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("bot.example.org"));

        let Json(body) = uptime(State(Arc::clone(&stats)), headers).await;
        assert_eq!(body["uptime"]["formatted"], "0d 0h 0m");
        assert_eq!(body["statistics"]["uptime_checks"], 1);
        assert_eq!(body["monitoring"]["ping_url"], "http://bot.example.org/ping");
    }

    #[tokio::test]
    async fn test_status_and_health() {
        let Json(body) = status().await;
        assert_eq!(body["status"], "online");
        assert_eq!(body["features"].as_array().unwrap().len(), 4);

        let Json(body) = health().await;
        assert_eq!(body["health"], "ok");

        let Html(page) = home().await;
        assert!(page.contains("Bot is running and active!"));
    }
}
