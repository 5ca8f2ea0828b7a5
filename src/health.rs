use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Liveness probe. The body is fixed so orchestrators can match on it.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "healthy" }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();
    let config = state.get_config();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "port": config.server.port,
            "ws_port": config.dedicated_ws_port()
        },
        "http": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "endpoints": endpoint_stats
        },
        "websocket": {
            "active_connections": metrics.active_connections,
            "total_connections": metrics.total_connections,
            "messages_received": metrics.messages_received,
            "malformed_messages": metrics.malformed_messages
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_health_body_is_exact() {
        let app = test::init_service(App::new().route("/health", web::get().to(health_check))).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/json"
        );

        let body = test::read_body(resp).await;
        assert_eq!(&body[..], br#"{"status":"healthy"}"#);
    }

    #[actix_web::test]
    async fn test_metrics_report_websocket_counters() {
        let state = AppState::new(AppConfig::default());
        state.connection_opened();
        state.message_received();
        state.message_malformed();
        state.message_malformed();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/api/v1/metrics", web::get().to(detailed_metrics)),
        )
        .await;

        let body: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/v1/metrics").to_request(),
        )
        .await;

        assert_eq!(body["websocket"]["active_connections"], 1);
        assert_eq!(body["websocket"]["messages_received"], 1);
        assert_eq!(body["websocket"]["malformed_messages"], 2);
        assert_eq!(body["service"]["port"], 4000);
        assert!(body["service"]["ws_port"].is_null());
    }
}
