//! Static file serving for the web client.
//!
//! Files are served from the configured root with content types guessed from
//! their extension. `GET /` serves the index file. Requests for anything that
//! is not a file under the root get a JSON 404.

use crate::config::StaticFilesConfig;
use crate::error::AppError;
use actix_files::Files;
use actix_web::dev::{fn_service, ServiceRequest, ServiceResponse};
use actix_web::guard;
use actix_web::http::Method;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Resolve the static root, returning `None` when there is nothing to serve.
///
/// A missing root is not fatal: the server still answers health checks and
/// WebSocket upgrades, and every static request becomes a 404.
pub fn resolve_root(config: &StaticFilesConfig) -> Option<PathBuf> {
    let root = &config.root;

    match root.canonicalize() {
        Ok(canonical) if canonical.is_dir() => {
            info!("Serving static files from {}", canonical.display());
            Some(canonical)
        }
        Ok(_) => {
            warn!("Static root is not a directory: {}", root.display());
            None
        }
        Err(err) => {
            warn!("Static root {} is unavailable: {}", root.display(), err);
            None
        }
    }
}

/// Build the file service mounted at `/`.
///
/// Must be registered after every other route, since it matches all paths.
/// Only `GET` and `HEAD` are routed to it; other methods reach [`not_found`].
pub fn service(root: &Path, index_file: &str) -> Files {
    Files::new("/", root)
        .guard(guard::Any(guard::Get()).or(guard::Head()))
        .index_file(index_file)
        .use_etag(true)
        .use_last_modified(true)
        .default_handler(fn_service(not_found))
}

/// Fallback for requests no file or route matched.
pub async fn not_found(req: ServiceRequest) -> Result<ServiceResponse, actix_web::Error> {
    let error = if req.method() == Method::GET || req.method() == Method::HEAD {
        AppError::NotFound(format!("File not found: {}", req.path()))
    } else {
        AppError::MethodNotAllowed(format!("{} {}", req.method(), req.path()))
    };
    Ok(req.error_response(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::{call_service, init_service, read_body, read_body_json, TestRequest};
    use actix_web::App;
    use std::fs;

    fn static_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>voice</h1>").unwrap();
        fs::write(dir.path().join("app.js"), "console.log('hi');").unwrap();
        fs::write(dir.path().join("style.css"), "body { margin: 0 }").unwrap();
        fs::create_dir(dir.path().join("audio")).unwrap();
        fs::write(dir.path().join("audio").join("worklet.js"), "// worklet").unwrap();
        dir
    }

    #[actix_web::test]
    async fn test_existing_files_are_served_with_content_type() {
        let dir = static_dir();
        let app = init_service(App::new().service(service(dir.path(), "index.html"))).await;

        let resp = call_service(&app, TestRequest::get().uri("/app.js").to_request()).await;
        assert_eq!(resp.status(), 200);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.contains("javascript"), "got {content_type}");
        assert_eq!(&read_body(resp).await[..], b"console.log('hi');");

        let resp = call_service(&app, TestRequest::get().uri("/style.css").to_request()).await;
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/css"), "got {content_type}");

        let resp = call_service(&app, TestRequest::get().uri("/audio/worklet.js").to_request()).await;
        assert_eq!(&read_body(resp).await[..], b"// worklet");
    }

    #[actix_web::test]
    async fn test_root_serves_index() {
        let dir = static_dir();
        let app = init_service(App::new().service(service(dir.path(), "index.html"))).await;

        let resp = call_service(&app, TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), 200);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/html"), "got {content_type}");
        assert_eq!(&read_body(resp).await[..], b"<h1>voice</h1>");
    }

    #[actix_web::test]
    async fn test_missing_file_is_json_404() {
        let dir = static_dir();
        let app = init_service(App::new().service(service(dir.path(), "index.html"))).await;

        let resp = call_service(&app, TestRequest::get().uri("/nope.js").to_request()).await;
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "not_found");
        assert_eq!(body["error"]["message"], "File not found: /nope.js");
    }

    #[actix_web::test]
    async fn test_fallback_rejects_other_methods() {
        let app = init_service(App::new().default_service(fn_service(not_found))).await;

        let resp = call_service(&app, TestRequest::post().uri("/upload").to_request()).await;
        assert_eq!(resp.status(), 405);
        let body: serde_json::Value = read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "method_not_allowed");

        let resp = call_service(&app, TestRequest::get().uri("/upload").to_request()).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn test_other_methods_on_existing_file_get_json_405() {
        let dir = static_dir();
        let app = init_service(
            App::new()
                .service(service(dir.path(), "index.html"))
                .default_service(fn_service(not_found)),
        )
        .await;

        let resp = call_service(&app, TestRequest::post().uri("/index.html").to_request()).await;
        assert_eq!(resp.status(), 405);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert_eq!(content_type, "application/json");
        let body: serde_json::Value = read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "method_not_allowed");
        assert_eq!(body["error"]["message"], "POST /index.html");

        let resp = call_service(&app, TestRequest::default().method(Method::HEAD).uri("/index.html").to_request()).await;
        assert_eq!(resp.status(), 200);
    }

    #[actix_web::test]
    async fn test_traversal_outside_root_is_refused() {
        let dir = static_dir();
        let app = init_service(App::new().service(service(dir.path(), "index.html"))).await;

        let resp = call_service(&app, TestRequest::get().uri("/../Cargo.toml").to_request()).await;
        assert!(resp.status().is_client_error());
    }

    #[test]
    fn test_resolve_root() {
        let dir = static_dir();
        let config = StaticFilesConfig {
            root: dir.path().to_path_buf(),
            index_file: "index.html".to_string(),
        };
        assert_eq!(resolve_root(&config), Some(dir.path().canonicalize().unwrap()));

        let missing = StaticFilesConfig {
            root: dir.path().join("does-not-exist"),
            index_file: "index.html".to_string(),
        };
        assert_eq!(resolve_root(&missing), None);

        let file = StaticFilesConfig {
            root: dir.path().join("app.js"),
            index_file: "index.html".to_string(),
        };
        assert_eq!(resolve_root(&file), None);
    }
}
