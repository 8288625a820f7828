//! Asset server for `forge://` requests.
//!
//! Assets live under `<app-dir>/web`. A window named `settings` is served from
//! `web/settings/` first and falls back to the shared `web/` root, so several
//! windows can ship their own `index.html`.

use std::path::{Component, Path, PathBuf};

use forge_app::{AssetServer, WebViewRequest, WINDOW_NAME_HEADER};
use wry::http::{Response, StatusCode};

// Include generated assets module (for release builds with embedded assets)
include!(concat!(env!("OUT_DIR"), "/assets.rs"));

const CSP: &str = "default-src 'self' forge:; \
                   script-src 'self' forge:; \
                   style-src 'self' forge: 'unsafe-inline'; \
                   img-src 'self' forge: data: blob:; \
                   font-src 'self' forge: data:; \
                   connect-src 'self' forge:;";

pub(crate) fn mime_for(path: &str) -> &'static str {
    if let Some(ext) = Path::new(path).extension().and_then(|s| s.to_str()) {
        match ext {
            "html" | "htm" => "text/html; charset=utf-8",
            "js" | "mjs" => "text/javascript; charset=utf-8",
            "css" => "text/css; charset=utf-8",
            "json" => "application/json",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "ico" => "image/x-icon",
            "txt" => "text/plain; charset=utf-8",
            "wasm" => "application/wasm",
            _ => "application/octet-stream",
        }
    } else {
        "application/octet-stream"
    }
}

/// Reject anything that could climb out of the web root.
fn is_safe_relative(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
}

pub struct DirAssetServer {
    web_dir: PathBuf,
}

impl DirAssetServer {
    pub fn new(web_dir: impl Into<PathBuf>) -> Self {
        Self {
            web_dir: web_dir.into(),
        }
    }

    /// Lookup keys for `path`, most specific first
    fn candidates(window_name: Option<&str>, path: &str) -> Vec<String> {
        let mut keys = Vec::with_capacity(2);
        if let Some(name) = window_name.filter(|name| is_safe_relative(name)) {
            keys.push(format!("{}/{}", name, path));
        }
        keys.push(path.to_string());
        keys
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        if ASSET_EMBEDDED {
            if let Some(bytes) = get_asset(key) {
                return Some(bytes.to_vec());
            }
        }

        let file_path = self.web_dir.join(key);
        if !file_path.is_file() {
            return None;
        }
        match std::fs::read(&file_path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!("Failed to read {}: {}", file_path.display(), e);
                None
            }
        }
    }
}

impl AssetServer for DirAssetServer {
    fn serve(&self, request: WebViewRequest) {
        let mut path = request.path().trim_start_matches('/').to_string();
        if path.is_empty() || path.ends_with('/') {
            path.push_str("index.html");
        }
        if !is_safe_relative(&path) {
            tracing::warn!(window_id = request.window_id, path = %path, "rejected asset path");
            request.not_found();
            return;
        }

        let window_name = request.header(WINDOW_NAME_HEADER).map(str::to_string);
        for key in Self::candidates(window_name.as_deref(), &path) {
            if let Some(bytes) = self.load(&key) {
                tracing::debug!(window_id = request.window_id, asset = %key, "serving asset");
                let response = Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", mime_for(&key))
                    .header("Content-Security-Policy", CSP)
                    .header("X-Content-Type-Options", "nosniff")
                    .body(bytes);
                match response {
                    Ok(response) => request.respond(response),
                    Err(e) => {
                        tracing::error!("Failed to build response for {}: {}", key, e);
                    }
                }
                return;
            }
        }

        tracing::debug!(window_id = request.window_id, path = %path, "asset not found");
        request.not_found();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Receiver};
    use std::fs;
    use wry::http::Request;

    fn web_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("forge-host-assets-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("settings")).unwrap();
        fs::write(dir.join("index.html"), "<h1>main</h1>").unwrap();
        fs::write(dir.join("app.css"), "body {}").unwrap();
        fs::write(dir.join("settings").join("index.html"), "<h1>settings</h1>").unwrap();
        dir
    }

    fn request(uri: &str, window_name: Option<&str>) -> (WebViewRequest, Receiver<Response<Vec<u8>>>) {
        let (tx, rx) = unbounded();
        let mut request = WebViewRequest::new(
            1,
            Request::builder().uri(uri).body(Vec::new()).unwrap(),
            move |response| {
                let _ = tx.send(response);
            },
        );
        if let Some(name) = window_name {
            request.annotate(1, name);
        }
        (request, rx)
    }

    #[test]
    fn test_window_scoped_asset_wins() {
        let dir = web_root("scoped");
        let server = DirAssetServer::new(&dir);

        let (req, rx) = request("forge://localhost/", Some("settings"));
        server.serve(req);
        let response = rx.recv().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_slice(), b"<h1>settings</h1>");

        let (req, rx) = request("forge://localhost/index.html", Some("main"));
        server.serve(req);
        assert_eq!(rx.recv().unwrap().body().as_slice(), b"<h1>main</h1>");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_falls_back_to_shared_root() {
        let dir = web_root("fallback");
        let server = DirAssetServer::new(&dir);

        let (req, rx) = request("forge://localhost/app.css", Some("settings"));
        server.serve(req);
        let response = rx.recv().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "text/css; charset=utf-8"
        );
        assert_eq!(response.headers().get("X-Content-Type-Options").unwrap(), "nosniff");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_and_escaping_paths_are_not_found() {
        let dir = web_root("missing");
        let server = DirAssetServer::new(&dir);

        for uri in ["forge://localhost/nope.js", "forge://localhost/../secret.txt"] {
            let (req, rx) = request(uri, Some("main"));
            server.serve(req);
            assert_eq!(rx.recv().unwrap().status(), StatusCode::NOT_FOUND, "{}", uri);
        }

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("index.html"), "text/html; charset=utf-8");
        assert_eq!(mime_for("mod.wasm"), "application/wasm");
        assert_eq!(mime_for("LICENSE"), "application/octet-stream");
    }
}
