//! Asset-serving seam.
//!
//! The core does not serve files. It tags every web-view request with the
//! window it came from and hands it to an [`AssetServer`], which may branch on
//! the window headers to scope assets per window.

use std::fmt;

use http::{HeaderValue, Request, Response, StatusCode};

/// Header carrying the numeric id of the requesting window
pub const WINDOW_ID_HEADER: &str = "x-forge-window-id";
/// Header carrying the name of the requesting window
pub const WINDOW_NAME_HEADER: &str = "x-forge-window-name";

type Responder = Box<dyn FnOnce(Response<Vec<u8>>) + Send>;

/// An asset request raised by a window's web-view
pub struct WebViewRequest {
    pub window_id: u64,
    pub window_name: String,
    pub request: Request<Vec<u8>>,
    responder: Responder,
}

impl WebViewRequest {
    pub fn new(
        window_id: u64,
        request: Request<Vec<u8>>,
        responder: impl FnOnce(Response<Vec<u8>>) + Send + 'static,
    ) -> Self {
        Self {
            window_id,
            window_name: String::new(),
            request,
            responder: Box::new(responder),
        }
    }

    /// Record the owning window and inject the window headers.
    pub fn annotate(&mut self, window_id: u64, window_name: &str) {
        self.window_id = window_id;
        self.window_name = window_name.to_string();

        let headers = self.request.headers_mut();
        headers.insert(WINDOW_ID_HEADER, HeaderValue::from(window_id));
        match HeaderValue::from_str(window_name) {
            Ok(value) => {
                headers.insert(WINDOW_NAME_HEADER, value);
            }
            Err(_) => {
                tracing::warn!(window_id, "window name is not a valid header value");
            }
        }
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn query(&self) -> Option<&str> {
        self.request.uri().query()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    pub fn respond(self, response: Response<Vec<u8>>) {
        (self.responder)(response);
    }

    pub fn respond_with(self, status: StatusCode, content_type: &str, body: impl Into<Vec<u8>>) {
        let mut response = Response::new(body.into());
        *response.status_mut() = status;
        if let Ok(value) = HeaderValue::from_str(content_type) {
            response.headers_mut().insert(http::header::CONTENT_TYPE, value);
        }
        self.respond(response);
    }

    pub fn not_found(self) {
        let body = format!("Not found: {}", self.path());
        self.respond_with(StatusCode::NOT_FOUND, "text/plain; charset=utf-8", body);
    }
}

impl fmt::Debug for WebViewRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebViewRequest")
            .field("window_id", &self.window_id)
            .field("window_name", &self.window_name)
            .field("uri", self.request.uri())
            .finish()
    }
}

/// Serves web-view asset requests
pub trait AssetServer: Send + Sync {
    fn serve(&self, request: WebViewRequest);
}

/// Answers every request with 404. Used when no asset server is configured.
pub struct NotFoundAssetServer;

impl AssetServer for NotFoundAssetServer {
    fn serve(&self, request: WebViewRequest) {
        request.not_found();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn request(uri: &str) -> Request<Vec<u8>> {
        Request::builder().uri(uri).body(Vec::new()).unwrap()
    }

    #[test]
    fn test_annotate_injects_window_headers() {
        let mut req = WebViewRequest::new(0, request("forge://localhost/index.html"), |_| {});
        req.annotate(12, "settings");

        assert_eq!(req.window_id, 12);
        assert_eq!(req.header(WINDOW_ID_HEADER), Some("12"));
        assert_eq!(req.header(WINDOW_NAME_HEADER), Some("settings"));
        assert_eq!(req.path(), "/index.html");
    }

    #[test]
    fn test_annotate_replaces_spoofed_headers() {
        let mut inner = request("forge://localhost/app.js");
        inner
            .headers_mut()
            .insert(WINDOW_ID_HEADER, HeaderValue::from_static("999"));
        let mut req = WebViewRequest::new(0, inner, |_| {});
        req.annotate(3, "main");
        assert_eq!(req.header(WINDOW_ID_HEADER), Some("3"));
    }

    #[test]
    fn test_not_found_server_responds_404() {
        let (tx, rx) = bounded(1);
        let req = WebViewRequest::new(1, request("forge://localhost/missing.css"), move |resp| {
            let _ = tx.send(resp);
        });
        NotFoundAssetServer.serve(req);

        let resp = rx.recv().unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(String::from_utf8_lossy(resp.body()).contains("/missing.css"));
    }
}
