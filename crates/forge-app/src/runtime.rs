//! Runtime method calls from the web-view.
//!
//! Script can drive the application by requesting
//! `forge://localhost/forge/runtime?object=application&method=<n>`. These
//! requests are answered by the runtime and never reach the asset server.
//! The same goes for `forge://localhost/forge/capabilities`, which returns
//! the application's [`Capabilities`](crate::Capabilities) as JSON.

use std::fmt;

use http::StatusCode;

use crate::app::App;
use crate::assets::WebViewRequest;
use crate::error::AppError;

pub const RUNTIME_PATH: &str = "/forge/runtime";
pub const CAPABILITIES_PATH: &str = "/forge/capabilities";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationMethod {
    Hide = 0,
    Show = 1,
    Quit = 2,
}

impl ApplicationMethod {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Hide),
            1 => Some(Self::Show),
            2 => Some(Self::Quit),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hide => "Hide",
            Self::Show => "Show",
            Self::Quit => "Quit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCall {
    Application(ApplicationMethod),
}

impl fmt::Display for RuntimeCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application(method) => write!(f, "Application.{}", method.name()),
        }
    }
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (k == key).then_some(v)
    })
}

/// Decode the `object`/`method` query of a runtime request
pub fn parse_call(query: Option<&str>) -> Result<RuntimeCall, AppError> {
    let query = query.unwrap_or_default();
    let object = query_param(query, "object")
        .ok_or_else(|| AppError::unknown_method("missing 'object' parameter"))?;
    let method = query_param(query, "method")
        .ok_or_else(|| AppError::unknown_method("missing 'method' parameter"))?;
    let code: u32 = method
        .parse()
        .map_err(|_| AppError::unknown_method(format!("invalid method '{}'", method)))?;

    match object {
        "application" => ApplicationMethod::from_code(code)
            .map(RuntimeCall::Application)
            .ok_or_else(|| AppError::unknown_method(format!("application method {}", code))),
        other => Err(AppError::unknown_method(format!("unknown object '{}'", other))),
    }
}

pub fn is_runtime_request(request: &WebViewRequest) -> bool {
    matches!(request.path(), RUNTIME_PATH | CAPABILITIES_PATH)
}

/// Answer a runtime request and perform the call.
pub(crate) fn process(app: &App, request: WebViewRequest) {
    if request.path() == CAPABILITIES_PATH {
        request.respond_with(StatusCode::OK, "application/json", app.capabilities().to_json());
        return;
    }
    let call = match parse_call(request.query()) {
        Ok(call) => call,
        Err(err) => {
            tracing::warn!(window_id = request.window_id, error = %err, "bad runtime call");
            request.respond_with(StatusCode::BAD_REQUEST, "text/plain; charset=utf-8", err.to_string());
            return;
        }
    };

    tracing::info!("Runtime Call: {}", call);
    // Respond first: Quit tears down the web-view that is waiting
    request.respond_with(StatusCode::OK, "text/plain; charset=utf-8", "ok");

    match call {
        RuntimeCall::Application(ApplicationMethod::Hide) => app.hide(),
        RuntimeCall::Application(ApplicationMethod::Show) => app.show(),
        RuntimeCall::Application(ApplicationMethod::Quit) => app.quit(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_application_methods() {
        assert_eq!(
            parse_call(Some("object=application&method=0")).unwrap(),
            RuntimeCall::Application(ApplicationMethod::Hide)
        );
        assert_eq!(
            parse_call(Some("method=2&object=application")).unwrap(),
            RuntimeCall::Application(ApplicationMethod::Quit)
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        for query in [
            None,
            Some("object=application"),
            Some("object=application&method=9"),
            Some("object=application&method=abc"),
            Some("object=window&method=0"),
        ] {
            let err = parse_call(query).unwrap_err();
            assert_eq!(err.code(), 8010, "query {:?}", query);
        }
    }

    #[test]
    fn test_call_display() {
        let call = RuntimeCall::Application(ApplicationMethod::Show);
        assert_eq!(call.to_string(), "Application.Show");
    }
}
