//! Web-view windows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::error::AppError;
use crate::events::{DragAndDrop, WindowEvent, WindowEventType, WindowMessage};
use crate::lifecycle::Runnable;
use crate::listeners::{ListenerMap, Listeners, Subscription};
use crate::lock;
use crate::panic::PanicPolicy;

/// Window creation options. Also the shape of a `[[windows]]` manifest entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowOptions {
    /// Unique name used for lookup and asset scoping; defaults to `window-<id>`
    pub name: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    /// Inline HTML, used when no url is given
    pub html: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub resizable: Option<bool>,
    pub decorations: Option<bool>,
    pub visible: Option<bool>,
    pub transparent: Option<bool>,
    pub always_on_top: Option<bool>,
    pub devtools: Option<bool>,
}

/// What the platform needs to build a native window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub id: u64,
    pub name: String,
    pub options: WindowOptions,
}

pub struct WebviewWindow {
    id: u64,
    name: String,
    options: Mutex<WindowOptions>,
    app: Weak<App>,
    created: AtomicBool,
    destroyed: AtomicBool,
    events: ListenerMap<WindowEventType, WindowEvent>,
    messages: Listeners<WindowMessage>,
    drops: Listeners<DragAndDrop>,
}

impl WebviewWindow {
    pub(crate) fn new(id: u64, options: WindowOptions, app: Weak<App>) -> Self {
        let name = options
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("window-{}", id));
        Self {
            id,
            name,
            options: Mutex::new(options),
            app,
            created: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            events: ListenerMap::new(),
            messages: Listeners::new(),
            drops: Listeners::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> WindowOptions {
        lock(&self.options).clone()
    }

    pub fn title(&self) -> Option<String> {
        lock(&self.options).title.clone()
    }

    /// True once a native window exists for this object
    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn spec(&self) -> WindowSpec {
        WindowSpec {
            id: self.id,
            name: self.name.clone(),
            options: self.options(),
        }
    }

    pub fn on(
        &self,
        event_type: WindowEventType,
        callback: impl Fn(&WindowEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.events.add(event_type, callback)
    }

    /// Listen for messages posted by script running in the window
    pub fn on_message(&self, callback: impl Fn(&WindowMessage) + Send + Sync + 'static) -> Subscription {
        self.messages.add(callback)
    }

    pub fn on_drag_and_drop(
        &self,
        callback: impl Fn(&DragAndDrop) + Send + Sync + 'static,
    ) -> Subscription {
        self.drops.add(callback)
    }

    pub fn set_title(&self, title: &str) {
        lock(&self.options).title = Some(title.to_string());
        if self.is_destroyed() {
            return;
        }
        if let Some(app) = self.app.upgrade() {
            let (id, title) = (self.id, title.to_string());
            app.on_platform(move |platform| platform.set_window_title(id, &title));
        }
    }

    /// Run `js` in the window's web-view. Ignored once the window is destroyed.
    pub fn exec_js(&self, js: &str) {
        if self.is_destroyed() {
            tracing::debug!(window_id = self.id, "exec_js on destroyed window ignored");
            return;
        }
        if let Some(app) = self.app.upgrade() {
            let (id, js) = (self.id, js.to_string());
            app.on_platform(move |platform| platform.exec_js(id, &js));
        }
    }

    /// Deliver a named event to script in this window through
    /// `window.__forge_dispatch`.
    pub fn emit(&self, name: &str, data: impl Serialize) -> Result<(), AppError> {
        self.exec_js(&dispatch_script(name, data)?);
        Ok(())
    }

    /// Unregister the window and close its native counterpart. A window
    /// destroyed before the application starts never gets one.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(app) = self.app.upgrade() else {
            return;
        };
        app.window_registry().unregister(self.id);
        if self.is_created() {
            let id = self.id;
            app.on_platform(move |platform| platform.destroy_window(id));
        }
        tracing::debug!(window_id = self.id, name = %self.name, "window destroyed");
    }

    /// The platform reported the native window gone.
    pub(crate) fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.created.store(false, Ordering::SeqCst);
        self.events.clear();
        self.messages.clear();
        self.drops.clear();
    }

    pub(crate) fn dispatch_event(&self, event: &WindowEvent, policy: &PanicPolicy) {
        self.events.emit_isolated(&event.event_type, policy, event);
    }

    pub(crate) fn dispatch_message(&self, message: &WindowMessage, policy: &PanicPolicy) {
        self.messages.emit_isolated(policy, message);
    }

    pub(crate) fn dispatch_drop(&self, drop: &DragAndDrop, policy: &PanicPolicy) {
        self.drops.emit_isolated(policy, drop);
    }
}

impl Runnable for WebviewWindow {
    fn run(&self) {
        if self.is_destroyed() {
            tracing::debug!(window_id = self.id, "window destroyed before start, skipping");
            return;
        }
        let Some(app) = self.app.upgrade() else {
            return;
        };
        let spec = self.spec();
        match app.invoke_platform(move |platform| platform.create_window(spec).map_err(AppError::from)) {
            Ok(()) => {
                self.created.store(true, Ordering::SeqCst);
                tracing::debug!(window_id = self.id, name = %self.name, "native window created");
                // destroy(), or a failed native build, may have raced the creation
                if self.is_destroyed() {
                    self.created.store(false, Ordering::SeqCst);
                    let id = self.id;
                    app.on_platform(move |platform| platform.destroy_window(id));
                }
            }
            Err(err) => {
                tracing::error!(window_id = self.id, error = %err, "failed to create native window");
            }
        }
    }
}

/// Script that hands `{ name, data }` to the page's dispatcher
pub(crate) fn dispatch_script(name: &str, data: impl Serialize) -> Result<String, AppError> {
    let payload = serde_json::json!({
        "name": name,
        "data": data,
    });
    let json = serde_json::to_string(&payload)
        .map_err(|e| AppError::generic(format!("failed to serialise event '{}': {}", name, e)))?;
    Ok(format!("window.__forge_dispatch({});", json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name_uses_id() {
        let window = WebviewWindow::new(7, WindowOptions::default(), Weak::new());
        assert_eq!(window.name(), "window-7");

        let named = WebviewWindow::new(
            8,
            WindowOptions {
                name: Some("settings".into()),
                ..Default::default()
            },
            Weak::new(),
        );
        assert_eq!(named.name(), "settings");
    }

    #[test]
    fn test_empty_name_falls_back_to_default() {
        let window = WebviewWindow::new(
            3,
            WindowOptions {
                name: Some(String::new()),
                ..Default::default()
            },
            Weak::new(),
        );
        assert_eq!(window.name(), "window-3");
    }

    #[test]
    fn test_listeners_are_keyed_by_event_type() {
        let window = WebviewWindow::new(1, WindowOptions::default(), Weak::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _focus = window.on(WindowEventType::Focus, {
            let seen = seen.clone();
            move |e| seen.lock().unwrap().push(e.event_type)
        });

        let policy = PanicPolicy::default();
        for event_type in [WindowEventType::Blur, WindowEventType::Focus] {
            window.dispatch_event(
                &WindowEvent {
                    window_id: 1,
                    event_type,
                },
                &policy,
            );
        }
        assert_eq!(*seen.lock().unwrap(), vec![WindowEventType::Focus]);
    }

    #[test]
    fn test_mark_destroyed_clears_listeners() {
        let window = WebviewWindow::new(1, WindowOptions::default(), Weak::new());
        let calls = Arc::new(Mutex::new(0));
        window.on_message({
            let calls = calls.clone();
            move |_| *calls.lock().unwrap() += 1
        });
        window.mark_destroyed();
        window.dispatch_message(
            &WindowMessage {
                window_id: 1,
                message: "ping".into(),
            },
            &PanicPolicy::default(),
        );
        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(window.is_destroyed());
    }

    #[test]
    fn test_panicking_event_listener_is_isolated() {
        let window = WebviewWindow::new(1, WindowOptions::default(), Weak::new());
        let policy = PanicPolicy::new(Some(Arc::new(|_| {})));
        let seen = Arc::new(Mutex::new(0));
        window.on(WindowEventType::Focus, |_| panic!("focus listener exploded"));
        window.on(WindowEventType::Focus, {
            let seen = seen.clone();
            move |_| *seen.lock().unwrap() += 1
        });
        window.on_message(|_| panic!("message listener exploded"));
        window.on_message({
            let seen = seen.clone();
            move |_| *seen.lock().unwrap() += 10
        });

        let focus = WindowEvent {
            window_id: 1,
            event_type: WindowEventType::Focus,
        };
        window.dispatch_event(&focus, &policy);
        window.dispatch_event(&focus, &policy);
        window.dispatch_message(
            &WindowMessage {
                window_id: 1,
                message: "ping".into(),
            },
            &policy,
        );
        assert_eq!(*seen.lock().unwrap(), 12);
    }

    #[test]
    fn test_dispatch_script_escapes_payload() {
        let script = dispatch_script("saved", serde_json::json!({ "path": "a\"b" })).unwrap();
        assert_eq!(
            script,
            r#"window.__forge_dispatch({"data":{"path":"a\"b"},"name":"saved"});"#
        );
    }

    #[test]
    fn test_window_options_from_toml() {
        let opts: WindowOptions = toml::from_str(
            r#"
            name = "main"
            title = "Main"
            width = 1024
            resizable = false
            "#,
        )
        .unwrap();
        assert_eq!(opts.name.as_deref(), Some("main"));
        assert_eq!(opts.width, Some(1024));
        assert_eq!(opts.resizable, Some(false));
        assert_eq!(opts.height, None);
    }
}
