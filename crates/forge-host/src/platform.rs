//! Desktop platform on tao + wry.
//!
//! The event loop, windows, web-views and tray icons are not `Send`, so they
//! live in thread-locals on the main thread. `TaoPlatform` itself only holds
//! the loop proxy and can be shared with the core freely.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use forge_app::{
    ApplicationEventType, EventSender, FileDialogSpec, MenuSpec, MessageDialogSpec, Platform,
    PlatformError, PlatformHost, Screen, TraySpec, WebViewRequest, WindowEventType, WindowSpec,
};
use once_cell::sync::OnceCell;
use tao::dpi::{LogicalPosition, LogicalSize};
use tao::event::{Event, StartCause, WindowEvent};
use tao::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget};
use tao::monitor::MonitorHandle;
use tao::platform::run_return::EventLoopExtRunReturn;
use tao::window::{Window, WindowBuilder, WindowId};
use tray_icon::{TrayIcon, TrayIconBuilder};
use wry::http::{Request, Response};
use wry::{DragDropEvent, RequestAsyncResponder, WebView, WebViewBuilder};

use crate::dialog;
use crate::menu;

pub(crate) const PROTOCOL: &str = "forge";

#[cfg(target_os = "windows")]
const START_URL: &str = "http://forge.localhost/index.html";
#[cfg(not(target_os = "windows"))]
const START_URL: &str = "forge://localhost/index.html";

const DEFAULT_WIDTH: u32 = 1024;
const DEFAULT_HEIGHT: u32 = 768;
const TRAY_ICON_SIZE: u32 = 22;

#[derive(Debug)]
pub(crate) enum UserEvent {
    Dispatch(u64),
    CreateWindow(WindowSpec),
    Respond(u64, Response<Vec<u8>>),
    Quit,
}

struct NativeWindow {
    // Dropped before the window it is attached to
    webview: WebView,
    window: Window,
}

#[derive(Default)]
struct MainState {
    windows: HashMap<u64, NativeWindow>,
    window_ids: HashMap<WindowId, u64>,
    trays: HashMap<u64, TrayIcon>,
    app_menu: Option<muda::Menu>,
    icon: Option<tao::window::Icon>,
    focused: Option<u64>,
}

thread_local! {
    static EVENT_LOOP: RefCell<Option<EventLoop<UserEvent>>> = const { RefCell::new(None) };
    static STATE: RefCell<MainState> = RefCell::new(MainState::default());
    // Kept apart from STATE: wry may call the protocol handler while a window is being built
    static RESPONDERS: RefCell<HashMap<u64, RequestAsyncResponder>> = RefCell::new(HashMap::new());
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn with_state<R>(f: impl FnOnce(&mut MainState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

pub struct TaoPlatform {
    proxy: Mutex<EventLoopProxy<UserEvent>>,
    main_thread: ThreadId,
    events: OnceCell<EventSender>,
}

impl TaoPlatform {
    /// Must be called on the thread that will later call `run`.
    pub fn new() -> Self {
        let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
        let proxy = event_loop.create_proxy();
        EVENT_LOOP.with(|cell| *cell.borrow_mut() = Some(event_loop));
        Self {
            proxy: Mutex::new(proxy),
            main_thread: thread::current().id(),
            events: OnceCell::new(),
        }
    }

    fn send(&self, event: UserEvent) {
        let proxy = self.proxy.lock().unwrap_or_else(|e| e.into_inner());
        if proxy.send_event(event).is_err() {
            tracing::debug!("event loop closed, dropping user event");
        }
    }

    fn proxy(&self) -> EventLoopProxy<UserEvent> {
        self.proxy.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn handle_event(
        &self,
        event: Event<'_, UserEvent>,
        target: &EventLoopWindowTarget<UserEvent>,
        control_flow: &mut ControlFlow,
        host: &PlatformHost,
    ) {
        match event {
            Event::NewEvents(StartCause::Init) => {
                *control_flow = ControlFlow::Wait;
                host.events().application_event(ApplicationEventType::Started);
            }
            Event::UserEvent(UserEvent::Dispatch(id)) => host.execute(id),
            Event::UserEvent(UserEvent::CreateWindow(spec)) => {
                let window_id = spec.id;
                if let Err(e) = self.build_window(spec, target, host.events()) {
                    tracing::error!(window_id, "Failed to create window: {}", e);
                    // Release the core object; no native window will ever report back
                    host.events().window_event(window_id, WindowEventType::Destroyed);
                }
            }
            Event::UserEvent(UserEvent::Respond(request_id, response)) => {
                match RESPONDERS.with(|r| r.borrow_mut().remove(&request_id)) {
                    Some(responder) => responder.respond(response),
                    None => tracing::debug!(request_id, "no responder for web-view request"),
                }
            }
            Event::UserEvent(UserEvent::Quit) => *control_flow = ControlFlow::Exit,
            Event::WindowEvent {
                window_id, event, ..
            } => {
                let Some(id) = with_state(|s| s.window_ids.get(&window_id).copied()) else {
                    return;
                };
                self.handle_window_event(id, event, control_flow, host.events());
            }
            Event::LoopDestroyed => {
                host.events().application_event(ApplicationEventType::WillTerminate);
            }
            _ => {}
        }
    }

    fn handle_window_event(
        &self,
        id: u64,
        event: WindowEvent<'_>,
        control_flow: &mut ControlFlow,
        events: &EventSender,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                events.window_event(id, WindowEventType::CloseRequested);
                close_window(id, events);
                let idle = with_state(|s| s.windows.is_empty() && s.trays.is_empty());
                if idle {
                    tracing::info!("All windows closed, exiting");
                    *control_flow = ControlFlow::Exit;
                }
            }
            WindowEvent::Focused(focused) => {
                with_state(|s| {
                    if focused {
                        s.focused = Some(id);
                    } else if s.focused == Some(id) {
                        s.focused = None;
                    }
                });
                let event_type = if focused {
                    WindowEventType::Focus
                } else {
                    WindowEventType::Blur
                };
                events.window_event(id, event_type);
            }
            WindowEvent::Resized(_) => events.window_event(id, WindowEventType::Resized),
            WindowEvent::Moved(_) => events.window_event(id, WindowEventType::Moved),
            WindowEvent::ThemeChanged(_) => {
                events.application_event(ApplicationEventType::ThemeChanged)
            }
            _ => {}
        }
    }

    fn build_window(
        &self,
        spec: WindowSpec,
        target: &EventLoopWindowTarget<UserEvent>,
        events: &EventSender,
    ) -> Result<(), PlatformError> {
        let opts = &spec.options;
        let id = spec.id;

        let mut builder = WindowBuilder::new()
            .with_title(opts.title.clone().unwrap_or_else(|| spec.name.clone()))
            .with_inner_size(LogicalSize::new(
                opts.width.unwrap_or(DEFAULT_WIDTH),
                opts.height.unwrap_or(DEFAULT_HEIGHT),
            ))
            .with_resizable(opts.resizable.unwrap_or(true))
            .with_decorations(opts.decorations.unwrap_or(true))
            .with_visible(opts.visible.unwrap_or(true))
            .with_transparent(opts.transparent.unwrap_or(false))
            .with_always_on_top(opts.always_on_top.unwrap_or(false));
        if let (Some(x), Some(y)) = (opts.x, opts.y) {
            builder = builder.with_position(LogicalPosition::new(x, y));
        }
        if let (Some(w), Some(h)) = (opts.min_width, opts.min_height) {
            builder = builder.with_min_inner_size(LogicalSize::new(w, h));
        }
        if let (Some(w), Some(h)) = (opts.max_width, opts.max_height) {
            builder = builder.with_max_inner_size(LogicalSize::new(w, h));
        }

        let window = builder
            .build(target)
            .map_err(|e| PlatformError::new(format!("window {}: {}", id, e)))?;
        if let Some(icon) = with_state(|s| s.icon.clone()) {
            window.set_window_icon(Some(icon));
        }

        let ipc_events = events.clone();
        let drop_events = events.clone();
        let protocol_events = events.clone();
        let proxy = self.proxy();
        let mut builder = WebViewBuilder::new()
            .with_transparent(opts.transparent.unwrap_or(false))
            .with_devtools(opts.devtools.unwrap_or(cfg!(debug_assertions)))
            .with_ipc_handler(move |msg: Request<String>| {
                ipc_events.window_message(id, msg.body().clone());
            })
            .with_drag_drop_handler(move |event| {
                if let DragDropEvent::Drop { paths, .. } = event {
                    drop_events.drag_and_drop(id, paths);
                }
                false
            })
            .with_asynchronous_custom_protocol(PROTOCOL.into(), move |_webview_id, request, responder| {
                let request_id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
                RESPONDERS.with(|r| r.borrow_mut().insert(request_id, responder));
                let proxy = proxy.clone();
                protocol_events.webview_request(WebViewRequest::new(id, request, move |response| {
                    if proxy.send_event(UserEvent::Respond(request_id, response)).is_err() {
                        tracing::debug!(request_id, "event loop closed before response");
                    }
                }));
            });
        builder = match (&opts.url, &opts.html) {
            (Some(url), _) => builder.with_url(url),
            (None, Some(html)) => builder.with_html(html),
            (None, None) => builder.with_url(START_URL),
        };

        let webview = builder
            .build(&window)
            .map_err(|e| PlatformError::new(format!("web-view for window {}: {}", id, e)))?;

        with_state(|s| {
            if let Some(menu) = &s.app_menu {
                menu::attach(menu, &window);
            }
            s.window_ids.insert(window.id(), id);
            s.windows.insert(id, NativeWindow { webview, window });
        });
        tracing::debug!(window_id = id, name = %spec.name, "native window created");
        events.window_event(id, WindowEventType::Created);
        Ok(())
    }
}

/// Drop the native window for `id`, if it still exists, and report it destroyed.
fn close_window(id: u64, events: &EventSender) {
    let native = with_state(|s| {
        let native = s.windows.remove(&id)?;
        s.window_ids.remove(&native.window.id());
        if s.focused == Some(id) {
            s.focused = None;
        }
        Some(native)
    });
    if let Some(native) = native {
        drop(native);
        events.window_event(id, WindowEventType::Destroyed);
    }
}

fn monitor_id(handle: &MonitorHandle) -> String {
    let name = handle.name().unwrap_or_default();
    let pos = handle.position();
    format!("{}:{}x{}", name, pos.x, pos.y)
}

fn to_screen(handle: &MonitorHandle, is_primary: bool) -> Screen {
    let pos = handle.position();
    let size = handle.size();
    Screen {
        id: monitor_id(handle),
        name: handle.name(),
        x: pos.x,
        y: pos.y,
        width: size.width,
        height: size.height,
        scale_factor: handle.scale_factor(),
        is_primary,
    }
}

/// Decode an encoded image to RGBA, optionally resized to a square of `size`.
fn decode_rgba(bytes: &[u8], size: Option<u32>) -> Result<(Vec<u8>, u32, u32), image::ImageError> {
    let mut img = image::load_from_memory(bytes)?;
    if let Some(size) = size {
        img = img.resize_exact(size, size, image::imageops::FilterType::Lanczos3);
    }
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok((rgba.into_raw(), width, height))
}

fn default_tray_icon() -> Option<tray_icon::Icon> {
    let size = TRAY_ICON_SIZE;
    let mut rgba_data = Vec::with_capacity((size * size * 4) as usize);
    for _ in 0..(size * size) {
        // Medium gray with full opacity
        rgba_data.extend_from_slice(&[128, 128, 128, 255]);
    }
    tray_icon::Icon::from_rgba(rgba_data, size, size).ok()
}

fn tray_icon(bytes: &[u8]) -> Option<tray_icon::Icon> {
    if bytes.is_empty() {
        return default_tray_icon();
    }
    match decode_rgba(bytes, Some(TRAY_ICON_SIZE)) {
        Ok((rgba, width, height)) => match tray_icon::Icon::from_rgba(rgba, width, height) {
            Ok(icon) => Some(icon),
            Err(e) => {
                tracing::warn!("Failed to create tray icon: {}", e);
                default_tray_icon()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to decode tray icon image: {}", e);
            default_tray_icon()
        }
    }
}

impl Default for TaoPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for TaoPlatform {
    fn run(&self, host: PlatformHost) -> Result<(), PlatformError> {
        let mut event_loop = EVENT_LOOP
            .with(|cell| cell.borrow_mut().take())
            .ok_or_else(|| PlatformError::new("event loop is not available on this thread"))?;

        let _ = self.events.set(host.events().clone());
        menu::spawn_click_forwarder(host.events().clone());

        let exit = event_loop.run_return(|event, target, control_flow| {
            self.handle_event(event, target, control_flow, &host);
        });
        tracing::debug!(exit = ?exit, "event loop returned");

        let discarded = host.discard_pending();
        if discarded > 0 {
            tracing::debug!(discarded, "dropped main-thread calls after loop exit");
        }
        let state = with_state(std::mem::take);
        RESPONDERS.with(|r| r.borrow_mut().clear());
        drop(state);
        Ok(())
    }

    fn destroy(&self) {
        self.send(UserEvent::Quit);
    }

    fn dispatch_on_main_thread(&self, id: u64) {
        self.send(UserEvent::Dispatch(id));
    }

    fn is_on_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread
    }

    fn on(&self, event_type: ApplicationEventType) {
        tracing::debug!(event = %event_type, "application listener registered");
    }

    fn name(&self) -> &str {
        "tao"
    }

    fn set_application_menu(&self, spec: Option<MenuSpec>) {
        let menu = spec.as_ref().map(menu::build_menu);
        with_state(|s| {
            if let Some(menu) = &menu {
                menu::attach_app(menu);
                for native in s.windows.values() {
                    menu::attach(menu, &native.window);
                }
            }
            s.app_menu = menu;
        });
        if let Some(spec) = spec {
            tracing::info!("Set app menu with {} items", spec.items.len());
        }
    }

    fn set_icon(&self, icon: &[u8]) {
        if icon.is_empty() {
            return;
        }
        let icon = decode_rgba(icon, None)
            .map_err(|e| e.to_string())
            .and_then(|(rgba, w, h)| tao::window::Icon::from_rgba(rgba, w, h).map_err(|e| e.to_string()));
        match icon {
            Ok(icon) => with_state(|s| {
                for native in s.windows.values() {
                    native.window.set_window_icon(Some(icon.clone()));
                }
                s.icon = Some(icon);
            }),
            Err(e) => tracing::warn!("Failed to load application icon: {}", e),
        }
    }

    fn show_about_dialog(&self, name: &str, description: &str, _icon: &[u8]) {
        rfd::MessageDialog::new()
            .set_title(name)
            .set_description(description)
            .set_level(rfd::MessageLevel::Info)
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }

    fn message_dialog(&self, spec: &MessageDialogSpec) -> Result<bool, PlatformError> {
        Ok(dialog::show_message(spec))
    }

    fn open_file_dialog(&self, spec: &FileDialogSpec) -> Result<Vec<PathBuf>, PlatformError> {
        Ok(dialog::pick(spec))
    }

    fn save_file_dialog(&self, spec: &FileDialogSpec) -> Result<Option<PathBuf>, PlatformError> {
        Ok(dialog::save(spec))
    }

    fn clipboard_text(&self) -> Result<Option<String>, PlatformError> {
        dialog::clipboard_text()
    }

    fn set_clipboard_text(&self, text: &str) -> Result<(), PlatformError> {
        dialog::set_clipboard_text(text)
    }

    fn hide(&self) {
        with_state(|s| {
            for native in s.windows.values() {
                native.window.set_visible(false);
            }
        });
    }

    fn show(&self) {
        with_state(|s| {
            for native in s.windows.values() {
                native.window.set_visible(true);
            }
        });
    }

    fn current_window_id(&self) -> Option<u64> {
        with_state(|s| s.focused)
    }

    fn primary_screen(&self) -> Result<Screen, PlatformError> {
        let screens = self.screens()?;
        screens
            .iter()
            .find(|screen| screen.is_primary)
            .or_else(|| screens.first())
            .cloned()
            .ok_or_else(|| PlatformError::new("no screens attached"))
    }

    fn screens(&self) -> Result<Vec<Screen>, PlatformError> {
        with_state(|s| {
            // Monitors are queried through any open window
            let window = s
                .windows
                .values()
                .next()
                .map(|native| &native.window)
                .ok_or_else(|| PlatformError::new("no window open to query screens"))?;
            let primary_id = window.primary_monitor().as_ref().map(monitor_id);
            Ok(window
                .available_monitors()
                .map(|handle| {
                    let is_primary = primary_id.as_deref() == Some(monitor_id(&handle).as_str());
                    to_screen(&handle, is_primary)
                })
                .collect())
        })
    }

    fn create_window(&self, spec: WindowSpec) -> Result<(), PlatformError> {
        // Windows need the loop's window target, which only the loop callback has
        self.send(UserEvent::CreateWindow(spec));
        Ok(())
    }

    fn destroy_window(&self, window_id: u64) {
        match self.events.get() {
            Some(events) => close_window(window_id, events),
            None => tracing::debug!(window_id, "destroy_window before the loop started"),
        }
    }

    fn set_window_title(&self, window_id: u64, title: &str) {
        with_state(|s| match s.windows.get(&window_id) {
            Some(native) => native.window.set_title(title),
            None => tracing::debug!(window_id, "set_title on unknown window"),
        });
    }

    fn exec_js(&self, window_id: u64, js: &str) {
        with_state(|s| match s.windows.get(&window_id) {
            Some(native) => {
                if let Err(e) = native.webview.evaluate_script(js) {
                    tracing::warn!(window_id, "Failed to evaluate script: {}", e);
                }
            }
            None => tracing::debug!(window_id, "exec_js on unknown window"),
        });
    }

    fn create_tray(&self, spec: TraySpec) -> Result<(), PlatformError> {
        let mut builder = TrayIconBuilder::new();
        if let Some(icon) = tray_icon(&spec.icon) {
            builder = builder.with_icon(icon);
        }
        if let Some(tooltip) = &spec.tooltip {
            builder = builder.with_tooltip(tooltip);
        }
        if let Some(menu) = &spec.menu {
            builder = builder.with_menu(Box::new(menu::build_menu(menu)));
        }
        let tray = builder
            .build()
            .map_err(|e| PlatformError::new(format!("tray {}: {}", spec.id, e)))?;
        with_state(|s| s.trays.insert(spec.id, tray));
        tracing::debug!(tray_id = spec.id, "tray icon created");
        Ok(())
    }

    fn update_tray(&self, spec: TraySpec) {
        with_state(|s| {
            let Some(tray) = s.trays.get(&spec.id) else {
                tracing::debug!(tray_id = spec.id, "update for unknown tray");
                return;
            };
            if let Err(e) = tray.set_tooltip(spec.tooltip.as_deref()) {
                tracing::warn!(tray_id = spec.id, "Failed to set tray tooltip: {}", e);
            }
            if let Err(e) = tray.set_icon(tray_icon(&spec.icon)) {
                tracing::warn!(tray_id = spec.id, "Failed to set tray icon: {}", e);
            }
            tray.set_menu(
                spec.menu
                    .as_ref()
                    .map(|menu| Box::new(menu::build_menu(menu)) as Box<dyn muda::ContextMenu>),
            );
        });
    }

    fn destroy_tray(&self, tray_id: u64) {
        let tray = with_state(|s| s.trays.remove(&tray_id));
        drop(tray);
    }
}
