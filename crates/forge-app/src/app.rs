//! The application core.
//!
//! [`App`] owns the registries, the event buses and the lifecycle. `App::run`
//! attaches a platform, starts one dispatch loop per event category, launches
//! everything created before start, and then hands the calling thread to the
//! platform's main loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::assets::{AssetServer, NotFoundAssetServer, WebViewRequest};
use crate::capabilities::Capabilities;
use crate::config::{non_empty_or, AppConfig, DEFAULT_APP_DESCRIPTION, DEFAULT_APP_NAME};
use crate::dialog::{Clipboard, DialogKind, MessageDialog, OpenFileDialog, SaveFileDialog};
use crate::dispatcher::Dispatcher;
use crate::error::{AppError, DispatchError};
use crate::events::{
    event_buses, ApplicationEvent, ApplicationEventType, DragAndDrop, EventCategory,
    EventReceivers, EventSender, MenuItemClicked, WindowEvent, WindowEventType, WindowMessage,
};
use crate::lifecycle::{DeferredCall, Lifecycle, Runnable};
use crate::listeners::{ListenerMap, Listeners, Subscription};
use crate::lock;
use crate::menu::{Menu, MenuItem};
use crate::panic::{recover, PanicHandler, PanicPolicy};
use crate::platform::{Platform, PlatformHost, Screen};
use crate::plugin::Plugin;
use crate::registry::{ObjectKind, Registry};
use crate::runtime;
use crate::tray::{SystemTray, TrayOptions};
use crate::window::{dispatch_script, WebviewWindow, WindowOptions};

/// Construction input for [`App::new`]
#[derive(Default)]
pub struct Options {
    /// Blank falls back to the manifest name, then to "Forge Application"
    pub name: String,
    pub description: String,
    /// Encoded application icon
    pub icon: Vec<u8>,
    pub config: AppConfig,
    /// Without a handler, a recovered panic terminates the process
    pub panic_handler: Option<PanicHandler>,
    pub plugins: Vec<Box<dyn Plugin>>,
    pub asset_server: Option<Arc<dyn AssetServer>>,
    /// Reported to script; set by the host to match its platform
    pub capabilities: Capabilities,
}

impl Options {
    pub fn from_config(config: AppConfig) -> Self {
        Self {
            name: config.app.name.clone(),
            description: config.app.description.clone(),
            config,
            ..Default::default()
        }
    }
}

pub struct App {
    self_ref: Weak<App>,
    name: String,
    description: String,
    icon: Vec<u8>,
    config: AppConfig,
    pid: u32,
    capabilities: Capabilities,
    policy: PanicPolicy,
    dispatcher: Dispatcher,
    lifecycle: Lifecycle,
    windows: Arc<Registry<WebviewWindow>>,
    trays: Arc<Registry<SystemTray>>,
    menu_items: Arc<Registry<MenuItem>>,
    application_listeners: ListenerMap<ApplicationEventType, ApplicationEvent>,
    window_creation_hooks: Listeners<Arc<WebviewWindow>>,
    application_menu: Mutex<Option<Arc<Menu>>>,
    context_menus: Mutex<HashMap<String, Arc<Menu>>>,
    asset_server: Arc<dyn AssetServer>,
    plugins: Vec<Box<dyn Plugin>>,
    events: EventSender,
    receivers: Mutex<Option<EventReceivers>>,
}

impl App {
    pub fn new(options: Options) -> Result<Arc<Self>, AppError> {
        let Options {
            name,
            description,
            icon,
            config,
            panic_handler,
            plugins,
            asset_server,
            capabilities,
        } = options;

        let name = non_empty_or(&name, non_empty_or(&config.app.name, DEFAULT_APP_NAME)).to_string();
        let description = non_empty_or(
            &description,
            non_empty_or(&config.app.description, DEFAULT_APP_DESCRIPTION),
        )
        .to_string();
        let policy = PanicPolicy::new(panic_handler);
        let (events, receivers) = event_buses();

        let app = Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            name,
            description,
            icon,
            config,
            pid: std::process::id(),
            capabilities,
            dispatcher: Dispatcher::new(policy.clone()),
            policy,
            lifecycle: Lifecycle::new(),
            windows: Arc::new(Registry::new(ObjectKind::Window)),
            trays: Arc::new(Registry::new(ObjectKind::Tray)),
            menu_items: Arc::new(Registry::new(ObjectKind::MenuItem)),
            application_listeners: ListenerMap::new(),
            window_creation_hooks: Listeners::new(),
            application_menu: Mutex::new(None),
            context_menus: Mutex::new(HashMap::new()),
            asset_server: asset_server.unwrap_or_else(|| Arc::new(NotFoundAssetServer)),
            plugins,
            events,
            receivers: Mutex::new(Some(receivers)),
        });

        for (index, plugin) in app.plugins.iter().enumerate() {
            if let Err(err) = plugin.init(&app) {
                error!(plugin = plugin.name(), error = %err, "plugin failed to initialise");
                for started in app.plugins[..index].iter().rev() {
                    started.shutdown();
                }
                return Err(AppError::plugin_init(plugin.name(), err.to_string()));
            }
            debug!(plugin = plugin.name(), "plugin initialised");
        }

        Ok(app)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn icon(&self) -> &[u8] {
        &self.icon
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    pub(crate) fn window_registry(&self) -> &Registry<WebviewWindow> {
        &self.windows
    }

    pub(crate) fn tray_registry(&self) -> &Registry<SystemTray> {
        &self.trays
    }

    // ======================================================================
    // Listeners
    // ======================================================================

    /// Listen for an application event. Each delivery runs on its own thread.
    pub fn on(
        &self,
        event_type: ApplicationEventType,
        callback: impl Fn(&ApplicationEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let event_type = event_type.normalized();
        let subscription = self.application_listeners.add(event_type, callback);
        self.on_platform(move |platform| platform.on(event_type));
        subscription
    }

    /// Run `hook` for every window created from now on, before it is launched.
    pub fn on_window_creation(
        &self,
        hook: impl Fn(&Arc<WebviewWindow>) + Send + Sync + 'static,
    ) -> Subscription {
        self.window_creation_hooks.add(hook)
    }

    // ======================================================================
    // Objects
    // ======================================================================

    pub fn new_webview_window(&self) -> Arc<WebviewWindow> {
        self.new_webview_window_with_options(WindowOptions::default())
    }

    pub fn new_webview_window_with_options(&self, options: WindowOptions) -> Arc<WebviewWindow> {
        let id = self.windows.allocate();
        let window = Arc::new(WebviewWindow::new(id, options, self.self_ref.clone()));
        if self.get_window_by_name(window.name()).is_some() {
            warn!(window_id = id, name = window.name(), "another window already uses this name");
        }
        self.windows.register(id, window.clone());
        debug!(window_id = id, name = window.name(), "window registered");

        self.window_creation_hooks.emit(&window);
        self.lifecycle.run_or_defer(window.clone());
        window
    }

    pub fn new_system_tray(&self) -> Arc<SystemTray> {
        self.new_system_tray_with_options(TrayOptions::default())
    }

    pub fn new_system_tray_with_options(&self, options: TrayOptions) -> Arc<SystemTray> {
        let id = self.trays.allocate();
        let tray = Arc::new(SystemTray::new(id, options, self.self_ref.clone()));
        self.trays.register(id, tray.clone());
        self.lifecycle.run_or_defer(tray.clone());
        tray
    }

    pub fn new_menu(&self) -> Arc<Menu> {
        Arc::new(Menu::new(self.menu_items.clone()))
    }

    pub fn get_window(&self, window_id: u64) -> Option<Arc<WebviewWindow>> {
        self.windows.lookup(window_id)
    }

    pub fn get_window_by_name(&self, name: &str) -> Option<Arc<WebviewWindow>> {
        self.windows.find(|window| window.name() == name)
    }

    /// The focused window, if the platform reports one
    pub fn current_window(&self) -> Option<Arc<WebviewWindow>> {
        match self.invoke_platform(|platform| Ok(platform.current_window_id())) {
            Ok(id) => id.and_then(|id| self.windows.lookup(id)),
            Err(err) => {
                debug!(error = %err, "current window unavailable");
                None
            }
        }
    }

    /// Live windows, oldest first
    pub fn windows(&self) -> Vec<Arc<WebviewWindow>> {
        self.windows.snapshot()
    }

    pub fn get_tray(&self, tray_id: u64) -> Result<Arc<SystemTray>, AppError> {
        self.trays
            .lookup(tray_id)
            .ok_or_else(|| AppError::tray_not_found(tray_id))
    }

    pub fn trays(&self) -> Vec<Arc<SystemTray>> {
        self.trays.snapshot()
    }

    pub fn register_context_menu(&self, name: &str, menu: Arc<Menu>) {
        lock(&self.context_menus).insert(name.to_string(), menu);
    }

    pub fn context_menu(&self, name: &str) -> Option<Arc<Menu>> {
        lock(&self.context_menus).get(name).cloned()
    }

    // ======================================================================
    // Application methods
    // ======================================================================

    pub fn set_menu(&self, menu: Option<Arc<Menu>>) {
        let spec = menu.as_ref().map(|menu| menu.spec());
        *lock(&self.application_menu) = menu;
        // Before start the menu is applied by `run`
        if self.is_started() {
            self.on_platform(move |platform| platform.set_application_menu(spec));
        }
    }

    pub fn application_menu(&self) -> Option<Arc<Menu>> {
        lock(&self.application_menu).clone()
    }

    pub fn show_about_dialog(&self) {
        let (name, description, icon) = (self.name.clone(), self.description.clone(), self.icon.clone());
        self.on_platform(move |platform| platform.show_about_dialog(&name, &description, &icon));
    }

    pub fn info_dialog(&self) -> MessageDialog<'_> {
        MessageDialog::new(self, DialogKind::Info)
    }

    pub fn question_dialog(&self) -> MessageDialog<'_> {
        MessageDialog::new(self, DialogKind::Question)
    }

    pub fn warning_dialog(&self) -> MessageDialog<'_> {
        MessageDialog::new(self, DialogKind::Warning)
    }

    pub fn error_dialog(&self) -> MessageDialog<'_> {
        MessageDialog::new(self, DialogKind::Error)
    }

    pub fn open_directory_dialog(&self) -> OpenFileDialog<'_> {
        OpenFileDialog::new(self, true)
    }

    pub fn open_file_dialog(&self) -> OpenFileDialog<'_> {
        OpenFileDialog::new(self, false)
    }

    pub fn save_file_dialog(&self) -> SaveFileDialog<'_> {
        SaveFileDialog::new(self)
    }

    pub fn clipboard(&self) -> Clipboard<'_> {
        Clipboard::new(self)
    }

    pub fn hide(&self) {
        self.on_platform(|platform| platform.hide());
    }

    pub fn show(&self) {
        self.on_platform(|platform| platform.show());
    }

    /// Destroy every window and tray, then stop the main loop. Before start
    /// this is deferred, so `run` returns right after launching.
    pub fn quit(&self) {
        info!(app = %self.name, "quit requested");
        for window in self.windows.snapshot() {
            window.destroy();
        }
        for tray in self.trays.snapshot() {
            tray.destroy();
        }
        self.on_platform(|platform| platform.destroy());
    }

    pub fn get_primary_screen(&self) -> Result<Screen, AppError> {
        self.invoke_platform(|platform| platform.primary_screen().map_err(AppError::from))
    }

    pub fn get_screens(&self) -> Result<Vec<Screen>, AppError> {
        self.invoke_platform(|platform| platform.screens().map_err(AppError::from))
    }

    /// Deliver a named event to script in every live window.
    pub fn emit_event(&self, name: &str, data: impl Serialize) -> Result<(), AppError> {
        let script = dispatch_script(name, data)?;
        for window in self.windows.snapshot() {
            window.exec_js(&script);
        }
        Ok(())
    }

    // ======================================================================
    // Main thread
    // ======================================================================

    /// Run `f` on the main thread without waiting. Calls made before `run`
    /// are queued and issued in order once the application starts.
    pub fn run_on_main(&self, f: impl FnOnce() + Send + 'static) {
        let app = self.self_ref.clone();
        self.lifecycle.run_or_defer(Arc::new(DeferredCall::new(move || {
            let Some(app) = app.upgrade() else {
                return;
            };
            if let Err(err) = app.dispatcher.run_on_main(f) {
                warn!(error = %err, "main thread dispatch failed");
            }
        })));
    }

    pub fn invoke_sync<F>(&self, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatcher.invoke_sync(f)
    }

    pub fn invoke_sync_with_result<T, F>(&self, f: F) -> Result<T, DispatchError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.dispatcher.invoke_sync_with_result(f)
    }

    pub fn invoke_sync_with_error<E, F>(&self, f: F) -> Result<(), E>
    where
        E: From<DispatchError> + Send + 'static,
        F: FnOnce() -> Result<(), E> + Send + 'static,
    {
        self.dispatcher.invoke_sync_with_error(f)
    }

    pub fn invoke_sync_with_result_and_error<T, E, F>(&self, f: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<DispatchError> + Send + 'static,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        self.dispatcher.invoke_sync_with_result_and_error(f)
    }

    /// Fire-and-forget platform call on the main thread, deferred until start.
    pub(crate) fn on_platform(&self, f: impl FnOnce(&dyn Platform) + Send + 'static) {
        let app = self.self_ref.clone();
        self.run_on_main(move || {
            let platform = app
                .upgrade()
                .and_then(|app| app.dispatcher.platform().cloned());
            if let Some(platform) = platform {
                f(platform.as_ref());
            }
        });
    }

    /// Blocking platform call on the main thread.
    pub(crate) fn invoke_platform<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Platform) -> Result<T, AppError> + Send + 'static,
    {
        let platform = self
            .dispatcher
            .platform()
            .cloned()
            .ok_or(DispatchError::NotStarted)?;
        self.dispatcher
            .invoke_sync_with_result_and_error(move || f(platform.as_ref()))
    }

    // ======================================================================
    // Run
    // ======================================================================

    /// Take over the calling thread with `platform`'s main loop. Returns once
    /// the loop exits and the runtime has shut down.
    pub fn run(self: &Arc<Self>, platform: Arc<dyn Platform>) -> Result<(), AppError> {
        let receivers = lock(&self.receivers)
            .take()
            .ok_or_else(AppError::already_running)?;
        if !self.dispatcher.attach(platform.clone()) {
            return Err(AppError::already_running());
        }
        info!(app = %self.name, pid = self.pid, platform = platform.name(), "starting application");

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let loops = self.spawn_dispatch_loops(receivers, &shutdown_rx)?;

        let pending = self.lifecycle.start()?;
        if let Some(menu) = self.application_menu() {
            let spec = menu.spec();
            self.on_platform(move |platform| platform.set_application_menu(Some(spec)));
        }
        if !self.icon.is_empty() {
            let icon = self.icon.clone();
            self.on_platform(move |platform| platform.set_icon(&icon));
        }
        let launcher = self.launch_pending(pending)?;

        let host = PlatformHost::new(self.dispatcher.functions(), self.events.clone());
        let result = platform.run(host);

        info!(app = %self.name, "main loop exited, shutting down");
        let discarded = self.dispatcher.functions().close();
        if discarded > 0 {
            debug!(discarded, "dropped main thread functions that never ran");
        }
        if launcher.join().is_err() {
            error!("pending-run launcher panicked");
        }
        for plugin in self.plugins.iter().rev() {
            recover(&self.policy, || plugin.shutdown());
        }

        drop(shutdown_tx);
        for handle in loops {
            if handle.join().is_err() {
                error!("dispatch loop panicked");
            }
        }
        // The native side is gone, so nothing registered is live any more
        for window in self.windows.drain() {
            window.mark_destroyed();
        }
        for tray in self.trays.drain() {
            tray.mark_destroyed();
        }
        self.menu_items.drain();
        self.application_listeners.clear();
        self.window_creation_hooks.clear();

        result.map_err(AppError::from)
    }

    /// Launch queued runnables in creation order on one thread.
    fn launch_pending(&self, pending: Vec<Arc<dyn Runnable>>) -> Result<JoinHandle<()>, AppError> {
        debug!(count = pending.len(), "launching pending runnables");
        let policy = self.policy.clone();
        thread::Builder::new()
            .name("forge-pending-run".to_string())
            .spawn(move || {
                for runnable in pending {
                    recover(&policy, || runnable.run());
                }
            })
            .map_err(|e| AppError::generic(format!("failed to spawn launcher thread: {}", e)))
    }

    fn spawn_dispatch_loops(
        self: &Arc<Self>,
        receivers: EventReceivers,
        shutdown: &Receiver<()>,
    ) -> Result<Vec<JoinHandle<()>>, AppError> {
        let EventReceivers {
            application,
            window,
            webview_request,
            window_message,
            drag_and_drop,
            menu_item_clicked,
        } = receivers;

        let app = self.clone();
        let mut loops = vec![self.spawn_loop(
            EventCategory::Application,
            application,
            shutdown.clone(),
            move |event| app.handle_application_event(event),
        )?];
        let app = self.clone();
        loops.push(self.spawn_loop(EventCategory::Window, window, shutdown.clone(), move |event| {
            app.handle_window_event(event)
        })?);
        let app = self.clone();
        loops.push(self.spawn_loop(
            EventCategory::WebViewRequest,
            webview_request,
            shutdown.clone(),
            move |request| app.handle_webview_request(request),
        )?);
        let app = self.clone();
        loops.push(self.spawn_loop(
            EventCategory::WindowMessage,
            window_message,
            shutdown.clone(),
            move |message| app.handle_window_message(message),
        )?);
        let app = self.clone();
        loops.push(self.spawn_loop(
            EventCategory::DragAndDrop,
            drag_and_drop,
            shutdown.clone(),
            move |drop| app.handle_drag_and_drop(drop),
        )?);
        let app = self.clone();
        loops.push(self.spawn_loop(
            EventCategory::MenuItemClicked,
            menu_item_clicked,
            shutdown.clone(),
            move |click| app.handle_menu_item_clicked(click),
        )?);
        Ok(loops)
    }

    fn spawn_loop<E, F>(
        &self,
        category: EventCategory,
        events: Receiver<E>,
        shutdown: Receiver<()>,
        handler: F,
    ) -> Result<JoinHandle<()>, AppError>
    where
        E: Send + 'static,
        F: Fn(E) + Send + 'static,
    {
        let policy = self.policy.clone();
        thread::Builder::new()
            .name(format!("forge-events-{}", category))
            .spawn(move || {
                debug!(%category, "dispatch loop started");
                loop {
                    select! {
                        recv(events) -> event => match event {
                            Ok(event) => {
                                recover(&policy, || handler(event));
                            }
                            Err(_) => break,
                        },
                        recv(shutdown) -> _ => break,
                    }
                }
                debug!(%category, "dispatch loop stopped");
            })
            .map_err(|e| {
                AppError::generic(format!("failed to spawn {} dispatch loop: {}", category, e))
            })
    }

    // ======================================================================
    // Event handlers
    // ======================================================================

    fn handle_application_event(&self, event: ApplicationEvent) {
        debug!(event = %event.event_type, "application event");
        for listener in self.application_listeners.snapshot(&event.event_type) {
            let policy = self.policy.clone();
            let spawned = thread::Builder::new()
                .name("forge-app-listener".to_string())
                .spawn(move || {
                    recover(&policy, || listener.invoke(&event));
                });
            if let Err(err) = spawned {
                error!(event = %event.event_type, error = %err, "failed to spawn listener thread");
            }
        }
    }

    fn handle_window_event(&self, event: WindowEvent) {
        let Some(window) = self.windows.lookup(event.window_id) else {
            if event.event_type == WindowEventType::Destroyed {
                debug!(window_id = event.window_id, "destroyed event for released window");
            } else {
                warn!(
                    window_id = event.window_id,
                    event = %event.event_type,
                    "window event for unknown window dropped"
                );
            }
            return;
        };
        window.dispatch_event(&event, &self.policy);
        if event.event_type == WindowEventType::Destroyed {
            self.windows.unregister(event.window_id);
            window.mark_destroyed();
        }
    }

    fn handle_webview_request(&self, mut request: WebViewRequest) {
        if runtime::is_runtime_request(&request) {
            runtime::process(self, request);
            return;
        }
        let Some(window) = self.windows.lookup(request.window_id) else {
            warn!(
                window_id = request.window_id,
                path = request.path(),
                "asset request for unknown window"
            );
            request.not_found();
            return;
        };
        request.annotate(window.id(), window.name());
        self.asset_server.serve(request);
    }

    fn handle_window_message(&self, message: WindowMessage) {
        match self.windows.lookup(message.window_id) {
            Some(window) => window.dispatch_message(&message, &self.policy),
            None => warn!(window_id = message.window_id, "message for unknown window dropped"),
        }
    }

    fn handle_drag_and_drop(&self, drop: DragAndDrop) {
        match self.windows.lookup(drop.window_id) {
            Some(window) => window.dispatch_drop(&drop, &self.policy),
            None => warn!(window_id = drop.window_id, "drop for unknown window dropped"),
        }
    }

    fn handle_menu_item_clicked(&self, click: MenuItemClicked) {
        match self.menu_items.lookup(click.menu_item_id) {
            Some(item) => item.click(),
            None => warn!(menu_item_id = click.menu_item_id, "click for unknown menu item dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn app() -> Arc<App> {
        App::new(Options::default()).unwrap()
    }

    #[test]
    fn test_defaults_are_merged() {
        let app = app();
        assert_eq!(app.name(), DEFAULT_APP_NAME);
        assert_eq!(app.description(), DEFAULT_APP_DESCRIPTION);
        assert_eq!(app.pid(), std::process::id());

        let named = App::new(Options {
            name: "Notes".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(named.name(), "Notes");
    }

    #[test]
    fn test_name_falls_back_to_config() {
        let config = AppConfig::from_toml_str("[app]\nname = \"From Manifest\"").unwrap();
        let app = App::new(Options::from_config(config)).unwrap();
        assert_eq!(app.name(), "From Manifest");
    }

    #[test]
    fn test_window_ids_and_lookup() {
        let app = app();
        let first = app.new_webview_window();
        let second = app.new_webview_window_with_options(WindowOptions {
            name: Some("settings".into()),
            ..Default::default()
        });

        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);
        assert_eq!(first.name(), "window-1");
        assert_eq!(app.get_window_by_name("settings").unwrap().id(), 2);
        assert!(app.get_window_by_name("missing").is_none());
        assert_eq!(app.windows().len(), 2);
    }

    #[test]
    fn test_destroyed_window_id_is_not_reused() {
        let app = app();
        let window = app.new_webview_window();
        window.destroy();
        assert!(app.get_window(window.id()).is_none());

        let next = app.new_webview_window();
        assert_eq!(next.id(), window.id() + 1);
    }

    #[test]
    fn test_creation_hooks_see_new_windows() {
        let app = app();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook = app.on_window_creation({
            let seen = seen.clone();
            move |window| seen.lock().unwrap().push(window.name().to_string())
        });

        app.new_webview_window();
        hook.cancel();
        app.new_webview_window();
        assert_eq!(*seen.lock().unwrap(), vec!["window-1"]);
    }

    #[test]
    fn test_platform_calls_before_run_are_deferred() {
        let app = app();
        app.new_webview_window();
        app.hide();
        app.run_on_main(|| {});
        assert!(!app.is_started());
        assert_eq!(app.lifecycle.pending_count(), 3);
    }

    #[test]
    fn test_blocking_calls_before_run_are_not_started() {
        let app = app();
        let err = app.get_screens().unwrap_err();
        assert_eq!(err.code(), 8001);
        assert!(app.current_window().is_none());
        assert_eq!(app.invoke_sync(|| {}), Err(DispatchError::NotStarted));
    }

    #[test]
    fn test_context_menus_by_name() {
        let app = app();
        let menu = app.new_menu();
        menu.add("Copy");
        app.register_context_menu("editor", menu);
        assert_eq!(app.context_menu("editor").unwrap().len(), 1);
        assert!(app.context_menu("sidebar").is_none());
    }

    #[test]
    fn test_missing_tray_is_an_error() {
        let app = app();
        assert_eq!(app.get_tray(9).err().unwrap().code(), 8006);
        let tray = app.new_system_tray();
        assert_eq!(app.get_tray(tray.id()).unwrap().id(), tray.id());
    }

    struct Failing;

    impl Plugin for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn init(&self, _app: &Arc<App>) -> Result<(), AppError> {
            Err(AppError::generic("no license"))
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl Plugin for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn init(&self, _app: &Arc<App>) -> Result<(), AppError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn shutdown(&self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_plugin_init_failure_refuses_startup() {
        let live = Arc::new(AtomicUsize::new(0));
        let err = App::new(Options {
            plugins: vec![Box::new(Counting(live.clone())), Box::new(Failing)],
            ..Default::default()
        })
        .err()
        .unwrap();

        assert_eq!(err.code(), 8007);
        assert!(err.to_string().contains("failing"));
        // The plugin that did start was shut down again
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
