//! Forge application runtime core.
//!
//! Owns the main-thread dispatcher, the per-category event buses and their
//! dispatch loops, the identity registries for windows, trays and menu items,
//! and the startup lifecycle. Native work is delegated to a [`Platform`]
//! adapter; `forge-host` provides the desktop one and [`HeadlessPlatform`]
//! runs without a display.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::OnceCell;

pub mod app;
pub mod assets;
pub mod capabilities;
pub mod config;
pub mod crash;
pub mod dialog;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod listeners;
pub mod logging;
pub mod menu;
pub mod panic;
pub mod platform;
pub mod plugin;
pub mod registry;
pub mod runtime;
pub mod tray;
pub mod window;

pub use app::{App, Options};
pub use assets::{AssetServer, NotFoundAssetServer, WebViewRequest, WINDOW_ID_HEADER, WINDOW_NAME_HEADER};
pub use capabilities::Capabilities;
pub use config::{AppConfig, LogConfig, TrayConfig};
pub use dialog::{
    Clipboard, DialogKind, FileDialogSpec, FileFilter, MessageDialog, MessageDialogSpec,
    OpenFileDialog, SaveFileDialog,
};
pub use dispatcher::Dispatcher;
pub use error::{AppError, AppErrorCode, DispatchError, PlatformError};
pub use events::{
    ApplicationEvent, ApplicationEventType, DragAndDrop, EventSender, MenuItemClicked,
    WindowEvent, WindowEventType, WindowMessage,
};
pub use lifecycle::Runnable;
pub use listeners::Subscription;
pub use menu::{Menu, MenuItem, MenuItemKind, MenuItemSpec, MenuSpec};
pub use panic::{PanicDetails, PanicHandler, PanicPolicy};
pub use platform::headless::HeadlessPlatform;
pub use platform::{Platform, PlatformHost, Screen};
pub use plugin::Plugin;
pub use tray::{SystemTray, TrayOptions, TraySpec};
pub use window::{WebviewWindow, WindowOptions, WindowSpec};

static GLOBAL_APP: OnceCell<Arc<App>> = OnceCell::new();

/// Publish `app` as the process-wide application. Returns `false` if one is
/// already set.
pub fn set_global(app: Arc<App>) -> bool {
    GLOBAL_APP.set(app).is_ok()
}

/// The process-wide application, if one was published
pub fn global() -> Option<Arc<App>> {
    GLOBAL_APP.get().cloned()
}

/// No lock in this crate is held while user code runs, so a poisoned mutex
/// still guards consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
