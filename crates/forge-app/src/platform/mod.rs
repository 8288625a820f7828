//! Platform capability interface.
//!
//! The core never talks to a windowing toolkit directly. A platform variant
//! implements [`Platform`]; every call into it except `run`,
//! `dispatch_on_main_thread` and `is_on_main_thread` is made on the main
//! thread through the dispatcher.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dialog::{FileDialogSpec, MessageDialogSpec};
use crate::dispatcher::FunctionStore;
use crate::error::PlatformError;
use crate::events::{ApplicationEventType, EventSender};
use crate::menu::MenuSpec;
use crate::tray::TraySpec;
use crate::window::WindowSpec;

pub mod headless;

/// A display attached to the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub id: String,
    pub name: Option<String>,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
    pub is_primary: bool,
}

/// What the core hands a platform when it starts running
#[derive(Clone)]
pub struct PlatformHost {
    functions: Arc<FunctionStore>,
    events: EventSender,
}

impl PlatformHost {
    pub(crate) fn new(functions: Arc<FunctionStore>, events: EventSender) -> Self {
        Self { functions, events }
    }

    /// Host whose events go nowhere, for dispatcher tests
    #[cfg(test)]
    pub(crate) fn detached(functions: Arc<FunctionStore>) -> Self {
        let (events, _receivers) = crate::events::event_buses();
        Self { functions, events }
    }

    /// Run the main-thread function stored under `id`. Call only on the main thread.
    pub fn execute(&self, id: u64) {
        self.functions.execute(id);
    }

    /// Drop main-thread functions that will never run, releasing their callers.
    pub fn discard_pending(&self) -> usize {
        self.functions.discard_pending()
    }

    /// Producer side of the event buses
    pub fn events(&self) -> &EventSender {
        &self.events
    }
}

/// Native platform adapter
pub trait Platform: Send + Sync {
    /// Take over the calling thread with the native main loop. Returns once the
    /// loop has been told to terminate.
    fn run(&self, host: PlatformHost) -> Result<(), PlatformError>;

    /// Ask the main loop to terminate.
    fn destroy(&self);

    /// Wake the main loop and have it call `PlatformHost::execute(id)`.
    /// Callable from any thread; must not block.
    fn dispatch_on_main_thread(&self, id: u64);

    /// Callable from any thread.
    fn is_on_main_thread(&self) -> bool;

    /// An application listener was registered for `event_type`.
    fn on(&self, event_type: ApplicationEventType);

    fn name(&self) -> &str;

    fn set_application_menu(&self, menu: Option<MenuSpec>);

    fn set_icon(&self, icon: &[u8]);

    fn show_about_dialog(&self, name: &str, description: &str, icon: &[u8]);

    /// Modal message box. `true` when the user accepted it.
    fn message_dialog(&self, spec: &MessageDialogSpec) -> Result<bool, PlatformError>;

    /// Modal file or directory picker. Empty when cancelled.
    fn open_file_dialog(&self, spec: &FileDialogSpec) -> Result<Vec<PathBuf>, PlatformError>;

    fn save_file_dialog(&self, spec: &FileDialogSpec) -> Result<Option<PathBuf>, PlatformError>;

    fn clipboard_text(&self) -> Result<Option<String>, PlatformError>;

    fn set_clipboard_text(&self, text: &str) -> Result<(), PlatformError>;

    fn hide(&self);

    fn show(&self);

    /// Id of the focused window, if any
    fn current_window_id(&self) -> Option<u64>;

    fn primary_screen(&self) -> Result<Screen, PlatformError>;

    fn screens(&self) -> Result<Vec<Screen>, PlatformError>;

    fn create_window(&self, spec: WindowSpec) -> Result<(), PlatformError>;

    fn destroy_window(&self, window_id: u64);

    fn set_window_title(&self, window_id: u64, title: &str);

    fn exec_js(&self, window_id: u64, js: &str);

    fn create_tray(&self, spec: TraySpec) -> Result<(), PlatformError>;

    fn update_tray(&self, spec: TraySpec);

    fn destroy_tray(&self, tray_id: u64);
}
