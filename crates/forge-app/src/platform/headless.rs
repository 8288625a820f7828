//! Headless platform variant.
//!
//! Pumps main-thread dispatches from a channel on whichever thread calls
//! `run`, and records the native calls it receives instead of drawing
//! anything. Used by `forge-host --headless` and by the runtime tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use crossbeam_channel::{unbounded, Receiver, Sender};
use once_cell::sync::OnceCell;

use super::{Platform, PlatformHost, Screen};
use crate::dialog::{FileDialogSpec, MessageDialogSpec};
use crate::error::PlatformError;
use crate::events::{ApplicationEventType, EventSender, WindowEventType};
use crate::lock;
use crate::menu::MenuSpec;
use crate::tray::TraySpec;
use crate::window::WindowSpec;

enum LoopMessage {
    Dispatch(u64),
    Quit,
}

#[derive(Default)]
struct HeadlessState {
    windows: BTreeMap<u64, WindowSpec>,
    trays: BTreeMap<u64, TraySpec>,
    menu: Option<MenuSpec>,
    icon: Vec<u8>,
    hidden: bool,
    subscriptions: Vec<ApplicationEventType>,
    scripts: Vec<(u64, String)>,
    focused: Option<u64>,
    message_dialogs: Vec<MessageDialogSpec>,
    file_dialogs: Vec<FileDialogSpec>,
    dialog_answer: bool,
    file_answer: Vec<PathBuf>,
    clipboard: Option<String>,
    failing_windows: Vec<String>,
}

pub struct HeadlessPlatform {
    tx: Sender<LoopMessage>,
    rx: Receiver<LoopMessage>,
    main_thread: OnceCell<ThreadId>,
    host: OnceCell<PlatformHost>,
    screens: Vec<Screen>,
    state: Mutex<HeadlessState>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::with_screens(vec![Screen {
            id: "headless-0".to_string(),
            name: Some("Headless Display".to_string()),
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
            scale_factor: 1.0,
            is_primary: true,
        }])
    }

    pub fn with_screens(screens: Vec<Screen>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            main_thread: OnceCell::new(),
            host: OnceCell::new(),
            screens,
            state: Mutex::new(HeadlessState::default()),
        }
    }

    /// Block until some thread has entered `run`.
    pub fn wait_until_running(&self) {
        self.main_thread.wait();
    }

    /// Event producer, available once the platform is running
    pub fn events(&self) -> Option<EventSender> {
        self.host.get().map(|host| host.events().clone())
    }

    pub fn windows(&self) -> Vec<WindowSpec> {
        lock(&self.state).windows.values().cloned().collect()
    }

    pub fn window(&self, window_id: u64) -> Option<WindowSpec> {
        lock(&self.state).windows.get(&window_id).cloned()
    }

    pub fn trays(&self) -> Vec<TraySpec> {
        lock(&self.state).trays.values().cloned().collect()
    }

    pub fn application_menu(&self) -> Option<MenuSpec> {
        lock(&self.state).menu.clone()
    }

    pub fn icon(&self) -> Vec<u8> {
        lock(&self.state).icon.clone()
    }

    pub fn is_hidden(&self) -> bool {
        lock(&self.state).hidden
    }

    pub fn subscriptions(&self) -> Vec<ApplicationEventType> {
        lock(&self.state).subscriptions.clone()
    }

    /// Scripts executed per window, in call order
    pub fn scripts(&self) -> Vec<(u64, String)> {
        lock(&self.state).scripts.clone()
    }

    /// Message dialogs shown so far, in call order
    pub fn message_dialogs(&self) -> Vec<MessageDialogSpec> {
        lock(&self.state).message_dialogs.clone()
    }

    /// Open and save dialogs shown so far, in call order
    pub fn file_dialogs(&self) -> Vec<FileDialogSpec> {
        lock(&self.state).file_dialogs.clone()
    }

    /// How every following message dialog is answered. Dialogs are declined
    /// until this is called.
    pub fn answer_dialogs(&self, accept: bool) {
        lock(&self.state).dialog_answer = accept;
    }

    /// Paths every following file dialog returns. Empty means cancelled.
    pub fn answer_file_dialogs(&self, paths: Vec<PathBuf>) {
        lock(&self.state).file_answer = paths;
    }

    /// Make the native build of windows named `name` fail after the request
    /// was accepted, the way a toolkit reports it from inside its loop.
    pub fn fail_windows_named(&self, name: &str) {
        lock(&self.state).failing_windows.push(name.to_string());
    }

    /// Simulate the user focusing a window.
    pub fn focus(&self, window_id: u64) {
        lock(&self.state).focused = Some(window_id);
        if let Some(events) = self.events() {
            events.window_event(window_id, WindowEventType::Focus);
        }
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for HeadlessPlatform {
    fn run(&self, host: PlatformHost) -> Result<(), PlatformError> {
        if self.host.set(host.clone()).is_err() {
            return Err(PlatformError::new("headless platform is already running"));
        }
        let _ = self.main_thread.set(thread::current().id());
        tracing::debug!("headless main loop started");
        host.events()
            .application_event(ApplicationEventType::Started);

        for message in self.rx.iter() {
            match message {
                LoopMessage::Dispatch(id) => host.execute(id),
                LoopMessage::Quit => break,
            }
        }

        host.events()
            .application_event(ApplicationEventType::WillTerminate);
        let discarded = host.discard_pending();
        if discarded > 0 {
            tracing::debug!(discarded, "discarded main thread functions at shutdown");
        }
        tracing::debug!("headless main loop stopped");
        Ok(())
    }

    fn destroy(&self) {
        let _ = self.tx.send(LoopMessage::Quit);
    }

    fn dispatch_on_main_thread(&self, id: u64) {
        let _ = self.tx.send(LoopMessage::Dispatch(id));
    }

    fn is_on_main_thread(&self) -> bool {
        self.main_thread
            .get()
            .is_some_and(|id| *id == thread::current().id())
    }

    fn on(&self, event_type: ApplicationEventType) {
        lock(&self.state).subscriptions.push(event_type);
    }

    fn name(&self) -> &str {
        "headless"
    }

    fn set_application_menu(&self, menu: Option<MenuSpec>) {
        lock(&self.state).menu = menu;
    }

    fn set_icon(&self, icon: &[u8]) {
        lock(&self.state).icon = icon.to_vec();
    }

    fn show_about_dialog(&self, name: &str, description: &str, _icon: &[u8]) {
        tracing::info!(name, description, "about dialog");
    }

    fn message_dialog(&self, spec: &MessageDialogSpec) -> Result<bool, PlatformError> {
        let mut state = lock(&self.state);
        state.message_dialogs.push(spec.clone());
        Ok(state.dialog_answer)
    }

    fn open_file_dialog(&self, spec: &FileDialogSpec) -> Result<Vec<PathBuf>, PlatformError> {
        let mut state = lock(&self.state);
        state.file_dialogs.push(spec.clone());
        let mut paths = state.file_answer.clone();
        if !spec.allow_multiple {
            paths.truncate(1);
        }
        Ok(paths)
    }

    fn save_file_dialog(&self, spec: &FileDialogSpec) -> Result<Option<PathBuf>, PlatformError> {
        let mut state = lock(&self.state);
        state.file_dialogs.push(spec.clone());
        Ok(state.file_answer.first().cloned())
    }

    fn clipboard_text(&self) -> Result<Option<String>, PlatformError> {
        Ok(lock(&self.state).clipboard.clone())
    }

    fn set_clipboard_text(&self, text: &str) -> Result<(), PlatformError> {
        lock(&self.state).clipboard = Some(text.to_string());
        Ok(())
    }

    fn hide(&self) {
        lock(&self.state).hidden = true;
    }

    fn show(&self) {
        lock(&self.state).hidden = false;
    }

    fn current_window_id(&self) -> Option<u64> {
        lock(&self.state).focused
    }

    fn primary_screen(&self) -> Result<Screen, PlatformError> {
        self.screens
            .iter()
            .find(|screen| screen.is_primary)
            .cloned()
            .ok_or_else(|| PlatformError::new("no primary screen"))
    }

    fn screens(&self) -> Result<Vec<Screen>, PlatformError> {
        Ok(self.screens.clone())
    }

    fn create_window(&self, spec: WindowSpec) -> Result<(), PlatformError> {
        let window_id = spec.id;
        let failed = {
            let mut state = lock(&self.state);
            if state.windows.contains_key(&window_id) {
                return Err(PlatformError::new(format!(
                    "window {} already exists",
                    window_id
                )));
            }
            if state.failing_windows.contains(&spec.name) {
                true
            } else {
                state.windows.insert(window_id, spec);
                false
            }
        };
        if let Some(events) = self.events() {
            if failed {
                tracing::error!(window_id, "simulated native window failure");
                events.window_event(window_id, WindowEventType::Destroyed);
            } else {
                events.window_event(window_id, WindowEventType::Created);
            }
        }
        Ok(())
    }

    fn destroy_window(&self, window_id: u64) {
        let removed = {
            let mut state = lock(&self.state);
            if state.focused == Some(window_id) {
                state.focused = None;
            }
            state.windows.remove(&window_id).is_some()
        };
        if removed {
            if let Some(events) = self.events() {
                events.window_event(window_id, WindowEventType::Destroyed);
            }
        }
    }

    fn set_window_title(&self, window_id: u64, title: &str) {
        if let Some(spec) = lock(&self.state).windows.get_mut(&window_id) {
            spec.options.title = Some(title.to_string());
        }
    }

    fn exec_js(&self, window_id: u64, js: &str) {
        lock(&self.state).scripts.push((window_id, js.to_string()));
    }

    fn create_tray(&self, spec: TraySpec) -> Result<(), PlatformError> {
        lock(&self.state).trays.insert(spec.id, spec);
        Ok(())
    }

    fn update_tray(&self, spec: TraySpec) {
        lock(&self.state).trays.insert(spec.id, spec);
    }

    fn destroy_tray(&self, tray_id: u64) {
        lock(&self.state).trays.remove(&tray_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_on_main_thread_before_run() {
        let platform = HeadlessPlatform::new();
        assert!(!platform.is_on_main_thread());
        assert!(platform.events().is_none());
    }

    #[test]
    fn test_primary_screen() {
        let platform = HeadlessPlatform::new();
        let screen = platform.primary_screen().unwrap();
        assert!(screen.is_primary);
        assert_eq!((screen.width, screen.height), (1920, 1080));

        let none = HeadlessPlatform::with_screens(Vec::new());
        assert!(none.primary_screen().is_err());
        assert!(none.screens().unwrap().is_empty());
    }

    #[test]
    fn test_records_native_calls() {
        let platform = HeadlessPlatform::new();
        platform.hide();
        assert!(platform.is_hidden());
        platform.show();
        assert!(!platform.is_hidden());

        platform.set_icon(&[1, 2, 3]);
        assert_eq!(platform.icon(), vec![1, 2, 3]);

        platform.exec_js(4, "console.log(1)");
        assert_eq!(platform.scripts(), vec![(4, "console.log(1)".to_string())]);
    }

    #[test]
    fn test_file_dialog_answers_respect_multiple() {
        let platform = HeadlessPlatform::new();
        let spec = FileDialogSpec::default();
        assert!(platform.open_file_dialog(&spec).unwrap().is_empty());

        platform.answer_file_dialogs(vec!["/tmp/a.txt".into(), "/tmp/b.txt".into()]);
        assert_eq!(platform.open_file_dialog(&spec).unwrap().len(), 1);
        let multiple = FileDialogSpec {
            allow_multiple: true,
            ..Default::default()
        };
        assert_eq!(platform.open_file_dialog(&multiple).unwrap().len(), 2);
        assert_eq!(
            platform.save_file_dialog(&spec).unwrap(),
            Some(PathBuf::from("/tmp/a.txt"))
        );
        assert_eq!(platform.file_dialogs().len(), 4);
    }
}
