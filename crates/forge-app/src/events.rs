//! Event buses.
//!
//! The platform adapter produces events on six independent buses, one per
//! category. Each bus is an unbounded FIFO so a producer never blocks the
//! native event pump; the application core drains each bus on its own
//! dispatch loop.

use std::fmt;
use std::path::PathBuf;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::assets::WebViewRequest;

// ============================================================================
// Event Types
// ============================================================================

/// Application lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationEventType {
    /// The platform loop has started. Pending windows and trays are still
    /// being launched concurrently when this fires.
    Started,
    /// The application is about to leave its main loop
    WillTerminate,
    DidBecomeActive,
    DidResignActive,
    ThemeChanged,
    ScreensChanged,
    /// Platform-specific event code not covered above. Codes of the named
    /// variants are folded back into them, see [`ApplicationEventType::normalized`].
    Custom(u32),
}

impl ApplicationEventType {
    pub fn code(&self) -> u32 {
        match self {
            Self::Started => 0,
            Self::WillTerminate => 1,
            Self::DidBecomeActive => 2,
            Self::DidResignActive => 3,
            Self::ThemeChanged => 4,
            Self::ScreensChanged => 5,
            Self::Custom(code) => *code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Started,
            1 => Self::WillTerminate,
            2 => Self::DidBecomeActive,
            3 => Self::DidResignActive,
            4 => Self::ThemeChanged,
            5 => Self::ScreensChanged,
            other => Self::Custom(other),
        }
    }

    /// `Custom(0)` and `Started` name the same event; listeners and the bus
    /// only ever see the named form.
    pub fn normalized(self) -> Self {
        Self::from_code(self.code())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::WillTerminate => "will-terminate",
            Self::DidBecomeActive => "did-become-active",
            Self::DidResignActive => "did-resign-active",
            Self::ThemeChanged => "theme-changed",
            Self::ScreensChanged => "screens-changed",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for ApplicationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(code) => write!(f, "custom({})", code),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Window lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowEventType {
    Created,
    CloseRequested,
    Destroyed,
    Focus,
    Blur,
    Resized,
    Moved,
    Minimised,
    Maximised,
    Restored,
    Shown,
    Hidden,
}

impl WindowEventType {
    const ALL: [WindowEventType; 12] = [
        Self::Created,
        Self::CloseRequested,
        Self::Destroyed,
        Self::Focus,
        Self::Blur,
        Self::Resized,
        Self::Moved,
        Self::Minimised,
        Self::Maximised,
        Self::Restored,
        Self::Shown,
        Self::Hidden,
    ];

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::CloseRequested => "close-requested",
            Self::Destroyed => "destroyed",
            Self::Focus => "focus",
            Self::Blur => "blur",
            Self::Resized => "resized",
            Self::Moved => "moved",
            Self::Minimised => "minimised",
            Self::Maximised => "maximised",
            Self::Restored => "restored",
            Self::Shown => "shown",
            Self::Hidden => "hidden",
        }
    }
}

impl fmt::Display for WindowEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Envelopes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationEvent {
    pub event_type: ApplicationEventType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEvent {
    pub window_id: u64,
    pub event_type: WindowEventType,
}

/// Text posted by script running inside a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMessage {
    pub window_id: u64,
    pub message: String,
}

/// Files dropped onto a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragAndDrop {
    pub window_id: u64,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItemClicked {
    pub menu_item_id: u64,
}

/// Bus category, used for thread names and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Application,
    Window,
    WebViewRequest,
    WindowMessage,
    DragAndDrop,
    MenuItemClicked,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Window => "window",
            Self::WebViewRequest => "webview-request",
            Self::WindowMessage => "window-message",
            Self::DragAndDrop => "drag-and-drop",
            Self::MenuItemClicked => "menu-click",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Buses
// ============================================================================

/// Producer handle for every bus. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct EventSender {
    application: Sender<ApplicationEvent>,
    window: Sender<WindowEvent>,
    webview_request: Sender<WebViewRequest>,
    window_message: Sender<WindowMessage>,
    drag_and_drop: Sender<DragAndDrop>,
    menu_item_clicked: Sender<MenuItemClicked>,
}

fn send<T>(tx: &Sender<T>, category: EventCategory, event: T) {
    if tx.send(event).is_err() {
        tracing::debug!(%category, "event bus closed, dropping event");
    }
}

impl EventSender {
    pub fn application_event(&self, event_type: ApplicationEventType) {
        send(
            &self.application,
            EventCategory::Application,
            ApplicationEvent {
                event_type: event_type.normalized(),
            },
        );
    }

    pub fn window_event(&self, window_id: u64, event_type: WindowEventType) {
        send(
            &self.window,
            EventCategory::Window,
            WindowEvent {
                window_id,
                event_type,
            },
        );
    }

    pub fn webview_request(&self, request: WebViewRequest) {
        send(&self.webview_request, EventCategory::WebViewRequest, request);
    }

    pub fn window_message(&self, window_id: u64, message: impl Into<String>) {
        send(
            &self.window_message,
            EventCategory::WindowMessage,
            WindowMessage {
                window_id,
                message: message.into(),
            },
        );
    }

    pub fn drag_and_drop(&self, window_id: u64, paths: Vec<PathBuf>) {
        send(
            &self.drag_and_drop,
            EventCategory::DragAndDrop,
            DragAndDrop { window_id, paths },
        );
    }

    pub fn menu_item_clicked(&self, menu_item_id: u64) {
        send(
            &self.menu_item_clicked,
            EventCategory::MenuItemClicked,
            MenuItemClicked { menu_item_id },
        );
    }
}

/// Consumer side of every bus, owned by the application core
pub(crate) struct EventReceivers {
    pub application: Receiver<ApplicationEvent>,
    pub window: Receiver<WindowEvent>,
    pub webview_request: Receiver<WebViewRequest>,
    pub window_message: Receiver<WindowMessage>,
    pub drag_and_drop: Receiver<DragAndDrop>,
    pub menu_item_clicked: Receiver<MenuItemClicked>,
}

pub(crate) fn event_buses() -> (EventSender, EventReceivers) {
    let (application_tx, application_rx) = unbounded();
    let (window_tx, window_rx) = unbounded();
    let (webview_request_tx, webview_request_rx) = unbounded();
    let (window_message_tx, window_message_rx) = unbounded();
    let (drag_and_drop_tx, drag_and_drop_rx) = unbounded();
    let (menu_item_clicked_tx, menu_item_clicked_rx) = unbounded();

    (
        EventSender {
            application: application_tx,
            window: window_tx,
            webview_request: webview_request_tx,
            window_message: window_message_tx,
            drag_and_drop: drag_and_drop_tx,
            menu_item_clicked: menu_item_clicked_tx,
        },
        EventReceivers {
            application: application_rx,
            window: window_rx,
            webview_request: webview_request_rx,
            window_message: window_message_rx,
            drag_and_drop: drag_and_drop_rx,
            menu_item_clicked: menu_item_clicked_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_event_codes_round_trip() {
        for code in 0..6 {
            assert_eq!(ApplicationEventType::from_code(code).code(), code);
        }
        assert_eq!(
            ApplicationEventType::from_code(1042),
            ApplicationEventType::Custom(1042)
        );
    }

    #[test]
    fn test_custom_codes_of_named_events_are_normalized() {
        assert_eq!(
            ApplicationEventType::Custom(0).normalized(),
            ApplicationEventType::Started
        );
        assert_eq!(
            ApplicationEventType::Custom(5).normalized(),
            ApplicationEventType::ScreensChanged
        );
        assert_eq!(
            ApplicationEventType::Custom(6).normalized(),
            ApplicationEventType::Custom(6)
        );

        let (tx, rx) = event_buses();
        tx.application_event(ApplicationEventType::Custom(1));
        assert_eq!(
            rx.application.try_recv().unwrap().event_type,
            ApplicationEventType::WillTerminate
        );
    }

    #[test]
    fn test_window_event_codes() {
        assert_eq!(WindowEventType::Created.code(), 0);
        assert_eq!(
            WindowEventType::from_code(WindowEventType::Hidden.code()),
            Some(WindowEventType::Hidden)
        );
        assert_eq!(WindowEventType::from_code(99), None);
    }

    #[test]
    fn test_bus_is_fifo_per_category() {
        let (tx, rx) = event_buses();
        for i in 0..5 {
            tx.window_message(1, format!("msg-{i}"));
        }
        tx.menu_item_clicked(3);

        let received: Vec<_> = rx.window_message.try_iter().map(|m| m.message).collect();
        assert_eq!(received, vec!["msg-0", "msg-1", "msg-2", "msg-3", "msg-4"]);
        assert_eq!(rx.menu_item_clicked.try_recv().unwrap().menu_item_id, 3);
    }

    #[test]
    fn test_send_after_receiver_dropped_does_not_panic() {
        let (tx, rx) = event_buses();
        drop(rx);
        tx.application_event(ApplicationEventType::Started);
        tx.drag_and_drop(1, vec![PathBuf::from("/tmp/a.txt")]);
    }

    #[test]
    fn test_window_event_type_serializes_kebab_case() {
        let json = serde_json::to_string(&WindowEventType::CloseRequested).unwrap();
        assert_eq!(json, "\"close-requested\"");
    }
}
