//! System tray icons.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::app::App;
use crate::error::AppError;
use crate::lifecycle::Runnable;
use crate::lock;
use crate::menu::{Menu, MenuSpec};

#[derive(Clone, Default)]
pub struct TrayOptions {
    pub tooltip: Option<String>,
    /// Encoded image (PNG, ICO, ...). The platform falls back to its own icon when empty.
    pub icon: Vec<u8>,
    pub menu: Option<Arc<Menu>>,
}

/// What the platform needs to build or refresh a native tray icon
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraySpec {
    pub id: u64,
    pub tooltip: Option<String>,
    pub icon: Vec<u8>,
    pub menu: Option<MenuSpec>,
}

pub struct SystemTray {
    id: u64,
    app: Weak<App>,
    options: Mutex<TrayOptions>,
    created: AtomicBool,
    destroyed: AtomicBool,
}

impl SystemTray {
    pub(crate) fn new(id: u64, options: TrayOptions, app: Weak<App>) -> Self {
        Self {
            id,
            app,
            options: Mutex::new(options),
            created: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn tooltip(&self) -> Option<String> {
        lock(&self.options).tooltip.clone()
    }

    pub fn menu(&self) -> Option<Arc<Menu>> {
        lock(&self.options).menu.clone()
    }

    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn spec(&self) -> TraySpec {
        let options = lock(&self.options);
        TraySpec {
            id: self.id,
            tooltip: options.tooltip.clone(),
            icon: options.icon.clone(),
            menu: options.menu.as_ref().map(|menu| menu.spec()),
        }
    }

    pub fn set_menu(&self, menu: Option<Arc<Menu>>) {
        lock(&self.options).menu = menu;
        self.refresh();
    }

    pub fn set_tooltip(&self, tooltip: &str) {
        lock(&self.options).tooltip = Some(tooltip.to_string());
        self.refresh();
    }

    pub fn set_icon(&self, icon: Vec<u8>) {
        lock(&self.options).icon = icon;
        self.refresh();
    }

    fn refresh(&self) {
        if !self.is_created() || self.is_destroyed() {
            return;
        }
        if let Some(app) = self.app.upgrade() {
            let spec = self.spec();
            app.on_platform(move |platform| platform.update_tray(spec));
        }
    }

    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(app) = self.app.upgrade() else {
            return;
        };
        app.tray_registry().unregister(self.id);
        if self.is_created() {
            let id = self.id;
            app.on_platform(move |platform| platform.destroy_tray(id));
        }
        tracing::debug!(tray_id = self.id, "tray destroyed");
    }

    /// The native tray went away with the main loop.
    pub(crate) fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.created.store(false, Ordering::SeqCst);
    }
}

impl Runnable for SystemTray {
    fn run(&self) {
        if self.is_destroyed() {
            return;
        }
        let Some(app) = self.app.upgrade() else {
            return;
        };
        let spec = self.spec();
        match app.invoke_platform(move |platform| platform.create_tray(spec).map_err(AppError::from)) {
            Ok(()) => {
                self.created.store(true, Ordering::SeqCst);
                if self.is_destroyed() {
                    let id = self.id;
                    app.on_platform(move |platform| platform.destroy_tray(id));
                }
            }
            Err(err) => {
                tracing::error!(tray_id = self.id, error = %err, "failed to create tray icon");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::MenuItem;
    use crate::registry::{ObjectKind, Registry};

    #[test]
    fn test_spec_includes_menu_tree() {
        let registry: Arc<Registry<MenuItem>> = Arc::new(Registry::new(ObjectKind::MenuItem));
        let menu = Arc::new(Menu::new(registry));
        let show = menu.add("Show");

        let tray = SystemTray::new(
            2,
            TrayOptions {
                tooltip: Some("Forge".into()),
                ..Default::default()
            },
            Weak::new(),
        );
        assert!(tray.spec().menu.is_none());

        tray.set_menu(Some(menu));
        let spec = tray.spec();
        assert_eq!(spec.id, 2);
        assert_eq!(spec.tooltip.as_deref(), Some("Forge"));
        assert_eq!(spec.menu.unwrap().items[0].id, show.id());
    }

    #[test]
    fn test_setters_before_creation_only_update_state() {
        let tray = SystemTray::new(1, TrayOptions::default(), Weak::new());
        tray.set_tooltip("Idle");
        tray.set_icon(vec![0x89, b'P', b'N', b'G']);
        assert_eq!(tray.tooltip().as_deref(), Some("Idle"));
        assert_eq!(tray.spec().icon.len(), 4);
    }
}
