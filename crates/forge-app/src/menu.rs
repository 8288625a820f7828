//! Menus and menu items.
//!
//! Every item is registered in the application's menu-item registry when it
//! is added, so a click reported by the platform by numeric id can be routed
//! back to the item. Platforms never see these objects; they receive the
//! plain [`MenuSpec`] tree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::listeners::{Listeners, Subscription};
use crate::lock;
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuItemKind {
    Normal,
    Checkbox,
    Separator,
    Submenu,
}

/// Plain description of a menu item handed to the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItemSpec {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: MenuItemKind,
    pub label: String,
    pub accelerator: Option<String>,
    pub enabled: bool,
    pub checked: bool,
    pub submenu: Option<MenuSpec>,
}

/// Plain description of a menu handed to the platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuSpec {
    pub items: Vec<MenuItemSpec>,
}

impl MenuSpec {
    /// Depth-first search for an item by id
    pub fn find(&self, id: u64) -> Option<&MenuItemSpec> {
        self.items.iter().find_map(|item| {
            if item.id == id {
                Some(item)
            } else {
                item.submenu.as_ref().and_then(|sub| sub.find(id))
            }
        })
    }
}

pub struct MenuItem {
    id: u64,
    kind: MenuItemKind,
    label: Mutex<String>,
    accelerator: Mutex<Option<String>>,
    enabled: AtomicBool,
    checked: AtomicBool,
    submenu: Option<Arc<Menu>>,
    clicks: Listeners<MenuItem>,
}

impl MenuItem {
    fn new(id: u64, kind: MenuItemKind, label: &str, submenu: Option<Arc<Menu>>) -> Self {
        Self {
            id,
            kind,
            label: Mutex::new(label.to_string()),
            accelerator: Mutex::new(None),
            enabled: AtomicBool::new(true),
            checked: AtomicBool::new(false),
            submenu,
            clicks: Listeners::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> MenuItemKind {
        self.kind
    }

    pub fn label(&self) -> String {
        lock(&self.label).clone()
    }

    pub fn set_label(&self, label: &str) {
        *lock(&self.label) = label.to_string();
    }

    pub fn accelerator(&self) -> Option<String> {
        lock(&self.accelerator).clone()
    }

    /// Keyboard shortcut in muda's accelerator syntax, e.g. `CmdOrCtrl+Q`
    pub fn set_accelerator(&self, accelerator: Option<&str>) {
        *lock(&self.accelerator) = accelerator.map(str::to_string);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_checked(&self) -> bool {
        self.checked.load(Ordering::SeqCst)
    }

    pub fn set_checked(&self, checked: bool) {
        self.checked.store(checked, Ordering::SeqCst);
    }

    pub fn submenu(&self) -> Option<&Arc<Menu>> {
        self.submenu.as_ref()
    }

    pub fn on_click(&self, callback: impl Fn(&MenuItem) + Send + Sync + 'static) -> Subscription {
        self.clicks.add(callback)
    }

    /// Handle a click reported by the platform. Checkbox items flip their
    /// checked state before listeners run.
    pub(crate) fn click(&self) {
        if !self.is_enabled() {
            tracing::debug!(menu_item_id = self.id, "click on disabled menu item ignored");
            return;
        }
        if self.kind == MenuItemKind::Checkbox {
            self.checked.fetch_xor(true, Ordering::SeqCst);
        }
        self.clicks.emit(self);
    }

    pub fn spec(&self) -> MenuItemSpec {
        MenuItemSpec {
            id: self.id,
            kind: self.kind,
            label: self.label(),
            accelerator: self.accelerator(),
            enabled: self.is_enabled(),
            checked: self.is_checked(),
            submenu: self.submenu.as_ref().map(|menu| menu.spec()),
        }
    }

    fn release(&self, registry: &Registry<MenuItem>) {
        registry.unregister(self.id);
        self.clicks.clear();
        if let Some(submenu) = &self.submenu {
            submenu.destroy();
        }
    }
}

pub struct Menu {
    registry: Arc<Registry<MenuItem>>,
    items: Mutex<Vec<Arc<MenuItem>>>,
}

impl Menu {
    pub fn new(registry: Arc<Registry<MenuItem>>) -> Self {
        Self {
            registry,
            items: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, kind: MenuItemKind, label: &str, submenu: Option<Arc<Menu>>) -> Arc<MenuItem> {
        let id = self.registry.allocate();
        let item = Arc::new(MenuItem::new(id, kind, label, submenu));
        self.registry.register(id, item.clone());
        lock(&self.items).push(item.clone());
        item
    }

    pub fn add(&self, label: &str) -> Arc<MenuItem> {
        self.push(MenuItemKind::Normal, label, None)
    }

    pub fn add_checkbox(&self, label: &str, checked: bool) -> Arc<MenuItem> {
        let item = self.push(MenuItemKind::Checkbox, label, None);
        item.set_checked(checked);
        item
    }

    pub fn add_separator(&self) -> Arc<MenuItem> {
        self.push(MenuItemKind::Separator, "", None)
    }

    /// Add a submenu and return it for population
    pub fn add_submenu(&self, label: &str) -> Arc<Menu> {
        let submenu = Arc::new(Menu::new(self.registry.clone()));
        self.push(MenuItemKind::Submenu, label, Some(submenu.clone()));
        submenu
    }

    pub fn items(&self) -> Vec<Arc<MenuItem>> {
        lock(&self.items).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spec(&self) -> MenuSpec {
        MenuSpec {
            items: self.items().iter().map(|item| item.spec()).collect(),
        }
    }

    /// Unregister every item, recursively. Clicks on them are dropped afterwards.
    pub fn destroy(&self) {
        let items: Vec<_> = lock(&self.items).drain(..).collect();
        for item in items {
            item.release(&self.registry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ObjectKind;
    use std::sync::atomic::AtomicUsize;

    fn menu() -> (Menu, Arc<Registry<MenuItem>>) {
        let registry = Arc::new(Registry::new(ObjectKind::MenuItem));
        (Menu::new(registry.clone()), registry)
    }

    #[test]
    fn test_items_are_registered_with_unique_ids() {
        let (menu, registry) = menu();
        let open = menu.add("Open");
        menu.add_separator();
        let file = menu.add_submenu("Recent");
        let nested = file.add("project.forge");

        assert_eq!(registry.len(), 4);
        assert!(registry.lookup(open.id()).is_some());
        assert!(registry.lookup(nested.id()).is_some());
        assert_ne!(open.id(), nested.id());
    }

    #[test]
    fn test_checkbox_toggles_on_click() {
        let (menu, _registry) = menu();
        let item = menu.add_checkbox("Word Wrap", false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        item.on_click({
            let seen = seen.clone();
            move |item| seen.lock().unwrap().push(item.is_checked())
        });

        item.click();
        item.click();
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_disabled_item_ignores_clicks() {
        let (menu, _registry) = menu();
        let item = menu.add("Save");
        let clicks = Arc::new(AtomicUsize::new(0));
        item.on_click({
            let clicks = clicks.clone();
            move |_| {
                clicks.fetch_add(1, Ordering::SeqCst);
            }
        });
        item.set_enabled(false);
        item.click();
        assert_eq!(clicks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_spec_mirrors_tree() {
        let (menu, _registry) = menu();
        let quit = menu.add("Quit");
        quit.set_accelerator(Some("CmdOrCtrl+Q"));
        let view = menu.add_submenu("View");
        let dark = view.add_checkbox("Dark Mode", true);

        let spec = menu.spec();
        assert_eq!(spec.items.len(), 2);
        assert_eq!(spec.items[0].accelerator.as_deref(), Some("CmdOrCtrl+Q"));
        assert_eq!(spec.items[1].kind, MenuItemKind::Submenu);
        let found = spec.find(dark.id()).unwrap();
        assert!(found.checked);
        assert_eq!(found.label, "Dark Mode");
    }

    #[test]
    fn test_destroy_unregisters_recursively() {
        let (menu, registry) = menu();
        menu.add("One");
        menu.add_submenu("More").add("Two");
        assert_eq!(registry.len(), 3);

        menu.destroy();
        assert!(registry.is_empty());
        assert!(menu.is_empty());
    }
}
