//! Native menus built from the core's menu descriptions.
//!
//! Every muda item carries the core's numeric item id as its `MenuId`, so a
//! click maps straight back to the registered menu item.

use forge_app::{EventSender, MenuItemKind, MenuItemSpec, MenuSpec};
use muda::{CheckMenuItem, IsMenuItem, MenuId, PredefinedMenuItem, Submenu};

fn menu_id(id: u64) -> MenuId {
    MenuId::new(id.to_string())
}

/// Core item id carried by a muda event id
pub(crate) fn item_id(id: &MenuId) -> Option<u64> {
    id.0.parse().ok()
}

fn append_items(items: &[MenuItemSpec], append: &mut dyn FnMut(&dyn IsMenuItem) -> muda::Result<()>) {
    for item in items {
        let accelerator = item.accelerator.as_ref().and_then(|a| a.parse().ok());
        let result = match item.kind {
            MenuItemKind::Separator => append(&PredefinedMenuItem::separator()),
            MenuItemKind::Submenu => {
                let submenu = Submenu::with_id(menu_id(item.id), &item.label, item.enabled);
                if let Some(children) = &item.submenu {
                    append_items(&children.items, &mut |child| submenu.append(child));
                }
                append(&submenu)
            }
            MenuItemKind::Checkbox => append(&CheckMenuItem::with_id(
                menu_id(item.id),
                &item.label,
                item.enabled,
                item.checked,
                accelerator,
            )),
            MenuItemKind::Normal => append(&muda::MenuItem::with_id(
                menu_id(item.id),
                &item.label,
                item.enabled,
                accelerator,
            )),
        };
        if let Err(e) = result {
            tracing::warn!(item_id = item.id, "failed to append menu item: {}", e);
        }
    }
}

pub(crate) fn build_menu(spec: &MenuSpec) -> muda::Menu {
    let menu = muda::Menu::new();
    append_items(&spec.items, &mut |item| menu.append(item));
    menu
}

/// Forward muda click events to the menu bus. muda delivers clicks from
/// menu bars and tray menus on one global channel.
pub(crate) fn spawn_click_forwarder(events: EventSender) {
    let spawned = std::thread::Builder::new()
        .name("forge-menu-events".into())
        .spawn(move || {
            let receiver = muda::MenuEvent::receiver();
            while let Ok(event) = receiver.recv() {
                match item_id(&event.id) {
                    Some(id) => {
                        tracing::debug!(menu_item_id = id, "menu item clicked");
                        events.menu_item_clicked(id);
                    }
                    None => tracing::warn!("Menu event for unknown MenuId: {:?}", event.id),
                }
            }
        });
    if let Err(e) = spawned {
        tracing::error!("failed to spawn menu event thread: {}", e);
    }
}

#[cfg(target_os = "windows")]
pub(crate) fn attach(menu: &muda::Menu, window: &tao::window::Window) {
    use tao::platform::windows::WindowExtWindows;
    unsafe {
        let _ = menu.init_for_hwnd(window.hwnd() as isize);
    }
}

#[cfg(target_os = "linux")]
pub(crate) fn attach(menu: &muda::Menu, window: &tao::window::Window) {
    use gtk::prelude::*;
    use tao::platform::unix::WindowExtUnix;
    let gtk_win = window.gtk_window();
    let gtk_win_ref: &gtk::Window = gtk_win.upcast_ref();
    let _ = menu.init_for_gtk_window(gtk_win_ref, None::<&gtk::Box>);
}

/// macOS has a single application menu bar, installed by `attach_app`.
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub(crate) fn attach(_menu: &muda::Menu, _window: &tao::window::Window) {}

/// Install `menu` as the application-wide menu where the OS has one.
pub(crate) fn attach_app(menu: &muda::Menu) {
    #[cfg(target_os = "macos")]
    menu.init_for_nsapp();
    #[cfg(not(target_os = "macos"))]
    let _ = menu;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_round_trips_through_menu_id() {
        assert_eq!(item_id(&menu_id(42)), Some(42));
        assert_eq!(item_id(&MenuId::new("quit")), None);
    }
}
