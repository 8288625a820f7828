//! Native dialogs through rfd and the clipboard through arboard.
//!
//! Everything here runs on the main thread; the core dispatches to it.

use std::cell::RefCell;
use std::path::PathBuf;

use forge_app::{DialogKind, FileDialogSpec, MessageDialogSpec, PlatformError};

pub fn show_message(spec: &MessageDialogSpec) -> bool {
    let (level, buttons) = match spec.kind {
        DialogKind::Info => (rfd::MessageLevel::Info, rfd::MessageButtons::Ok),
        DialogKind::Question => (rfd::MessageLevel::Info, rfd::MessageButtons::YesNo),
        DialogKind::Warning => (rfd::MessageLevel::Warning, rfd::MessageButtons::Ok),
        DialogKind::Error => (rfd::MessageLevel::Error, rfd::MessageButtons::Ok),
    };
    let result = rfd::MessageDialog::new()
        .set_level(level)
        .set_title(spec.title.as_deref().unwrap_or(""))
        .set_description(&spec.message)
        .set_buttons(buttons)
        .show();
    matches!(
        result,
        rfd::MessageDialogResult::Ok | rfd::MessageDialogResult::Yes
    )
}

fn file_dialog(spec: &FileDialogSpec) -> rfd::FileDialog {
    let mut dialog = rfd::FileDialog::new();
    if let Some(title) = &spec.title {
        dialog = dialog.set_title(title);
    }
    if let Some(directory) = &spec.directory {
        dialog = dialog.set_directory(directory);
    }
    if let Some(file_name) = &spec.file_name {
        dialog = dialog.set_file_name(file_name);
    }
    for filter in &spec.filters {
        let exts: Vec<&str> = filter.extensions.iter().map(String::as_str).collect();
        dialog = dialog.add_filter(&filter.name, &exts);
    }
    dialog
}

pub fn pick(spec: &FileDialogSpec) -> Vec<PathBuf> {
    let dialog = file_dialog(spec);
    let picked = match (spec.pick_directories, spec.allow_multiple) {
        (true, true) => dialog.pick_folders(),
        (true, false) => dialog.pick_folder().map(|p| vec![p]),
        (false, true) => dialog.pick_files(),
        (false, false) => dialog.pick_file().map(|p| vec![p]),
    };
    picked.unwrap_or_default()
}

pub fn save(spec: &FileDialogSpec) -> Option<PathBuf> {
    file_dialog(spec).save_file()
}

thread_local! {
    // Kept for the life of the main thread: on X11 the selection is served by
    // the clipboard object, so dropping it right after a write loses the text
    static CLIPBOARD: RefCell<Option<arboard::Clipboard>> = const { RefCell::new(None) };
}

fn with_clipboard<R>(
    f: impl FnOnce(&mut arboard::Clipboard) -> Result<R, PlatformError>,
) -> Result<R, PlatformError> {
    CLIPBOARD.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| PlatformError::new(format!("clipboard: {}", e)))?;
            *slot = Some(clipboard);
        }
        match slot.as_mut() {
            Some(clipboard) => f(clipboard),
            None => Err(PlatformError::new("clipboard unavailable")),
        }
    })
}

pub fn clipboard_text() -> Result<Option<String>, PlatformError> {
    with_clipboard(|clipboard| match clipboard.get_text() {
        Ok(text) => Ok(Some(text)),
        Err(arboard::Error::ContentNotAvailable) => Ok(None),
        Err(e) => Err(PlatformError::new(format!("clipboard read: {}", e))),
    })
}

pub fn set_clipboard_text(text: &str) -> Result<(), PlatformError> {
    with_clipboard(|clipboard| {
        clipboard
            .set_text(text)
            .map_err(|e| PlatformError::new(format!("clipboard write: {}", e)))
    })
}
