//! Native dialogs and the clipboard.
//!
//! Dialogs are built from [`App`] and block the calling thread until the user
//! answers. The native call itself always runs on the main thread, so these
//! can be used from listeners and worker threads alike. Calling them before
//! the application has started fails with `NotStarted`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DialogKind {
    #[default]
    Info,
    /// Yes/No; the answer is `true` for Yes
    Question,
    Warning,
    Error,
}

/// What the platform needs to show a message box
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDialogSpec {
    pub kind: DialogKind,
    pub title: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFilter {
    pub name: String,
    /// Extensions without the leading dot
    pub extensions: Vec<String>,
}

/// What the platform needs to show an open or save dialog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileDialogSpec {
    pub title: Option<String>,
    /// Starting directory
    pub directory: Option<PathBuf>,
    /// Suggested file name, save dialogs only
    pub file_name: Option<String>,
    pub filters: Vec<FileFilter>,
    pub allow_multiple: bool,
    /// Pick directories instead of files
    pub pick_directories: bool,
}

impl FileDialogSpec {
    fn push_filter(&mut self, name: &str, extensions: &[&str]) {
        self.filters.push(FileFilter {
            name: name.to_string(),
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
        });
    }
}

/// Info, question, warning or error message box
pub struct MessageDialog<'a> {
    app: &'a App,
    spec: MessageDialogSpec,
}

impl<'a> MessageDialog<'a> {
    pub(crate) fn new(app: &'a App, kind: DialogKind) -> Self {
        Self {
            app,
            spec: MessageDialogSpec {
                kind,
                ..Default::default()
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.spec.title = Some(title.to_string());
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        self.spec.message = message.to_string();
        self
    }

    pub fn spec(&self) -> &MessageDialogSpec {
        &self.spec
    }

    /// Show the dialog and wait for it to close. `true` when the user
    /// accepted it (OK or Yes).
    pub fn show(self) -> Result<bool, AppError> {
        let spec = self.spec;
        tracing::debug!(kind = ?spec.kind, "message dialog");
        self.app
            .invoke_platform(move |platform| platform.message_dialog(&spec).map_err(AppError::from))
    }
}

/// File or directory picker
pub struct OpenFileDialog<'a> {
    app: &'a App,
    spec: FileDialogSpec,
}

impl<'a> OpenFileDialog<'a> {
    pub(crate) fn new(app: &'a App, pick_directories: bool) -> Self {
        Self {
            app,
            spec: FileDialogSpec {
                pick_directories,
                ..Default::default()
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.spec.title = Some(title.to_string());
        self
    }

    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.spec.directory = Some(directory.into());
        self
    }

    pub fn filter(mut self, name: &str, extensions: &[&str]) -> Self {
        self.spec.push_filter(name, extensions);
        self
    }

    pub fn allow_multiple(mut self, allow: bool) -> Self {
        self.spec.allow_multiple = allow;
        self
    }

    pub fn spec(&self) -> &FileDialogSpec {
        &self.spec
    }

    /// Chosen paths; empty when the user cancelled.
    pub fn pick(self) -> Result<Vec<PathBuf>, AppError> {
        let spec = self.spec;
        self.app
            .invoke_platform(move |platform| platform.open_file_dialog(&spec).map_err(AppError::from))
    }

    /// First chosen path, if any
    pub fn pick_one(self) -> Result<Option<PathBuf>, AppError> {
        Ok(self.allow_multiple(false).pick()?.into_iter().next())
    }
}

pub struct SaveFileDialog<'a> {
    app: &'a App,
    spec: FileDialogSpec,
}

impl<'a> SaveFileDialog<'a> {
    pub(crate) fn new(app: &'a App) -> Self {
        Self {
            app,
            spec: FileDialogSpec::default(),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.spec.title = Some(title.to_string());
        self
    }

    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.spec.directory = Some(directory.into());
        self
    }

    pub fn file_name(mut self, file_name: &str) -> Self {
        self.spec.file_name = Some(file_name.to_string());
        self
    }

    pub fn filter(mut self, name: &str, extensions: &[&str]) -> Self {
        self.spec.push_filter(name, extensions);
        self
    }

    pub fn spec(&self) -> &FileDialogSpec {
        &self.spec
    }

    /// `None` when the user cancelled.
    pub fn pick(self) -> Result<Option<PathBuf>, AppError> {
        let spec = self.spec;
        self.app
            .invoke_platform(move |platform| platform.save_file_dialog(&spec).map_err(AppError::from))
    }
}

/// Text clipboard, accessed on the main thread
pub struct Clipboard<'a> {
    app: &'a App,
}

impl<'a> Clipboard<'a> {
    pub(crate) fn new(app: &'a App) -> Self {
        Self { app }
    }

    /// Current text contents; `None` when the clipboard holds no text.
    pub fn text(&self) -> Result<Option<String>, AppError> {
        self.app
            .invoke_platform(|platform| platform.clipboard_text().map_err(AppError::from))
    }

    pub fn set_text(&self, text: &str) -> Result<(), AppError> {
        let text = text.to_string();
        self.app
            .invoke_platform(move |platform| platform.set_clipboard_text(&text).map_err(AppError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Options;

    #[test]
    fn test_builders_fill_the_spec() {
        let app = App::new(Options::default()).unwrap();

        let question = app.question_dialog().title("Unsaved").message("Quit anyway?");
        assert_eq!(
            question.spec(),
            &MessageDialogSpec {
                kind: DialogKind::Question,
                title: Some("Unsaved".into()),
                message: "Quit anyway?".into(),
            }
        );

        let open = app
            .open_file_dialog()
            .filter("Images", &[".png", "jpg"])
            .allow_multiple(true);
        assert_eq!(open.spec().filters[0].extensions, vec!["png", "jpg"]);
        assert!(open.spec().allow_multiple);
        assert!(!open.spec().pick_directories);
        assert!(app.open_directory_dialog().spec().pick_directories);

        let save = app.save_file_dialog().file_name("notes.md");
        assert_eq!(save.spec().file_name.as_deref(), Some("notes.md"));
    }

    #[test]
    fn test_dialogs_before_start_fail() {
        let app = App::new(Options::default()).unwrap();
        let err = app.info_dialog().message("hello").show().unwrap_err();
        assert_eq!(err.code(), 8001);
        assert_eq!(app.clipboard().text().unwrap_err().code(), 8001);
    }
}
