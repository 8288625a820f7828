//! Application plugins.
//!
//! Plugins are initialised in registration order when the application is
//! constructed and shut down after the platform loop exits. An init failure
//! aborts construction.

use std::sync::Arc;

use crate::app::App;
use crate::error::AppError;

pub trait Plugin: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn init(&self, app: &Arc<App>) -> Result<(), AppError>;

    /// Called once after the main loop has returned
    fn shutdown(&self) {}
}
