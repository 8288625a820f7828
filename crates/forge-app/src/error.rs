//! Runtime errors.
//!
//! Every failure surfaced by the application core is an [`AppError`] carrying
//! a stable numeric [`AppErrorCode`] in the 8000 range, so script callers can
//! match on the code without parsing messages.

/// Error codes for runtime operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AppErrorCode {
    /// Generic runtime error
    Generic = 8000,
    /// Main-thread dispatch attempted before the platform loop exists
    NotStarted = 8001,
    /// `App::run` called more than once
    AlreadyRunning = 8002,
    /// Dispatched closure panicked
    Panicked = 8003,
    /// Dispatched closure was discarded without running
    Dropped = 8004,
    /// Window not found
    WindowNotFound = 8005,
    /// System tray not found
    TrayNotFound = 8006,
    /// Plugin failed to initialise
    PluginInit = 8007,
    /// Invalid or unreadable configuration
    Config = 8008,
    /// Platform adapter failure
    Platform = 8009,
    /// Unknown runtime method
    UnknownMethod = 8010,
}

/// Failure of a main-thread dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("[8001] Main thread dispatch before the application is running")]
    NotStarted,

    #[error("[8003] Dispatched function panicked")]
    Panicked,

    #[error("[8004] Dispatched function was dropped before it ran")]
    Dropped,
}

impl DispatchError {
    pub fn code(&self) -> u32 {
        match self {
            Self::NotStarted => AppErrorCode::NotStarted as u32,
            Self::Panicked => AppErrorCode::Panicked as u32,
            Self::Dropped => AppErrorCode::Dropped as u32,
        }
    }
}

/// Failure reported by a platform adapter.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct PlatformError {
    pub message: String,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Custom error type for runtime operations
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("[{code}] {message}")]
    Generic { code: u32, message: String },

    #[error("[{code}] Application is not running")]
    NotStarted { code: u32 },

    #[error("[{code}] Application is already running")]
    AlreadyRunning { code: u32 },

    #[error("[{code}] Dispatched function panicked")]
    Panicked { code: u32 },

    #[error("[{code}] Dispatched function was dropped before it ran")]
    Dropped { code: u32 },

    #[error("[{code}] Window not found: {window_id}")]
    WindowNotFound { code: u32, window_id: u64 },

    #[error("[{code}] System tray not found: {tray_id}")]
    TrayNotFound { code: u32, tray_id: u64 },

    #[error("[{code}] Plugin '{name}' failed to initialise: {message}")]
    PluginInit {
        code: u32,
        name: String,
        message: String,
    },

    #[error("[{code}] Configuration error: {message}")]
    Config { code: u32, message: String },

    #[error("[{code}] Platform error: {message}")]
    Platform { code: u32, message: String },

    #[error("[{code}] Unknown runtime method: {message}")]
    UnknownMethod { code: u32, message: String },
}

impl AppError {
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            code: AppErrorCode::Generic as u32,
            message: message.into(),
        }
    }

    pub fn already_running() -> Self {
        Self::AlreadyRunning {
            code: AppErrorCode::AlreadyRunning as u32,
        }
    }

    pub fn window_not_found(window_id: u64) -> Self {
        Self::WindowNotFound {
            code: AppErrorCode::WindowNotFound as u32,
            window_id,
        }
    }

    pub fn tray_not_found(tray_id: u64) -> Self {
        Self::TrayNotFound {
            code: AppErrorCode::TrayNotFound as u32,
            tray_id,
        }
    }

    pub fn plugin_init(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PluginInit {
            code: AppErrorCode::PluginInit as u32,
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: AppErrorCode::Config as u32,
            message: message.into(),
        }
    }

    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            code: AppErrorCode::Platform as u32,
            message: message.into(),
        }
    }

    pub fn unknown_method(message: impl Into<String>) -> Self {
        Self::UnknownMethod {
            code: AppErrorCode::UnknownMethod as u32,
            message: message.into(),
        }
    }

    /// Numeric code carried by every variant
    pub fn code(&self) -> u32 {
        match self {
            Self::Generic { code, .. }
            | Self::NotStarted { code }
            | Self::AlreadyRunning { code }
            | Self::Panicked { code }
            | Self::Dropped { code }
            | Self::WindowNotFound { code, .. }
            | Self::TrayNotFound { code, .. }
            | Self::PluginInit { code, .. }
            | Self::Config { code, .. }
            | Self::Platform { code, .. }
            | Self::UnknownMethod { code, .. } => *code,
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        let code = err.code();
        match err {
            DispatchError::NotStarted => Self::NotStarted { code },
            DispatchError::Panicked => Self::Panicked { code },
            DispatchError::Dropped => Self::Dropped { code },
        }
    }
}

impl From<PlatformError> for AppError {
    fn from(err: PlatformError) -> Self {
        Self::platform(err.message)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppErrorCode::Generic as u32, 8000);
        assert_eq!(AppErrorCode::NotStarted as u32, 8001);
        assert_eq!(AppErrorCode::Panicked as u32, 8003);
        assert_eq!(AppErrorCode::UnknownMethod as u32, 8010);
    }

    #[test]
    fn test_error_display() {
        let err = AppError::window_not_found(7);
        assert!(err.to_string().contains("8005"));
        assert!(err.to_string().contains('7'));

        let err = AppError::plugin_init("updater", "no feed url");
        assert!(err.to_string().contains("8007"));
        assert!(err.to_string().contains("updater"));
        assert!(err.to_string().contains("no feed url"));
    }

    #[test]
    fn test_dispatch_error_conversion_keeps_code() {
        for err in [
            DispatchError::NotStarted,
            DispatchError::Panicked,
            DispatchError::Dropped,
        ] {
            let app_err = AppError::from(err);
            assert_eq!(app_err.code(), err.code());
        }
    }
}
