//! Panic & termination policy.
//!
//! Every closure the runtime runs on behalf of application code (main-thread
//! dispatches, dispatch-loop handlers, application event listeners) is run
//! through [`recover`]. A recovered panic is handed to the [`PanicPolicy`]:
//! a configured handler gets the panic and the process keeps going, otherwise
//! the panic and a full stack trace are printed and the process exits.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

/// Payload carried by an unwinding panic
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Application-supplied panic handler
pub type PanicHandler = Arc<dyn Fn(PanicDetails) + Send + Sync>;

/// A recovered panic
pub struct PanicDetails {
    pub message: String,
    pub payload: PanicPayload,
}

impl fmt::Debug for PanicDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicDetails")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}

/// Decides the fate of every panic recovered by the runtime
#[derive(Clone, Default)]
pub struct PanicPolicy {
    handler: Option<PanicHandler>,
}

impl PanicPolicy {
    pub fn new(handler: Option<PanicHandler>) -> Self {
        Self { handler }
    }

    pub fn handle(&self, payload: PanicPayload) {
        let message = panic_message(payload.as_ref());
        match &self.handler {
            Some(handler) => {
                error!(panic = %message, "recovered panic passed to application handler");
                handler(PanicDetails { message, payload });
            }
            None => fail_fast(&message),
        }
    }
}

impl fmt::Debug for PanicPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicPolicy")
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

fn fail_fast(message: &str) -> ! {
    let backtrace = backtrace::Backtrace::new();
    error!("PANIC: {}", message);
    eprintln!("Panic occurred: {}", message);
    eprintln!("Stack trace:");
    eprintln!("{:?}", backtrace);
    std::process::exit(1);
}

/// Run `f`, routing a panic to `policy`. Returns `None` when `f` panicked.
pub fn recover<T>(policy: &PanicPolicy, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            policy.handle(payload);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_panic_message_from_str_and_string() {
        let payload: PanicPayload = Box::new("boom-str");
        assert_eq!(panic_message(payload.as_ref()), "boom-str");

        let payload: PanicPayload = Box::new(String::from("boom-string"));
        assert_eq!(panic_message(payload.as_ref()), "boom-string");

        let payload: PanicPayload = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown error");
    }

    #[test]
    fn test_recover_returns_value_without_panic() {
        let policy = PanicPolicy::default();
        assert_eq!(recover(&policy, || 7), Some(7));
    }

    #[test]
    fn test_recover_hands_panic_to_handler_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(String::new()));
        let policy = PanicPolicy::new(Some(Arc::new({
            let calls = calls.clone();
            let seen = seen.clone();
            move |details: PanicDetails| {
                calls.fetch_add(1, Ordering::SeqCst);
                *seen.lock().unwrap() = details.message;
            }
        })));

        let result: Option<()> = recover(&policy, || panic!("listener exploded"));
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().unwrap().as_str(), "listener exploded");
    }
}
