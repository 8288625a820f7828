//! Startup lifecycle and the pending-run queue.
//!
//! Objects created before the platform loop exists cannot touch native
//! resources yet. They are queued here and launched, in creation order, once
//! the application starts. The started flag and the queue share one lock so
//! nothing can slip in between the check and the append.

use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::lock;

/// Work that must wait for the platform loop
pub trait Runnable: Send + Sync {
    fn run(&self);
}

/// A one-shot closure queued as a [`Runnable`]
pub struct DeferredCall {
    f: Mutex<Option<Box<dyn FnOnce() + Send + 'static>>>,
}

impl DeferredCall {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            f: Mutex::new(Some(Box::new(f))),
        }
    }
}

impl Runnable for DeferredCall {
    fn run(&self) {
        let f = lock(&self.f).take();
        if let Some(f) = f {
            f();
        }
    }
}

#[derive(Default)]
struct LifecycleState {
    started: bool,
    pending: Vec<Arc<dyn Runnable>>,
}

#[derive(Default)]
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        lock(&self.state).started
    }

    /// Queue `runnable` if the application has not started, otherwise run it
    /// on the calling thread. Returns `true` if it ran.
    pub fn run_or_defer(&self, runnable: Arc<dyn Runnable>) -> bool {
        {
            let mut state = lock(&self.state);
            if !state.started {
                state.pending.push(runnable);
                return false;
            }
        }
        runnable.run();
        true
    }

    /// Mark the application started and hand back everything queued so far,
    /// oldest first.
    pub fn start(&self) -> Result<Vec<Arc<dyn Runnable>>, AppError> {
        let mut state = lock(&self.state);
        if state.started {
            return Err(AppError::already_running());
        }
        state.started = true;
        Ok(std::mem::take(&mut state.pending))
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Record {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Runnable for Record {
        fn run(&self) {
            self.log.lock().unwrap().push(self.label);
        }
    }

    #[test]
    fn test_defers_until_started() {
        let lifecycle = Lifecycle::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for label in ["a", "b", "c"] {
            let ran = lifecycle.run_or_defer(Arc::new(Record {
                label,
                log: log.clone(),
            }));
            assert!(!ran);
        }
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(lifecycle.pending_count(), 3);

        let pending = lifecycle.start().unwrap();
        for runnable in pending {
            runnable.run();
        }
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(lifecycle.pending_count(), 0);
    }

    #[test]
    fn test_runs_immediately_after_start() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.start().unwrap().is_empty());

        let log = Arc::new(Mutex::new(Vec::new()));
        let ran = lifecycle.run_or_defer(Arc::new(Record {
            label: "late",
            log: log.clone(),
        }));
        assert!(ran);
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn test_start_twice_is_an_error() {
        let lifecycle = Lifecycle::new();
        lifecycle.start().unwrap();
        let err = lifecycle.start().err().unwrap();
        assert_eq!(err.code(), 8002);
    }

    #[test]
    fn test_deferred_call_runs_once() {
        let count = Arc::new(Mutex::new(0));
        let call = DeferredCall::new({
            let count = count.clone();
            move || *count.lock().unwrap() += 1
        });
        call.run();
        call.run();
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
