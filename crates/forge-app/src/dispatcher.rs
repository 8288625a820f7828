//! Main-thread dispatcher.
//!
//! Native UI toolkits only accept calls from one thread. Any other thread
//! schedules work there by storing a closure under a fresh id and asking the
//! platform adapter to run that id on its loop. The `invoke_sync*` family
//! blocks the caller on a one-shot completion until the closure has run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tokio::sync::oneshot;

use crate::error::DispatchError;
use crate::lock;
use crate::panic::{recover, PanicPolicy};
use crate::platform::Platform;

/// A closure queued for the main thread
pub type MainThreadFn = Box<dyn FnOnce() + Send + 'static>;

/// Pending closures keyed by dispatch id. Shared with the platform through
/// [`crate::platform::PlatformHost`].
pub struct FunctionStore {
    last_id: Mutex<u64>,
    pending: Mutex<HashMap<u64, MainThreadFn>>,
    // Only read or written while `pending` is locked
    closed: AtomicBool,
    policy: PanicPolicy,
}

impl FunctionStore {
    pub(crate) fn new(policy: PanicPolicy) -> Self {
        Self {
            last_id: Mutex::new(0),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            policy,
        }
    }

    /// Returns `None` once the store is closed; `f` is dropped unrun.
    fn store(&self, f: MainThreadFn) -> Option<u64> {
        let id = {
            let mut last = lock(&self.last_id);
            *last += 1;
            *last
        };
        let mut pending = lock(&self.pending);
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        pending.insert(id, f);
        Some(id)
    }

    /// Run the closure stored under `id`. Must be called on the main thread.
    pub fn execute(&self, id: u64) {
        let Some(f) = lock(&self.pending).remove(&id) else {
            tracing::warn!(dispatch_id = id, "no pending main thread function");
            return;
        };
        recover(&self.policy, f);
    }

    /// Drop every closure that never ran. Blocked callers are released with
    /// [`DispatchError::Dropped`].
    pub fn discard_pending(&self) -> usize {
        let drained: Vec<_> = lock(&self.pending).drain().collect();
        drained.len()
    }

    /// Refuse new closures and discard the pending ones. Used once the main
    /// loop has exited for good.
    pub(crate) fn close(&self) -> usize {
        let drained: Vec<_> = {
            let mut pending = lock(&self.pending);
            self.closed.store(true, Ordering::SeqCst);
            pending.drain().collect()
        };
        drained.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn policy(&self) -> &PanicPolicy {
        &self.policy
    }
}

/// The only sanctioned path onto the main thread
pub struct Dispatcher {
    functions: Arc<FunctionStore>,
    platform: OnceCell<Arc<dyn Platform>>,
}

impl Dispatcher {
    pub(crate) fn new(policy: PanicPolicy) -> Self {
        Self {
            functions: Arc::new(FunctionStore::new(policy)),
            platform: OnceCell::new(),
        }
    }

    pub(crate) fn functions(&self) -> Arc<FunctionStore> {
        self.functions.clone()
    }

    /// Attach the platform adapter. Returns `false` if one is already attached.
    pub(crate) fn attach(&self, platform: Arc<dyn Platform>) -> bool {
        self.platform.set(platform).is_ok()
    }

    pub fn platform(&self) -> Option<&Arc<dyn Platform>> {
        self.platform.get()
    }

    pub fn is_on_main_thread(&self) -> bool {
        self.platform
            .get()
            .is_some_and(|platform| platform.is_on_main_thread())
    }

    /// Schedule `f` on the main thread without waiting. Runs inline when
    /// already on the main thread. Fails with `Dropped` once the main loop has
    /// shut down.
    pub fn run_on_main<F>(&self, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        let platform = self.platform.get().ok_or(DispatchError::NotStarted)?;
        if platform.is_on_main_thread() {
            recover(&self.functions.policy, f);
            return Ok(());
        }
        let id = self
            .functions
            .store(Box::new(f))
            .ok_or(DispatchError::Dropped)?;
        platform.dispatch_on_main_thread(id);
        Ok(())
    }

    /// Run `f` on the main thread and wait for it to finish.
    pub fn invoke_sync<F>(&self, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.invoke_sync_with_result(f)
    }

    /// Run `f` on the main thread and wait for its result.
    pub fn invoke_sync_with_result<T, F>(&self, f: F) -> Result<T, DispatchError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<Result<T, DispatchError>>();
        let policy = self.functions.policy.clone();
        self.run_on_main(move || {
            // Recover here so the policy sees the panic before the caller wakes.
            let outcome = recover(&policy, f).ok_or(DispatchError::Panicked);
            let _ = tx.send(outcome);
        })?;
        rx.blocking_recv().unwrap_or(Err(DispatchError::Dropped))
    }

    /// Run a fallible `f` on the main thread and wait for its error.
    pub fn invoke_sync_with_error<E, F>(&self, f: F) -> Result<(), E>
    where
        E: From<DispatchError> + Send + 'static,
        F: FnOnce() -> Result<(), E> + Send + 'static,
    {
        self.invoke_sync_with_result_and_error(f)
    }

    /// Run a fallible `f` on the main thread and wait for its result or error.
    /// A dispatch failure is converted into `E`.
    pub fn invoke_sync_with_result_and_error<T, E, F>(&self, f: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<DispatchError> + Send + 'static,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        self.invoke_sync_with_result(f)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::panic::PanicDetails;
    use crate::platform::headless::HeadlessPlatform;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn counting_policy() -> (PanicPolicy, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = PanicPolicy::new(Some(Arc::new({
            let calls = calls.clone();
            move |_: PanicDetails| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        })));
        (policy, calls)
    }

    /// Start a headless main loop on its own thread.
    fn running(policy: PanicPolicy) -> (Arc<Dispatcher>, Arc<HeadlessPlatform>, thread::JoinHandle<()>) {
        let dispatcher = Arc::new(Dispatcher::new(policy));
        let platform = Arc::new(HeadlessPlatform::new());
        assert!(dispatcher.attach(platform.clone()));

        let host = crate::platform::PlatformHost::detached(dispatcher.functions());
        let loop_platform = platform.clone();
        let handle = thread::spawn(move || {
            let _ = loop_platform.run(host);
        });
        platform.wait_until_running();
        (dispatcher, platform, handle)
    }

    #[test]
    fn test_dispatch_before_attach_is_not_started() {
        let dispatcher = Dispatcher::new(PanicPolicy::default());
        assert_eq!(dispatcher.run_on_main(|| {}), Err(DispatchError::NotStarted));
        assert_eq!(
            dispatcher.invoke_sync_with_result(|| 1),
            Err(DispatchError::NotStarted)
        );
    }

    #[test]
    fn test_invoke_sync_with_result_from_worker() {
        let (dispatcher, platform, handle) = running(PanicPolicy::default());

        let result = dispatcher.invoke_sync_with_result(|| 42);
        assert_eq!(result, Ok(42));

        platform.destroy();
        handle.join().unwrap();
    }

    #[test]
    fn test_invoke_sync_runs_on_main_thread() {
        let (dispatcher, platform, handle) = running(PanicPolicy::default());

        let main_id = handle.thread().id();
        let ran_on = dispatcher
            .invoke_sync_with_result(|| thread::current().id())
            .unwrap();
        assert_eq!(ran_on, main_id);

        platform.destroy();
        handle.join().unwrap();
    }

    #[test]
    fn test_result_and_error_pass_through_unchanged() {
        let (dispatcher, platform, handle) = running(PanicPolicy::default());

        let ok: Result<&str, AppError> =
            dispatcher.invoke_sync_with_result_and_error(|| Ok("value"));
        assert_eq!(ok.unwrap(), "value");

        let err: Result<(), AppError> = dispatcher
            .invoke_sync_with_error(|| Err(AppError::generic("main thread said no")));
        assert!(err.unwrap_err().to_string().contains("main thread said no"));

        platform.destroy();
        handle.join().unwrap();
    }

    #[test]
    fn test_panic_releases_caller_and_reaches_policy_once() {
        let (policy, calls) = counting_policy();
        let (dispatcher, platform, handle) = running(policy);

        let result: Result<u32, AppError> =
            dispatcher.invoke_sync_with_result_and_error(|| panic!("bad closure"));
        assert_eq!(result.unwrap_err().code(), 8003);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The loop survives and keeps serving
        assert_eq!(dispatcher.invoke_sync_with_result(|| 5), Ok(5));

        platform.destroy();
        handle.join().unwrap();
    }

    #[test]
    fn test_concurrent_closures_never_overlap() {
        let (dispatcher, platform, handle) = running(PanicPolicy::default());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                let inside = inside.clone();
                let overlaps = overlaps.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        let inside = inside.clone();
                        let overlaps = overlaps.clone();
                        dispatcher
                            .invoke_sync(move || {
                                if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                                    overlaps.fetch_add(1, Ordering::SeqCst);
                                }
                                thread::yield_now();
                                inside.fetch_sub(1, Ordering::SeqCst);
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);

        platform.destroy();
        handle.join().unwrap();
    }

    #[test]
    fn test_discarded_function_releases_caller() {
        let dispatcher = Arc::new(Dispatcher::new(PanicPolicy::default()));
        // Attached but never running: dispatched ids are never executed
        let platform = Arc::new(HeadlessPlatform::new());
        dispatcher.attach(platform);

        let waiter = {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || dispatcher.invoke_sync_with_result(|| 1))
        };
        while dispatcher.functions.pending_count() == 0 {
            thread::yield_now();
        }
        assert_eq!(dispatcher.functions.discard_pending(), 1);
        assert_eq!(waiter.join().unwrap(), Err(DispatchError::Dropped));
    }

    #[test]
    fn test_closed_store_rejects_dispatch() {
        let (dispatcher, platform, handle) = running(PanicPolicy::default());
        platform.destroy();
        handle.join().unwrap();

        dispatcher.functions.close();
        assert!(dispatcher.functions.is_closed());
        assert_eq!(
            dispatcher.invoke_sync_with_result(|| 1),
            Err(DispatchError::Dropped)
        );
    }

    #[test]
    fn test_execute_unknown_id_is_ignored() {
        let store = FunctionStore::new(PanicPolicy::default());
        store.execute(404);
        assert_eq!(store.pending_count(), 0);
    }
}
