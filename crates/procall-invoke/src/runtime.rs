//! Shared Tokio runtime for the blocking API
//!
//! Blocking operations run the same futures as the async API on one
//! process-wide multi-thread runtime.

use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

static TOKIO_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Get or create the shared runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be created.
pub fn shared_runtime() -> &'static Runtime {
    TOKIO_RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("procall-runtime")
            .build()
            .expect("Failed to create Tokio runtime for procall")
    })
}

/// Block the current thread on `future` using the shared runtime.
///
/// Must not be called from inside an async context; use the async API there.
pub fn block_on<F>(future: F) -> F::Output
where
    F: Future,
{
    shared_runtime().block_on(future)
}

/// Spawn on the current runtime if there is one, else on the shared runtime
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => handle.spawn(future),
        Err(_) => shared_runtime().spawn(future),
    }
}
