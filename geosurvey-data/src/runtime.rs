//! Blocking bridge from the synchronous backend contract to async clients.

use std::future::Future;

use geosurvey_core::BackendError;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

/// Owns a current-thread runtime used to drive async clients from sync code.
///
/// Inside a multi-threaded Tokio runtime the caller's handle is used via
/// [`tokio::task::block_in_place`]. Inside a `current_thread` runtime the
/// calling thread may not block on another runtime, so the owned runtime
/// drives the future on a scoped helper thread. Outside Tokio the owned
/// runtime runs on the calling thread.
///
/// Dropping the bridge shuts the owned runtime down in the background, so
/// a store may be dropped from async code.
pub(crate) struct BlockingRuntime {
    // `None` only once `Drop` has taken it.
    runtime: Option<Runtime>,
}

impl std::fmt::Debug for BlockingRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlockingRuntime(<tokio::runtime::Runtime>)")
    }
}

impl BlockingRuntime {
    pub(crate) fn new() -> std::io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    /// Drive `future` to completion from synchronous code.
    pub(crate) fn block_on<F, T>(&self, future: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>> + Send,
        T: Send,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            return Err(BackendError::Connection {
                target: "tokio runtime".into(),
                message: "runtime has been shut down".into(),
            });
        };
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            Ok(_) => std::thread::scope(|scope| {
                scope
                    .spawn(|| runtime.block_on(future))
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            }),
            Err(_) => runtime.block_on(future),
        }
    }
}

impl Drop for BlockingRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
