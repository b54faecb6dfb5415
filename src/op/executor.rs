use std::future::Future;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

/// Time granted to in-flight tasks when the workers are shut down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The two single-worker schedulers owned by one operation: one for
/// immediate tasks, one for delayed and periodic tasks.
pub(crate) struct Schedulers {
    executor: Runtime,
    scheduled: Runtime,
}

impl Schedulers {
    pub(crate) fn new(name: &str) -> std::io::Result<Self> {
        let executor = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(format!("{}-exec", name))
            .enable_all()
            .build()?;
        let scheduled = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(format!("{}-sched", name))
            .enable_all()
            .build()?;
        Ok(Self { executor, scheduled })
    }

    pub(crate) fn executor(&self) -> Handle {
        self.executor.handle().clone()
    }

    pub(crate) fn scheduled(&self) -> Handle {
        self.scheduled.handle().clone()
    }

    /// Drive `future` on the calling thread
    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.executor.block_on(future)
    }

    /// Stop both workers; tasks still running after the grace period are dropped
    pub(crate) fn shutdown(self) {
        self.executor.shutdown_timeout(SHUTDOWN_GRACE);
        self.scheduled.shutdown_timeout(SHUTDOWN_GRACE);
        debug!("Operation schedulers stopped");
    }
}
