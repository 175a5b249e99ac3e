//! Off-thread Transform Engine.
//!
//! Decoding and re-encoding a multi-megapixel photo takes long enough to
//! stall anything interactive, so transforms run on a dedicated rayon pool
//! and the caller awaits a oneshot reply. Requests carry owned, immutable
//! inputs (`Bytes` + `TransformParams`) and the reply carries owned output;
//! nothing mutable is shared across the boundary.
//!
//! Jobs are started in submission order (`spawn_fifo`). With the default
//! single worker thread they also complete in that order.

use crate::imaging::{BackendError, ImageBackend, TransformParams};
use bytes::Bytes;
use log::{debug, error};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

pub struct TransformWorker {
    pool: ThreadPool,
    backend: Arc<dyn ImageBackend>,
}

impl TransformWorker {
    /// Start `threads` worker threads (at least one) around `backend`.
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        threads: usize,
    ) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("transform-worker-{}", i))
            // Without a handler a panicking job aborts the process
            .panic_handler(|_| error!("transform job panicked; request dropped"))
            .build()?;
        Ok(Self { pool, backend })
    }

    /// Run one transform off the calling thread and await its result.
    pub async fn transform(
        &self,
        source: Bytes,
        params: TransformParams,
    ) -> Result<Vec<u8>, BackendError> {
        let (tx, rx) = oneshot::channel();
        let backend = Arc::clone(&self.backend);

        self.pool.spawn_fifo(move || {
            let started = Instant::now();
            let result = backend.transform(&source, &params);
            debug!(
                "transform of {} bytes finished in {:?} ({})",
                source.len(),
                started.elapsed(),
                if result.is_ok() { "ok" } else { "failed" }
            );
            // Receiver gone means the caller stopped caring
            let _ = tx.send(result);
        });

        rx.await.unwrap_or_else(|_| {
            Err(BackendError::ProcessingFailed(
                "transform worker dropped the request".to_string(),
            ))
        })
    }
}
