//! Bounded execution of blocking store work from async callers.
//!
//! Store transactions hold a synchronous connection, so every operation runs
//! on Tokio's blocking thread pool. An [`ExecutorPool`] caps how many of them
//! run at once with a semaphore. Streaming operations hand rows to the caller
//! through a bounded channel: the producer blocks while the consumer is
//! behind, and learns the consumer went away on its next send.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::{Semaphore, mpsc};

use crate::{
    config::PoolConfig,
    errors::{Result, SpatioGraphError},
};

#[derive(Debug, Clone)]
pub struct ExecutorPool {
    name: String,
    size: usize,
    buffer: usize,
    permits: Arc<Semaphore>,
}

impl ExecutorPool {
    pub fn new(cfg: &PoolConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            size: cfg.size,
            buffer: cfg.stream_buffer.max(1),
            permits: Arc::new(Semaphore::new(cfg.size)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running operation.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Rejects every operation submitted afterwards. Running operations finish.
    pub fn close(&self) {
        tracing::debug!(pool = %self.name, "closing executor pool");
        self.permits.close();
    }

    /// Runs `task` on the blocking pool once a permit is free.
    pub async fn run<F, R>(&self, task: F) -> Result<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SpatioGraphError::executor(format!("pool {} is closed", self.name)))?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        })
        .await
        .map_err(|e| SpatioGraphError::executor(format!("pool {}: {e}", self.name)))?
    }

    /// Starts `produce` on the blocking pool and returns the rows it sends as
    /// a stream. Returns immediately; the work is queued behind the pool's
    /// permits. An error returned by `produce` is delivered as the stream's
    /// last item, except [`SpatioGraphError::Cancelled`], which only means the
    /// stream was dropped.
    ///
    /// Must be called from within a Tokio runtime; otherwise the returned
    /// stream yields a single executor error.
    pub fn stream<T, F>(&self, produce: F) -> ResultStream<T>
    where
        T: Send + 'static,
        F: FnOnce(&RowSink<T>) -> Result<()> + Send + 'static,
    {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                return ResultStream::failed(SpatioGraphError::executor(format!(
                    "pool {}: {e}",
                    self.name
                )));
            }
        };
        let (tx, rx) = mpsc::channel(self.buffer);
        let permits = self.permits.clone();
        let name = self.name.clone();
        handle.spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                let _ = tx
                    .send(Err(SpatioGraphError::executor(format!("pool {name} is closed"))))
                    .await;
                return;
            };
            let failures = tx.clone();
            let sink = RowSink { tx };
            let joined = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                match produce(&sink) {
                    Ok(()) => {}
                    Err(SpatioGraphError::Cancelled(reason)) => {
                        tracing::debug!(%reason, "stream cancelled by consumer");
                    }
                    Err(err) => {
                        let _ = sink.tx.blocking_send(Err(err));
                    }
                }
            })
            .await;
            if let Err(e) = joined {
                tracing::error!(pool = %name, error = %e, "stream producer failed");
                let _ = failures
                    .send(Err(SpatioGraphError::executor(format!("pool {name}: {e}"))))
                    .await;
            }
        });
        ResultStream { rx }
    }
}

/// Producer half of a [`ResultStream`].
pub struct RowSink<T> {
    tx: mpsc::Sender<Result<T>>,
}

impl<T> RowSink<T> {
    /// Delivers one row, blocking while the consumer's buffer is full.
    /// Fails with [`SpatioGraphError::Cancelled`] once the stream is dropped.
    pub fn send(&self, row: T) -> Result<()> {
        self.tx
            .blocking_send(Ok(row))
            .map_err(|_| SpatioGraphError::cancelled("result stream was dropped"))
    }

    /// Whether the consumer has dropped the stream.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Lazily produced query results. Dropping the stream cancels the producing
/// operation, which aborts its transaction.
pub struct ResultStream<T> {
    rx: mpsc::Receiver<Result<T>>,
}

impl<T> ResultStream<T> {
    /// A stream whose only item is `err`.
    pub fn failed(err: SpatioGraphError) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(Err(err));
        Self { rx }
    }

    /// Stops the producer without dropping the stream. Rows already buffered
    /// can still be received.
    pub fn cancel(&mut self) {
        self.rx.close();
    }
}

impl<T> Stream for ResultStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use futures::{StreamExt, TryStreamExt};

    use super::*;

    fn pool(size: usize, stream_buffer: usize) -> ExecutorPool {
        ExecutorPool::new(&PoolConfig {
            name: "test-pool".to_string(),
            size,
            stream_buffer,
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn run_never_exceeds_pool_size() {
        let pool = pool(2, 4);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                pool.run(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }));
        }
        for task in tasks {
            task.await.expect("join").expect("run");
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn run_propagates_task_errors() {
        let pool = pool(1, 1);
        let err = pool
            .run(|| Err::<(), _>(SpatioGraphError::invalid_input("bad")))
            .await
            .unwrap_err();
        assert!(matches!(err, SpatioGraphError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn closed_pool_rejects_work() {
        let pool = pool(1, 1);
        pool.close();
        let err = pool.run(|| Ok(())).await.unwrap_err();
        assert!(matches!(err, SpatioGraphError::ExecutorError(_)));
    }

    #[tokio::test]
    async fn stream_delivers_rows_then_error() {
        let pool = pool(1, 2);
        let stream = pool.stream(|sink| {
            for i in 0..5 {
                sink.send(i)?;
            }
            Err(SpatioGraphError::query("broken after five"))
        });
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 6);
        assert_eq!(*items[4].as_ref().expect("row"), 4);
        assert!(matches!(items[5], Err(SpatioGraphError::QueryError(_))));
    }

    #[tokio::test]
    async fn dropping_stream_cancels_producer() {
        let pool = pool(1, 1);
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let mut stream = pool.stream(move |sink| {
            let outcome = (0..1_000).try_for_each(|i| sink.send(i));
            let _ = done_tx.send(outcome);
            Ok(())
        });
        assert_eq!(stream.try_next().await.expect("row"), Some(0));
        drop(stream);
        let outcome = done_rx.await.expect("producer finished");
        assert!(matches!(outcome, Err(SpatioGraphError::Cancelled(_))));
    }

    #[tokio::test]
    async fn sink_reports_dropped_stream() {
        let pool = pool(1, 1);
        let (dropped_tx, dropped_rx) = std::sync::mpsc::channel::<()>();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let mut stream = pool.stream(move |sink| {
            let open_before = !sink.is_closed();
            sink.send(0)?;
            let _ = dropped_rx.recv();
            let _ = done_tx.send((open_before, sink.is_closed()));
            Ok(())
        });
        assert_eq!(stream.try_next().await.expect("row"), Some(0));
        drop(stream);
        dropped_tx.send(()).expect("producer waiting");
        assert_eq!(done_rx.await.expect("producer finished"), (true, true));
    }

    #[test]
    fn stream_outside_runtime_fails() {
        let pool = pool(1, 1);
        let stream = pool.stream(|sink: &RowSink<u8>| sink.send(1));
        let items = futures::executor::block_on(stream.collect::<Vec<_>>());
        assert!(matches!(items[..], [Err(SpatioGraphError::ExecutorError(_))]));
    }
}
