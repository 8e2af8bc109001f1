//! Per-resource serialized execution queues.
//!
//! # Responsibility
//! - Run at most one operation at a time per resource name.
//! - Keep independent resources fully concurrent.
//!
//! # Invariants
//! - Operations on one resource run in submission order (first poll of the
//!   returned future), each after the previous one finished.
//! - A slot is released when its operation returns, fails, panics or is dropped.
//! - A queue entry is removed once nobody holds or waits on it.
//! - The registry lock is never held across an `.await`.

use log::{debug, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as QueueMutex, OwnedMutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Waited longer than the configured queue timeout for a slot.
    Timeout { resource: String, waited: Duration },
}

impl Display for QueueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { resource, waited } => write!(
                f,
                "timed out after {}ms waiting for exclusive access to `{resource}`",
                waited.as_millis()
            ),
        }
    }
}

impl Error for QueueError {}

/// Registry of FIFO mutation queues keyed by resource name.
///
/// Owned by the engine instance; starts empty.
#[derive(Debug, Default)]
pub struct ResourceQueues {
    queues: Mutex<HashMap<String, Arc<QueueMutex<()>>>>,
    wait_timeout: Option<Duration>,
}

impl ResourceQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry whose callers give up after `timeout` in the queue.
    ///
    /// The timeout bounds waiting only; a running operation is never cut short.
    pub fn with_wait_timeout(timeout: Duration) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            wait_timeout: Some(timeout),
        }
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    /// Number of resources that currently have a holder or waiters.
    pub fn active_resources(&self) -> usize {
        self.registry().len()
    }

    /// Runs `operation` exclusively for `resource`.
    ///
    /// The operation's own error is returned unchanged; queue failures are
    /// converted into the caller's error type.
    pub async fn run_exclusive<F, Fut, T, E>(&self, resource: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<QueueError>,
    {
        let slot = self.acquire(resource).await?;
        let result = operation().await;
        drop(slot);
        result
    }

    async fn acquire(&self, resource: &str) -> Result<QueueSlot<'_>, QueueError> {
        let queue = {
            let mut queues = self.registry();
            Arc::clone(queues.entry(resource.to_string()).or_default())
        };

        let guard = match self.wait_timeout {
            None => queue.lock_owned().await,
            Some(waited) => match tokio::time::timeout(waited, queue.lock_owned()).await {
                Ok(guard) => guard,
                Err(_) => {
                    // The timed-out lock future already dropped its handle.
                    self.prune(resource);
                    warn!(
                        "event=queue_wait module=sync status=error resource={} error_code=timeout waited_ms={}",
                        resource,
                        waited.as_millis()
                    );
                    return Err(QueueError::Timeout {
                        resource: resource.to_string(),
                        waited,
                    });
                }
            },
        };

        debug!(
            "event=queue_acquire module=sync status=ok resource={}",
            resource
        );
        Ok(QueueSlot {
            registry: self,
            resource: resource.to_string(),
            guard: Some(guard),
        })
    }

    fn prune(&self, resource: &str) {
        let mut queues = self.registry();
        let idle = queues
            .get(resource)
            .is_some_and(|queue| Arc::strong_count(queue) == 1);
        if idle {
            queues.remove(resource);
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<QueueMutex<()>>>> {
        // The map holds no invariant a panicking holder could break mid-update.
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held slot for one resource; releasing it admits the next waiter.
struct QueueSlot<'a> {
    registry: &'a ResourceQueues,
    resource: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        // Guard first: it owns one reference to the queue being pruned.
        drop(self.guard.take());
        self.registry.prune(&self.resource);
    }
}

#[cfg(test)]
mod tests {
    use super::{QueueError, ResourceQueues};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Queue(QueueError),
        Boom,
    }

    impl From<QueueError> for TestError {
        fn from(value: QueueError) -> Self {
            Self::Queue(value)
        }
    }

    #[tokio::test]
    async fn same_resource_runs_in_submission_order() {
        let queues = ResourceQueues::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = queues.run_exclusive("cards.json", || {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("first:start");
                tokio::time::sleep(Duration::from_millis(30)).await;
                log.lock().unwrap().push("first:end");
                Ok::<_, TestError>(1)
            }
        });
        let second = queues.run_exclusive("cards.json", || {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("second");
                Ok::<_, TestError>(2)
            }
        });
        let third = queues.run_exclusive("cards.json", || {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("third");
                Ok::<_, TestError>(3)
            }
        });

        let (a, b, c) = tokio::join!(first, second, third);
        assert_eq!((a, b, c), (Ok(1), Ok(2), Ok(3)));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:start", "first:end", "second", "third"]
        );
    }

    #[tokio::test]
    async fn failed_operation_does_not_block_the_queue() {
        let queues = ResourceQueues::new();

        let failing = queues.run_exclusive("cards.json", || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<(), _>(TestError::Boom)
        });
        let following = queues.run_exclusive("cards.json", || async { Ok::<_, TestError>("ran") });

        let (failed, ran) = tokio::join!(failing, following);
        assert_eq!(failed, Err(TestError::Boom));
        assert_eq!(ran, Ok("ran"));
    }

    #[tokio::test]
    async fn different_resources_do_not_wait_for_each_other() {
        let queues = ResourceQueues::new();
        let (tx, rx) = oneshot::channel::<()>();

        // `cards` only finishes after `columns` ran; a shared lock would deadlock.
        let cards = queues.run_exclusive("cards.json", || async move {
            rx.await.map_err(|_| TestError::Boom)
        });
        let columns = queues.run_exclusive("columns.json", || async move {
            tx.send(()).map_err(|_| TestError::Boom)
        });

        let joined = tokio::time::timeout(Duration::from_secs(2), async {
            tokio::join!(cards, columns)
        })
        .await
        .expect("independent resources must not serialize");
        assert_eq!(joined, (Ok(()), Ok(())));
    }

    #[tokio::test]
    async fn drained_queues_are_released() {
        let queues = ResourceQueues::new();
        for index in 0..16 {
            let name = format!("resource-{index}");
            queues
                .run_exclusive(&name, || async { Ok::<_, TestError>(()) })
                .await
                .unwrap();
        }
        let _ = queues
            .run_exclusive("cards.json", || async { Err::<(), _>(TestError::Boom) })
            .await;

        assert_eq!(queues.active_resources(), 0);
    }

    #[tokio::test]
    async fn waiters_time_out_without_running() {
        let queues = ResourceQueues::with_wait_timeout(Duration::from_millis(20));
        let ran_late = Arc::new(Mutex::new(false));

        let holder = queues.run_exclusive("cards.json", || async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok::<_, TestError>(())
        });
        let waiter = queues.run_exclusive("cards.json", || {
            let ran_late = Arc::clone(&ran_late);
            async move {
                *ran_late.lock().unwrap() = true;
                Ok::<_, TestError>(())
            }
        });

        let (held, waited) = tokio::join!(holder, waiter);
        assert_eq!(held, Ok(()));
        assert!(matches!(
            waited,
            Err(TestError::Queue(QueueError::Timeout { ref resource, .. })) if resource == "cards.json"
        ));
        assert!(!*ran_late.lock().unwrap());
        assert_eq!(queues.active_resources(), 0);
    }

    #[tokio::test]
    async fn cancelled_operation_releases_its_slot() {
        let queues = ResourceQueues::new();

        let abandoned = queues.run_exclusive("cards.json", || async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, TestError>(())
        });
        let _ = tokio::time::timeout(Duration::from_millis(10), abandoned).await;

        let next = queues
            .run_exclusive("cards.json", || async { Ok::<_, TestError>("next") })
            .await;
        assert_eq!(next, Ok("next"));
        assert_eq!(queues.active_resources(), 0);
    }
}
