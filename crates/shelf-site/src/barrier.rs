//! Counting barrier for background build tasks.
//!
//! A [`Barrier`] counts outstanding tasks. Each task holds a [`BarrierGuard`]
//! and the count drops when the guard does, on every exit path including
//! early returns and panics. Any number of waiters can wait for zero.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Barrier wait gave up.
#[derive(Debug, thiserror::Error)]
#[error("timed out after {timeout:?} waiting for {name} ({outstanding} task(s) outstanding)")]
pub struct BarrierTimeout {
    pub name: String,
    pub timeout: Duration,
    pub outstanding: usize,
}

/// Counter of outstanding tasks that can be awaited.
#[derive(Clone)]
pub struct Barrier {
    name: Arc<str>,
    count: Arc<watch::Sender<usize>>,
}

/// Registration of one task on a [`Barrier`]; releases it on drop.
#[must_use = "the task is released as soon as the guard is dropped"]
pub struct BarrierGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for BarrierGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl Barrier {
    pub fn new(name: &str) -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            name: Arc::from(name),
            count: Arc::new(tx),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a task. Call before spawning it so waiters cannot miss it.
    pub fn add(&self) -> BarrierGuard {
        self.count.send_modify(|n| *n += 1);
        BarrierGuard {
            count: Arc::clone(&self.count),
        }
    }

    /// Tasks registered and not yet released.
    pub fn outstanding(&self) -> usize {
        *self.count.borrow()
    }

    /// Wait until no task is outstanding.
    pub async fn wait(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// [`wait`](Self::wait), giving up after `timeout`.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<(), BarrierTimeout> {
        if tokio::time::timeout(timeout, self.wait()).await.is_ok() {
            return Ok(());
        }
        let err = BarrierTimeout {
            name: self.name.to_string(),
            timeout,
            outstanding: self.outstanding(),
        };
        tracing::error!(barrier = %self.name, outstanding = err.outstanding, "{err}");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_with_nothing_outstanding() {
        let barrier = Barrier::new("books");
        barrier.wait().await;
        assert_eq!(barrier.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_releases_when_guards_drop() {
        let barrier = Barrier::new("books");
        let a = barrier.add();
        let b = barrier.add();
        assert_eq!(barrier.outstanding(), 2);

        let waiter = {
            let barrier = barrier.clone();
            tokio::spawn(async move { barrier.wait().await })
        };

        drop(a);
        assert_eq!(barrier.outstanding(), 1);
        drop(b);

        waiter.await.unwrap();
        assert_eq!(barrier.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_multiple_waiters() {
        let barrier = Barrier::new("books");
        let guard = barrier.add();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let barrier = barrier.clone();
                tokio::spawn(async move { barrier.wait().await })
            })
            .collect();

        drop(guard);
        for waiter in waiters {
            waiter.await.unwrap();
        }
        // Waiting does not consume the release.
        barrier.wait().await;
    }

    #[tokio::test]
    async fn test_panicking_task_still_releases() {
        let barrier = Barrier::new("books");
        let guard = barrier.add();

        let task = tokio::spawn(async move {
            let _guard = guard;
            panic!("builder failed");
        });
        assert!(task.await.is_err());

        barrier
            .wait_timeout(Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_timeout_reports_outstanding() {
        let barrier = Barrier::new("sitemap");
        let _guard = barrier.add();

        let err = barrier
            .wait_timeout(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err.outstanding, 1);
        assert!(err.to_string().contains("sitemap"));
    }
}
