//! Fixed-size pool of reusable browser sessions.
//!
//! Sessions are created eagerly by [`SessionPool::warm_up`]. A task borrows
//! one through [`SessionPool::acquire`], which blocks while every session is
//! leased. The returned [`SessionLease`] hands the session back when dropped,
//! so a lease is returned exactly once on success, failure, panic or
//! cancellation.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use profilecrawl_shared::{ProfileCrawlError, Result};

use crate::agent::SessionProvider;

type Idle<S> = Arc<Mutex<Vec<S>>>;

fn lock<S>(idle: &Mutex<Vec<S>>) -> MutexGuard<'_, Vec<S>> {
    idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

pub struct SessionPool<P: SessionProvider> {
    provider: Arc<P>,
    permits: Arc<Semaphore>,
    idle: Idle<P::Session>,
    size: usize,
}

impl<P: SessionProvider> SessionPool<P> {
    /// Create `size` sessions up front.
    ///
    /// If any creation fails, the sessions already created are destroyed and
    /// the pool is not built.
    pub async fn warm_up(provider: P, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(ProfileCrawlError::config("session pool size must be at least 1"));
        }

        let mut sessions = Vec::with_capacity(size);
        for index in 0..size {
            match provider.create().await {
                Ok(session) => {
                    debug!(index, "session created");
                    sessions.push(session);
                }
                Err(e) => {
                    warn!(index, error = %e, "session creation failed, tearing down warm-up");
                    for session in sessions {
                        if let Err(destroy_err) = provider.destroy(session).await {
                            warn!(error = %destroy_err, "failed to destroy session after warm-up failure");
                        }
                    }
                    return Err(ProfileCrawlError::SessionPool(format!(
                        "could not create session {} of {size}: {e}",
                        index + 1
                    )));
                }
            }
        }

        info!(size, "session pool ready");
        Ok(Self {
            provider: Arc::new(provider),
            permits: Arc::new(Semaphore::new(size)),
            idle: Arc::new(Mutex::new(sessions)),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Sessions not currently leased.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Borrow a session, waiting until one is free.
    ///
    /// The session is reset before it is handed out. A failed reset returns
    /// the session to the pool and fails this acquisition only.
    pub async fn acquire(&self) -> Result<SessionLease<P::Session>> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ProfileCrawlError::PoolClosed)?;

        let Some(session) = lock(&self.idle).pop() else {
            return Err(ProfileCrawlError::SessionPool(
                "permit granted but no idle session".into(),
            ));
        };

        let mut lease = SessionLease {
            session: Some(session),
            idle: Arc::clone(&self.idle),
            _permit: permit,
        };

        self.provider
            .reset(&mut *lease)
            .await
            .map_err(|e| ProfileCrawlError::Session(format!("reset failed: {e}")))?;

        Ok(lease)
    }

    /// Close the pool and destroy every session.
    ///
    /// Destruction failures are collected, never fatal; the remaining
    /// sessions are still destroyed.
    pub async fn shutdown(self) -> TeardownReport {
        self.permits.close();

        let sessions: Vec<P::Session> = lock(&self.idle).drain(..).collect();
        let mut report = TeardownReport::default();

        if sessions.len() < self.size {
            report.failures.push(format!(
                "{} session(s) still leased at shutdown",
                self.size - sessions.len()
            ));
        }

        for session in sessions {
            match self.provider.destroy(session).await {
                Ok(()) => report.destroyed += 1,
                Err(e) => {
                    warn!(error = %e, "session teardown failed");
                    report.failures.push(e.to_string());
                }
            }
        }

        info!(
            destroyed = report.destroyed,
            failures = report.failures.len(),
            "session pool shut down"
        );
        report
    }
}

/// Outcome of [`SessionPool::shutdown`].
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    pub destroyed: usize,
    pub failures: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Lease
// ---------------------------------------------------------------------------

/// Exclusive loan of one session. Returned to the pool on drop.
pub struct SessionLease<S> {
    session: Option<S>,
    idle: Idle<S>,
    // Dropped after `Drop::drop` has put the session back.
    _permit: OwnedSemaphorePermit,
}

impl<S> Deref for SessionLease<S> {
    type Target = S;

    fn deref(&self) -> &S {
        match &self.session {
            Some(session) => session,
            None => unreachable!("session is only taken on drop"),
        }
    }
}

impl<S> DerefMut for SessionLease<S> {
    fn deref_mut(&mut self) -> &mut S {
        match &mut self.session {
            Some(session) => session,
            None => unreachable!("session is only taken on drop"),
        }
    }
}

impl<S> Drop for SessionLease<S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            lock(&self.idle).push(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    /// In-memory provider; sessions are plain ids.
    #[derive(Default)]
    struct FakeProvider {
        created: AtomicUsize,
        resets: AtomicUsize,
        destroyed: Arc<AtomicUsize>,
        fail_create_at: Option<usize>,
        fail_first_reset: bool,
        /// First reset never answers; it gives up after this long.
        stall_first_reset: Option<Duration>,
        fail_destroy_of: Option<usize>,
    }

    #[async_trait]
    impl SessionProvider for FakeProvider {
        type Session = usize;

        async fn create(&self) -> Result<usize> {
            let id = self.created.fetch_add(1, Ordering::SeqCst);
            if self.fail_create_at == Some(id) {
                return Err(ProfileCrawlError::Session("browser did not start".into()));
            }
            Ok(id)
        }

        async fn reset(&self, _session: &mut usize) -> Result<()> {
            let n = self.resets.fetch_add(1, Ordering::SeqCst);
            if self.fail_first_reset && n == 0 {
                return Err(ProfileCrawlError::Session("page crashed".into()));
            }
            if let (Some(limit), 0) = (self.stall_first_reset, n) {
                return match tokio::time::timeout(limit, std::future::pending::<()>()).await {
                    Ok(()) => Ok(()),
                    Err(_) => Err(ProfileCrawlError::Session("reset not acknowledged".into())),
                };
            }
            Ok(())
        }

        async fn destroy(&self, session: usize) -> Result<()> {
            if self.fail_destroy_of == Some(session) {
                return Err(ProfileCrawlError::Session(format!("session {session} hung")));
            }
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn zero_size_is_rejected() {
        let result = SessionPool::warm_up(FakeProvider::default(), 0).await;
        assert!(matches!(result, Err(ProfileCrawlError::Config { .. })));
    }

    #[tokio::test]
    async fn acquire_blocks_until_release() {
        let pool = SessionPool::warm_up(FakeProvider::default(), 1).await.unwrap();

        let lease = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(blocked.is_err(), "second acquire must wait");

        drop(lease);
        let lease = tokio::time::timeout(Duration::from_millis(500), pool.acquire())
            .await
            .expect("acquire after release")
            .unwrap();
        assert_eq!(*lease, 0);
    }

    #[tokio::test]
    async fn sessions_are_never_shared() {
        let pool = SessionPool::warm_up(FakeProvider::default(), 2).await.unwrap();
        let in_use = Mutex::new(HashSet::new());
        let peak = AtomicUsize::new(0);

        let (pool, in_use, peak) = (&pool, &in_use, &peak);
        let workers = (0..8).map(|_| async move {
            let lease = pool.acquire().await.unwrap();
            let id = *lease;
            {
                let mut held = in_use.lock().unwrap();
                assert!(held.insert(id), "session {id} leased twice");
                peak.fetch_max(held.len(), Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            in_use.lock().unwrap().remove(&id);
        });
        futures::future::join_all(workers).await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn every_loan_is_reset() {
        let pool = SessionPool::warm_up(FakeProvider::default(), 1).await.unwrap();
        for _ in 0..3 {
            let _lease = pool.acquire().await.unwrap();
        }
        assert_eq!(pool.provider.resets.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_reset_returns_the_session() {
        let provider = FakeProvider {
            fail_first_reset: true,
            ..Default::default()
        };
        let pool = SessionPool::warm_up(provider, 1).await.unwrap();

        let err = pool.acquire().await.err().unwrap();
        assert!(matches!(err, ProfileCrawlError::Session(_)));
        assert_eq!(pool.available(), 1);

        let lease = pool.acquire().await.unwrap();
        assert_eq!(*lease, 0);
    }

    #[tokio::test]
    async fn timed_out_reset_returns_the_permit() {
        let provider = FakeProvider {
            stall_first_reset: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let pool = SessionPool::warm_up(provider, 1).await.unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), pool.acquire())
            .await
            .expect("acquire must not hang on a silent session")
            .err()
            .unwrap();
        assert!(matches!(err, ProfileCrawlError::Session(ref m) if m.contains("not acknowledged")));
        assert_eq!(pool.available(), 1);

        let lease = tokio::time::timeout(Duration::from_millis(500), pool.acquire())
            .await
            .expect("permit was returned")
            .unwrap();
        assert_eq!(*lease, 0);
    }

    #[tokio::test]
    async fn acquire_abandoned_during_reset_returns_the_permit() {
        let provider = FakeProvider {
            stall_first_reset: Some(Duration::from_secs(3600)),
            ..Default::default()
        };
        let pool = SessionPool::warm_up(provider, 1).await.unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(20), pool.acquire()).await;
        assert!(abandoned.is_err());
        assert_eq!(pool.available(), 1);

        let lease = tokio::time::timeout(Duration::from_millis(500), pool.acquire())
            .await
            .expect("permit was returned")
            .unwrap();
        assert_eq!(*lease, 0);
    }

    #[tokio::test]
    async fn cancelled_holder_returns_the_session() {
        let pool = SessionPool::warm_up(FakeProvider::default(), 1).await.unwrap();

        let holder = async {
            let _lease = pool.acquire().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        };
        let _ = tokio::time::timeout(Duration::from_millis(20), holder).await;

        assert_eq!(pool.available(), 1);
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn warm_up_failure_destroys_created_sessions() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let provider = FakeProvider {
            fail_create_at: Some(2),
            destroyed: Arc::clone(&destroyed),
            ..Default::default()
        };

        let result = SessionPool::warm_up(provider, 3).await;
        assert!(matches!(result, Err(ProfileCrawlError::SessionPool(_))));
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_continues_past_failures() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let provider = FakeProvider {
            fail_destroy_of: Some(1),
            destroyed: Arc::clone(&destroyed),
            ..Default::default()
        };
        let pool = SessionPool::warm_up(provider, 3).await.unwrap();

        let report = pool.shutdown().await;
        assert_eq!(report.destroyed, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_clean());
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn acquire_after_close_reports_pool_closed() {
        let pool = SessionPool::warm_up(FakeProvider::default(), 1).await.unwrap();
        pool.permits.close();
        assert!(matches!(pool.acquire().await, Err(ProfileCrawlError::PoolClosed)));
    }
}
