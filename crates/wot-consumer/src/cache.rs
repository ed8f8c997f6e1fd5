use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hashbrown::HashMap;

use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, info};

use crate::error::Result;

/// Converts a time-to-live expressed in minutes into a [`Duration`].
#[must_use]
#[inline]
pub const fn minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

struct Expiry {
    deadline: Instant,
    // The token used to cancel the eviction task.
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Entry<S> {
    cell: Arc<OnceCell<S>>,
    // Drawn from a counter shared by the whole cache on each timer restart,
    // so a stale eviction task never matches a refreshed or recreated entry.
    generation: u64,
    expiry: Option<Expiry>,
}

impl<S> Entry<S> {
    fn vacant() -> Self {
        Self::populated(Arc::new(OnceCell::new()))
    }

    const fn populated(cell: Arc<OnceCell<S>>) -> Self {
        Self {
            cell,
            generation: 0,
            expiry: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expiry
            .as_ref()
            .is_some_and(|expiry| expiry.deadline <= now)
    }

    fn is_live(&self, now: Instant) -> bool {
        self.cell.initialized() && !self.is_expired(now)
    }

    fn disarm(&mut self) -> Option<JoinHandle<()>> {
        self.expiry.take().map(|expiry| {
            expiry.token.cancel();
            expiry.handle
        })
    }
}

type Entries<S> = Arc<Mutex<HashMap<String, Entry<S>>>>;

async fn expire<S>(
    entries: Entries<S>,
    identity: String,
    generation: u64,
    ttl: Duration,
    token: CancellationToken,
) {
    tokio::select! {
        // A refresh or a removal cancels the timer
        () = token.cancelled() => {}
        () = tokio::time::sleep(ttl) => {
            let mut entries = entries.lock().await;
            if entries
                .get(&identity)
                .is_some_and(|entry| entry.generation == generation)
                && entries.remove(&identity).is_some()
            {
                info!("Session for `{identity}` expired");
            }
        }
    }
}

/// A time-bounded cache of device sessions, keyed by thing identity.
///
/// The cache holds at most one session per identity. Concurrent requests
/// for an identity without a live session are coalesced: the factory runs
/// once and every waiter receives its session. A failed factory leaves the
/// identity unpopulated, so the next request runs the factory again.
///
/// Cloning a [`SessionCache`] produces a new handle to the same cache.
pub struct SessionCache<S> {
    entries: Entries<S>,
    generations: Arc<AtomicU64>,
}

impl<S> Clone for SessionCache<S> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            generations: Arc::clone(&self.generations),
        }
    }
}

impl<S> Default for SessionCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SessionCache<S> {
    /// Creates an empty [`SessionCache`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            // Zero is reserved for entries without a timer.
            generations: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl<S> SessionCache<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Returns the session associated with an identity, creating it through
    /// the given factory when no live session exists.
    ///
    /// When `ttl` is not zero, the expiration timer of the session is
    /// started, or restarted if the session was already cached. A zero `ttl`
    /// leaves the timer untouched, so a session created with a zero `ttl`
    /// never expires.
    ///
    /// # Errors
    ///
    /// The error returned by the factory. Nothing is cached in this case.
    pub async fn get_or_create<F, Fut>(&self, identity: &str, ttl: Duration, factory: F) -> Result<S>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S>>,
    {
        let cell = self.cell(identity).await;

        let mut created = false;
        let session = match cell
            .get_or_try_init(|| {
                created = true;
                factory()
            })
            .await
        {
            Ok(session) => session.clone(),
            Err(e) => {
                self.discard(identity, &cell).await;
                return Err(e);
            }
        };

        if created {
            info!("Session for `{identity}` created");
        } else {
            debug!("Session for `{identity}` found in cache");
        }

        if !ttl.is_zero() {
            self.arm(identity, &cell, ttl).await;
        }

        Ok(session)
    }

    /// Returns the number of live sessions.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// Checks whether the cache holds no live sessions.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Checks whether a live session exists for an identity.
    pub async fn contains(&self, identity: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .get(identity)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Removes the session associated with an identity.
    ///
    /// Returns `true` when a live session has been removed.
    pub async fn remove(&self, identity: &str) -> bool {
        let now = Instant::now();
        let Some(mut entry) = self.entries.lock().await.remove(identity) else {
            return false;
        };
        let _handle = entry.disarm();
        entry.is_live(now)
    }

    /// Removes all sessions and stops all expiration timers.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self
            .entries
            .lock()
            .await
            .drain()
            .filter_map(|(_, mut entry)| entry.disarm())
            .collect();

        for handle in handles {
            // Await the task.
            if let Err(e) = handle.await {
                error!("Failed to await the expiration task: {e}");
            }
        }
    }

    async fn cell(&self, identity: &str) -> Arc<OnceCell<S>> {
        let mut entries = self.entries.lock().await;

        if entries
            .get(identity)
            .is_some_and(|entry| entry.is_expired(Instant::now()))
            && let Some(mut entry) = entries.remove(identity)
        {
            let _handle = entry.disarm();
            debug!("Session for `{identity}` expired before eviction");
        }

        let entry = entries
            .entry(identity.to_owned())
            .or_insert_with(Entry::vacant);
        Arc::clone(&entry.cell)
    }

    // Removes the entry left behind by a failed factory, unless another
    // request has already replaced or populated it.
    async fn discard(&self, identity: &str, cell: &Arc<OnceCell<S>>) {
        let mut entries = self.entries.lock().await;
        if entries
            .get(identity)
            .is_some_and(|entry| Arc::ptr_eq(&entry.cell, cell) && !entry.cell.initialized())
        {
            let _entry = entries.remove(identity);
        }
    }

    async fn arm(&self, identity: &str, cell: &Arc<OnceCell<S>>, ttl: Duration) {
        let Some(deadline) = Instant::now().checked_add(ttl) else {
            debug!("Session for `{identity}` never expires");
            return;
        };

        let mut entries = self.entries.lock().await;

        // The entry is evicted when its timer fires between the creation of
        // the session and this point, so it is inserted again.
        let entry = entries
            .entry(identity.to_owned())
            .or_insert_with(|| Entry::populated(Arc::clone(cell)));

        // A newer session replaced this one.
        if !Arc::ptr_eq(&entry.cell, cell) {
            return;
        }

        let _handle = entry.disarm();
        entry.generation = self.generations.fetch_add(1, Ordering::Relaxed);

        let token = CancellationToken::new();
        let handle = tokio::spawn(expire(
            Arc::clone(&self.entries),
            identity.to_owned(),
            entry.generation,
            ttl,
            token.clone(),
        ));

        entry.expiry = Some(Expiry {
            deadline,
            token,
            handle,
        });
    }
}
