//! Single-flight model cache
//!
//! Holds at most one fitted model for the lifetime of the process. The first
//! caller that finds the slot empty starts a build; callers arriving while
//! that build runs join it instead of starting their own, and every caller
//! after a successful build gets the same `Arc` back without touching the
//! builder again.
//!
//! The slot moves through three states:
//!
//! ```text
//! Unset ──get_or_build──▶ Building ──ok──▶ Ready (terminal)
//!   ▲                        │
//!   └────────────err─────────┘
//! ```
//!
//! A build that outlives `build_timeout` answers its waiters with
//! `BuildTimedOut` but keeps the slot in `Building` until the builder thread
//! actually returns, so a second builder never runs alongside it. A late
//! success is still adopted into `Ready`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

/// Boxed error returned by a [`ModelBuilder`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Something that can produce the model artifact from nothing.
///
/// `build` is allowed to block for a long time; the cache always runs it on
/// the blocking thread pool.
pub trait ModelBuilder: Send + Sync + 'static {
    type Artifact: Send + Sync + 'static;

    fn build(&self) -> std::result::Result<Self::Artifact, BoxError>;
}

/// Adapts a closure into a [`ModelBuilder`].
pub struct FnBuilder<F>(pub F);

impl<F, T> ModelBuilder for FnBuilder<F>
where
    F: Fn() -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    type Artifact = T;

    fn build(&self) -> std::result::Result<T, BoxError> {
        (self.0)()
    }
}

/// Failures reported by [`ModelCache::get_or_build`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelCacheError {
    /// The builder returned an error or panicked.
    #[error("model build failed: {0}")]
    BuildFailed(String),

    /// The builder did not finish within the configured timeout. It may
    /// still be running.
    #[error("model build timed out after {0:?}")]
    BuildTimedOut(Duration),

    /// A previous build failed recently and `failure_cooldown` is active.
    #[error("model build failed recently, retry later: {cause}")]
    CoolingDown { cause: String },
}

pub type Result<T> = std::result::Result<T, ModelCacheError>;

/// Tuning knobs for [`ModelCache`]. Everything is off by default.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Upper bound on a single builder run.
    pub build_timeout: Option<Duration>,
    /// After a failed build, refuse to start another one for this long.
    pub failure_cooldown: Option<Duration>,
}

/// Observable state of the cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Unset,
    Building,
    Ready,
}

/// Snapshot of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub builds_started: u64,
    pub builds_succeeded: u64,
    pub builds_failed: u64,
    /// Builds that outlived `build_timeout`. They still end up counted as
    /// succeeded or failed once the builder returns.
    pub builds_timed_out: u64,
    /// Calls answered from a `Ready` slot.
    pub hits: u64,
    /// Calls that joined an in-flight build.
    pub joins: u64,
}

type BuildOutcome<T> = Result<Arc<T>>;

#[derive(Debug, Clone)]
struct FailureRecord {
    at: Instant,
    cause: String,
}

enum Slot<T> {
    Unset { last_failure: Option<FailureRecord> },
    Building {
        generation: u64,
        outcome: watch::Receiver<Option<BuildOutcome<T>>>,
        /// Set once the build has outlived its timeout
        timed_out: Option<Duration>,
    },
    Ready(Arc<T>),
}

#[derive(Default)]
struct Counters {
    builds_started: AtomicU64,
    builds_succeeded: AtomicU64,
    builds_failed: AtomicU64,
    builds_timed_out: AtomicU64,
    hits: AtomicU64,
    joins: AtomicU64,
}

struct Inner<T> {
    builder: Arc<dyn ModelBuilder<Artifact = T>>,
    config: CacheConfig,
    slot: RwLock<Slot<T>>,
    next_generation: AtomicU64,
    counters: Counters,
}

/// Lazily built, process-lifetime model slot with single-flight builds.
///
/// Cloning is cheap and every clone shares the same slot.
pub struct ModelCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ModelCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> ModelCache<T> {
    /// Create an empty cache around `builder` with the default config.
    pub fn new<B>(builder: B) -> Self
    where
        B: ModelBuilder<Artifact = T>,
    {
        Self::with_config(builder, CacheConfig::default())
    }

    /// Create an empty cache around `builder`.
    pub fn with_config<B>(builder: B, config: CacheConfig) -> Self
    where
        B: ModelBuilder<Artifact = T>,
    {
        Self {
            inner: Arc::new(Inner {
                builder: Arc::new(builder),
                config,
                slot: RwLock::new(Slot::Unset { last_failure: None }),
                next_generation: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    /// Return the cached model, building it first if nobody has yet.
    ///
    /// Concurrent callers that arrive while a build is running wait for that
    /// build and share its outcome, including its failure.
    pub async fn get_or_build(&self) -> Result<Arc<T>> {
        if let Some(artifact) = self.get() {
            self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(artifact);
        }

        let (generation, mut outcome) = {
            let mut slot = self.inner.write_slot();
            match &*slot {
                Slot::Ready(artifact) => {
                    self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Arc::clone(artifact));
                }
                Slot::Building {
                    generation,
                    timed_out: Some(limit),
                    ..
                } => {
                    debug!(generation, "Timed-out model build is still running");
                    return Err(ModelCacheError::BuildTimedOut(*limit));
                }
                Slot::Building {
                    generation,
                    outcome,
                    timed_out: None,
                } => {
                    self.inner.counters.joins.fetch_add(1, Ordering::Relaxed);
                    debug!(generation, "Joining in-flight model build");
                    (*generation, outcome.clone())
                }
                Slot::Unset { last_failure } => {
                    if let (Some(cooldown), Some(failure)) =
                        (self.inner.config.failure_cooldown, last_failure)
                    {
                        if failure.at.elapsed() < cooldown {
                            return Err(ModelCacheError::CoolingDown {
                                cause: failure.cause.clone(),
                            });
                        }
                    }

                    let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    *slot = Slot::Building {
                        generation,
                        outcome: rx.clone(),
                        timed_out: None,
                    };
                    Inner::spawn_build(Arc::clone(&self.inner), generation, tx);
                    (generation, rx)
                }
            }
        };

        let received = outcome
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|value| value.clone());

        match received {
            Some(result) => result,
            None => {
                // Build task vanished without reporting (runtime shutting down).
                self.inner.abandon(generation);
                Err(ModelCacheError::BuildFailed(
                    "model build task was aborted".to_string(),
                ))
            }
        }
    }

    /// Return the model if it has already been built. Never triggers a build.
    pub fn get(&self) -> Option<Arc<T>> {
        match &*self.inner.read_slot() {
            Slot::Ready(artifact) => Some(Arc::clone(artifact)),
            _ => None,
        }
    }

    pub fn state(&self) -> CacheState {
        match &*self.inner.read_slot() {
            Slot::Unset { .. } => CacheState::Unset,
            Slot::Building { .. } => CacheState::Building,
            Slot::Ready(_) => CacheState::Ready,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            builds_started: c.builds_started.load(Ordering::Relaxed),
            builds_succeeded: c.builds_succeeded.load(Ordering::Relaxed),
            builds_failed: c.builds_failed.load(Ordering::Relaxed),
            builds_timed_out: c.builds_timed_out.load(Ordering::Relaxed),
            hits: c.hits.load(Ordering::Relaxed),
            joins: c.joins.load(Ordering::Relaxed),
        }
    }
}

impl<T: Send + Sync + 'static> Inner<T> {
    fn read_slot(&self) -> RwLockReadGuard<'_, Slot<T>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Slot<T>> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the builder on a detached task so the build completes (and the
    /// slot is updated) even if the request that started it goes away.
    fn spawn_build(
        inner: Arc<Self>,
        generation: u64,
        tx: watch::Sender<Option<BuildOutcome<T>>>,
    ) {
        inner.counters.builds_started.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            let started = Instant::now();
            info!(generation, "Model build started");

            let builder = Arc::clone(&inner.builder);
            let mut task = tokio::task::spawn_blocking(move || builder.build());

            let joined = match inner.config.build_timeout {
                Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        // The blocking thread cannot be cancelled. Release the
                        // waiters but hold the slot until it returns.
                        inner.counters.builds_timed_out.fetch_add(1, Ordering::Relaxed);
                        inner.mark_timed_out(generation, limit);
                        warn!(
                            generation,
                            timeout_ms = limit.as_millis() as u64,
                            "Model build timed out, waiting for the builder to return"
                        );
                        let _ = tx.send(Some(Err(ModelCacheError::BuildTimedOut(limit))));
                        task.await
                    }
                },
                None => task.await,
            };
            let outcome = flatten(joined);

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &outcome {
                Ok(_) => {
                    inner.counters.builds_succeeded.fetch_add(1, Ordering::Relaxed);
                    info!(generation, elapsed_ms, "Model build finished");
                }
                Err(e) => {
                    inner.counters.builds_failed.fetch_add(1, Ordering::Relaxed);
                    error!(generation, elapsed_ms, error = %e, "Model build failed");
                }
            }

            inner.finish(generation, &outcome);
            // Slot is updated before waiters wake, so they never see Building.
            let _ = tx.send(Some(outcome));
        });
    }

    fn finish(&self, generation: u64, outcome: &BuildOutcome<T>) {
        let mut slot = self.write_slot();
        if !matches!(&*slot, Slot::Building { generation: g, .. } if *g == generation) {
            warn!(generation, "Discarding result of a superseded model build");
            return;
        }
        *slot = match outcome {
            Ok(artifact) => Slot::Ready(Arc::clone(artifact)),
            Err(e) => Slot::Unset {
                last_failure: Some(FailureRecord {
                    at: Instant::now(),
                    cause: e.to_string(),
                }),
            },
        };
    }

    fn mark_timed_out(&self, generation: u64, limit: Duration) {
        let mut slot = self.write_slot();
        if let Slot::Building {
            generation: g,
            timed_out,
            ..
        } = &mut *slot
        {
            if *g == generation {
                *timed_out = Some(limit);
            }
        }
    }

    fn abandon(&self, generation: u64) {
        let mut slot = self.write_slot();
        if matches!(&*slot, Slot::Building { generation: g, .. } if *g == generation) {
            warn!(generation, "Resetting abandoned model build");
            *slot = Slot::Unset { last_failure: None };
        }
    }
}

fn flatten<T>(
    joined: std::result::Result<std::result::Result<T, BoxError>, JoinError>,
) -> BuildOutcome<T> {
    match joined {
        Ok(Ok(artifact)) => Ok(Arc::new(artifact)),
        Ok(Err(e)) => Err(ModelCacheError::BuildFailed(e.to_string())),
        Err(e) if e.is_panic() => Err(ModelCacheError::BuildFailed(
            "model builder panicked".to_string(),
        )),
        Err(e) => Err(ModelCacheError::BuildFailed(e.to_string())),
    }
}
