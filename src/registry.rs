//! Lazy, single-flight model registry
//!
//! The registry owns the process-wide inference artifact. The artifact load is
//! expensive (multi-second for large models), so it is deferred until the
//! first request needs it and guarded so that concurrent first requests
//! trigger exactly one load: the initiating caller spawns a detached load
//! task, every caller (initiator included) awaits its completion, and all of
//! them observe the same cached artifact or the same recorded failure.
//!
//! The load task is detached on purpose. A caller that disconnects mid-load
//! must not cancel the load, because other waiters depend on it completing.
//!
//! A failed load latches: `ensure_ready` re-raises the recorded reason without
//! touching the disk again until an explicit `reset`. Blind automatic retries
//! against a permanently missing artifact would hot-loop for nothing.

use crate::{
    artifact::{ArtifactLoader, LoadedArtifact},
    error::{Result, SortiumError},
};
use instant::{Duration, Instant};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Observable lifecycle state of the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No load has been attempted yet
    Uninitialized,
    /// A load is in flight; callers are waiting on its outcome
    Loading,
    /// The artifact is cached and served without further loads
    Ready,
    /// The load failed; the reason is latched until reset
    Failed,
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Loading => write!(f, "loading"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

enum Slot {
    Uninitialized,
    Loading {
        done: watch::Receiver<bool>,
    },
    Ready(Arc<dyn LoadedArtifact>),
    Failed(String),
}

impl Slot {
    fn state(&self) -> LoadState {
        match self {
            Self::Uninitialized => LoadState::Uninitialized,
            Self::Loading { .. } => LoadState::Loading,
            Self::Ready(_) => LoadState::Ready,
            Self::Failed(_) => LoadState::Failed,
        }
    }
}

/// Owns the lazily loaded inference artifact and serializes load attempts
pub struct ModelRegistry {
    artifact_dir: PathBuf,
    loader: Arc<dyn ArtifactLoader>,
    load_timeout: Duration,
    slot: Arc<Mutex<Slot>>,
    load_count: Arc<AtomicUsize>,
}

impl ModelRegistry {
    /// Create a registry for the artifact at `artifact_dir`
    ///
    /// Nothing is loaded here; the first `ensure_ready` call pays that cost.
    #[must_use]
    pub fn new(
        artifact_dir: PathBuf,
        loader: Arc<dyn ArtifactLoader>,
        load_timeout: Duration,
    ) -> Self {
        Self {
            artifact_dir,
            loader,
            load_timeout,
            slot: Arc::new(Mutex::new(Slot::Uninitialized)),
            load_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.slot
            .lock()
            .map(|slot| slot.state())
            .unwrap_or(LoadState::Failed)
    }

    /// Number of underlying load attempts performed so far
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    /// Return the cached artifact, loading it first if necessary
    ///
    /// At most one load is ever in flight; concurrent callers block on the
    /// same outcome without spinning. Once ready, this is a cheap shared read.
    ///
    /// # Errors
    /// - `ModelLoad` if the load fails or timed out; the same reason is
    ///   re-raised on every call until `reset`
    pub async fn ensure_ready(&self) -> Result<Arc<dyn LoadedArtifact>> {
        loop {
            let mut done = {
                let mut slot = self
                    .slot
                    .lock()
                    .map_err(|_| SortiumError::model_load("registry lock poisoned"))?;
                match &*slot {
                    Slot::Ready(artifact) => return Ok(Arc::clone(artifact)),
                    Slot::Failed(reason) => return Err(SortiumError::model_load(reason.clone())),
                    Slot::Loading { done } => done.clone(),
                    Slot::Uninitialized => {
                        let rx = self.begin_load();
                        *slot = Slot::Loading { done: rx.clone() };
                        rx
                    },
                }
            };

            // Wait for the in-flight load without holding the slot lock. The
            // sender is dropped when the load task finishes, so either signal
            // ends the wait and the loop re-reads the slot.
            while !*done.borrow() {
                if done.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    /// Administrative reset back to `Uninitialized`
    ///
    /// Intended for operators after fixing a broken deployment and for tests
    /// that substitute artifacts between cases. Refused while a load is in
    /// flight so the single-flight accounting stays coherent.
    ///
    /// # Errors
    /// - `InvalidConfig` if called while a load is in progress
    pub fn reset(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| SortiumError::model_load("registry lock poisoned"))?;
        if matches!(&*slot, Slot::Loading { .. }) {
            return Err(SortiumError::invalid_config(
                "cannot reset the model registry while a load is in flight",
            ));
        }
        tracing::info!(state = %slot.state(), "resetting model registry");
        *slot = Slot::Uninitialized;
        Ok(())
    }

    /// Spawn the detached load task and return its completion channel
    fn begin_load(&self) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        self.load_count.fetch_add(1, Ordering::SeqCst);

        let loader = Arc::clone(&self.loader);
        let dir = self.artifact_dir.clone();
        let slot = Arc::clone(&self.slot);
        let load_timeout = self.load_timeout;

        tracing::info!(dir = %dir.display(), "loading inference artifact");
        tokio::spawn(async move {
            let load_start = Instant::now();
            let dir_for_task = dir.clone();
            let join =
                tokio::task::spawn_blocking(move || loader.load(&dir_for_task));

            let outcome = match tokio::time::timeout(load_timeout, join).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(SortiumError::model_load(format!(
                    "artifact loader panicked: {join_err}"
                ))),
                Err(_) => Err(SortiumError::model_load(format!(
                    "artifact load timed out after {:.1}s",
                    load_timeout.as_secs_f64()
                ))),
            };

            let next = match outcome {
                Ok(artifact) => {
                    tracing::info!(
                        dir = %dir.display(),
                        elapsed_ms = load_start.elapsed().as_millis() as u64,
                        "artifact loaded and cached"
                    );
                    Slot::Ready(artifact)
                },
                Err(err) => {
                    let reason = match err {
                        SortiumError::ModelLoad(reason) => reason,
                        other => other.to_string(),
                    };
                    tracing::error!(dir = %dir.display(), %reason, "artifact load failed");
                    Slot::Failed(reason)
                },
            };

            // Always publish the outcome, even past a poisoned lock; waiters
            // would otherwise spin on a permanently Loading slot.
            match slot.lock() {
                Ok(mut slot) => *slot = next,
                Err(poisoned) => *poisoned.into_inner() = next,
            }
            let _ = tx.send(true);
        });

        rx
    }
}
