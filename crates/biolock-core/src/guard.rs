//! Biometric lock state machine
//!
//! The guard is the single source of truth for whether app content may be
//! shown. It is advanced only by [`LockGuard::enable`], [`LockGuard::disable`],
//! [`LockGuard::authenticate`] and [`LockGuard::reassert_lock`].
//!
//! # Serialization
//!
//! All state reads and writes happen under one mutex. The hardware challenge
//! runs with the mutex released so a lifecycle signal can supersede it and a
//! second caller can be rejected immediately. Every unlock attempt carries a
//! generation number; an outcome is applied only if the guard is still
//! `Authenticating` at that generation, so the most recent lifecycle signal
//! always wins over a stale result. A superseded challenge still holds the
//! sensor until it returns, and no new challenge is issued before then.
//!
//! Store writes are serialized by a separate async lock and committed to
//! memory only after they succeed, so the in-memory flag never diverges from
//! the last persisted value. Write and commit run together on a spawned task
//! and finish even if the caller stops waiting.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::capability::{self, CapabilityProbe, CapabilitySnapshot, ChallengeResult, ProbeResult};
use crate::config::GuardConfig;
use crate::error::{LockError, Result};
use crate::store::{KeyValueStore, LockConfig};

/// Whether app content is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockState {
    /// Content visible
    Unlocked,
    /// Content hidden behind the lock screen
    Locked,
    /// A biometric prompt is on screen
    Authenticating,
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Unlocked => f.write_str("unlocked"),
            LockState::Locked => f.write_str("locked"),
            LockState::Authenticating => f.write_str("authenticating"),
        }
    }
}

/// App lifecycle signal from the host shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// App moved to the background
    Background,
    /// App resumed in the foreground
    Foreground,
}

/// Published view of the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardStatus {
    pub state: LockState,
    pub enabled: bool,
    pub capability: CapabilitySnapshot,
}

impl GuardStatus {
    /// Whether content must be hidden
    pub fn is_locked(&self) -> bool {
        self.state != LockState::Unlocked
    }
}

struct Inner {
    state: LockState,
    enabled: bool,
    capability: CapabilitySnapshot,
    /// Advanced on every attempt start and every supersede
    generation: u64,
    /// State restored when the in-flight attempt fails
    resume_to: LockState,
    /// A hardware challenge was issued and has not returned yet, even if its
    /// attempt was superseded
    challenge_outstanding: bool,
}

impl Inner {
    fn status(&self) -> GuardStatus {
        GuardStatus {
            state: self.state,
            enabled: self.enabled,
            capability: self.capability,
        }
    }

    fn lock_required(&self) -> bool {
        self.enabled && self.capability.available
    }

    fn challenge_in_flight(&self) -> bool {
        self.challenge_outstanding || self.state == LockState::Authenticating
    }
}

/// State shared with spawned persist tasks
struct Shared {
    inner: Mutex<Inner>,
    status_tx: watch::Sender<GuardStatus>,
}

impl Shared {
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.status_tx.send_replace(inner.status());
    }
}

/// Biometric app-lock guard
///
/// Construct once at startup and share by `Arc`.
pub struct LockGuard {
    shared: Arc<Shared>,
    /// Serializes persist-then-commit sequences
    write_lock: Arc<tokio::sync::Mutex<()>>,
    probe: Arc<dyn CapabilityProbe>,
    store: Arc<dyn KeyValueStore>,
    config: GuardConfig,
}

impl LockGuard {
    /// Probe the device, read the persisted flag and compute the initial state
    pub async fn initialize(
        probe: Arc<dyn CapabilityProbe>,
        store: Arc<dyn KeyValueStore>,
        config: GuardConfig,
    ) -> Self {
        let capability = capability::probe(probe.as_ref()).await;
        let lock_config = LockConfig::load(store.as_ref(), &config.store_key).await;

        let state = if lock_config.enabled && capability.available {
            LockState::Locked
        } else {
            LockState::Unlocked
        };

        let inner = Inner {
            state,
            enabled: lock_config.enabled,
            capability,
            generation: 0,
            resume_to: state,
            challenge_outstanding: false,
        };

        info!(
            state = %state,
            enabled = lock_config.enabled,
            available = capability.available,
            "Lock guard initialized"
        );

        let (status_tx, _) = watch::channel(inner.status());

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                status_tx,
            }),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
            probe,
            store,
            config,
        }
    }

    /// Initialize with the default configuration
    pub async fn with_defaults(
        probe: Arc<dyn CapabilityProbe>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::initialize(probe, store, GuardConfig::default()).await
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.shared.lock_inner()
    }

    fn publish(&self, inner: &Inner) {
        self.shared.publish(inner);
    }

    /// Current published status
    pub fn status(&self) -> GuardStatus {
        self.lock_inner().status()
    }

    pub fn state(&self) -> LockState {
        self.lock_inner().state
    }

    /// Whether content must currently be hidden
    pub fn is_locked(&self) -> bool {
        self.state() != LockState::Unlocked
    }

    pub fn is_enabled(&self) -> bool {
        self.lock_inner().enabled
    }

    /// Last capability snapshot
    pub fn capability(&self) -> CapabilitySnapshot {
        self.lock_inner().capability
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Receive every status change
    pub fn subscribe(&self) -> watch::Receiver<GuardStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Turn lock-on-launch on after a proof-of-possession challenge
    pub async fn enable(&self) -> Result<()> {
        let request = {
            let mut inner = self.lock_inner();
            if !inner.capability.available {
                return Err(LockError::CapabilityUnavailable);
            }
            if inner.challenge_in_flight() {
                return Err(LockError::AlreadyAuthenticating);
            }
            inner.challenge_outstanding = true;
            self.config.enable_request()
        };

        let mut pending = PendingChallenge::enable(self);
        let outcome = self.probe.challenge(&request).await;
        pending.settle();

        if !challenge_passed(outcome) {
            info!("Enable challenge not passed, lock stays disabled");
            return Err(LockError::ChallengeFailed);
        }

        self.persist(true).await
    }

    /// Turn lock-on-launch off and reveal content
    ///
    /// On a failed write nothing in memory changes.
    pub async fn disable(&self) -> Result<()> {
        self.persist(false).await
    }

    /// Write the flag, then commit it to memory
    ///
    /// The write and the commit run on their own task, so dropping the
    /// caller's future never leaves a completed write uncommitted.
    async fn persist(&self, enabled: bool) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let store = Arc::clone(&self.store);
        let write_lock = Arc::clone(&self.write_lock);
        let key = self.config.store_key.clone();

        let task = tokio::spawn(async move {
            let _write = write_lock.lock().await;
            if let Err(e) = (LockConfig { enabled }).save(store.as_ref(), &key).await {
                warn!(enabled, "Failed to persist lock flag: {}", e);
                return Err(LockError::from(e));
            }

            let mut inner = shared.lock_inner();
            inner.enabled = enabled;
            inner.generation += 1;
            inner.state = if enabled {
                LockState::Locked
            } else {
                LockState::Unlocked
            };
            shared.publish(&inner);
            info!(enabled, "Biometric lock setting committed");

            Ok(())
        });

        task.await.map_err(|e| LockError::StoreWriteFailed(e.to_string()))?
    }

    /// Run one biometric challenge
    ///
    /// Returns `Ok(true)` when the app was unlocked, `Ok(false)` when the user
    /// declined, the sensor failed, or the attempt was superseded by a
    /// lifecycle signal before it resolved.
    pub async fn authenticate(&self) -> Result<bool> {
        let (generation, request) = {
            let mut inner = self.lock_inner();
            if !inner.capability.available {
                return Err(LockError::CapabilityUnavailable);
            }
            if inner.challenge_in_flight() {
                debug!("Rejecting re-entrant authentication attempt");
                return Err(LockError::AlreadyAuthenticating);
            }

            inner.resume_to = inner.state;
            inner.state = LockState::Authenticating;
            inner.generation += 1;
            inner.challenge_outstanding = true;
            self.publish(&inner);

            (
                inner.generation,
                self.config.unlock_request(inner.capability.modality),
            )
        };

        let mut pending = PendingChallenge::unlock(self, generation);
        let outcome = self.probe.challenge(&request).await;
        pending.settle();

        let success = challenge_passed(outcome);

        let mut inner = self.lock_inner();
        if inner.state != LockState::Authenticating || inner.generation != generation {
            debug!(
                generation,
                success, "Discarding superseded authentication outcome"
            );
            return Ok(false);
        }

        inner.state = if success {
            LockState::Unlocked
        } else {
            inner.resume_to
        };
        self.publish(&inner);
        info!(state = %inner.state, success, "Authentication attempt resolved");

        Ok(success)
    }

    /// Force the locked state if the lock is enabled and usable
    ///
    /// Supersedes any in-flight attempt. The superseded challenge still
    /// occupies the sensor until it returns.
    pub fn reassert_lock(&self) {
        let mut inner = self.lock_inner();
        if !inner.lock_required() {
            return;
        }

        if inner.state == LockState::Authenticating {
            debug!("Superseding in-flight authentication attempt");
        }
        inner.generation += 1;
        inner.state = LockState::Locked;
        self.publish(&inner);
        info!("Lock reasserted");
    }

    /// Feed a host lifecycle signal
    pub fn handle_lifecycle(&self, event: LifecycleEvent) {
        debug!(?event, "Lifecycle event");
        self.reassert_lock();
    }

    /// Re-probe the device
    ///
    /// Losing capability releases a held lock, since a device that cannot
    /// authenticate cannot be locked. Gaining capability never locks by
    /// itself; that waits for the next reassertion.
    pub async fn refresh_capability(&self) -> CapabilitySnapshot {
        let snapshot = capability::probe(self.probe.as_ref()).await;

        let mut inner = self.lock_inner();
        inner.capability = snapshot;
        if !snapshot.available {
            match inner.state {
                LockState::Locked => {
                    inner.generation += 1;
                    inner.state = LockState::Unlocked;
                    info!("Biometric capability lost, releasing lock");
                }
                LockState::Authenticating => inner.resume_to = LockState::Unlocked,
                LockState::Unlocked => {}
            }
        }
        self.publish(&inner);

        snapshot
    }
}

fn challenge_passed(outcome: ProbeResult<ChallengeResult>) -> bool {
    match outcome {
        Ok(result) => result.success,
        Err(e) => {
            warn!("Biometric challenge failed: {}", e);
            false
        }
    }
}

enum PendingKind {
    Enable,
    Unlock { generation: u64 },
}

/// Rolls back a challenge whose future was dropped before resolving
struct PendingChallenge<'a> {
    guard: &'a LockGuard,
    kind: PendingKind,
    armed: bool,
}

impl<'a> PendingChallenge<'a> {
    fn enable(guard: &'a LockGuard) -> Self {
        Self {
            guard,
            kind: PendingKind::Enable,
            armed: true,
        }
    }

    fn unlock(guard: &'a LockGuard, generation: u64) -> Self {
        Self {
            guard,
            kind: PendingKind::Unlock { generation },
            armed: true,
        }
    }

    /// The challenge returned; free the sensor and disarm
    fn settle(&mut self) {
        self.guard.lock_inner().challenge_outstanding = false;
        self.armed = false;
    }
}

impl Drop for PendingChallenge<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut inner = self.guard.lock_inner();
        inner.challenge_outstanding = false;
        match self.kind {
            PendingKind::Enable => {}
            PendingKind::Unlock { generation } => {
                if inner.state == LockState::Authenticating && inner.generation == generation {
                    inner.state = inner.resume_to;
                    self.guard.publish(&inner);
                    debug!(
                        generation,
                        "Authentication attempt dropped, treated as cancelled"
                    );
                }
            }
        }
    }
}
