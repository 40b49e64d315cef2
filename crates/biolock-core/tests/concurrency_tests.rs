//! Re-entrancy and supersede behaviour with a sensor whose prompts resolve
//! only when the test releases them

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, Notify};

use biolock_core::capability::ProbeResult;
use biolock_core::{
    CapabilityProbe, ChallengeRequest, ChallengeResult, LockError, LockGuard, LockState,
    MemoryStore, Modality, BIOMETRIC_ENABLED_KEY,
};

struct GatedProbe {
    started: Notify,
    release: Mutex<mpsc::UnboundedReceiver<bool>>,
    challenges: AtomicUsize,
}

impl GatedProbe {
    fn new() -> (Arc<Self>, mpsc::UnboundedSender<bool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = Arc::new(Self {
            started: Notify::new(),
            release: Mutex::new(rx),
            challenges: AtomicUsize::new(0),
        });
        (probe, tx)
    }

    fn challenge_count(&self) -> usize {
        self.challenges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilityProbe for GatedProbe {
    async fn has_hardware(&self) -> ProbeResult<bool> {
        Ok(true)
    }

    async fn is_enrolled(&self) -> ProbeResult<bool> {
        Ok(true)
    }

    async fn supported_modalities(&self) -> ProbeResult<Vec<Modality>> {
        Ok(vec![Modality::Fingerprint])
    }

    async fn challenge(&self, _request: &ChallengeRequest) -> ProbeResult<ChallengeResult> {
        self.challenges.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        let success = self.release.lock().await.recv().await.unwrap_or(false);
        Ok(ChallengeResult { success })
    }

    fn probe_type(&self) -> &'static str {
        "gated"
    }
}

async fn locked_guard() -> (Arc<LockGuard>, Arc<GatedProbe>, mpsc::UnboundedSender<bool>) {
    let (probe, release) = GatedProbe::new();
    let store = Arc::new(MemoryStore::with_entry(BIOMETRIC_ENABLED_KEY, "true"));
    let guard = Arc::new(LockGuard::with_defaults(probe.clone(), store).await);
    assert_eq!(guard.state(), LockState::Locked);
    (guard, probe, release)
}

#[tokio::test]
async fn test_second_attempt_is_rejected_without_challenge() {
    let (guard, probe, release) = locked_guard().await;

    let attempt = tokio::spawn({
        let guard = guard.clone();
        async move { guard.authenticate().await }
    });
    probe.started.notified().await;
    assert_eq!(guard.state(), LockState::Authenticating);

    assert_eq!(
        guard.authenticate().await,
        Err(LockError::AlreadyAuthenticating)
    );
    assert_eq!(guard.enable().await, Err(LockError::AlreadyAuthenticating));
    assert_eq!(probe.challenge_count(), 1);

    release.send(true).unwrap();
    assert_eq!(attempt.await.unwrap(), Ok(true));
    assert_eq!(guard.state(), LockState::Unlocked);
}

#[tokio::test]
async fn test_stale_success_after_reassertion_is_discarded() {
    let (guard, probe, release) = locked_guard().await;

    let attempt = tokio::spawn({
        let guard = guard.clone();
        async move { guard.authenticate().await }
    });
    probe.started.notified().await;

    guard.reassert_lock();
    guard.reassert_lock();
    assert_eq!(guard.state(), LockState::Locked);

    release.send(true).unwrap();
    assert_eq!(attempt.await.unwrap(), Ok(false));
    assert_eq!(guard.state(), LockState::Locked);
}

#[tokio::test]
async fn test_superseded_challenge_still_holds_sensor() {
    let (guard, probe, release) = locked_guard().await;

    let first = tokio::spawn({
        let guard = guard.clone();
        async move { guard.authenticate().await }
    });
    probe.started.notified().await;
    guard.reassert_lock();
    assert_eq!(guard.state(), LockState::Locked);

    assert_eq!(
        guard.authenticate().await,
        Err(LockError::AlreadyAuthenticating)
    );
    assert_eq!(guard.enable().await, Err(LockError::AlreadyAuthenticating));
    assert_eq!(probe.challenge_count(), 1);

    release.send(false).unwrap();
    assert_eq!(first.await.unwrap(), Ok(false));
    assert_eq!(guard.state(), LockState::Locked);

    // Once the old prompt returned, a fresh attempt gets the sensor
    let second = tokio::spawn({
        let guard = guard.clone();
        async move { guard.authenticate().await }
    });
    probe.started.notified().await;
    assert_eq!(guard.state(), LockState::Authenticating);
    assert_eq!(probe.challenge_count(), 2);

    release.send(true).unwrap();
    assert_eq!(second.await.unwrap(), Ok(true));
    assert_eq!(guard.state(), LockState::Unlocked);
}

#[tokio::test]
async fn test_disable_during_attempt_wins() {
    let (guard, probe, release) = locked_guard().await;

    let attempt = tokio::spawn({
        let guard = guard.clone();
        async move { guard.authenticate().await }
    });
    probe.started.notified().await;

    guard.disable().await.unwrap();
    assert_eq!(guard.state(), LockState::Unlocked);

    release.send(false).unwrap();
    assert_eq!(attempt.await.unwrap(), Ok(false));
    assert_eq!(guard.state(), LockState::Unlocked);
    assert!(!guard.is_enabled());
}

#[tokio::test]
async fn test_enable_waits_for_attempt_superseded_by_disable() {
    let (guard, probe, release) = locked_guard().await;

    let attempt = tokio::spawn({
        let guard = guard.clone();
        async move { guard.authenticate().await }
    });
    probe.started.notified().await;

    guard.disable().await.unwrap();
    assert_eq!(guard.enable().await, Err(LockError::AlreadyAuthenticating));
    assert_eq!(probe.challenge_count(), 1);

    release.send(true).unwrap();
    assert_eq!(attempt.await.unwrap(), Ok(false));
    assert_eq!(guard.state(), LockState::Unlocked);

    let enabling = tokio::spawn({
        let guard = guard.clone();
        async move { guard.enable().await }
    });
    probe.started.notified().await;
    assert_eq!(probe.challenge_count(), 2);

    release.send(true).unwrap();
    assert_eq!(enabling.await.unwrap(), Ok(()));
    assert!(guard.is_enabled());
    assert_eq!(guard.state(), LockState::Locked);
}

#[tokio::test]
async fn test_enable_challenge_blocks_unlock_attempts() {
    let (probe, release) = GatedProbe::new();
    let store = Arc::new(MemoryStore::new());
    let guard = Arc::new(LockGuard::with_defaults(probe.clone(), store).await);

    let enabling = tokio::spawn({
        let guard = guard.clone();
        async move { guard.enable().await }
    });
    probe.started.notified().await;

    assert_eq!(
        guard.authenticate().await,
        Err(LockError::AlreadyAuthenticating)
    );
    assert_eq!(probe.challenge_count(), 1);

    release.send(true).unwrap();
    assert_eq!(enabling.await.unwrap(), Ok(()));
    assert_eq!(guard.state(), LockState::Locked);
}
