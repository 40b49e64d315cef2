//! Lock screen controller
//!
//! Drives unlock attempts through the guard and turns the outcome into
//! something a screen can render: a message and whether to offer a retry.

use std::sync::Arc;

use crate::error::LockError;
use crate::guard::{LockGuard, LockState};

/// Outcome of one unlock attempt from the lock screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockPrompt {
    /// Content may be shown
    Unlocked,
    /// User declined, wrong biometric, or the attempt was superseded
    Declined,
    /// Another prompt is already on screen
    Busy,
    /// The device cannot authenticate; retrying will not help
    Unavailable,
}

impl UnlockPrompt {
    /// Text for the alert shown after the attempt
    pub fn message(&self) -> &'static str {
        match self {
            UnlockPrompt::Unlocked => "Unlocked",
            UnlockPrompt::Declined => "Please try again or use your device passcode.",
            UnlockPrompt::Busy => "Authenticating...",
            UnlockPrompt::Unavailable => {
                "Biometric authentication is not available on this device."
            }
        }
    }

    /// Whether a "Try Again" affordance makes sense
    pub fn can_retry(&self) -> bool {
        matches!(self, UnlockPrompt::Declined | UnlockPrompt::Busy)
    }
}

/// Controller behind the lock screen
pub struct LockScreen {
    guard: Arc<LockGuard>,
}

impl LockScreen {
    pub fn new(guard: Arc<LockGuard>) -> Self {
        Self { guard }
    }

    /// Whether the lock screen must cover app content
    pub fn should_show(&self) -> bool {
        self.guard.is_locked()
    }

    /// Headline under the sensor button
    pub fn sensor_label(&self) -> String {
        let status = self.guard.status();
        if status.state == LockState::Authenticating {
            return "Authenticating...".to_string();
        }
        format!("Touch {} sensor", status.capability.modality_name())
    }

    /// Secondary instruction text
    pub fn instruction(&self) -> String {
        let name = self.guard.capability().modality_name().to_lowercase();
        format!("Use your {} to unlock the app", name)
    }

    /// Run one unlock attempt
    ///
    /// Nothing is shown to the sensor when the guard is already unlocked.
    pub async fn attempt_unlock(&self) -> UnlockPrompt {
        if self.guard.state() == LockState::Unlocked {
            return UnlockPrompt::Unlocked;
        }

        match self.guard.authenticate().await {
            Ok(true) => UnlockPrompt::Unlocked,
            Ok(false) => UnlockPrompt::Declined,
            Err(LockError::AlreadyAuthenticating) => UnlockPrompt::Busy,
            Err(LockError::CapabilityUnavailable) => UnlockPrompt::Unavailable,
            // authenticate never writes to the store
            Err(LockError::ChallengeFailed) | Err(LockError::StoreWriteFailed(_)) => {
                UnlockPrompt::Declined
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Modality, SimulatedProbe};
    use crate::store::{MemoryStore, BIOMETRIC_ENABLED_KEY};

    async fn locked_screen(probe: Arc<SimulatedProbe>) -> (LockScreen, Arc<LockGuard>) {
        let store = Arc::new(MemoryStore::with_entry(BIOMETRIC_ENABLED_KEY, "true"));
        let guard = Arc::new(LockGuard::with_defaults(probe, store).await);
        (LockScreen::new(guard.clone()), guard)
    }

    #[tokio::test]
    async fn test_labels_follow_modality() {
        let probe = Arc::new(SimulatedProbe::new(true, true, vec![Modality::Face]));
        let (screen, _) = locked_screen(probe).await;

        assert!(screen.should_show());
        assert_eq!(screen.sensor_label(), "Touch Face Recognition sensor");
        assert_eq!(screen.instruction(), "Use your face recognition to unlock the app");
    }

    #[tokio::test]
    async fn test_declined_offers_retry() {
        let probe = Arc::new(SimulatedProbe::fingerprint());
        probe.script([false, true]).await;
        let (screen, guard) = locked_screen(probe).await;

        let first = screen.attempt_unlock().await;
        assert_eq!(first, UnlockPrompt::Declined);
        assert!(first.can_retry());
        assert!(guard.is_locked());

        assert_eq!(screen.attempt_unlock().await, UnlockPrompt::Unlocked);
        assert!(!screen.should_show());
    }

    #[tokio::test]
    async fn test_unlocked_guard_skips_sensor() {
        let probe = Arc::new(SimulatedProbe::fingerprint());
        let guard = Arc::new(
            LockGuard::with_defaults(probe.clone(), Arc::new(MemoryStore::new())).await,
        );
        let screen = LockScreen::new(guard);

        assert_eq!(screen.attempt_unlock().await, UnlockPrompt::Unlocked);
        assert_eq!(probe.challenge_count(), 0);
    }

    #[test]
    fn test_unavailable_is_not_retryable() {
        assert!(!UnlockPrompt::Unavailable.can_retry());
        assert!(UnlockPrompt::Declined.can_retry());
    }
}
