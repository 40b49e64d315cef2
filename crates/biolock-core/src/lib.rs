//! biolock - biometric app-lock guard
//!
//! This crate decides, at any instant, whether application content is
//! visible or hidden behind a biometric challenge:
//! - Capability probing and modality selection
//! - The lock state machine and its serialization discipline
//! - Persistence of the lock-on-launch flag
//! - Thin lock screen and settings controllers
//!
//! The platform biometric layer and the durable store are consumed through
//! the [`CapabilityProbe`] and [`KeyValueStore`] traits.

pub mod capability;
pub mod config;
pub mod error;
pub mod guard;
pub mod lock_screen;
pub mod settings;
pub mod store;

pub use capability::{
    CapabilityProbe, CapabilitySnapshot, ChallengeRequest, ChallengeResult, Modality,
    SimulatedProbe,
};
pub use config::GuardConfig;
pub use error::{ConfigError, LockError, ProbeError, Result, StoreError};
pub use guard::{GuardStatus, LifecycleEvent, LockGuard, LockState};
pub use lock_screen::{LockScreen, UnlockPrompt};
pub use settings::{Settings, SettingsView};
pub use store::{FileStore, KeyValueStore, LockConfig, MemoryStore, BIOMETRIC_ENABLED_KEY};
