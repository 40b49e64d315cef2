//! Biometric capability abstraction
//!
//! This module defines the contract the guard consumes from the platform's
//! biometric layer:
//! - hardware presence and enrollment queries
//! - the set of supported modalities
//! - the authentication challenge itself
//!
//! # Failure Model
//!
//! Every call is fallible on its own. [`probe`] folds any failure into an
//! unavailable [`CapabilitySnapshot`] so a misbehaving sensor degrades the
//! lock to "unavailable" instead of surfacing an error.

pub mod simulated;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ProbeError;

pub use simulated::SimulatedProbe;

/// Result type alias for probe calls
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// Kind of biometric factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Fingerprint sensor
    Fingerprint,
    /// Facial recognition
    Face,
    /// Iris scanner
    Iris,
    /// Unspecified platform biometric
    Generic,
}

/// Selection order, first match wins
pub const MODALITY_PRIORITY: [Modality; 4] = [
    Modality::Fingerprint,
    Modality::Face,
    Modality::Iris,
    Modality::Generic,
];

impl Modality {
    /// Human-readable name shown on lock and settings screens
    pub fn display_name(&self) -> &'static str {
        match self {
            Modality::Fingerprint => "Fingerprint",
            Modality::Face => "Face Recognition",
            Modality::Iris => "Iris",
            Modality::Generic => "Biometric",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Pick the highest-priority modality from a supported set
pub fn select_modality(supported: &[Modality]) -> Option<Modality> {
    MODALITY_PRIORITY
        .iter()
        .copied()
        .find(|m| supported.contains(m))
}

/// Point-in-time view of what the device can do
///
/// Recomputed on every probe and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    /// Biometric hardware exists
    pub hardware_present: bool,
    /// At least one biometric is enrolled
    pub enrolled: bool,
    /// `hardware_present && enrolled`
    pub available: bool,
    /// Selected modality, `None` whenever `available` is false
    pub modality: Option<Modality>,
}

impl CapabilitySnapshot {
    /// Build a snapshot, suppressing the modality when nothing can authenticate
    pub fn new(hardware_present: bool, enrolled: bool, supported: &[Modality]) -> Self {
        let available = hardware_present && enrolled;
        let modality = if available {
            Some(select_modality(supported).unwrap_or(Modality::Generic))
        } else {
            None
        };

        Self {
            hardware_present,
            enrolled,
            available,
            modality,
        }
    }

    /// Snapshot used when the platform cannot be queried
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Display name for the selected modality, falling back to the generic label
    pub fn modality_name(&self) -> &'static str {
        self.modality
            .unwrap_or(Modality::Generic)
            .display_name()
    }
}

/// Parameters for a single biometric prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRequest {
    /// Message shown in the system prompt
    pub prompt: String,
    /// Label for the platform's passcode fallback button
    pub fallback_label: String,
    /// Let the platform offer its own passcode fallback
    pub allow_device_fallback: bool,
}

impl ChallengeRequest {
    /// Create a request with the default fallback settings
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            fallback_label: "Use passcode".to_string(),
            allow_device_fallback: true,
        }
    }
}

/// Outcome of a biometric prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeResult {
    /// The user proved possession
    pub success: bool,
}

impl ChallengeResult {
    pub fn success() -> Self {
        Self { success: true }
    }

    pub fn declined() -> Self {
        Self { success: false }
    }
}

/// Platform biometric layer
///
/// Implementations own their own timeouts; the guard never cancels a call.
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    /// Whether biometric hardware exists
    async fn has_hardware(&self) -> ProbeResult<bool>;

    /// Whether at least one biometric is enrolled
    async fn is_enrolled(&self) -> ProbeResult<bool>;

    /// All modalities the platform reports, in any order
    async fn supported_modalities(&self) -> ProbeResult<Vec<Modality>>;

    /// Show a biometric prompt and wait for its outcome
    async fn challenge(&self, request: &ChallengeRequest) -> ProbeResult<ChallengeResult>;

    /// Short identifier for logs
    fn probe_type(&self) -> &'static str;
}

/// Query the platform and build a snapshot
///
/// Never fails: any probe error yields [`CapabilitySnapshot::unavailable`].
pub async fn probe(probe: &dyn CapabilityProbe) -> CapabilitySnapshot {
    match query(probe).await {
        Ok(snapshot) => {
            debug!(
                probe = probe.probe_type(),
                available = snapshot.available,
                modality = ?snapshot.modality,
                "Capability probed"
            );
            snapshot
        }
        Err(e) => {
            warn!(probe = probe.probe_type(), "Capability probe failed: {}", e);
            CapabilitySnapshot::unavailable()
        }
    }
}

async fn query(probe: &dyn CapabilityProbe) -> ProbeResult<CapabilitySnapshot> {
    let hardware_present = probe.has_hardware().await?;
    let enrolled = probe.is_enrolled().await?;
    let supported = probe.supported_modalities().await?;

    Ok(CapabilitySnapshot::new(hardware_present, enrolled, &supported))
}
