//! Scriptable in-process sensor
//!
//! Used by the demo shell and by tests in place of a platform biometric layer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::{CapabilityProbe, ChallengeRequest, ChallengeResult, Modality, ProbeResult};
use crate::error::ProbeError;

/// Simulated biometric sensor
pub struct SimulatedProbe {
    hardware: AtomicBool,
    enrolled: AtomicBool,
    modalities: RwLock<Vec<Modality>>,
    /// Default outcome when no scripted outcome is queued
    accept: AtomicBool,
    /// Queued outcomes, consumed one per challenge
    script: Mutex<VecDeque<bool>>,
    fail_queries: AtomicBool,
    fail_challenges: AtomicBool,
    latency: Duration,
    challenges: AtomicUsize,
}

impl SimulatedProbe {
    /// Create a sensor that accepts every challenge
    pub fn new(hardware: bool, enrolled: bool, modalities: Vec<Modality>) -> Self {
        Self {
            hardware: AtomicBool::new(hardware),
            enrolled: AtomicBool::new(enrolled),
            modalities: RwLock::new(modalities),
            accept: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            fail_queries: AtomicBool::new(false),
            fail_challenges: AtomicBool::new(false),
            latency: Duration::ZERO,
            challenges: AtomicUsize::new(0),
        }
    }

    /// Fingerprint sensor with an enrolled finger
    pub fn fingerprint() -> Self {
        Self::new(true, true, vec![Modality::Fingerprint])
    }

    /// Device without biometric hardware
    pub fn absent() -> Self {
        Self::new(false, false, Vec::new())
    }

    /// Delay every challenge by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Set the default challenge outcome
    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn set_enrolled(&self, enrolled: bool) {
        self.enrolled.store(enrolled, Ordering::SeqCst);
    }

    pub fn set_hardware(&self, hardware: bool) {
        self.hardware.store(hardware, Ordering::SeqCst);
    }

    pub async fn set_modalities(&self, modalities: Vec<Modality>) {
        *self.modalities.write().await = modalities;
    }

    /// Queue outcomes for the next challenges, in order
    pub async fn script(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.script.lock().await.extend(outcomes);
    }

    /// Make every capability query return an error
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make every challenge return an error
    pub fn fail_challenges(&self, fail: bool) {
        self.fail_challenges.store(fail, Ordering::SeqCst);
    }

    /// Number of challenges shown so far
    pub fn challenge_count(&self) -> usize {
        self.challenges.load(Ordering::SeqCst)
    }

    fn check_queries(&self) -> ProbeResult<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(ProbeError::Hardware("simulated sensor fault".to_string()));
        }
        Ok(())
    }
}

impl Default for SimulatedProbe {
    fn default() -> Self {
        Self::fingerprint()
    }
}

#[async_trait]
impl CapabilityProbe for SimulatedProbe {
    async fn has_hardware(&self) -> ProbeResult<bool> {
        self.check_queries()?;
        Ok(self.hardware.load(Ordering::SeqCst))
    }

    async fn is_enrolled(&self) -> ProbeResult<bool> {
        self.check_queries()?;
        Ok(self.enrolled.load(Ordering::SeqCst))
    }

    async fn supported_modalities(&self) -> ProbeResult<Vec<Modality>> {
        self.check_queries()?;
        Ok(self.modalities.read().await.clone())
    }

    async fn challenge(&self, request: &ChallengeRequest) -> ProbeResult<ChallengeResult> {
        self.challenges.fetch_add(1, Ordering::SeqCst);
        debug!(prompt = %request.prompt, "Simulated challenge shown");

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.fail_challenges.load(Ordering::SeqCst) {
            return Err(ProbeError::Hardware("simulated sensor fault".to_string()));
        }

        let scripted = self.script.lock().await.pop_front();
        let success = scripted.unwrap_or_else(|| self.accept.load(Ordering::SeqCst));

        Ok(ChallengeResult { success })
    }

    fn probe_type(&self) -> &'static str {
        "simulated"
    }
}
