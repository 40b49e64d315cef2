//! Settings screen controller

use std::sync::Arc;

use serde::Serialize;

use crate::error::{LockError, Result};
use crate::guard::LockGuard;

/// What the settings screen renders for the app-lock section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsView {
    pub available: bool,
    pub enabled: bool,
    /// Modality display name when the device can authenticate
    pub modality: Option<&'static str>,
    /// The toggle is only interactive when the device can authenticate
    pub toggle_enabled: bool,
    pub description: String,
}

/// Controller behind the settings screen
pub struct Settings {
    guard: Arc<LockGuard>,
}

impl Settings {
    pub fn new(guard: Arc<LockGuard>) -> Self {
        Self { guard }
    }

    pub fn describe(&self) -> SettingsView {
        let status = self.guard.status();
        let capability = status.capability;

        let description = if capability.available {
            format!(
                "Secure your app with {} authentication",
                capability.modality_name()
            )
        } else {
            "Biometric authentication is not available on this device".to_string()
        };

        SettingsView {
            available: capability.available,
            enabled: status.enabled,
            modality: capability.modality.map(|m| m.display_name()),
            toggle_enabled: capability.available,
            description,
        }
    }

    /// Flip the app-lock toggle, returning the confirmation text
    pub async fn set_lock_enabled(&self, enabled: bool) -> Result<String> {
        if enabled {
            self.guard.enable().await?;
            Ok(format!(
                "Your app is now secured with {} authentication.",
                self.guard.capability().modality_name()
            ))
        } else {
            self.guard.disable().await?;
            Ok("Your app is no longer protected by biometric authentication.".to_string())
        }
    }

    /// Run a challenge without changing the lock setting
    ///
    /// A failed test never locks the app.
    pub async fn test_authentication(&self) -> Result<String> {
        if !self.guard.capability().available {
            return Err(LockError::CapabilityUnavailable);
        }

        let passed = self.guard.authenticate().await?;
        Ok(if passed {
            "Biometric authentication successful!".to_string()
        } else {
            "Authentication failed or cancelled.".to_string()
        })
    }
}
