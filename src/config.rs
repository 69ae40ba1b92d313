use crate::source::SourceShape;
use crate::transfer::RetryPolicy;
use crate::trust::TrustEntry;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Version source
    pub version_url: String,
    pub source_shape: SourceShape,

    // Firmware asset, used when the descriptor carries no URL
    pub firmware_url: String,

    // Scheduling
    pub poll_interval_secs: u64,

    // Transfer policy
    pub transfer_attempts: u32,
    pub retry_backoff_secs: u64,

    // How long the success signal stays up before the reboot request
    pub success_signal_secs: u64,

    // Trust ladder, strongest first. Weak rungs must be opted into here;
    // the default never bypasses verification.
    pub trust: Vec<TrustEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version_url: "https://ota.example.com/version.json".to_string(),
            source_shape: SourceShape::VersionJson,
            firmware_url: "https://ota.example.com/firmware.bin".to_string(),
            poll_interval_secs: 120,
            transfer_attempts: 2,
            retry_backoff_secs: 5,
            success_signal_secs: 2,
            trust: vec![TrustEntry::SystemRoots],
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn success_window(&self) -> Duration {
        Duration::from_secs(self.success_signal_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.transfer_attempts.max(1),
            backoff: Duration::from_secs(self.retry_backoff_secs),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

pub fn load_or_default(path: &Path) -> Result<Config> {
    match load_from_file(path) {
        Ok(config) => {
            log::info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Err(e) => {
            log::warn!(
                "Failed to load config from {}: {:?}, using defaults",
                path.display(),
                e
            );
            let config = Config::default();

            // Try to save the defaults for next time
            if let Err(save_err) = config.save(path) {
                log::warn!("Failed to save default config: {:?}", save_err);
            }

            Ok(config)
        }
    }
}

fn load_from_file(path: &Path) -> Result<Config> {
    let data = std::fs::read(path)?;
    let config: Config = serde_json::from_slice(&data)?;
    Ok(config)
}
