// File-backed A/B image bank for host runs: two slot files plus a boot
// pointer file that only ever changes by atomic rename. Stands in for the
// flash OTA partitions an embedded port would use.

use crate::platform::{FlashError, ImageBank};
use crate::version::VersionToken;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// ESP application images start with this magic byte; finalize refuses
/// anything that does not look like one.
const IMAGE_MAGIC: u8 = 0xE9;

const BOOT_POINTER: &str = "boot_slot";

struct Staging {
    file: File,
    path: PathBuf,
    slot: &'static str,
    hasher: Sha256,
    bytes: u64,
    first_byte: Option<u8>,
    size_hint: Option<u64>,
}

pub struct FileBank {
    dir: PathBuf,
    running: VersionToken,
    staging: Option<Staging>,
}

impl FileBank {
    pub fn new(dir: impl Into<PathBuf>, running: VersionToken) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            running,
            staging: None,
        })
    }

    /// Slot currently marked as boot target; "a" when no pointer exists yet.
    pub fn boot_slot(&self) -> String {
        fs::read_to_string(self.dir.join(BOOT_POINTER))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "a".to_string())
    }

    fn inactive_slot(&self) -> &'static str {
        if self.boot_slot() == "a" {
            "b"
        } else {
            "a"
        }
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("slot_{}.bin", slot))
    }

    fn set_boot_slot(&self, slot: &str) -> Result<(), FlashError> {
        // Write-then-rename so a power cut mid-update never leaves a torn
        // boot pointer.
        let tmp = self.dir.join(format!("{}.tmp", BOOT_POINTER));
        fs::write(&tmp, slot).map_err(|_| FlashError::BootTargetFailed)?;
        fs::rename(&tmp, self.dir.join(BOOT_POINTER)).map_err(|_| FlashError::BootTargetFailed)
    }
}

impl ImageBank for FileBank {
    fn running_version(&self) -> VersionToken {
        self.running.clone()
    }

    fn begin_update(&mut self, size_hint: Option<u64>) -> Result<(), FlashError> {
        if self.staging.is_some() {
            return Err(FlashError::Busy);
        }
        let slot = self.inactive_slot();
        let path = self.slot_path(slot);
        let file = File::create(&path).map_err(|_| FlashError::BeginFailed)?;
        log::info!("Staging image into slot {} ({})", slot, path.display());
        self.staging = Some(Staging {
            file,
            path,
            slot,
            hasher: Sha256::new(),
            bytes: 0,
            first_byte: None,
            size_hint,
        });
        Ok(())
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<(), FlashError> {
        let staging = self.staging.as_mut().ok_or(FlashError::WriteFailed)?;
        staging.file.write_all(data).map_err(|_| FlashError::WriteFailed)?;
        staging.hasher.update(data);
        if staging.first_byte.is_none() {
            staging.first_byte = data.first().copied();
        }
        staging.bytes += data.len() as u64;
        Ok(())
    }

    fn finish_update(&mut self) -> Result<(), FlashError> {
        let mut staging = self.staging.take().ok_or(FlashError::ValidationFailed)?;
        staging.file.flush().map_err(|_| FlashError::WriteFailed)?;
        staging.file.sync_all().map_err(|_| FlashError::WriteFailed)?;
        drop(staging.file);

        if staging.bytes == 0 || staging.first_byte != Some(IMAGE_MAGIC) {
            log::error!("Staged image failed header validation");
            let _ = fs::remove_file(&staging.path);
            return Err(FlashError::ValidationFailed);
        }
        if let Some(expected) = staging.size_hint {
            if staging.bytes != expected {
                log::error!(
                    "Staged image truncated: {} of {} bytes",
                    staging.bytes,
                    expected
                );
                let _ = fs::remove_file(&staging.path);
                return Err(FlashError::ValidationFailed);
            }
        }

        let digest = staging.hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        let sidecar = self.dir.join(format!("slot_{}.sha256", staging.slot));
        fs::write(&sidecar, &hex).map_err(|_| FlashError::WriteFailed)?;

        self.set_boot_slot(staging.slot)?;
        log::info!(
            "Slot {} validated ({} bytes, sha256 {}) and marked bootable",
            staging.slot,
            staging.bytes,
            &hex[..12]
        );
        Ok(())
    }

    fn cancel_update(&mut self) {
        if let Some(staging) = self.staging.take() {
            log::warn!(
                "Discarding partial image in slot {} ({} bytes)",
                staging.slot,
                staging.bytes
            );
            drop(staging.file);
            let _ = fs::remove_file(&staging.path);
        }
    }
}

/// Read back the digest recorded for a slot, if any.
pub fn slot_digest(dir: &Path, slot: &str) -> Option<String> {
    fs::read_to_string(dir.join(format!("slot_{}.sha256", slot))).ok()
}
