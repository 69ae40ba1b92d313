// Transport trust ladder: the ordered list of transport-security
// configurations an operation may attempt, strongest first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One rung of the trust ladder. Profiles are configured strongest-first and
/// walked downward; every downgrade is logged so a weakened transport is
/// always visible in the device log, never a silent fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TrustEntry {
    /// Verified TLS against a single pinned CA certificate (PEM).
    PinnedCa { ca_pem: String },
    /// Verified TLS against the platform's bundled root store.
    SystemRoots,
    /// TLS with certificate chain and hostname verification disabled.
    NoVerification,
    /// No TLS at all; the asset URL is downgraded to plain HTTP.
    Plaintext,
}

impl TrustEntry {
    /// Certificate validation needs a sane wall clock. While time is unsynced
    /// these entries are skipped rather than failed, so the ladder can still
    /// reach a weaker rung that works.
    pub fn requires_wall_clock(&self) -> bool {
        matches!(self, TrustEntry::PinnedCa { .. } | TrustEntry::SystemRoots)
    }

    /// Short label for downgrade logging.
    pub fn label(&self) -> &'static str {
        match self {
            TrustEntry::PinnedCa { .. } => "pinned-ca",
            TrustEntry::SystemRoots => "system-roots",
            TrustEntry::NoVerification => "no-verification",
            TrustEntry::Plaintext => "plaintext",
        }
    }
}

impl fmt::Display for TrustEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_entries_need_wall_clock() {
        assert!(TrustEntry::SystemRoots.requires_wall_clock());
        assert!(TrustEntry::PinnedCa { ca_pem: String::new() }.requires_wall_clock());
        assert!(!TrustEntry::NoVerification.requires_wall_clock());
        assert!(!TrustEntry::Plaintext.requires_wall_clock());
    }

    #[test]
    fn serde_tagged_representation() {
        let json = r#"[{"mode":"system_roots"},{"mode":"no_verification"}]"#;
        let ladder: Vec<TrustEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(ladder, vec![TrustEntry::SystemRoots, TrustEntry::NoVerification]);
    }
}
