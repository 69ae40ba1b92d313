// Firmware version tokens and the update decision policy

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a firmware build, as read from the image bank or a
/// version source. Never edited after construction; only compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse as a `major.minor.patch` triple. Accepts an optional leading
    /// `v`/`V` since release tags commonly carry one (e.g. "v1.0.2").
    fn as_triple(&self) -> Option<(u32, u32, u32)> {
        let s = self
            .0
            .strip_prefix('v')
            .or_else(|| self.0.strip_prefix('V'))
            .unwrap_or(&self.0);
        let mut parts = s.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some((major, minor, patch))
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Decide whether `candidate` supersedes `current`.
///
/// Primary policy: both tokens parse as `major.minor.patch`, compared as a
/// 3-tuple (major first). This refuses stale or out-of-order remote tokens,
/// so the device never downgrades itself into an update loop.
///
/// Fallback policy: if either token is not a numeric triple, any difference
/// counts as newer. This is deliberately weaker - it cannot tell a downgrade
/// from an upgrade - and exists only for deployments with non-semantic
/// version strings.
pub fn is_newer(current: &VersionToken, candidate: &VersionToken) -> bool {
    match (current.as_triple(), candidate.as_triple()) {
        (Some(cur), Some(cand)) => cand > cur,
        _ => current != candidate,
    }
}
