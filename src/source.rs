// Version source client: asks the distribution point what the latest
// firmware is and turns the reply into a typed descriptor.

use crate::platform::{Clock, FetchResponse, Transport};
use crate::trust::TrustEntry;
use crate::version::VersionToken;
use serde::Deserialize;

/// Upper bound on a version descriptor body. Anything larger than this is
/// not a descriptor, whatever the server thinks it is sending.
const DESCRIPTOR_CAP: usize = 8 * 1024;

const READ_BUF: usize = 1024;

/// What the configured version endpoint returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceShape {
    /// A bare version string, e.g. the body is `1.0.2\n`.
    PlainText,
    /// `{"version": "...", "url": "..."}` with the url optional.
    VersionJson,
    /// A GitHub-style release document; `tag_name` carries the version and
    /// the first asset's `browser_download_url` the optional firmware URL.
    ReleaseIndex,
}

/// Result of one version query. Created per query, discarded after the
/// update decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDescriptor {
    pub version: VersionToken,
    pub asset_url: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("version source unreachable: {0}")]
    Unreachable(String),
    #[error("version source returned HTTP {0}")]
    BadStatus(u16),
    #[error("malformed version descriptor: {0}")]
    MalformedBody(String),
}

#[derive(Deserialize)]
struct VersionJsonBody {
    version: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct ReleaseAsset {
    browser_download_url: String,
}

#[derive(Deserialize)]
struct ReleaseIndexBody {
    tag_name: String,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

/// The configured version endpoint. Performs exactly one query per
/// `fetch_latest` call; retrying across cycles is the orchestrator's job.
pub struct VersionSource {
    url: String,
    shape: SourceShape,
}

impl VersionSource {
    pub fn new(url: impl Into<String>, shape: SourceShape) -> Self {
        Self { url: url.into(), shape }
    }

    /// Query the source once, walking the trust ladder until some entry
    /// yields an HTTP response. Ladder entries that need certificate
    /// validation are skipped while wall-clock time is unsynced.
    pub fn fetch_latest(
        &self,
        transport: &dyn Transport,
        trust: &[TrustEntry],
        clock: &dyn Clock,
    ) -> Result<UpdateDescriptor, SourceError> {
        let mut last_err = String::from("empty trust profile");

        for (rung, entry) in trust.iter().enumerate() {
            if entry.requires_wall_clock() && !clock.wall_clock_synced() {
                log::warn!("Skipping trust entry {} (wall clock unsynced)", entry);
                continue;
            }
            if rung > 0 {
                log::warn!("Version check downgrading transport trust to {}", entry);
            }

            let mut response = match transport.fetch(&self.url, entry) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("Version check via {} failed: {}", entry, e);
                    last_err = e.to_string();
                    continue;
                }
            };

            let status = response.status();
            if !(200..300).contains(&status) {
                // The server answered; a weaker transport will not change that.
                return Err(SourceError::BadStatus(status));
            }

            let body = read_bounded(response.as_mut()).map_err(|e| {
                log::warn!("Version body read via {} failed: {}", entry, e);
                e
            })?;
            return parse_descriptor(self.shape, &body);
        }

        Err(SourceError::Unreachable(last_err))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Drain the response into a capped buffer. The descriptor endpoints serve a
/// handful of bytes; refusing anything past the cap keeps a misconfigured
/// URL (say, pointed at the firmware binary) from ballooning the heap.
fn read_bounded(response: &mut dyn FetchResponse) -> Result<Vec<u8>, SourceError> {
    let mut body = Vec::new();
    let mut buf = [0u8; READ_BUF];
    loop {
        let n = response
            .next_chunk(&mut buf)
            .map_err(|e| SourceError::Unreachable(format!("read interrupted: {}", e)))?;
        if n == 0 {
            return Ok(body);
        }
        if body.len() + n > DESCRIPTOR_CAP {
            return Err(SourceError::MalformedBody(format!(
                "descriptor exceeds {} byte cap",
                DESCRIPTOR_CAP
            )));
        }
        body.extend_from_slice(&buf[..n]);
    }
}

/// Turn a raw descriptor body into a typed descriptor. Missing or
/// wrong-typed fields are rejected outright; no partial matches.
pub fn parse_descriptor(shape: SourceShape, body: &[u8]) -> Result<UpdateDescriptor, SourceError> {
    match shape {
        SourceShape::PlainText => {
            let text = std::str::from_utf8(body)
                .map_err(|_| SourceError::MalformedBody("descriptor is not UTF-8".into()))?;
            let token = text.trim();
            if token.is_empty() {
                return Err(SourceError::MalformedBody("empty version token".into()));
            }
            Ok(UpdateDescriptor {
                version: VersionToken::new(token),
                asset_url: None,
            })
        }
        SourceShape::VersionJson => {
            let parsed: VersionJsonBody = serde_json::from_slice(body)
                .map_err(|e| SourceError::MalformedBody(e.to_string()))?;
            Ok(UpdateDescriptor {
                version: VersionToken::new(parsed.version),
                asset_url: parsed.url,
            })
        }
        SourceShape::ReleaseIndex => {
            let parsed: ReleaseIndexBody = serde_json::from_slice(body)
                .map_err(|e| SourceError::MalformedBody(e.to_string()))?;
            Ok(UpdateDescriptor {
                version: VersionToken::new(parsed.tag_name),
                asset_url: parsed.assets.into_iter().next().map(|a| a.browser_download_url),
            })
        }
    }
}
