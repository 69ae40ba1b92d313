// HTTP(S) transport backed by a blocking reqwest client. Each trust entry
// maps to its own client configuration; the ladder decides which one runs.

use crate::platform::{FetchResponse, Transport, TransportError};
use crate::trust::TrustEntry;
use reqwest::blocking::{Client, Response};
use std::borrow::Cow;
use std::io::Read;
use std::time::Duration;

const USER_AGENT: &str = concat!("ota-agent/", env!("CARGO_PKG_VERSION"));

pub struct ReqwestTransport {
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn build_client(&self, trust: &TrustEntry) -> Result<Client, TransportError> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        match trust {
            TrustEntry::PinnedCa { ca_pem } => {
                let cert = reqwest::Certificate::from_pem(ca_pem.as_bytes())
                    .map_err(|e| TransportError::Tls(format!("bad pinned CA: {}", e)))?;
                builder = builder
                    .tls_built_in_root_certs(false)
                    .add_root_certificate(cert);
            }
            TrustEntry::SystemRoots => {}
            TrustEntry::NoVerification => {
                builder = builder
                    .danger_accept_invalid_certs(true)
                    .danger_accept_invalid_hostnames(true);
            }
            // Scheme downgrade happens in fetch; nothing to configure here.
            TrustEntry::Plaintext => {}
        }

        builder
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))
    }
}

impl Transport for ReqwestTransport {
    fn fetch(
        &self,
        url: &str,
        trust: &TrustEntry,
    ) -> Result<Box<dyn FetchResponse>, TransportError> {
        let url = effective_url(url, trust);
        let client = self.build_client(trust)?;
        let response = client.get(url.as_ref()).send().map_err(classify)?;
        Ok(Box::new(ReqwestBody { inner: response }))
    }
}

/// The plaintext rung talks to the same host without TLS.
fn effective_url<'a>(url: &'a str, trust: &TrustEntry) -> Cow<'a, str> {
    match (trust, url.strip_prefix("https://")) {
        (TrustEntry::Plaintext, Some(rest)) => Cow::Owned(format!("http://{}", rest)),
        _ => Cow::Borrowed(url),
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        // TLS handshake failures surface as connect errors too; either way
        // the ladder moves on.
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Io(e.to_string())
    }
}

struct ReqwestBody {
    inner: Response,
}

impl FetchResponse for ReqwestBody {
    fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    fn content_length(&self) -> Option<u64> {
        self.inner.content_length()
    }

    fn next_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.inner.read(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                TransportError::Timeout
            }
            _ => TransportError::Io(e.to_string()),
        })
    }
}
