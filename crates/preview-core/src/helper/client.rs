//! Typed HTTP client for the rendering helper

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};
use ureq::Agent;

use crate::catalog::Catalog;
use crate::config::PreviewConfig;
use crate::error::{PreviewError, PreviewResult};
use crate::helper::wire::{parse_batch_response, BatchBody, PreviewRequest, PreviewResponse};
use crate::preview::PreviewImage;
use crate::traits::PreviewService;

/// Upper bound on a response body; batches of bitmaps get large
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;
/// Floor for a single readiness probe
const MIN_PROBE_TIMEOUT: Duration = Duration::from_millis(200);

fn agent_with_timeout(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn request_error(endpoint: &str, err: ureq::Error) -> PreviewError {
    match err {
        ureq::Error::StatusCode(status) => PreviewError::HelperStatus {
            endpoint: endpoint.to_string(),
            status,
        },
        other => PreviewError::HelperRequest {
            endpoint: endpoint.to_string(),
            message: other.to_string(),
        },
    }
}

/// Percent-encode one URL path segment
pub fn encode_path_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Client for `/ping`, `/fonts`, `/batch-preview` and `/preview/<name>`.
///
/// The `try_*` methods report failures; the plain methods are the
/// component boundary and substitute `false`, an empty catalog or an
/// empty list.
pub struct HelperClient {
    base_url: String,
    agent: Agent,
    ready: AtomicBool,
}

impl HelperClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            agent: agent_with_timeout(request_timeout),
            ready: AtomicBool::new(false),
        }
    }

    pub fn from_config(base_url: impl Into<String>, config: &PreviewConfig) -> Self {
        Self::new(base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Mark the helper as unusable for batch requests
    pub fn mark_unavailable(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// One `/ping` probe
    pub fn ping(&self) -> bool {
        self.ping_with(&self.agent)
    }

    fn ping_with(&self, agent: &Agent) -> bool {
        match agent.get(&self.url("/ping")).call() {
            Ok(_) => true,
            Err(e) => {
                trace!("Helper ping failed: {}", e);
                false
            }
        }
    }

    /// Poll `/ping` every `interval` until it answers or `timeout` elapses
    pub fn wait_until_ready(&self, timeout: Duration, interval: Duration) -> bool {
        let probe = agent_with_timeout(interval.max(MIN_PROBE_TIMEOUT));
        let started = Instant::now();
        while started.elapsed() < timeout {
            if self.ping_with(&probe) {
                debug!("Helper answered after {:?}", started.elapsed());
                self.ready.store(true, Ordering::SeqCst);
                return true;
            }
            thread::sleep(interval);
        }
        warn!("Helper at {} not ready after {:?}", self.base_url, timeout);
        self.mark_unavailable();
        false
    }

    pub fn try_fetch_catalog(&self) -> PreviewResult<Catalog> {
        let endpoint = "/fonts";
        let mut response = self
            .agent
            .get(&self.url(endpoint))
            .call()
            .map_err(|e| request_error(endpoint, e))?;
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_string()
            .map_err(|e| request_error(endpoint, e))?;
        Catalog::parse(&body)
    }

    /// Fetch the catalog; any failure yields an empty catalog
    pub fn fetch_catalog(&self) -> Catalog {
        match self.try_fetch_catalog() {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Failed to fetch font catalog: {}", e);
                Catalog::default()
            }
        }
    }

    pub fn try_fetch_batch(
        &self,
        requests: &[PreviewRequest],
        text: &str,
        size: u32,
    ) -> PreviewResult<Vec<PreviewResponse>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let endpoint = "/batch-preview";
        let body = BatchBody {
            fonts: requests,
            text,
            size,
        };
        debug!("Requesting {} previews", requests.len());
        let mut response = self
            .agent
            .post(&self.url(endpoint))
            .send_json(&body)
            .map_err(|e| request_error(endpoint, e))?;
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_string()
            .map_err(|e| request_error(endpoint, e))?;
        let previews = parse_batch_response(&body)?;
        debug!("Helper returned {} of {} previews", previews.len(), requests.len());
        Ok(previews)
    }

    /// Batch previews; transport or parse failures yield an empty list
    pub fn fetch_batch_previews(
        &self,
        requests: &[PreviewRequest],
        text: &str,
        size: u32,
    ) -> Vec<PreviewResponse> {
        match self.try_fetch_batch(requests, text, size) {
            Ok(previews) => previews,
            Err(e) => {
                warn!("Batch preview request failed: {}", e);
                Vec::new()
            }
        }
    }

    pub fn try_fetch_preview(&self, name: &str, text: &str, size: u32) -> PreviewResult<Option<PreviewImage>> {
        let endpoint = format!("/preview/{}", encode_path_segment(name));
        let mut response = self
            .agent
            .get(&self.url(&endpoint))
            .query("text", text)
            .query("size", size.to_string())
            .call()
            .map_err(|e| request_error(&endpoint, e))?;
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_string()
            .map_err(|e| request_error(&endpoint, e))?;
        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| PreviewError::malformed("preview response", e))?;
        Ok(value
            .get("image")
            .and_then(serde_json::Value::as_str)
            .and_then(|uri| PreviewImage::from_data_uri(uri).ok()))
    }

    /// Single-font preview; `None` on any failure
    pub fn fetch_preview(&self, name: &str, text: &str, size: u32) -> Option<PreviewImage> {
        match self.try_fetch_preview(name, text, size) {
            Ok(image) => image,
            Err(e) => {
                warn!("Preview request for {} failed: {}", name, e);
                None
            }
        }
    }
}

impl PreviewService for HelperClient {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn fetch_batch(
        &self,
        requests: &[PreviewRequest],
        text: &str,
        size: u32,
    ) -> PreviewResult<Vec<PreviewResponse>> {
        self.try_fetch_batch(requests, text, size)
    }
}

impl std::fmt::Debug for HelperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelperClient")
            .field("base_url", &self.base_url)
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}/", port)
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("Noto Sans"), "Noto%20Sans");
        assert_eq!(encode_path_segment("a/b?c"), "a%2Fb%3Fc");
        assert_eq!(encode_path_segment("나"), "%EB%82%98");
        assert_eq!(encode_path_segment("Arial-Bold_1.0~"), "Arial-Bold_1.0~");
    }

    #[test]
    fn test_unreachable_helper_degrades() {
        let client = HelperClient::new(dead_url(), Duration::from_millis(500));
        assert!(!client.base_url().ends_with('/'));
        assert!(!client.wait_until_ready(Duration::from_millis(60), Duration::from_millis(20)));
        assert!(!client.is_ready());
        assert!(client.fetch_catalog().is_empty());

        let request = PreviewRequest {
            name: "Arial".to_string(),
            aliases: Vec::new(),
            post_script_name: None,
            style: None,
            width: 100,
            request_id: "arial".to_string(),
            catalog_key: None,
        };
        assert!(client.fetch_batch_previews(&[request.clone()], "Hi", 24).is_empty());
        assert!(client.fetch_batch(&[request], "Hi", 24).is_err());
        assert!(client.fetch_preview("Arial", "Hi", 24).is_none());
    }

    #[test]
    fn test_empty_batch_skips_network() {
        let client = HelperClient::new(dead_url(), Duration::from_millis(500));
        assert!(client.try_fetch_batch(&[], "Hi", 24).unwrap().is_empty());
    }
}
