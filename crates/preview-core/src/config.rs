// src/config.rs
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    DEBOUNCE_MS, DEFAULT_FONT_SIZE, DEFAULT_HELPER_PORT, DEFAULT_MAX_RESTARTS,
    DEFAULT_PREVIEW_TEXT, MAX_PREVIEW_TEXT, MIN_READY_INTERVAL_MS, PORT_SCAN_SPAN,
    PREVIEW_CACHE_CAPACITY, READY_INTERVAL_MS, READY_TIMEOUT_MS, REQUEST_TIMEOUT_MS,
    VISIBILITY_MARGIN_PX,
};

/// Tunables for the helper session, the preview cache and the scheduler.
///
/// Every field has a default, so a partial TOML table is enough.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub default_port: u16,
    pub port_scan_span: u16,
    pub ready_timeout_ms: u64,
    pub ready_interval_ms: u64,
    /// Client-side limit for catalog and batch requests
    pub request_timeout_ms: u64,
    pub debounce_ms: u64,
    pub preview_cache_capacity: usize,
    pub max_preview_text: usize,
    pub default_font_size: u32,
    pub default_preview_text: String,
    pub max_restarts: u32,
    pub helper_root: Option<PathBuf>,
    pub visibility_margin_px: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_HELPER_PORT,
            port_scan_span: PORT_SCAN_SPAN,
            ready_timeout_ms: READY_TIMEOUT_MS,
            ready_interval_ms: READY_INTERVAL_MS,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            debounce_ms: DEBOUNCE_MS,
            preview_cache_capacity: PREVIEW_CACHE_CAPACITY,
            max_preview_text: MAX_PREVIEW_TEXT,
            default_font_size: DEFAULT_FONT_SIZE,
            default_preview_text: DEFAULT_PREVIEW_TEXT.to_string(),
            max_restarts: DEFAULT_MAX_RESTARTS,
            helper_root: None,
            visibility_margin_px: VISIBILITY_MARGIN_PX,
        }
    }
}

impl PreviewConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn with_port_scan_span(mut self, span: u16) -> Self {
        self.port_scan_span = span;
        self
    }

    pub fn with_ready_timeout(mut self, timeout_ms: u64, interval_ms: u64) -> Self {
        self.ready_timeout_ms = timeout_ms;
        self.ready_interval_ms = interval_ms;
        self
    }

    pub fn with_request_timeout(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn with_debounce(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.preview_cache_capacity = capacity;
        self
    }

    pub fn with_font_size(mut self, size: u32) -> Self {
        self.default_font_size = size;
        self
    }

    pub fn with_preview_text(mut self, text: &str) -> Self {
        self.default_preview_text = text.to_string();
        self
    }

    pub fn with_max_restarts(mut self, restarts: u32) -> Self {
        self.max_restarts = restarts;
        self
    }

    pub fn with_helper_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.helper_root = Some(root.into());
        self
    }

    /// Cache capacity, never below one entry
    pub fn effective_cache_capacity(&self) -> usize {
        self.preview_cache_capacity.max(1)
    }

    /// Readiness poll interval, floored so the poll cannot spin
    pub fn effective_ready_interval(&self) -> Duration {
        Duration::from_millis(self.ready_interval_ms.max(MIN_READY_INTERVAL_MS))
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Text length kept in cache keys and payloads, at least one character
    pub fn effective_max_preview_text(&self) -> usize {
        self.max_preview_text.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = PreviewConfig::default();
        assert_eq!(config.default_port, 8765);
        assert_eq!(config.port_scan_span, 24);
        assert_eq!(config.ready_timeout_ms, 5000);
        assert_eq!(config.ready_interval_ms, 300);
        assert_eq!(config.max_preview_text, 200);
        assert!(config.helper_root.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let config = PreviewConfig::new()
            .with_default_port(9000)
            .with_debounce(0)
            .with_cache_capacity(0)
            .with_helper_root("/opt/helper");
        assert_eq!(config.default_port, 9000);
        assert_eq!(config.debounce(), Duration::ZERO);
        assert_eq!(config.effective_cache_capacity(), 1);
        assert_eq!(config.helper_root, Some(PathBuf::from("/opt/helper")));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PreviewConfig =
            serde_json::from_str(r#"{"debounce_ms": 40, "ready_interval_ms": 1}"#).unwrap();
        assert_eq!(config.debounce_ms, 40);
        assert_eq!(config.effective_ready_interval(), Duration::from_millis(10));
        assert_eq!(config.default_port, 8765);
    }
}
