//! Dummy collaborators for testing the pipeline without a host or helper

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::error::{PreviewError, PreviewResult};
use crate::font::entity::HostFont;
use crate::font::normalize::normalize;
use crate::helper::wire::{PreviewRequest, PreviewResponse};
use crate::host::ApplyResult;
use crate::traits::{FontSurface, HostBridge, PreviewService};

/// 1x1 PNG returned for every successful dummy render
pub const DUMMY_IMAGE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR4nGNgYAAAAAMAASsJTYQAAAAASUVORK5CYII=";

/// Font surface with a fixed family list; counts every probe
#[derive(Debug, Default)]
pub struct DummySurface {
    families: HashSet<String>,
    probes: AtomicUsize,
}

impl DummySurface {
    /// Surface that knows no families
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_families(families: &[&str]) -> Self {
        Self {
            families: families.iter().map(|f| normalize(f)).collect(),
            probes: AtomicUsize::new(0),
        }
    }

    /// Number of `has_family` calls so far
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl FontSurface for DummySurface {
    fn has_family(&self, family: &str) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.families.contains(&normalize(family))
    }
}

/// One recorded batch call
#[derive(Debug, Clone)]
pub struct RecordedBatch {
    pub requests: Vec<PreviewRequest>,
    pub text: String,
    pub size: u32,
}

/// Preview service that renders everything as `DUMMY_IMAGE`.
///
/// Names registered with `drop_name` are left out of the response and
/// names registered with `substitute_name` come back flagged substituted.
#[derive(Debug)]
pub struct DummyPreviewService {
    ready: AtomicBool,
    transport_failure: AtomicBool,
    dropped: HashSet<String>,
    substituted: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedBatch>>,
}

impl Default for DummyPreviewService {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyPreviewService {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            transport_failure: AtomicBool::new(false),
            dropped: HashSet::new(),
            substituted: HashSet::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn drop_name(mut self, name: &str) -> Self {
        self.dropped.insert(name.to_string());
        self
    }

    pub fn substitute_name(mut self, name: &str) -> Self {
        self.substituted.insert(name.to_string());
        self
    }

    /// Sleep this long inside every batch call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Make batch calls fail as if the connection dropped
    pub fn set_transport_failure(&self, fail: bool) {
        self.transport_failure.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RecordedBatch> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or_default()
    }
}

impl PreviewService for DummyPreviewService {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn fetch_batch(
        &self,
        requests: &[PreviewRequest],
        text: &str,
        size: u32,
    ) -> PreviewResult<Vec<PreviewResponse>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedBatch {
                requests: requests.to_vec(),
                text: text.to_string(),
                size,
            });
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.transport_failure.load(Ordering::SeqCst) {
            return Err(PreviewError::HelperRequest {
                endpoint: "/batch-preview".to_string(),
                message: "connection reset".to_string(),
            });
        }

        Ok(requests
            .iter()
            .filter(|request| !self.dropped.contains(&request.name))
            .map(|request| PreviewResponse {
                request_id: request.request_id.clone(),
                image: DUMMY_IMAGE.to_string(),
                substituted: self.substituted.contains(&request.name),
                font_name: Some(request.name.clone()),
            })
            .collect())
    }
}

/// Host bridge backed by a fixed font list; records applied names
#[derive(Debug, Default)]
pub struct DummyHost {
    fonts: Vec<HostFont>,
    extension_path: Option<PathBuf>,
    applied: Mutex<Vec<String>>,
}

impl DummyHost {
    pub fn with_fonts(fonts: Vec<HostFont>) -> Self {
        Self {
            fonts,
            ..Self::default()
        }
    }

    pub fn with_extension_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.extension_path = Some(path.into());
        self
    }

    /// Names passed to `apply_font`, in call order
    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().map(|names| names.clone()).unwrap_or_default()
    }
}

impl HostBridge for DummyHost {
    fn fetch_fonts(&self) -> PreviewResult<Vec<HostFont>> {
        Ok(self.fonts.clone())
    }

    fn apply_font(&self, name: &str) -> PreviewResult<ApplyResult> {
        self.applied
            .lock()
            .map_err(|_| PreviewError::Host {
                message: "apply log poisoned".to_string(),
            })?
            .push(name.to_string());
        Ok(ApplyResult { applied_count: 1 })
    }

    fn extension_path(&self) -> Option<PathBuf> {
        self.extension_path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_service_scripting() {
        let service = DummyPreviewService::new().drop_name("Gone").substitute_name("Odd");
        let request = |name: &str| PreviewRequest {
            name: name.to_string(),
            aliases: Vec::new(),
            post_script_name: None,
            style: None,
            width: 10,
            request_id: name.to_lowercase(),
            catalog_key: None,
        };
        let previews = service
            .fetch_batch(&[request("Gone"), request("Odd"), request("Fine")], "Hi", 12)
            .unwrap();
        assert_eq!(previews.len(), 2);
        assert!(previews[0].substituted);
        assert!(!previews[1].substituted);
        assert_eq!(service.call_count(), 1);
        assert_eq!(service.calls()[0].text, "Hi");
    }

    #[test]
    fn test_dummy_surface_counts_probes() {
        let surface = DummySurface::with_families(&["Noto Sans"]);
        assert!(surface.has_family("NotoSans"));
        assert!(!surface.has_family("Arial"));
        assert_eq!(surface.probe_count(), 2);
    }
}
