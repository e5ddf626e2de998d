//! Preview orchestration
//!
//! Decides which visible, externally rendered fonts need a round trip,
//! builds one deduplicated batch, and writes results back onto entities
//! and into the preview cache. All state lives in one
//! `PreviewOrchestrator`; `scheduler` drives it from a command queue.

pub mod scheduler;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::cache::LruCache;
use crate::config::PreviewConfig;
use crate::error::PreviewResult;
use crate::font::entity::FontEntity;
use crate::font::resolve::{Classification, RenderCandidateResolver};
use crate::helper::wire::{PreviewRequest, PreviewResponse};
use crate::preview::{PreviewImage, PreviewKey};
use crate::store::FontStore;
use crate::traits::{FontSurface, PreviewService};

pub use scheduler::{PreviewCommand, PreviewScheduler, SchedulerCore, Urgency};

/// A list row currently on screen and the pixel width of its preview slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleItem {
    pub uid: String,
    pub width: u32,
}

impl VisibleItem {
    pub fn new(uid: impl Into<String>, width: u32) -> Self {
        Self {
            uid: uid.into(),
            width,
        }
    }
}

/// Notifications for whoever displays the previews
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewEvent {
    /// A bitmap was applied to a font
    ImageReady {
        uid: String,
        image: PreviewImage,
        substituted: bool,
    },
    /// The helper returned nothing for this font and key
    RenderFailed { uid: String, key: PreviewKey },
    /// A batch completed
    CycleFinished(CycleReport),
    /// A batch never completed; the next tick retries
    CycleFailed { message: String },
}

/// Counters for one update cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Distinct cache keys sent to the helper
    pub requested: usize,
    /// Entities that received a fresh bitmap
    pub applied: usize,
    /// Entities newly memoized as failed
    pub failed: usize,
    /// Entities served from the preview cache
    pub cache_hits: usize,
    /// Responses that arrived after their entity moved on
    pub stale: usize,
}

#[derive(Debug, Clone)]
struct Binding {
    key: PreviewKey,
    uids: Vec<String>,
}

/// One outbound batch plus the bookkeeping needed to route its response
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub requests: Vec<PreviewRequest>,
    pub text: String,
    pub size: u32,
    bindings: HashMap<String, Binding>,
    cache_hits: usize,
}

impl PendingBatch {
    /// Uids bound to a request id
    pub fn bound_uids(&self, request_id: &str) -> &[String] {
        self.bindings
            .get(request_id)
            .map(|b| b.uids.as_slice())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Scheduling brain for preview requests; owns store, cache and inputs
pub struct PreviewOrchestrator {
    config: PreviewConfig,
    store: FontStore,
    cache: LruCache<PreviewKey, PreviewImage>,
    service: Option<Arc<dyn PreviewService>>,
    surface: Option<Arc<dyn FontSurface>>,
    visible: Vec<VisibleItem>,
    text: String,
    size: u32,
    busy: bool,
    events: Option<async_channel::Sender<PreviewEvent>>,
}

impl PreviewOrchestrator {
    pub fn new(config: PreviewConfig, store: FontStore) -> Self {
        Self {
            cache: LruCache::new(config.effective_cache_capacity()),
            text: config.default_preview_text.clone(),
            size: config.default_font_size,
            config,
            store,
            service: None,
            surface: None,
            visible: Vec::new(),
            busy: false,
            events: None,
        }
    }

    pub fn with_service(mut self, service: Arc<dyn PreviewService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_surface(mut self, surface: Arc<dyn FontSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Swap the helper; a ready one takes over visible fonts that had
    /// failed for lack of a helper
    pub fn set_service(&mut self, service: Option<Arc<dyn PreviewService>>) {
        self.service = service;
        if !self.helper_ready() {
            return;
        }
        let uids: Vec<String> = self.visible.iter().map(|item| item.uid.clone()).collect();
        let promoted = uids
            .iter()
            .filter(|uid| self.classify(uid, true) == Classification::External)
            .count();
        if promoted > 0 {
            debug!("{} visible fonts moved to helper rendering", promoted);
        }
    }

    fn classify(&mut self, uid: &str, helper_ready: bool) -> Classification {
        let (Some(surface), Some(entity)) = (&self.surface, self.store.get_mut(uid)) else {
            return Classification::Unchanged;
        };
        RenderCandidateResolver::new(surface.as_ref()).classify(entity, helper_ready)
    }

    pub fn service(&self) -> Option<Arc<dyn PreviewService>> {
        self.service.clone()
    }

    /// Create the event channel; the orchestrator keeps the sender
    pub fn subscribe(&mut self) -> async_channel::Receiver<PreviewEvent> {
        let (tx, rx) = async_channel::unbounded();
        self.events = Some(tx);
        rx
    }

    fn emit(&self, event: PreviewEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.try_send(event) {
                trace!("Preview event dropped: {}", e);
            }
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn store(&self) -> &FontStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut FontStore {
        &mut self.store
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn visible_items(&self) -> &[VisibleItem] {
        &self.visible
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cached_image(&self, key: &PreviewKey) -> Option<&PreviewImage> {
        self.cache.peek(key)
    }

    fn helper_ready(&self) -> bool {
        self.service.as_ref().is_some_and(|service| service.is_ready())
    }

    /// Replace the visible set.
    ///
    /// Newly visible fonts are classified first. Returns `true` when a
    /// newly visible font needs a bitmap it does not have yet, which calls
    /// for an immediate update instead of a debounced one.
    pub fn set_visible_items(&mut self, items: Vec<VisibleItem>) -> bool {
        let previous: HashSet<String> = self.visible.iter().map(|item| item.uid.clone()).collect();
        let helper_ready = self.helper_ready();
        let mut urgent = false;

        for item in &items {
            let newly_visible = !previous.contains(&item.uid);
            if self.classify(&item.uid, helper_ready) == Classification::External {
                urgent = true;
            }
            let Some(entity) = self.store.get(&item.uid) else {
                continue;
            };
            if newly_visible && entity.requires_external_render && entity.last_image.is_none() {
                urgent = true;
            }
        }

        self.visible = items;
        urgent
    }

    pub fn set_preview_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    pub fn set_font_size(&mut self, size: u32) {
        self.size = size;
    }

    /// Swap in a reloaded font list; cache and visible set start over
    pub fn replace_fonts(&mut self, entities: Vec<FontEntity>) {
        self.store.replace_all(entities);
        self.reset();
    }

    /// Forget cached previews and the visible set
    pub fn reset(&mut self) {
        self.cache.clear();
        self.visible.clear();
        self.busy = false;
    }

    fn cache_key(&self, entity: &FontEntity, width: u32) -> PreviewKey {
        PreviewKey::new(
            &entity.external_key,
            entity.style_marker(),
            &self.text,
            self.size,
            width,
            self.config.effective_max_preview_text(),
        )
    }

    /// Build the next batch, or `None` when nothing needs the helper.
    ///
    /// Marks the orchestrator busy when a batch is returned; every batch
    /// must be handed back through `complete_cycle`.
    pub fn begin_cycle(&mut self) -> Option<PendingBatch> {
        if self.busy || !self.helper_ready() || self.visible.is_empty() {
            return None;
        }

        let mut batch = PendingBatch {
            requests: Vec::new(),
            text: crate::preview::truncate_chars(&self.text, self.config.effective_max_preview_text())
                .to_string(),
            size: self.size,
            bindings: HashMap::new(),
            cache_hits: 0,
        };
        let mut hits: Vec<(String, PreviewImage)> = Vec::new();

        let visible = self.visible.clone();
        for item in &visible {
            let Some(entity) = self.store.get(&item.uid) else {
                continue;
            };
            if !entity.requires_external_render || entity.external_key.is_empty() {
                continue;
            }
            let key = self.cache_key(entity, item.width);

            if let Some(entity) = self.store.get_mut(&item.uid) {
                entity.current_cache_key = Some(key.clone());
            }
            let Some(entity) = self.store.get(&item.uid) else {
                continue;
            };
            if entity.failed_cache_key.as_ref() == Some(&key) {
                trace!("Skipping {}: known failure for this key", entity.display_name);
                continue;
            }

            if let Some(image) = self.cache.get(&key) {
                hits.push((item.uid.clone(), image.clone()));
                continue;
            }

            let request_id = key.request_id();
            match batch.bindings.get_mut(&request_id) {
                Some(binding) => binding.uids.push(item.uid.clone()),
                None => {
                    batch.requests.push(PreviewRequest {
                        name: entity.request_name().to_string(),
                        aliases: entity.request_aliases(),
                        post_script_name: Some(entity.post_script_name.clone())
                            .filter(|p| !p.is_empty()),
                        style: Some(entity.style().to_string()).filter(|s| !s.is_empty()),
                        width: item.width,
                        request_id: request_id.clone(),
                        catalog_key: entity.catalog_key.clone(),
                    });
                    batch.bindings.insert(
                        request_id,
                        Binding {
                            key,
                            uids: vec![item.uid.clone()],
                        },
                    );
                }
            }
        }

        batch.cache_hits = hits.len();
        for (uid, image) in hits {
            if let Some(entity) = self.store.get_mut(&uid) {
                entity.last_image = Some(image.clone());
            }
            self.emit(PreviewEvent::ImageReady {
                uid,
                image,
                substituted: false,
            });
        }

        if batch.requests.is_empty() {
            if batch.cache_hits > 0 {
                debug!("Served {} previews from cache", batch.cache_hits);
            }
            return None;
        }

        debug!(
            "Batch of {} requests for {} visible fonts",
            batch.requests.len(),
            batch.bindings.values().map(|b| b.uids.len()).sum::<usize>()
        );
        self.busy = true;
        Some(batch)
    }

    /// Route a batch result back to entities and clear the busy flag.
    ///
    /// A failed request changes nothing but the flag. A completed response
    /// caches every image, applies it where the entity still wants that
    /// key, and memoizes request ids missing from the response as failed.
    pub fn complete_cycle(
        &mut self,
        batch: PendingBatch,
        result: PreviewResult<Vec<PreviewResponse>>,
    ) -> CycleReport {
        self.busy = false;
        let mut report = CycleReport {
            requested: batch.requests.len(),
            cache_hits: batch.cache_hits,
            ..CycleReport::default()
        };

        let previews = match result {
            Ok(previews) => previews,
            Err(e) => {
                warn!("Preview batch failed: {}", e);
                self.emit(PreviewEvent::CycleFailed {
                    message: e.to_string(),
                });
                return report;
            }
        };

        let mut answered: HashSet<String> = HashSet::new();
        for preview in previews {
            let Some(binding) = batch.bindings.get(&preview.request_id) else {
                trace!("Ignoring preview for unknown request {}", preview.request_id);
                continue;
            };
            let image = match PreviewImage::from_data_uri(&preview.image) {
                Ok(image) => image,
                Err(e) => {
                    debug!("Unusable image for {}: {}", preview.request_id, e);
                    continue;
                }
            };
            answered.insert(preview.request_id.clone());
            self.cache.set(binding.key.clone(), image.clone());

            for uid in &binding.uids {
                let Some(entity) = self.store.get_mut(uid) else {
                    continue;
                };
                if entity.current_cache_key.as_ref() != Some(&binding.key) {
                    report.stale += 1;
                    continue;
                }
                if preview.substituted {
                    entity.failed_cache_key = Some(binding.key.clone());
                }
                entity.last_image = Some(image.clone());
                report.applied += 1;
                self.emit(PreviewEvent::ImageReady {
                    uid: uid.clone(),
                    image: image.clone(),
                    substituted: preview.substituted,
                });
            }
        }

        for (request_id, binding) in &batch.bindings {
            if answered.contains(request_id) {
                continue;
            }
            for uid in &binding.uids {
                let Some(entity) = self.store.get_mut(uid) else {
                    continue;
                };
                if entity.current_cache_key.as_ref() != Some(&binding.key) {
                    continue;
                }
                entity.failed_cache_key = Some(binding.key.clone());
                report.failed += 1;
                self.emit(PreviewEvent::RenderFailed {
                    uid: uid.clone(),
                    key: binding.key.clone(),
                });
            }
        }

        debug!(
            "Cycle done: {} requested, {} applied, {} failed, {} stale",
            report.requested, report.applied, report.failed, report.stale
        );
        self.emit(PreviewEvent::CycleFinished(report));
        report
    }

    /// Run one full cycle synchronously on the calling thread
    pub fn run_cycle(&mut self) -> Option<CycleReport> {
        let batch = self.begin_cycle()?;
        let result = match &self.service {
            Some(service) => service.fetch_batch(&batch.requests, &batch.text, batch.size),
            None => Ok(Vec::new()),
        };
        Some(self.complete_cycle(batch, result))
    }
}

impl std::fmt::Debug for PreviewOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewOrchestrator")
            .field("fonts", &self.store.len())
            .field("visible", &self.visible.len())
            .field("cached", &self.cache.len())
            .field("busy", &self.busy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy_backend::{DummyPreviewService, DummySurface};
    use crate::font::entity::HostFont;
    use crate::font::LoadStatus;

    fn external(name: &str, ps: &str, index: usize) -> FontEntity {
        let mut entity = FontEntity::from_host(
            &HostFont {
                name: Some(name.to_string()),
                family: Some(name.to_string()),
                style: Some("Regular".to_string()),
                post_script_name: Some(ps.to_string()),
                ..HostFont::default()
            },
            index,
        );
        entity.requires_external_render = true;
        entity
    }

    fn orchestrator(service: Arc<DummyPreviewService>, fonts: Vec<FontEntity>) -> PreviewOrchestrator {
        let mut store = FontStore::new();
        store.replace_all(fonts);
        PreviewOrchestrator::new(PreviewConfig::default(), store).with_service(service)
    }

    #[test]
    fn test_identical_keys_share_one_request() {
        let service = Arc::new(DummyPreviewService::new());
        let mut orch = orchestrator(
            service.clone(),
            vec![external("Nanum Gothic", "NanumGothic", 0), external("Nanum Gothic", "NanumGothic", 1)],
        );
        orch.set_visible_items(vec![VisibleItem::new("font-0", 300), VisibleItem::new("font-1", 300)]);

        let report = orch.run_cycle().unwrap();
        assert_eq!(report.requested, 1);
        assert_eq!(report.applied, 2);
        assert_eq!(service.call_count(), 1);
        assert_eq!(service.calls()[0].requests.len(), 1);

        let first = orch.store().get("font-0").unwrap().last_image.clone();
        assert!(first.is_some());
        assert_eq!(first, orch.store().get("font-1").unwrap().last_image);
        assert!(!orch.is_busy());
    }

    #[test]
    fn test_missing_response_memoizes_failure() {
        let service = Arc::new(DummyPreviewService::new().drop_name("Broken"));
        let mut orch = orchestrator(service.clone(), vec![external("Broken", "Broken-Regular", 0)]);
        let events = orch.subscribe();
        orch.set_visible_items(vec![VisibleItem::new("font-0", 200)]);

        let report = orch.run_cycle().unwrap();
        assert_eq!(report.failed, 1);
        let entity = orch.store().get("font-0").unwrap();
        assert_eq!(entity.failed_cache_key, entity.current_cache_key);
        assert!(matches!(events.try_recv(), Ok(PreviewEvent::RenderFailed { .. })));

        assert!(orch.run_cycle().is_none());
        assert_eq!(service.call_count(), 1);

        orch.set_font_size(30);
        assert!(orch.run_cycle().is_some());
        assert_eq!(service.call_count(), 2);
    }

    #[test]
    fn test_transport_failure_does_not_memoize() {
        let service = Arc::new(DummyPreviewService::new());
        service.set_transport_failure(true);
        let mut orch = orchestrator(service.clone(), vec![external("Arial", "ArialMT", 0)]);
        orch.set_visible_items(vec![VisibleItem::new("font-0", 200)]);

        let report = orch.run_cycle().unwrap();
        assert_eq!(report.failed, 0);
        assert!(!orch.is_busy());
        assert!(orch.store().get("font-0").unwrap().failed_cache_key.is_none());

        service.set_transport_failure(false);
        assert_eq!(orch.run_cycle().unwrap().applied, 1);
    }

    #[test]
    fn test_cache_hit_skips_request() {
        let service = Arc::new(DummyPreviewService::new());
        let mut orch = orchestrator(service.clone(), vec![external("Arial", "ArialMT", 0)]);
        orch.set_visible_items(vec![VisibleItem::new("font-0", 200)]);
        orch.run_cycle();
        assert_eq!(orch.cache_len(), 1);

        orch.store_mut().get_mut("font-0").unwrap().last_image = None;
        assert!(orch.run_cycle().is_none());
        assert_eq!(service.call_count(), 1);
        assert!(orch.store().get("font-0").unwrap().last_image.is_some());
    }

    #[test]
    fn test_stale_response_cached_not_applied() {
        let service = Arc::new(DummyPreviewService::new());
        let mut orch = orchestrator(service.clone(), vec![external("Arial", "ArialMT", 0)]);
        orch.set_visible_items(vec![VisibleItem::new("font-0", 200)]);

        let batch = orch.begin_cycle().unwrap();
        assert!(orch.is_busy());
        assert!(orch.begin_cycle().is_none());
        let result = service.fetch_batch(&batch.requests, &batch.text, batch.size);

        // Width changed while the request was in flight
        orch.store_mut().get_mut("font-0").unwrap().current_cache_key = None;
        let report = orch.complete_cycle(batch, result);
        assert_eq!(report.stale, 1);
        assert_eq!(report.applied, 0);
        assert_eq!(orch.cache_len(), 1);
        assert!(orch.store().get("font-0").unwrap().last_image.is_none());
    }

    #[test]
    fn test_substituted_preview_applied_and_memoized() {
        let service = Arc::new(DummyPreviewService::new().substitute_name("Odd"));
        let mut orch = orchestrator(service, vec![external("Odd", "Odd-Regular", 0)]);
        orch.set_visible_items(vec![VisibleItem::new("font-0", 120)]);
        let report = orch.run_cycle().unwrap();
        assert_eq!(report.applied, 1);
        let entity = orch.store().get("font-0").unwrap();
        assert!(entity.last_image.is_some());
        assert_eq!(entity.failed_cache_key, entity.current_cache_key);
    }

    #[test]
    fn test_no_cycle_without_ready_helper() {
        let service = Arc::new(DummyPreviewService::new());
        service.set_ready(false);
        let mut orch = orchestrator(service.clone(), vec![external("Arial", "ArialMT", 0)]);
        orch.set_visible_items(vec![VisibleItem::new("font-0", 200)]);
        assert!(orch.run_cycle().is_none());

        orch.set_service(None);
        assert!(orch.run_cycle().is_none());
        assert_eq!(service.call_count(), 0);
    }

    #[test]
    fn test_local_fonts_never_requested() {
        let service = Arc::new(DummyPreviewService::new());
        let mut local = external("Arial", "ArialMT", 0);
        local.requires_external_render = false;
        let mut orch = orchestrator(service.clone(), vec![local]);
        orch.set_visible_items(vec![VisibleItem::new("font-0", 200)]);
        assert!(orch.run_cycle().is_none());
        assert_eq!(service.call_count(), 0);
    }

    #[test]
    fn test_visibility_classifies_and_flags_urgency() {
        let service = Arc::new(DummyPreviewService::new());
        let surface = Arc::new(DummySurface::with_families(&["Arial"]));
        let mut unknown = external("Mystery", "Mystery-Regular", 1);
        unknown.requires_external_render = false;
        let mut arial = external("Arial", "ArialMT", 0);
        arial.requires_external_render = false;

        let mut orch = orchestrator(service, vec![arial, unknown]).with_surface(surface);
        assert!(orch.set_visible_items(vec![VisibleItem::new("font-0", 200), VisibleItem::new("font-1", 200)]));
        assert!(orch.store().get("font-1").unwrap().requires_external_render);
        assert!(!orch.store().get("font-0").unwrap().requires_external_render);

        orch.run_cycle();
        assert!(!orch.set_visible_items(vec![VisibleItem::new("font-1", 200)]));
    }

    #[test]
    fn test_late_helper_takes_over_failed_fonts() {
        let service = Arc::new(DummyPreviewService::new());
        service.set_ready(false);
        let surface = Arc::new(DummySurface::new());
        let mut unknown = external("Mystery", "Mystery-Regular", 0);
        unknown.requires_external_render = false;

        let mut orch = orchestrator(service.clone(), vec![unknown]).with_surface(surface);
        assert!(!orch.set_visible_items(vec![VisibleItem::new("font-0", 200)]));
        assert_eq!(orch.store().get("font-0").unwrap().load_status(), LoadStatus::RenderFailed);
        assert!(orch.run_cycle().is_none());

        service.set_ready(true);
        let ready: Arc<dyn PreviewService> = service.clone();
        orch.set_service(Some(ready));
        assert!(orch.store().get("font-0").unwrap().requires_external_render);
        assert_eq!(orch.run_cycle().unwrap().applied, 1);
        assert_eq!(service.call_count(), 1);
    }

    #[test]
    fn test_reload_clears_cache() {
        let service = Arc::new(DummyPreviewService::new());
        let mut orch = orchestrator(service, vec![external("Arial", "ArialMT", 0)]);
        orch.set_visible_items(vec![VisibleItem::new("font-0", 200)]);
        orch.run_cycle();
        orch.replace_fonts(vec![external("Arial", "ArialMT", 0)]);
        assert_eq!(orch.cache_len(), 0);
        assert!(orch.visible_items().is_empty());
    }
}
