//! Preview Core - UI-agnostic font preview pipeline
//!
//! This crate decides how each font in a host's font list gets drawn:
//! locally through a font surface, or as a bitmap rendered by an
//! out-of-process helper. It owns the helper process, batches and caches
//! preview requests, and merges the helper's catalog into the font list.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod dummy_backend;
pub mod error;
pub mod font;
pub mod helper;
pub mod host;
pub mod orchestrator;
pub mod preview;
pub mod store;
pub mod traits;

// Re-export main types
pub use cache::LruCache;
pub use catalog::{merge_catalog, Catalog, CatalogMeta};
pub use config::PreviewConfig;
pub use error::{PreviewError, PreviewResult};
pub use font::{
    normalize, Classification, FamilyMeta, FontEntity, HostFont, LoadStatus, MatchTier,
    RenderCandidateResolver, RenderPlan, RenderSource, SystemFontSurface,
};
pub use helper::{HelperClient, HelperProcessSupervisor, HelperSession, HelperState};
pub use host::{parse_apply_result, parse_font_list, ApplyResult};
pub use orchestrator::{
    CycleReport, PendingBatch, PreviewEvent, PreviewOrchestrator, PreviewScheduler, VisibleItem,
};
pub use preview::{PreviewImage, PreviewKey};
pub use store::FontStore;

// Re-export traits
pub use traits::*;
