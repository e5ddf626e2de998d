//! Font entities, canonical keys and render planning
//!
//! This module decides, per font, whether the local rendering surface can
//! draw it or whether a bitmap preview has to come from the helper.

pub mod discovery;
pub mod entity;
pub mod family;
pub mod normalize;
pub mod resolve;

pub use discovery::SystemFontSurface;
pub use entity::{FontEntity, HostFont};
pub use family::{build_families, strip_style_suffix, FamilyMeta};
pub use normalize::{normalize, normalize_opt};
pub use resolve::{
    map_style_to_weight, Classification, MatchTier, PlanWarning, RenderCandidateResolver, RenderPlan,
    RenderSource,
};

/// Loading status of a font on the local surface, as last reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadStatus {
    /// Nothing decided yet
    #[default]
    Unresolved,
    /// A web font download is in progress
    Loading,
    /// A web font finished loading
    Loaded,
    /// Rendered from a web font
    Web,
    /// A locally installed face renders it
    Local,
    /// Reported available by the surface
    Available,
    /// Loading failed
    Failed,
    /// No web font configuration matched
    MissingConfig,
    /// Nothing can draw this font
    RenderFailed,
}

impl LoadStatus {
    /// Whether classification already happened for this status
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            LoadStatus::Loading
                | LoadStatus::Web
                | LoadStatus::Local
                | LoadStatus::Available
                | LoadStatus::RenderFailed
        )
    }
}
