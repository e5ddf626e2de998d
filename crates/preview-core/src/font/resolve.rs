//! Render candidate scoring and render plans
//!
//! A plan says which family string the local surface should draw a font
//! with, how confident that choice is, and whether an explicit weight has
//! to compensate for a family string that cannot carry the style.

use std::collections::HashSet;
use std::fmt;

use unicode_segmentation::UnicodeSegmentation;

use crate::constants::GENERIC_FAMILY;
use crate::font::entity::FontEntity;
use crate::font::normalize::normalize;
use crate::font::LoadStatus;
use crate::traits::FontSurface;

/// How well the chosen candidate matches the font's own names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchTier {
    Exact,
    Family,
    StyleFragment,
    Fuzzy,
    Fallback,
}

impl MatchTier {
    fn from_score(score: u32) -> Self {
        match score {
            0 => MatchTier::Exact,
            1 => MatchTier::Family,
            2 => MatchTier::StyleFragment,
            3 => MatchTier::Fuzzy,
            _ => MatchTier::Fallback,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::Family => "family",
            MatchTier::StyleFragment => "style-fragment",
            MatchTier::Fuzzy => "fuzzy",
            MatchTier::Fallback => "fallback",
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the pixels of a font preview come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderSource {
    RenderFailed,
    Error,
    Web,
    Local,
    WebLoading,
    Pending,
}

impl RenderSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderSource::RenderFailed => "render-failed",
            RenderSource::Error => "error",
            RenderSource::Web => "web",
            RenderSource::Local => "local",
            RenderSource::WebLoading => "web-loading",
            RenderSource::Pending => "pending",
        }
    }
}

impl fmt::Display for RenderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a plan may not display the exact face of a multi-member family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanWarning {
    NoLoadedVariant,
    UsingBaseFamily,
    FuzzyMatch,
    WeightOverride,
}

impl PlanWarning {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanWarning::NoLoadedVariant => "no-loaded-variant",
            PlanWarning::UsingBaseFamily => "using-base-family",
            PlanWarning::FuzzyMatch => "fuzzy-match",
            PlanWarning::WeightOverride => "weight-override",
        }
    }
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decided rendering strategy for one font entity
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    /// CSS `font-family` value, always ending in the generic family
    pub css_string: String,
    /// Family actually drawn: the available match, else the chosen candidate
    pub preferred_family: String,
    /// Best scoring candidate before availability was considered
    pub candidate_family: String,
    pub tier: MatchTier,
    pub font_weight: Option<u16>,
    pub needs_weight_override: bool,
    pub render_source: RenderSource,
    pub available_candidate: Option<String>,
    pub available_candidates: Vec<String>,
    pub fallback_to_family: bool,
    pub family_has_variants: bool,
    pub warnings: Vec<PlanWarning>,
}

impl RenderPlan {
    /// Whether a locally available face can draw this font
    pub fn is_local(&self) -> bool {
        self.available_candidate.is_some()
    }

    pub fn has_warning(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Outcome of deciding between local drawing and helper rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Already decided earlier; nothing changed
    Unchanged,
    /// A local face draws it
    Local,
    /// Needs a bitmap from the helper; schedule an urgent update
    External,
    /// Nothing can draw it
    RenderFailed,
}

/// Keyword rules in ascending weight order; each entry is a word phrase
const WEIGHT_RULES: &[(u16, &[&[&str]])] = &[
    (100, &[&["thin"]]),
    (200, &[&["extra", "light"]]),
    (300, &[&["light"]]),
    (400, &[&["regular"], &["normal"]]),
    (500, &[&["medium"]]),
    (600, &[&["semi", "bold"], &["demi"]]),
    (700, &[&["bold"]]),
    (800, &[&["extra", "bold"]]),
    (900, &[&["black"], &["heavy"]]),
];

/// Whether `words` holds `phrase` as consecutive words or as one fused word
fn contains_phrase(words: &[&str], phrase: &[&str]) -> bool {
    let fused: String = phrase.concat();
    if words.iter().any(|word| *word == fused) {
        return true;
    }
    phrase.len() > 1 && words.windows(phrase.len()).any(|window| window == phrase)
}

/// Numeric weight implied by a style name, `None` when no rule matches.
///
/// Rules are tried from thin to black and the first hit wins; a rule hits
/// on its keyword as a whole word or on its number anywhere in the name.
pub fn map_style_to_weight(style: &str) -> Option<u16> {
    if style.trim().is_empty() {
        return None;
    }
    let lower = style.to_lowercase();
    let words: Vec<&str> = lower.unicode_words().collect();

    WEIGHT_RULES.iter().find_map(|(weight, phrases)| {
        let keyword = phrases.iter().any(|phrase| contains_phrase(&words, phrase));
        let numeric = lower.contains(&weight.to_string());
        (keyword || numeric).then_some(*weight)
    })
}

fn escape_css_string(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn build_css_string(family: &str) -> String {
    if family.is_empty() {
        return GENERIC_FAMILY.to_string();
    }
    format!("\"{}\", {}", escape_css_string(family), GENERIC_FAMILY)
}

/// Pick the best candidate and its tier; ties keep the earliest candidate
fn choose_candidate(entity: &FontEntity) -> (String, MatchTier) {
    let candidates: Vec<&String> = entity
        .css_families()
        .iter()
        .filter(|c| !c.trim().is_empty())
        .collect();
    let Some(first) = candidates.first() else {
        let family = [entity.display_name.as_str(), entity.family.as_str()]
            .into_iter()
            .find(|name| !name.is_empty())
            .unwrap_or(GENERIC_FAMILY);
        return (family.to_string(), MatchTier::Fallback);
    };

    let family_norm = normalize(&entity.family);
    let style_norm = normalize(entity.style());
    let targets: HashSet<String> = [
        normalize(&entity.display_name),
        normalize(&entity.post_script_name),
        normalize(&format!("{} {}", entity.family, entity.style())),
        normalize(&format!("{} {}", entity.display_name, entity.style())),
    ]
    .into_iter()
    .filter(|t| !t.is_empty())
    .collect();

    let mut best = (*first).clone();
    let mut best_score = u32::MAX;
    for candidate in &candidates {
        let norm = normalize(candidate);
        let score = if targets.contains(&norm) {
            0
        } else if !family_norm.is_empty() && norm == family_norm {
            1
        } else if !style_norm.is_empty() && norm.contains(&style_norm) {
            2
        } else if norm.contains(&family_norm) {
            3
        } else {
            100
        };
        if score < best_score {
            best = (*candidate).clone();
            best_score = score;
        }
    }
    (best, MatchTier::from_score(best_score))
}

fn resolve_render_source(status: LoadStatus, has_available: bool) -> RenderSource {
    match status {
        LoadStatus::RenderFailed => RenderSource::RenderFailed,
        LoadStatus::Failed | LoadStatus::MissingConfig => RenderSource::Error,
        LoadStatus::Web | LoadStatus::Loaded => RenderSource::Web,
        _ if has_available => RenderSource::Local,
        LoadStatus::Loading => RenderSource::WebLoading,
        LoadStatus::Local | LoadStatus::Available => RenderSource::Local,
        _ => RenderSource::Pending,
    }
}

/// Scores candidates against a rendering surface and memoizes plans on entities
pub struct RenderCandidateResolver<'a> {
    surface: &'a dyn FontSurface,
}

impl<'a> RenderCandidateResolver<'a> {
    pub fn new(surface: &'a dyn FontSurface) -> Self {
        Self { surface }
    }

    /// Candidates the surface can draw right now, memoized until invalidated
    pub fn available_candidates(&self, entity: &mut FontEntity) -> Vec<String> {
        if let Some(list) = entity.cached_available() {
            return list.to_vec();
        }

        let mut available = Vec::new();
        if !self.surface.supports_probe() {
            // Without a probe the first candidate is taken on trust
            if let Some(first) = entity.css_families().first() {
                available.push(first.clone());
            }
        } else {
            let mut seen = HashSet::new();
            for candidate in entity.css_families() {
                let norm = normalize(candidate);
                if seen.contains(&norm) {
                    continue;
                }
                if self.surface.has_family(candidate) {
                    available.push(candidate.clone());
                    seen.insert(norm);
                }
            }
        }

        tracing::trace!(
            "Probed {} candidates for {}: {} available",
            entity.css_families().len(),
            entity.display_name,
            available.len()
        );
        entity.store_available(available.clone());
        available
    }

    /// Compute (or reuse) the render plan of an entity
    pub fn compute_plan(&self, entity: &mut FontEntity) -> RenderPlan {
        if let Some(plan) = entity.cached_plan() {
            return plan.clone();
        }

        let (candidate_family, tier) = choose_candidate(entity);
        let available_candidates = self.available_candidates(entity);
        let candidate_norm = normalize(&candidate_family);
        let available_candidate = available_candidates
            .iter()
            .find(|name| normalize(name) == candidate_norm)
            .or_else(|| available_candidates.first())
            .cloned();

        let preferred_family = available_candidate
            .clone()
            .unwrap_or_else(|| candidate_family.clone());
        let font_weight = map_style_to_weight(entity.style());
        let effective_norm = normalize(&preferred_family);
        let fallback_to_family =
            effective_norm == normalize(&entity.family) && candidate_norm != effective_norm;
        let needs_weight_override =
            font_weight.is_some() && (available_candidate.is_none() || fallback_to_family);
        let render_source =
            resolve_render_source(entity.load_status(), available_candidate.is_some());

        let family_has_variants = entity.family_meta().is_some_and(|meta| meta.has_variants);
        let mut warnings = Vec::new();
        if family_has_variants {
            if available_candidate.is_none() {
                warnings.push(PlanWarning::NoLoadedVariant);
            }
            if fallback_to_family {
                warnings.push(PlanWarning::UsingBaseFamily);
            }
            if tier != MatchTier::Exact {
                warnings.push(PlanWarning::FuzzyMatch);
            }
            if needs_weight_override {
                warnings.push(PlanWarning::WeightOverride);
            }
        }

        let plan = RenderPlan {
            css_string: build_css_string(&preferred_family),
            preferred_family,
            candidate_family,
            tier,
            font_weight,
            needs_weight_override,
            render_source,
            available_candidate,
            available_candidates,
            fallback_to_family,
            family_has_variants,
            warnings,
        };
        entity.store_plan(plan.clone());
        plan
    }

    /// Whether at least one candidate is drawable locally
    pub fn is_renderable(&self, entity: &mut FontEntity) -> bool {
        !self.available_candidates(entity).is_empty()
    }

    /// Decide between local drawing and helper rendering.
    ///
    /// Fonts already marked external or already resolved are left alone,
    /// except a render failure once a helper is ready. Without a ready
    /// helper a font never becomes external.
    pub fn classify(&self, entity: &mut FontEntity, helper_ready: bool) -> Classification {
        let retry = helper_ready && entity.load_status() == LoadStatus::RenderFailed;
        if entity.requires_external_render || (entity.load_status().is_resolved() && !retry) {
            return Classification::Unchanged;
        }
        if retry {
            entity.set_load_status(LoadStatus::Unresolved);
        }

        if self.is_renderable(entity) {
            entity.set_load_status(LoadStatus::Local);
            return Classification::Local;
        }

        if helper_ready {
            entity.requires_external_render = true;
            entity.invalidate_plan();
            tracing::debug!("{} needs external rendering", entity.display_name);
            Classification::External
        } else {
            entity.set_load_status(LoadStatus::RenderFailed);
            tracing::debug!("{} cannot be rendered without the helper", entity.display_name);
            Classification::RenderFailed
        }
    }
}
