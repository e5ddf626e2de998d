//! Font entities built from host metadata

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::constants::{DEFAULT_STYLE, UNKNOWN_FONT_NAME};
use crate::font::family::FamilyMeta;
use crate::font::normalize::{normalize, push_unique};
use crate::font::resolve::RenderPlan;
use crate::font::LoadStatus;
use crate::preview::{PreviewImage, PreviewKey};

/// One font face as reported by the host application
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostFont {
    pub name: Option<String>,
    pub family: Option<String>,
    pub style: Option<String>,
    pub post_script_name: Option<String>,
    pub native_family: Option<String>,
    pub native_style: Option<String>,
    pub native_full: Option<String>,
    pub location: Option<String>,
}

/// One font face known to the host, plus everything derived for previews.
///
/// Style-affecting inputs are private and only change through setters that
/// bump the generation, which invalidates the memoized plan and probe.
#[derive(Debug, Clone)]
pub struct FontEntity {
    pub uid: String,
    pub display_name: String,
    pub family: String,
    style: String,
    pub post_script_name: String,
    pub native_family: Option<String>,
    pub native_style: Option<String>,
    pub native_full: Option<String>,
    pub location: Option<String>,
    css_families: Vec<String>,

    aliases: BTreeSet<String>,
    normalized_aliases: BTreeSet<String>,

    pub requires_external_render: bool,
    load_status: LoadStatus,
    family_meta: Option<FamilyMeta>,
    /// Canonical key addressing the helper catalog
    pub external_key: String,
    /// Name the helper knows this font by
    pub external_lookup: String,
    /// Catalog entry this font matched, looked up by key on demand
    pub catalog_key: Option<String>,
    pub can_apply: bool,

    pub last_image: Option<PreviewImage>,
    pub current_cache_key: Option<PreviewKey>,
    pub failed_cache_key: Option<PreviewKey>,

    generation: u64,
    plan_memo: Option<(u64, RenderPlan)>,
    available_memo: Option<(u64, Vec<String>)>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl FontEntity {
    /// Build an entity from host metadata; `index` gives the per-load uid
    pub fn from_host(font: &HostFont, index: usize) -> Self {
        let display_name = non_empty(&font.name)
            .or_else(|| non_empty(&font.family))
            .or_else(|| non_empty(&font.post_script_name))
            .unwrap_or(UNKNOWN_FONT_NAME)
            .to_string();
        let family = non_empty(&font.family).unwrap_or(&display_name).to_string();
        let style = non_empty(&font.style).unwrap_or(DEFAULT_STYLE).to_string();
        let post_script_name = non_empty(&font.post_script_name)
            .unwrap_or(&display_name)
            .to_string();

        let css_families = build_css_candidates(&display_name, &family, &style, &post_script_name);

        let mut entity = Self {
            uid: format!("font-{}", index),
            external_key: normalize(&display_name),
            external_lookup: display_name.clone(),
            display_name,
            family,
            style,
            post_script_name,
            native_family: non_empty(&font.native_family).map(str::to_string),
            native_style: non_empty(&font.native_style).map(str::to_string),
            native_full: non_empty(&font.native_full).map(str::to_string),
            location: non_empty(&font.location).map(str::to_string),
            css_families,
            aliases: BTreeSet::new(),
            normalized_aliases: BTreeSet::new(),
            requires_external_render: false,
            load_status: LoadStatus::Unresolved,
            family_meta: None,
            catalog_key: None,
            can_apply: true,
            last_image: None,
            current_cache_key: None,
            failed_cache_key: None,
            generation: 0,
            plan_memo: None,
            available_memo: None,
        };
        entity.seed_aliases();
        entity
    }

    fn seed_aliases(&mut self) {
        let mut seeds = vec![
            self.display_name.clone(),
            self.family.clone(),
            self.post_script_name.clone(),
            format!("{} {}", self.family, self.style),
            format!("{} {}", self.display_name, self.style),
            format!("{}-{}", self.family, self.style),
            format!("{}-{}", self.display_name, self.style),
        ];
        if let (Some(native_family), Some(native_style)) = (&self.native_family, &self.native_style) {
            seeds.push(format!("{} {}", native_family, native_style));
            seeds.push(format!("{}-{}", native_family, native_style));
        }
        seeds.extend(self.css_families.iter().cloned());
        for alias in seeds {
            self.add_alias(&alias);
        }
    }

    /// Record an alternate name; the alias sets only ever grow
    pub fn add_alias(&mut self, alias: &str) {
        let value = alias.trim();
        if value.is_empty() {
            return;
        }
        self.aliases.insert(value.to_string());
        self.add_normalized_alias(&normalize(value));
    }

    /// Record an already-canonical key
    pub fn add_normalized_alias(&mut self, key: &str) {
        if !key.is_empty() {
            self.normalized_aliases.insert(key.to_string());
        }
    }

    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }

    pub fn normalized_aliases(&self) -> &BTreeSet<String> {
        &self.normalized_aliases
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn css_families(&self) -> &[String] {
        &self.css_families
    }

    pub fn load_status(&self) -> LoadStatus {
        self.load_status
    }

    pub fn family_meta(&self) -> Option<&FamilyMeta> {
        self.family_meta.as_ref()
    }

    pub fn set_style(&mut self, style: &str) {
        if self.style != style {
            self.style = style.to_string();
            self.invalidate_plan();
        }
    }

    pub fn set_css_families(&mut self, families: Vec<String>) {
        let mut deduped = Vec::with_capacity(families.len());
        for family in &families {
            push_unique(&mut deduped, family);
        }
        for family in &deduped {
            self.add_alias(family);
        }
        self.css_families = deduped;
        self.invalidate_plan();
    }

    pub fn set_load_status(&mut self, status: LoadStatus) {
        if self.load_status != status {
            self.load_status = status;
            self.invalidate_plan();
        }
    }

    pub fn set_family_meta(&mut self, meta: Option<FamilyMeta>) {
        self.family_meta = meta;
        self.invalidate_plan();
    }

    /// Mark the render plan and surface probe stale
    pub fn invalidate_plan(&mut self) {
        self.generation += 1;
        self.plan_memo = None;
        self.available_memo = None;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn cached_plan(&self) -> Option<&RenderPlan> {
        match &self.plan_memo {
            Some((generation, plan)) if *generation == self.generation => Some(plan),
            _ => None,
        }
    }

    pub(crate) fn store_plan(&mut self, plan: RenderPlan) {
        self.plan_memo = Some((self.generation, plan));
    }

    pub(crate) fn cached_available(&self) -> Option<&[String]> {
        match &self.available_memo {
            Some((generation, list)) if *generation == self.generation => Some(list),
            _ => None,
        }
    }

    pub(crate) fn store_available(&mut self, list: Vec<String>) {
        self.available_memo = Some((self.generation, list));
    }

    /// Marker distinguishing faces that share an external key
    pub fn style_marker(&self) -> &str {
        if self.post_script_name.is_empty() {
            &self.style
        } else {
            &self.post_script_name
        }
    }

    /// Name used when applying this font to document layers
    pub fn apply_name(&self) -> &str {
        if self.post_script_name.is_empty() {
            &self.display_name
        } else {
            &self.post_script_name
        }
    }

    /// Every known name for this font, most specific first, deduplicated
    pub fn request_aliases(&self) -> Vec<String> {
        let mut list = Vec::new();
        push_unique(&mut list, &self.display_name);
        push_unique(&mut list, &self.external_lookup);
        push_unique(&mut list, &self.post_script_name);
        push_unique(&mut list, &self.family);
        if let Some(native_family) = &self.native_family {
            push_unique(&mut list, native_family);
        }
        if let Some(native_full) = &self.native_full {
            push_unique(&mut list, native_full);
        }
        if let (Some(native_family), Some(native_style)) = (&self.native_family, &self.native_style) {
            push_unique(&mut list, &format!("{} {}", native_family, native_style));
            push_unique(&mut list, &format!("{}-{}", native_family, native_style));
        }
        for alias in &self.aliases {
            push_unique(&mut list, alias);
        }
        list
    }

    /// Name sent as the primary identifier in helper requests
    pub fn request_name(&self) -> &str {
        [
            self.display_name.as_str(),
            self.native_full.as_deref().unwrap_or_default(),
            self.external_lookup.as_str(),
            self.post_script_name.as_str(),
            self.family.as_str(),
        ]
        .into_iter()
        .find(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_FONT_NAME)
    }
}

/// CSS family candidates for a font, first-seen order, deduplicated
fn build_css_candidates(display_name: &str, family: &str, style: &str, post_script_name: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    push_unique(&mut candidates, post_script_name);
    push_unique(&mut candidates, family);
    push_unique(&mut candidates, display_name);
    push_unique(&mut candidates, &display_name.replace('_', " "));
    push_unique(&mut candidates, &family.replace('_', " "));
    push_unique(&mut candidates, &post_script_name.replace(['_', '-'], " "));
    if !style.is_empty() {
        push_unique(&mut candidates, &format!("{} {}", family, style));
        push_unique(&mut candidates, &format!("{}-{}", family, style));
        push_unique(&mut candidates, &format!("{} {}", display_name, style));
        push_unique(&mut candidates, &format!("{}-{}", display_name, style));
    }
    if candidates.is_empty() {
        candidates.push(display_name.to_string());
    }
    candidates
}
