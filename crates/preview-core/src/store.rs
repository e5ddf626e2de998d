//! Font entities of one host font-list load

use std::collections::HashMap;

use crate::catalog::{merge_catalog, Catalog};
use crate::error::{PreviewError, PreviewResult};
use crate::font::entity::FontEntity;
use crate::font::family::{build_families, FamilyMeta};
use crate::host::ApplyResult;
use crate::traits::HostBridge;

/// Owns every entity of the current load plus lookup indices.
///
/// Reloads replace everything at once; nothing is diffed.
#[derive(Debug, Default)]
pub struct FontStore {
    fonts: Vec<FontEntity>,
    families: Vec<FamilyMeta>,
    by_uid: HashMap<String, usize>,
    /// Normalized alias or external key -> uids sharing it
    by_key: HashMap<String, Vec<String>>,
    search_query: String,
    filtered: Vec<usize>,
    selected: Option<String>,
}

impl FontStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the host font list and replace the store contents with it
    pub fn load_from_host(&mut self, host: &dyn HostBridge) -> PreviewResult<usize> {
        let fonts = host.fetch_fonts()?;
        let entities: Vec<FontEntity> = fonts
            .iter()
            .enumerate()
            .map(|(index, font)| FontEntity::from_host(font, index))
            .collect();
        self.replace_all(entities);
        tracing::info!(
            "Loaded {} fonts in {} families from host",
            self.fonts.len(),
            self.families.len()
        );
        Ok(self.fonts.len())
    }

    /// Swap in a new entity list, rebuilding families and indices
    pub fn replace_all(&mut self, mut entities: Vec<FontEntity>) {
        self.families = build_families(&mut entities);
        self.fonts = entities;
        self.selected = None;
        self.reindex();
        self.apply_filter();
    }

    /// Merge a helper catalog into the current entities
    pub fn merge_catalog(&mut self, catalog: &Catalog) -> usize {
        let matched = merge_catalog(&mut self.fonts, catalog);
        if matched > 0 {
            self.reindex();
        }
        matched
    }

    fn reindex(&mut self) {
        self.by_uid.clear();
        self.by_key.clear();
        for (index, font) in self.fonts.iter().enumerate() {
            self.by_uid.insert(font.uid.clone(), index);
            let keys = std::iter::once(&font.external_key).chain(font.normalized_aliases().iter());
            for key in keys {
                if key.is_empty() {
                    continue;
                }
                let uids = self.by_key.entry(key.clone()).or_default();
                if !uids.contains(&font.uid) {
                    uids.push(font.uid.clone());
                }
            }
        }
    }

    fn apply_filter(&mut self) {
        let query = self.search_query.trim().to_lowercase();
        self.filtered = self
            .fonts
            .iter()
            .enumerate()
            .filter(|(_, font)| query.is_empty() || matches_query(font, &query))
            .map(|(index, _)| index)
            .collect();
    }

    pub fn set_search_query(&mut self, query: &str) {
        self.search_query = query.to_string();
        self.apply_filter();
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Entities passing the search filter, in load order
    pub fn filtered(&self) -> Vec<&FontEntity> {
        self.filtered.iter().filter_map(|&i| self.fonts.get(i)).collect()
    }

    pub fn get(&self, uid: &str) -> Option<&FontEntity> {
        self.by_uid.get(uid).and_then(|&i| self.fonts.get(i))
    }

    pub fn get_mut(&mut self, uid: &str) -> Option<&mut FontEntity> {
        let index = *self.by_uid.get(uid)?;
        self.fonts.get_mut(index)
    }

    /// Entities reachable through a canonical key or alias
    pub fn fonts_by_key(&self, key: &str) -> Vec<&FontEntity> {
        self.by_key
            .get(key)
            .map(|uids| uids.iter().filter_map(|uid| self.get(uid)).collect())
            .unwrap_or_default()
    }

    pub fn fonts(&self) -> &[FontEntity] {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut [FontEntity] {
        &mut self.fonts
    }

    pub fn families(&self) -> &[FamilyMeta] {
        &self.families
    }

    /// Select a font; unknown uids leave the selection unchanged
    pub fn select(&mut self, uid: &str) -> bool {
        if !self.by_uid.contains_key(uid) {
            return false;
        }
        self.selected = Some(uid.to_string());
        true
    }

    pub fn selected(&self) -> Option<&FontEntity> {
        self.selected.as_deref().and_then(|uid| self.get(uid))
    }

    /// Apply the selected font to the host's selected layers
    pub fn apply_selected(&self, host: &dyn HostBridge) -> PreviewResult<ApplyResult> {
        let font = self.selected().ok_or(PreviewError::NoSelection)?;
        if !font.can_apply {
            return Err(PreviewError::Host {
                message: format!("{} cannot be applied", font.display_name),
            });
        }
        let result = host.apply_font(font.apply_name())?;
        tracing::info!("Applied {} to {} layers", font.apply_name(), result.applied_count);
        Ok(result)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

fn matches_query(font: &FontEntity, query: &str) -> bool {
    [
        Some(font.display_name.as_str()),
        Some(font.family.as_str()),
        font.native_family.as_deref(),
        Some(font.post_script_name.as_str()),
        Some(font.style()),
    ]
    .into_iter()
    .flatten()
    .any(|target| target.to_lowercase().contains(query))
}
