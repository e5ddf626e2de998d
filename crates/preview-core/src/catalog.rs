//! The helper's font catalog and its merge into host entities

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::constants::DEFAULT_STYLE;
use crate::error::PreviewResult;
use crate::font::entity::FontEntity;
use crate::font::normalize::normalize;
use crate::helper::wire::{parse_lenient_list, CatalogFont};

/// One font the helper knows how to render
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMeta {
    pub key: String,
    pub name: String,
    pub family: String,
    pub style: String,
    pub paths: Vec<String>,
    /// Always render this font through the helper
    pub force_bitmap: bool,
    /// Whether the font may be applied to documents
    pub apply: bool,
    pub post_script_name: String,
    pub weight: Option<u16>,
    pub aliases: Vec<String>,
    pub normalized_aliases: Vec<String>,
}

impl CatalogMeta {
    /// Build a meta from a wire entry; `None` when the name has no key
    pub fn from_wire(font: CatalogFont) -> Option<Self> {
        let key = normalize(&font.name);
        if key.is_empty() {
            return None;
        }

        let aliases: Vec<String> = font
            .aliases
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .map(str::to_string)
            .collect();
        let mut normalized_aliases: Vec<String> = Vec::new();
        for alias in &aliases {
            let alias_key = normalize(alias);
            if !alias_key.is_empty() && !normalized_aliases.contains(&alias_key) {
                normalized_aliases.push(alias_key);
            }
        }

        Some(Self {
            key,
            family: font.family.filter(|f| !f.is_empty()).unwrap_or_else(|| font.name.clone()),
            style: font.style.filter(|s| !s.is_empty()).unwrap_or_else(|| DEFAULT_STYLE.to_string()),
            post_script_name: font
                .post_script_name
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| font.name.clone()),
            name: font.name,
            paths: font.paths,
            force_bitmap: font.force_bitmap,
            apply: font.apply.unwrap_or(true),
            weight: font.weight,
            aliases,
            normalized_aliases,
        })
    }
}

/// Read-only catalog snapshot for one helper session.
///
/// Both the canonical key and every normalized alias resolve to the same
/// shared `CatalogMeta`. Canonical keys overwrite earlier entries; an alias
/// never displaces a key that is already indexed.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    index: HashMap<String, Arc<CatalogMeta>>,
    entries: Vec<Arc<CatalogMeta>>,
}

impl Catalog {
    pub fn new(metas: Vec<CatalogMeta>) -> Self {
        let mut catalog = Self::default();
        for meta in metas {
            catalog.insert(meta);
        }
        catalog
    }

    /// Parse a `/fonts` body; malformed entries are skipped one by one
    pub fn parse(body: &str) -> PreviewResult<Self> {
        let fonts: Vec<CatalogFont> = parse_lenient_list(body, "fonts", "font catalog")?;
        let catalog = Self::new(fonts.into_iter().filter_map(CatalogMeta::from_wire).collect());
        tracing::debug!(
            "Catalog holds {} fonts under {} keys",
            catalog.len(),
            catalog.index_len()
        );
        Ok(catalog)
    }

    fn insert(&mut self, meta: CatalogMeta) {
        let meta = Arc::new(meta);
        if let Some(previous) = self.index.insert(meta.key.clone(), Arc::clone(&meta)) {
            if previous.key == meta.key {
                self.entries.retain(|entry| !Arc::ptr_eq(entry, &previous));
                for target in self.index.values_mut() {
                    if Arc::ptr_eq(target, &previous) {
                        *target = Arc::clone(&meta);
                    }
                }
            }
        }
        for alias in &meta.normalized_aliases {
            if alias != &meta.key {
                self.index
                    .entry(alias.clone())
                    .or_insert_with(|| Arc::clone(&meta));
            }
        }
        self.entries.push(meta);
    }

    /// Look up a canonical key or a normalized alias
    pub fn get(&self, key: &str) -> Option<&Arc<CatalogMeta>> {
        self.index.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Distinct catalog fonts, in listing order
    pub fn entries(&self) -> impl Iterator<Item = &Arc<CatalogMeta>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of keys and aliases that resolve to an entry
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the catalog entry for an entity by any of its names
    pub fn find_for(&self, entity: &FontEntity) -> Option<Arc<CatalogMeta>> {
        let mut keys: Vec<String> = Vec::new();
        let mut push = |key: String| {
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        };
        push(normalize(&entity.external_key));
        push(normalize(&entity.display_name));
        push(normalize(&entity.family));
        push(normalize(&entity.post_script_name));
        for alias in entity.aliases() {
            push(normalize(alias));
        }
        for key in entity.normalized_aliases() {
            push(key.clone());
        }

        keys.iter().find_map(|key| self.get(key).cloned())
    }
}

/// Annotate entities with their catalog identity.
///
/// Matched entities take the catalog's key, lookup name and aliases;
/// `force_bitmap` entries flag the entity for external rendering. Returns
/// the number of matched entities. An empty catalog is a no-op.
pub fn merge_catalog(entities: &mut [FontEntity], catalog: &Catalog) -> usize {
    if catalog.is_empty() {
        return 0;
    }

    let mut matched = 0;
    for entity in entities.iter_mut() {
        let Some(meta) = catalog.find_for(entity) else {
            continue;
        };
        entity.external_key = meta.key.clone();
        entity.external_lookup = meta.name.clone();
        entity.catalog_key = Some(meta.key.clone());
        entity.can_apply = meta.apply;
        for alias in &meta.aliases {
            entity.add_alias(alias);
        }
        for alias in &meta.normalized_aliases {
            entity.add_normalized_alias(alias);
        }
        if meta.force_bitmap && !entity.requires_external_render {
            entity.requires_external_render = true;
            entity.invalidate_plan();
        }
        matched += 1;
    }

    tracing::info!("Matched {} of {} fonts against the helper catalog", matched, entities.len());
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::entity::HostFont;

    const BODY: &str = r#"{"fonts": [
        {"name": "Nanum Gothic", "aliases": ["나눔고딕", "NanumGothic", 7, " "], "forceBitmap": true},
        {"name": "Arial", "family": "Arial", "apply": false},
        {"family": "no name"},
        {"name": "Nanum-Gothic Coding", "aliases": ["Arial"]}
    ], "count": 4}"#;

    fn host(name: &str) -> FontEntity {
        FontEntity::from_host(
            &HostFont {
                name: Some(name.to_string()),
                ..HostFont::default()
            },
            0,
        )
    }

    #[test]
    fn test_parse_skips_malformed_entries() {
        let catalog = Catalog::parse(BODY).unwrap();
        assert_eq!(catalog.len(), 3);

        let nanum = catalog.get("nanumgothic").unwrap();
        assert_eq!(nanum.aliases, vec!["나눔고딕", "NanumGothic"]);
        assert_eq!(nanum.style, "Regular");
        assert_eq!(nanum.post_script_name, "Nanum Gothic");
        assert!(Arc::ptr_eq(nanum, catalog.get("나눔고딕").unwrap()));
    }

    #[test]
    fn test_alias_never_displaces_canonical_key() {
        let catalog = Catalog::parse(BODY).unwrap();
        assert_eq!(catalog.get("arial").map(|m| m.name.as_str()), Some("Arial"));
        assert!(!catalog.get("arial").unwrap().apply);
    }

    #[test]
    fn test_parse_failures() {
        assert!(Catalog::parse("<html>").is_err());
        assert!(Catalog::parse(r#"{"fonts": null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_merge_by_native_alias() {
        let catalog = Catalog::parse(BODY).unwrap();
        let mut entities = vec![host("나눔고딕"), host("Courier")];
        assert_eq!(merge_catalog(&mut entities, &catalog), 1);

        let nanum = &entities[0];
        assert_eq!(nanum.external_key, "nanumgothic");
        assert_eq!(nanum.external_lookup, "Nanum Gothic");
        assert_eq!(nanum.catalog_key.as_deref(), Some("nanumgothic"));
        assert!(nanum.requires_external_render);
        assert!(nanum.aliases().contains("NanumGothic"));

        assert!(entities[1].catalog_key.is_none());
        assert!(!entities[1].requires_external_render);
    }

    #[test]
    fn test_merge_with_empty_catalog_is_noop() {
        let mut entities = vec![host("Arial")];
        let before = entities[0].generation();
        assert_eq!(merge_catalog(&mut entities, &Catalog::default()), 0);
        assert_eq!(entities[0].generation(), before);
        assert!(entities[0].catalog_key.is_none());
    }
}
