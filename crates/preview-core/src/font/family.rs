//! Grouping of font faces into families

use std::collections::{BTreeSet, HashMap};

use crate::font::entity::FontEntity;
use crate::font::resolve::map_style_to_weight;

/// Style words recognised at the end of a face name, longest first
const STYLE_SUFFIXES: &[&[&str]] = &[
    &["extra", "thin"],
    &["extra", "light"],
    &["semi", "bold"],
    &["demi", "bold"],
    &["extra", "bold"],
    &["ultra", "bold"],
    &["hairline"],
    &["ultrathin"],
    &["extralight"],
    &["semibold"],
    &["extrabold"],
    &["thin"],
    &["light"],
    &["book"],
    &["regular"],
    &["normal"],
    &["medium"],
    &["demi"],
    &["bold"],
    &["heavy"],
    &["black"],
    &["ultra"],
    &["italic"],
    &["oblique"],
    &["condensed"],
    &["extended"],
    &["compressed"],
];

/// Family-level facts shared by every member of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyMeta {
    pub id: String,
    pub display_name: String,
    pub member_count: usize,
    pub has_variants: bool,
    /// Distinct numeric weights, ascending
    pub weights: Vec<u16>,
    /// Distinct style names in first-seen order
    pub styles: Vec<String>,
}

/// Strip trailing style words from a face name.
///
/// `_` and `-` become spaces and whitespace collapses. If every word is a
/// style word the trimmed input is returned instead of an empty string.
pub fn strip_style_suffix(name: &str) -> String {
    let spaced = name.replace(['_', '-'], " ");
    let mut words: Vec<&str> = spaced.split_whitespace().collect();
    if words.is_empty() {
        return String::new();
    }

    loop {
        let matched = STYLE_SUFFIXES.iter().find(|suffix| {
            suffix.len() <= words.len()
                && words[words.len() - suffix.len()..]
                    .iter()
                    .zip(suffix.iter())
                    .all(|(word, style)| word.eq_ignore_ascii_case(style))
        });
        match matched {
            Some(suffix) => {
                let keep = words.len() - suffix.len();
                words.truncate(keep);
            }
            None => break,
        }
        if words.is_empty() {
            break;
        }
    }

    if words.is_empty() {
        name.trim().to_string()
    } else {
        words.join(" ")
    }
}

fn family_key(name: &str) -> String {
    strip_style_suffix(name).to_lowercase()
}

fn first_non_empty<'a>(values: &[&'a str]) -> Option<&'a str> {
    values.iter().copied().map(str::trim).find(|v| !v.is_empty())
}

/// Group entities by their style-less family name and stamp each one with
/// its `FamilyMeta`. Returns the metas in first-seen order.
pub fn build_families(entities: &mut [FontEntity]) -> Vec<FamilyMeta> {
    let mut order: Vec<String> = Vec::new();
    let mut members: HashMap<String, Vec<usize>> = HashMap::new();
    let mut names: HashMap<String, String> = HashMap::new();
    let mut anonymous = 0usize;

    for (index, entity) in entities.iter().enumerate() {
        let base = first_non_empty(&[&entity.family, &entity.display_name, &entity.post_script_name])
            .unwrap_or_default();
        let mut key = family_key(base);
        if key.is_empty() {
            key = format!("family-{}", anonymous);
            anonymous += 1;
        }
        if !members.contains_key(&key) {
            order.push(key.clone());
            names.insert(key.clone(), strip_style_suffix(base));
        }
        members.entry(key).or_default().push(index);
    }

    let mut metas = Vec::with_capacity(order.len());
    for key in order {
        let indices = members.remove(&key).unwrap_or_default();
        let mut weights = BTreeSet::new();
        let mut styles: Vec<String> = Vec::new();
        for &index in &indices {
            let style = entities[index].style();
            if let Some(weight) = map_style_to_weight(style) {
                weights.insert(weight);
            }
            if !style.is_empty() && !styles.iter().any(|s| s == style) {
                styles.push(style.to_string());
            }
        }

        let display_name = names
            .remove(&key)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| key.clone());
        let meta = FamilyMeta {
            id: key,
            display_name,
            member_count: indices.len(),
            has_variants: indices.len() > 1,
            weights: weights.into_iter().collect(),
            styles,
        };
        for &index in &indices {
            entities[index].set_family_meta(Some(meta.clone()));
        }
        metas.push(meta);
    }

    tracing::debug!("Grouped {} fonts into {} families", entities.len(), metas.len());
    metas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::entity::HostFont;

    fn entity(family: &str, style: &str, index: usize) -> FontEntity {
        FontEntity::from_host(
            &HostFont {
                name: Some(format!("{} {}", family, style)),
                family: Some(family.to_string()),
                style: Some(style.to_string()),
                ..HostFont::default()
            },
            index,
        )
    }

    #[test]
    fn test_strip_style_suffix() {
        assert_eq!(strip_style_suffix("Roboto-Bold"), "Roboto");
        assert_eq!(strip_style_suffix("Roboto_Light  Italic"), "Roboto");
        assert_eq!(strip_style_suffix("Source Sans Semi Bold"), "Source Sans");
        assert_eq!(strip_style_suffix("Lightning Sans"), "Lightning Sans");
        assert_eq!(strip_style_suffix("Noto Sans KR"), "Noto Sans KR");
    }

    #[test]
    fn test_strip_never_empties() {
        assert_eq!(strip_style_suffix("Bold"), "Bold");
        assert_eq!(strip_style_suffix(" Black Italic "), "Black Italic");
        assert_eq!(strip_style_suffix(""), "");
    }

    #[test]
    fn test_build_families_groups_variants() {
        let mut fonts = vec![
            entity("Roboto", "Regular", 0),
            entity("Roboto", "Bold", 1),
            entity("Arial", "Regular", 2),
            entity("Roboto", "Bold Italic", 3),
        ];
        let families = build_families(&mut fonts);
        assert_eq!(families.len(), 2);

        let roboto = &families[0];
        assert_eq!(roboto.id, "roboto");
        assert_eq!(roboto.member_count, 3);
        assert!(roboto.has_variants);
        assert_eq!(roboto.weights, vec![400, 700]);
        assert_eq!(roboto.styles, vec!["Regular", "Bold", "Bold Italic"]);

        assert!(!families[1].has_variants);
        assert_eq!(fonts[3].family_meta().map(|m| m.id.as_str()), Some("roboto"));
        assert_eq!(fonts[2].family_meta().map(|m| m.member_count), Some(1));
    }
}
