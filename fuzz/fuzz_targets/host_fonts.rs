#![no_main]
use libfuzzer_sys::fuzz_target;

use fontpreview::host_file::parse_fonts;
use preview_core::{FontEntity, FontStore};

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > 64 * 1024 { &data[..64 * 1024] } else { data };
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(fonts) = parse_fonts(body) else {
        return;
    };

    let entities: Vec<FontEntity> = fonts
        .iter()
        .enumerate()
        .map(|(index, font)| FontEntity::from_host(font, index))
        .collect();
    for entity in &entities {
        assert!(!entity.display_name.is_empty());
        assert!(!entity.style().is_empty());
        assert!(entity.normalized_aliases().iter().all(|alias| !alias.is_empty()));
    }

    let mut store = FontStore::new();
    store.replace_all(entities);
    assert_eq!(store.families().iter().map(|f| f.member_count).sum::<usize>(), store.len());
});
