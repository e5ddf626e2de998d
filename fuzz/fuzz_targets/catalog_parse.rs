#![no_main]
use libfuzzer_sys::fuzz_target;

use preview_core::Catalog;
use preview_core::helper::wire::parse_batch_response;

fuzz_target!(|data: &[u8]| {
    // Limit input size to prevent timeouts
    let data = if data.len() > 64 * 1024 { &data[..64 * 1024] } else { data };
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(catalog) = Catalog::parse(body) {
        assert!(catalog.index_len() >= catalog.len());
        for meta in catalog.entries() {
            assert!(!meta.key.is_empty(), "catalog entry without key");
            assert!(catalog.contains(&meta.key));
        }
    }

    if let Ok(previews) = parse_batch_response(body) {
        for preview in previews {
            assert!(!preview.request_id.is_empty());
            assert!(!preview.image.is_empty());
        }
    }
});
