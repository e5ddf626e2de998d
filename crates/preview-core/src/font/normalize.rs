//! Canonical lookup keys for font names and aliases

/// Turn a font name or alias into its canonical key.
///
/// Lower-cases, drops all whitespace and the `_`/`-` separators. The result
/// is the only identity used when matching host fonts to catalog entries.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|ch| !is_separator(*ch))
        .flat_map(char::to_lowercase)
        .filter(|ch| !is_separator(*ch))
        .collect()
}

/// `normalize` for optional inputs; absent names yield an empty key
pub fn normalize_opt(name: Option<&str>) -> String {
    name.map(normalize).unwrap_or_default()
}

fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || ch == '_' || ch == '-'
}

/// Append a trimmed candidate unless it is empty or already present
pub fn push_unique(target: &mut Vec<String>, value: &str) {
    let candidate = value.trim();
    if candidate.is_empty() {
        return;
    }
    if !target.iter().any(|existing| existing == candidate) {
        target.push(candidate.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_separator_insensitive() {
        let expected = normalize("NOTOSANSKR");
        assert_eq!(normalize("Noto Sans-KR"), expected);
        assert_eq!(normalize("noto_sans kr"), expected);
        assert_eq!(expected, "notosanskr");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \t_-"), "");
        assert_eq!(normalize_opt(None), "");
        assert_eq!(normalize_opt(Some("A B")), "ab");
    }

    #[test]
    fn test_unicode_names() {
        assert_eq!(normalize("나눔 고딕"), "나눔고딕");
        assert_eq!(normalize("Ärial\u{3000}Black"), "ärialblack");
    }

    #[test]
    fn test_idempotent_on_random_input() {
        let alphabet: Vec<char> = "aZ _-\t09Éß나İ\u{3000}".chars().collect();
        let mut rng = rand::rng();
        for _ in 0..500 {
            let len = rng.random_range(0..24);
            let input: String = (0..len)
                .map(|_| alphabet[rng.random_range(0..alphabet.len())])
                .collect();
            let once = normalize(&input);
            assert_eq!(normalize(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_push_unique_keeps_first_seen_order() {
        let mut list = Vec::new();
        push_unique(&mut list, " Arial ");
        push_unique(&mut list, "Arial Bold");
        push_unique(&mut list, "Arial");
        push_unique(&mut list, "   ");
        assert_eq!(list, vec!["Arial".to_string(), "Arial Bold".to_string()]);
    }
}
