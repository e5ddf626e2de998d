//! JSON bodies exchanged with the rendering helper

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{PreviewError, PreviewResult};

/// One font in a batch preview request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub post_script_name: Option<String>,
    pub style: Option<String>,
    pub width: u32,
    pub request_id: String,
    /// Catalog key the font matched, if any
    #[serde(rename = "key", skip_serializing_if = "Option::is_none")]
    pub catalog_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchBody<'a> {
    pub fonts: &'a [PreviewRequest],
    pub text: &'a str,
    pub size: u32,
}

/// One rendered preview in a batch response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub request_id: String,
    pub image: String,
    #[serde(default, deserialize_with = "null_as_false")]
    pub substituted: bool,
    #[serde(default)]
    pub font_name: Option<String>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// One entry of the helper's `/fonts` listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFont {
    pub name: String,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub force_bitmap: bool,
    #[serde(default)]
    pub apply: Option<bool>,
    #[serde(default)]
    pub post_script_name: Option<String>,
    #[serde(default)]
    pub weight: Option<u16>,
    #[serde(default)]
    pub aliases: Vec<Value>,
}

/// Deserialize each element of `body[field]` on its own, dropping the
/// elements that do not fit `T`.
///
/// Fails only when the body itself is not JSON. A missing or non-array
/// field yields an empty list.
pub(crate) fn parse_lenient_list<T>(body: &str, field: &str, what: &str) -> PreviewResult<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let root: Value = serde_json::from_str(body).map_err(|e| PreviewError::malformed(what, e))?;
    let Some(items) = root.get(field).and_then(Value::as_array) else {
        tracing::debug!("{} has no '{}' array", what, field);
        return Ok(Vec::new());
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match T::deserialize(item) {
            Ok(value) => parsed.push(value),
            Err(e) => tracing::debug!("Skipping malformed {} entry {}: {}", what, index, e),
        }
    }
    Ok(parsed)
}

/// Parse a `/batch-preview` response, keeping entries with a request id
/// and a non-empty image
pub fn parse_batch_response(body: &str) -> PreviewResult<Vec<PreviewResponse>> {
    let previews: Vec<PreviewResponse> = parse_lenient_list(body, "previews", "batch response")?;
    Ok(previews
        .into_iter()
        .filter(|p| !p.request_id.is_empty() && !p.image.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = PreviewRequest {
            name: "Arial".to_string(),
            aliases: vec![],
            post_script_name: Some("ArialMT".to_string()),
            style: None,
            width: 320,
            request_id: "arial::ArialMT::Hi::24::320".to_string(),
            catalog_key: Some("arial".to_string()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["postScriptName"], "ArialMT");
        assert_eq!(json["requestId"], "arial::ArialMT::Hi::24::320");
        assert_eq!(json["key"], "arial");
        assert!(json.get("aliases").is_none());
        assert!(json["style"].is_null());
    }

    #[test]
    fn test_batch_response_skips_bad_entries() {
        let body = r#"{"previews": [
            {"requestId": "a", "image": "data:image/png;base64,AA=="},
            {"requestId": null, "image": "data:image/png;base64,AA=="},
            {"requestId": "b", "image": ""},
            {"image": "data:image/png;base64,AA=="},
            {"requestId": "c", "image": "data:image/png;base64,AA==", "substituted": true, "fontName": "C"}
        ]}"#;
        let previews = parse_batch_response(body).unwrap();
        let ids: Vec<&str> = previews.iter().map(|p| p.request_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(previews[1].substituted);
    }

    #[test]
    fn test_batch_response_without_previews() {
        assert!(parse_batch_response("{}").unwrap().is_empty());
        assert!(parse_batch_response(r#"{"previews": 3}"#).unwrap().is_empty());
        assert!(parse_batch_response("not json").is_err());
    }

    #[test]
    fn test_null_substituted_keeps_entry() {
        let body = r#"{"previews": [
            {"requestId": "a", "image": "data:image/png;base64,AA==", "substituted": null},
            {"requestId": "b", "image": "data:image/png;base64,AA==", "substituted": true}
        ]}"#;
        let previews = parse_batch_response(body).unwrap();
        assert_eq!(previews.len(), 2);
        assert!(!previews[0].substituted);
        assert!(previews[1].substituted);
    }
}
