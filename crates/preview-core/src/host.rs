//! Responses of the host application bridge

use serde::Deserialize;

use crate::error::{PreviewError, PreviewResult};
use crate::font::entity::HostFont;

#[derive(Debug, Deserialize)]
struct FontListReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    fonts: Vec<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Result of applying a font to the selected layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    #[serde(default)]
    pub applied_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    applied_count: u32,
    #[serde(default)]
    error: Option<String>,
}

fn host_error(error: Option<String>, fallback: &str) -> PreviewError {
    PreviewError::Host {
        message: error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string()),
    }
}

/// Parse the host's `{success, fonts, error}` font list.
///
/// Entries that are not font objects are skipped.
pub fn parse_font_list(json: &str) -> PreviewResult<Vec<HostFont>> {
    let reply: FontListReply =
        serde_json::from_str(json).map_err(|e| PreviewError::malformed("host font list", e))?;
    if !reply.success {
        return Err(host_error(reply.error, "font list request failed"));
    }

    let total = reply.fonts.len();
    let fonts: Vec<HostFont> = reply
        .fonts
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect();
    if fonts.len() < total {
        tracing::warn!("Skipped {} malformed host font entries", total - fonts.len());
    }
    Ok(fonts)
}

/// Parse the host's `{success, appliedCount, error}` reply
pub fn parse_apply_result(json: &str) -> PreviewResult<ApplyResult> {
    let reply: ApplyReply =
        serde_json::from_str(json).map_err(|e| PreviewError::malformed("apply result", e))?;
    if !reply.success {
        return Err(host_error(reply.error, "apply failed"));
    }
    Ok(ApplyResult {
        applied_count: reply.applied_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_font_list() {
        let json = r#"{"success": true, "fonts": [
            {"name": "Arial", "family": "Arial", "style": "Bold", "postScriptName": "Arial-BoldMT"},
            {"name": "나눔고딕", "nativeFamily": "나눔고딕", "nativeStyle": "보통", "location": "C:/f.ttf"},
            "garbage",
            {"name": 12}
        ]}"#;
        let fonts = parse_font_list(json).unwrap();
        assert_eq!(fonts.len(), 2);
        assert_eq!(fonts[0].post_script_name.as_deref(), Some("Arial-BoldMT"));
        assert_eq!(fonts[1].native_style.as_deref(), Some("보통"));
    }

    #[test]
    fn test_font_list_failure() {
        let err = parse_font_list(r#"{"success": false, "error": "no project"}"#).unwrap_err();
        assert!(matches!(err, PreviewError::Host { ref message } if message == "no project"));
        assert!(parse_font_list("{").is_err());
    }

    #[test]
    fn test_parse_apply_result() {
        let result = parse_apply_result(r#"{"success": true, "appliedCount": 3}"#).unwrap();
        assert_eq!(result.applied_count, 3);
        let err = parse_apply_result(r#"{"success": false}"#).unwrap_err();
        assert!(matches!(err, PreviewError::Host { .. }));
    }
}
