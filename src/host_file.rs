//! A host bridge backed by a JSON file on disk
//!
//! The file holds either the host's `{success, fonts, error}` reply or a
//! bare array of font objects. Applying a font only records the name.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use preview_core::host::{parse_font_list, ApplyResult};
use preview_core::{HostBridge, HostFont, PreviewError, PreviewResult};

use crate::error::AppResult;

#[derive(Debug)]
pub struct JsonFileHost {
    path: PathBuf,
    fonts: Vec<HostFont>,
    extension_path: Option<PathBuf>,
    applied: Mutex<Vec<String>>,
}

impl JsonFileHost {
    /// Read and parse the font file once
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = fs::read_to_string(&path)?;
        let fonts = parse_fonts(&contents)?;
        info!("Loaded {} host fonts from {}", fonts.len(), path.display());
        Ok(Self {
            path,
            fonts,
            extension_path: None,
            applied: Mutex::new(Vec::new()),
        })
    }

    pub fn with_extension_path(mut self, path: Option<PathBuf>) -> Self {
        self.extension_path = path;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().map(|names| names.clone()).unwrap_or_default()
    }
}

/// Accept the wrapped host reply or a plain array
pub fn parse_fonts(contents: &str) -> PreviewResult<Vec<HostFont>> {
    if contents.trim_start().starts_with('[') {
        let values: Vec<serde_json::Value> = serde_json::from_str(contents)
            .map_err(|e| PreviewError::malformed("font file", e))?;
        let total = values.len();
        let fonts: Vec<HostFont> = values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        if fonts.len() < total {
            debug!("Skipped {} malformed font entries", total - fonts.len());
        }
        return Ok(fonts);
    }
    parse_font_list(contents)
}

impl HostBridge for JsonFileHost {
    fn fetch_fonts(&self) -> PreviewResult<Vec<HostFont>> {
        Ok(self.fonts.clone())
    }

    fn apply_font(&self, name: &str) -> PreviewResult<ApplyResult> {
        self.applied
            .lock()
            .map_err(|_| PreviewError::Host {
                message: "apply log poisoned".to_string(),
            })?
            .push(name.to_string());
        info!("Applied {}", name);
        Ok(ApplyResult { applied_count: 1 })
    }

    fn extension_path(&self) -> Option<PathBuf> {
        self.extension_path.clone()
    }
}
