//! Seams between the preview pipeline and its collaborators

use std::path::PathBuf;

use crate::error::PreviewResult;
use crate::helper::wire::{PreviewRequest, PreviewResponse};
use crate::host::ApplyResult;
use crate::font::entity::HostFont;

/// A surface that draws text with locally available font faces
pub trait FontSurface: Send + Sync {
    /// Live membership check for a family name
    fn has_family(&self, family: &str) -> bool;

    /// Whether `has_family` answers anything meaningful.
    ///
    /// Surfaces that cannot probe make the resolver trust the first candidate.
    fn supports_probe(&self) -> bool {
        true
    }
}

/// Anything that can render a batch of previews out of process
pub trait PreviewService: Send + Sync {
    /// Whether a batch may be issued right now
    fn is_ready(&self) -> bool;

    /// Issue one batch request.
    ///
    /// `Err` means the request never completed (transport, status or body
    /// failure). `Ok` with missing request ids means those fonts could not
    /// be rendered.
    fn fetch_batch(
        &self,
        requests: &[PreviewRequest],
        text: &str,
        size: u32,
    ) -> PreviewResult<Vec<PreviewResponse>>;
}

/// The host application that owns the font list and the document
pub trait HostBridge {
    /// Fetch the current font list
    fn fetch_fonts(&self) -> PreviewResult<Vec<HostFont>>;

    /// Apply a font name to the selected document layers
    fn apply_font(&self, name: &str) -> PreviewResult<ApplyResult>;

    /// Install directory of the extension, used to locate the helper
    fn extension_path(&self) -> Option<PathBuf> {
        None
    }
}
