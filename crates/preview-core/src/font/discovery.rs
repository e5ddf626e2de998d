//! Local font surface backed by a font database
//!
//! Family names come from the faces themselves (the `name` table), so a
//! bold file such as `arialbd.ttf` registers as "Arial" and every face of
//! a `.ttc` collection is registered on its own.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::font::normalize::normalize;
use crate::traits::FontSurface;

/// A `FontSurface` answering from installed faces, extra font folders and
/// families registered explicitly
#[derive(Debug, Default)]
pub struct SystemFontSurface {
    font_dirs: Vec<PathBuf>,
    system_fonts: bool,
    known: HashSet<String>,
    faces: usize,
}

impl SystemFontSurface {
    /// A surface over `font_dirs` only
    pub fn new(font_dirs: Vec<PathBuf>) -> Self {
        Self {
            font_dirs,
            ..Self::default()
        }
    }

    /// Also load the platform's installed fonts on `scan`
    pub fn with_system_fonts(mut self) -> Self {
        self.system_fonts = true;
        self
    }

    /// Installed fonts, scanned once
    #[cfg(feature = "font-discovery")]
    pub fn discover() -> Self {
        let mut surface = Self::new(Vec::new()).with_system_fonts();
        surface.scan();
        surface
    }

    /// Reload every face and register its family and PostScript names.
    ///
    /// Missing folders are skipped. Returns the number of known keys.
    #[cfg(feature = "font-discovery")]
    pub fn scan(&mut self) -> usize {
        let mut db = fontdb::Database::new();
        if self.system_fonts {
            db.load_system_fonts();
        }
        for dir in &self.font_dirs {
            if dir.is_dir() {
                db.load_fonts_dir(dir);
            } else {
                tracing::trace!("Skipping missing font folder {}", dir.display());
            }
        }

        self.faces = db.len();
        for face in db.faces() {
            for (family, _) in &face.families {
                self.register(family);
            }
            self.register(&face.post_script_name);
        }
        tracing::debug!(
            "Font surface knows {} keys from {} faces",
            self.known.len(),
            self.faces
        );
        self.known.len()
    }

    #[cfg(not(feature = "font-discovery"))]
    pub fn scan(&mut self) -> usize {
        tracing::debug!("Font discovery disabled; {} registered families", self.known.len());
        self.known.len()
    }

    /// Make a family name known to the surface
    pub fn register(&mut self, family: &str) {
        let key = normalize(family);
        if !key.is_empty() {
            self.known.insert(key);
        }
    }

    /// Faces loaded by the last scan
    pub fn face_count(&self) -> usize {
        self.faces
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

impl FontSurface for SystemFontSurface {
    fn has_family(&self, family: &str) -> bool {
        self.known.contains(&normalize(family))
    }
}
