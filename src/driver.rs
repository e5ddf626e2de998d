//! Headless driver: the glue a panel UI would otherwise provide
//!
//! Loads the host font list, brings up the helper, classifies a window of
//! "visible" rows and runs preview cycles, writing bitmaps to disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use preview_core::{
    CycleReport, FontStore, FontSurface, HelperSession, HostBridge, LoadStatus, PreviewConfig,
    PreviewEvent, PreviewImage, PreviewOrchestrator, RenderCandidateResolver, SystemFontSurface, VisibleItem,
};

use crate::constants::{MAX_FILE_STEM_LEN, ROW_HEIGHT_PX};
use crate::error::{AppError, AppResult};

/// Read an optional TOML config; missing fields keep their defaults
pub fn load_config(path: Option<&Path>) -> AppResult<PreviewConfig> {
    let Some(path) = path else {
        return Ok(PreviewConfig::default());
    };
    let contents = fs::read_to_string(path)?;
    let config: PreviewConfig = toml::from_str(&contents)?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

pub fn load_store(host: &dyn HostBridge) -> AppResult<FontStore> {
    let mut store = FontStore::new();
    store.load_from_host(host)?;
    Ok(store)
}

/// Installed fonts plus any extra directories, scanned once
pub fn build_surface(extra_dirs: &[PathBuf]) -> SystemFontSurface {
    let mut surface = SystemFontSurface::new(extra_dirs.to_vec()).with_system_fonts();
    let known = surface.scan();
    info!("Font surface knows {} family keys", known);
    surface
}

/// One printable line of `plans` output
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRow {
    pub uid: String,
    pub name: String,
    pub tier: String,
    pub source: String,
    pub candidate: String,
    pub weight: Option<u16>,
    pub css: String,
    pub warnings: Vec<String>,
}

impl std::fmt::Display for PlanRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<9} {:<32} {:<9} {:<12} {}",
            self.uid, self.name, self.tier, self.source, self.css
        )?;
        if let Some(weight) = self.weight {
            write!(f, " [{}]", weight)?;
        }
        if !self.warnings.is_empty() {
            write!(f, " ({})", self.warnings.join(", "))?;
        }
        Ok(())
    }
}

pub fn describe_plans(store: &mut FontStore, surface: &dyn FontSurface) -> Vec<PlanRow> {
    let resolver = RenderCandidateResolver::new(surface);
    store
        .fonts_mut()
        .iter_mut()
        .map(|entity| {
            let plan = resolver.compute_plan(entity);
            PlanRow {
                uid: entity.uid.clone(),
                name: entity.display_name.clone(),
                tier: plan.tier.to_string(),
                source: plan.render_source.to_string(),
                candidate: plan.preferred_family.clone(),
                weight: plan.font_weight,
                css: plan.css_string.clone(),
                warnings: plan.warnings.iter().map(|w| w.to_string()).collect(),
            }
        })
        .collect()
}

/// Rows `first..first + count` plus the overscan margin on both sides
pub fn visible_window(
    store: &FontStore,
    first: usize,
    count: usize,
    width: u32,
    margin_px: u32,
) -> AppResult<Vec<VisibleItem>> {
    let total = store.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    if first >= total || count == 0 {
        return Err(AppError::InvalidWindow { first, count, total });
    }

    let overscan = margin_px.div_ceil(ROW_HEIGHT_PX) as usize;
    let start = first.saturating_sub(overscan);
    let end = first.saturating_add(count).saturating_add(overscan).min(total);
    Ok(store.fonts()[start..end]
        .iter()
        .map(|entity| VisibleItem::new(entity.uid.clone(), width))
        .collect())
}

/// Attach to `url` when given, else start the helper from the host's root
pub fn connect_helper(session: &mut HelperSession, host: &dyn HostBridge, url: Option<&str>) -> bool {
    match url {
        Some(url) => session.attach(url),
        None => session.ensure_ready_with_host(host),
    }
}

/// File stem `<uid>-<name>` with anything outside `[A-Za-z0-9_-]` replaced
pub fn file_stem(uid: &str, name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_FILE_STEM_LEN)
        .collect();
    format!("{}-{}", uid, cleaned.trim_matches('_'))
}

pub fn write_image(out_dir: &Path, stem: &str, image: &PreviewImage) -> AppResult<PathBuf> {
    let bytes = image.decode()?;
    let path = out_dir.join(format!("{}.{}", stem, image.extension()));
    fs::write(&path, bytes)?;
    Ok(path)
}

/// Inputs for one `preview` run
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub out_dir: PathBuf,
    pub text: Option<String>,
    pub size: Option<u32>,
    pub first: usize,
    pub count: usize,
    pub width: u32,
    pub url: Option<String>,
}

/// What a `preview` run produced
#[derive(Debug, Default)]
pub struct PreviewSummary {
    pub written: Vec<PathBuf>,
    /// Visible fonts a local face draws
    pub local: Vec<String>,
    pub failed: Vec<String>,
    pub report: Option<CycleReport>,
}

/// Classify the window, run one cycle and write every bitmap that arrived.
///
/// Without a helper the window is still classified: local fonts are
/// reported as such and the rest as failed.
pub fn run_preview(
    config: PreviewConfig,
    host: &dyn HostBridge,
    surface: Arc<dyn FontSurface>,
    options: &PreviewOptions,
) -> AppResult<PreviewSummary> {
    let mut store = load_store(host)?;
    let mut session = HelperSession::new(config.clone());
    if !connect_helper(&mut session, host, options.url.as_deref()) {
        warn!("No font helper answered; only local fonts can be previewed");
    }
    let merged = store.merge_catalog(session.catalog());
    info!("Matched {} fonts against the helper catalog", merged);

    let visible = visible_window(
        &store,
        options.first,
        options.count,
        options.width,
        config.visibility_margin_px,
    )?;
    let mut orchestrator = PreviewOrchestrator::new(config, store).with_surface(surface);
    orchestrator.set_service(session.service());
    let events = orchestrator.subscribe();
    if let Some(text) = &options.text {
        orchestrator.set_preview_text(text);
    }
    if let Some(size) = options.size {
        orchestrator.set_font_size(size);
    }
    orchestrator.set_visible_items(visible);

    let report = orchestrator.run_cycle();
    fs::create_dir_all(&options.out_dir)?;

    let mut summary = PreviewSummary {
        report,
        ..PreviewSummary::default()
    };
    for item in orchestrator.visible_items() {
        let Some(entity) = orchestrator.store().get(&item.uid) else {
            continue;
        };
        match entity.load_status() {
            LoadStatus::Local => summary.local.push(item.uid.clone()),
            LoadStatus::RenderFailed => summary.failed.push(item.uid.clone()),
            _ if entity.requires_external_render && !session.is_ready() => {
                summary.failed.push(item.uid.clone())
            }
            _ => {}
        }
    }
    while let Ok(event) = events.try_recv() {
        match event {
            PreviewEvent::ImageReady { uid, image, substituted } => {
                let name = orchestrator
                    .store()
                    .get(&uid)
                    .map(|entity| entity.display_name.clone())
                    .unwrap_or_default();
                if substituted {
                    warn!("{} was rendered with a substitute font", name);
                }
                let path = write_image(&options.out_dir, &file_stem(&uid, &name), &image)?;
                summary.written.push(path);
            }
            PreviewEvent::RenderFailed { uid, .. } => summary.failed.push(uid),
            PreviewEvent::CycleFailed { message } => warn!("Preview cycle failed: {}", message),
            PreviewEvent::CycleFinished(_) => {}
        }
    }

    session.stop();
    Ok(summary)
}
