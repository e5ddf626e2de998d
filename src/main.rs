// src/main.rs
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use fontpreview::constants::{CATALOG_NAME_WIDTH, DEFAULT_PREVIEW_WIDTH, DEFAULT_WINDOW_COUNT};
use fontpreview::driver::{self, PreviewOptions};
use fontpreview::host_file::JsonFileHost;
use fontpreview::logger::init_logger;
use preview_core::{HelperClient, HelperSession};

/// Render plans and helper previews for a host font list
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// TOML file overriding the preview defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// log at debug level
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve and print the render plan of every font
    Plans {
        /// host font list (JSON)
        fonts: PathBuf,
        /// extra font folders for the local surface
        #[arg(long = "font-dir")]
        font_dirs: Vec<PathBuf>,
    },
    /// Start (or reach) the helper and print its catalog
    Catalog {
        /// helper root directory
        #[arg(long)]
        root: Option<PathBuf>,
        /// use a helper already listening here instead of starting one
        #[arg(long)]
        url: Option<String>,
    },
    /// Run one preview cycle over a window of the list and write images
    Preview {
        /// host font list (JSON)
        fonts: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        size: Option<u32>,
        /// first visible row
        #[arg(long, default_value_t = 0)]
        first: usize,
        /// number of visible rows
        #[arg(long, default_value_t = DEFAULT_WINDOW_COUNT)]
        count: usize,
        /// preview slot width in pixels
        #[arg(long, default_value_t = DEFAULT_PREVIEW_WIDTH)]
        width: u32,
        #[arg(long)]
        root: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long = "font-dir")]
        font_dirs: Vec<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logger(args.verbose);

    let config = driver::load_config(args.config.as_deref())
        .with_context(|| format!("failed to load config {:?}", args.config))?;

    match args.command {
        Command::Plans { fonts, font_dirs } => {
            let host = JsonFileHost::open(&fonts)?;
            let mut store = driver::load_store(&host)?;
            let surface = driver::build_surface(&font_dirs);
            for row in driver::describe_plans(&mut store, &surface) {
                println!("{}", row);
            }
        }
        Command::Catalog { root, url } => {
            let catalog = match url {
                Some(url) => HelperClient::from_config(url, &config).try_fetch_catalog()?,
                None => {
                    let mut session = HelperSession::new(config);
                    if !session.ensure_ready(root.as_deref()) {
                        bail!("font helper did not start");
                    }
                    let catalog = session.catalog().clone();
                    session.stop();
                    catalog
                }
            };
            let mut entries: Vec<_> = catalog.entries().collect();
            entries.sort_by(|a, b| a.key.cmp(&b.key));
            for meta in entries {
                println!(
                    "{:<width$} {:<24} {}{}",
                    meta.name,
                    meta.style,
                    meta.post_script_name,
                    if meta.force_bitmap { " [bitmap]" } else { "" },
                    width = CATALOG_NAME_WIDTH
                );
            }
            info!("{} catalog fonts", catalog.len());
        }
        Command::Preview {
            fonts,
            out,
            text,
            size,
            first,
            count,
            width,
            root,
            url,
            font_dirs,
        } => {
            let host = JsonFileHost::open(&fonts)?.with_extension_path(root);
            let surface = Arc::new(driver::build_surface(&font_dirs));
            let options = PreviewOptions {
                out_dir: out,
                text,
                size,
                first,
                count,
                width,
                url,
            };
            let summary = driver::run_preview(config, &host, surface, &options)?;
            for path in &summary.written {
                println!("{}", path.display());
            }
            if !summary.local.is_empty() {
                println!("drawn locally: {}", summary.local.join(", "));
            }
            if !summary.failed.is_empty() {
                println!("no preview for: {}", summary.failed.join(", "));
            }
        }
    }

    Ok(())
}
