// src/constants.rs

// Helper process constants
pub const DEFAULT_HELPER_PORT: u16 = 8765;
pub const PORT_SCAN_SPAN: u16 = 24;
pub const HELPER_PORT_ENV: &str = "AE_FONT_SERVER_PORT";
pub const HELPER_HOST: &str = "127.0.0.1";
pub const DEFAULT_MAX_RESTARTS: u32 = 2;

// Helper layout under the extension root
pub const HELPER_SCRIPT: &str = "python/font_server.py";
#[cfg(windows)]
pub const BUNDLED_INTERPRETER: &str = "python/runtime/python.exe";
#[cfg(not(windows))]
pub const BUNDLED_INTERPRETER: &str = "python/runtime/bin/python3";
#[cfg(windows)]
pub const PACKAGED_EXECUTABLE: &str = "bin/win/font_server.exe";
#[cfg(not(windows))]
pub const PACKAGED_EXECUTABLE: &str = "bin/unix/font_server";
#[cfg(windows)]
pub const SYSTEM_INTERPRETERS: &[&str] = &["python.exe", "py.exe"];
#[cfg(not(windows))]
pub const SYSTEM_INTERPRETERS: &[&str] = &["python3", "python"];

// Timing constants
pub const READY_TIMEOUT_MS: u64 = 5000;
pub const READY_INTERVAL_MS: u64 = 300;
pub const MIN_READY_INTERVAL_MS: u64 = 10;
pub const REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const DEBOUNCE_MS: u64 = 100;

// Preview constants
pub const PREVIEW_CACHE_CAPACITY: usize = 256;
pub const MAX_PREVIEW_TEXT: usize = 200;
pub const DEFAULT_FONT_SIZE: u32 = 24;
pub const DEFAULT_PREVIEW_TEXT: &str = "The quick brown fox jumps over the lazy dog";
pub const VISIBILITY_MARGIN_PX: u32 = 80;

// Rendering surface constants
pub const GENERIC_FAMILY: &str = "sans-serif";
pub const UNKNOWN_FONT_NAME: &str = "Unknown Font";
pub const DEFAULT_STYLE: &str = "Regular";
