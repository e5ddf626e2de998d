// src/constants.rs

// Headless list geometry
pub const ROW_HEIGHT_PX: u32 = 48;
pub const DEFAULT_PREVIEW_WIDTH: u32 = 480;
pub const DEFAULT_WINDOW_COUNT: usize = 20;

// Output
pub const MAX_FILE_STEM_LEN: usize = 64;
pub const CATALOG_NAME_WIDTH: usize = 36;
