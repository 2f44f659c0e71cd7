//! Application-level configuration constants.

// Storage
pub const STORAGE_KEY: &str = "focusBracketSettings";
pub const STORAGE_AREA: &str = "sync";
pub const SAVE_DEBOUNCE_MS: u32 = 500;
pub const LOAD_TIMEOUT_MS: u32 = 5_000;

// Keyboard command steps (percentage points of viewport height)
pub const MOVE_STEP: f64 = 10.0;
pub const RESIZE_STEP: f64 = 5.0;

// Clamp ranges for persisted fields
pub const TOP_OFFSET_RANGE: (f64, f64) = (0.0, 80.0);
pub const BRACKET_HEIGHT_RANGE: (f64, f64) = (2.0, 60.0);
pub const SIDE_POSITION_RANGE: (f64, f64) = (0.0, 40.0);
pub const OPACITY_RANGE: (f64, f64) = (0.0, 1.0);
pub const MIN_BRACKET_WIDTH: u32 = 1;
pub const MAX_BRACKET_WIDTH: u32 = 20;

// Default values
pub const DEFAULT_TOP_OFFSET: f64 = 40.0;
pub const DEFAULT_BRACKET_HEIGHT: f64 = 20.0;
pub const DEFAULT_SIDE_POSITION: f64 = 8.0;
pub const DEFAULT_SHADING_COLOR: &str = "#000000";
pub const DEFAULT_SHADING_OPACITY: f64 = 0.75;
pub const DEFAULT_BRACKET_COLOR: &str = "#00ff00";
pub const DEFAULT_BRACKET_WIDTH: u32 = 7;

// Detector
pub const DETECT_SELECTORS: &[&str] = &[
    "article p",
    "main p",
    "[role=\"main\"] p",
    ".content p",
    ".post-content p",
    ".article-content p",
    ".entry-content p",
    "p",
];
pub const PREFERRED_SAMPLE: usize = 5;
pub const MIN_VALID_BLOCKS: usize = 3;
pub const MIN_TEXT_CHARS: usize = 100;
pub const MIN_BLOCK_WIDTH_PX: f64 = 200.0;
pub const MAX_BLOCK_WIDTH_RATIO: f64 = 0.9;
pub const MIN_BLOCK_HEIGHT_PX: f64 = 20.0;
pub const MAX_VIEWPORTS_DOWN: f64 = 3.0;
pub const EDGE_PADDING_PX: f64 = 25.0;
pub const CONTENT_WIDTH_RANGE: (f64, f64) = (30.0, 90.0);
pub const MIN_CONFIDENCE: f64 = 40.0;
pub const LAYOUT_CHANGE_THRESHOLD: f64 = 5.0;

// Overlay layout
pub const HANDLE_INSET_PX: f64 = 30.0;
pub const Z_SHADE: u32 = 9999;
pub const Z_LINE: u32 = 10000;
pub const Z_CONTROL: u32 = 10001;
pub const Z_PANEL: u32 = 10002;
