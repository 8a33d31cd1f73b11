//! Browser backends for the capture engine.

pub mod chromium;

pub use chromium::{find_chromium, ChromiumBrowser};

use comment_harvest::HarvestConfig;

/// Launch and page settings for a browser backend.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Only responses whose URL contains this get their body fetched.
    pub api_path: String,
    pub continue_label: String,
    pub continue_selector: String,
}

impl From<&HarvestConfig> for BrowserOptions {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            headless: config.headless,
            window_width: config.window_width,
            window_height: config.window_height,
            api_path: config.api_path.clone(),
            continue_label: config.continue_label.clone(),
            continue_selector: config.continue_selector.clone(),
        }
    }
}
