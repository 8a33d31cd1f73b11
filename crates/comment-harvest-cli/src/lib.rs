//! Comment Harvest CLI: Chromium-backed capture, YAML configuration and
//! spreadsheet export around the `comment-harvest` engine.

pub mod cli;
pub mod config;
pub mod export;
pub mod renderer;

pub use config::{load_config, make_output_names, output_paths, OutputPaths, Overrides};
pub use export::{export_sink, write_table};
pub use renderer::{find_chromium, BrowserOptions, ChromiumBrowser};
