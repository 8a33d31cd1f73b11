//! Comment Harvest entry point.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use comment_harvest::TokenCollisionPolicy;
use comment_harvest_cli::cli::{capture_cmd, parse_cmd};
use comment_harvest_cli::config::{self, Overrides, DEFAULT_CONFIG_PATH};

#[derive(Parser)]
#[command(
    name = "comment-harvest",
    about = "Capture a paginated comment thread and export it as JSON and CSV",
    version
)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Comments page URL.
    #[arg(long, visible_alias = "comments_page")]
    url: Option<String>,

    /// Capture sink file name (".json" is added when missing).
    #[arg(long = "output_json")]
    output_json: Option<String>,

    /// Spreadsheet file name.
    #[arg(long = "output_table", visible_alias = "output_excel")]
    output_table: Option<String>,

    /// Maximum number of "load more" attempts.
    #[arg(long = "max_clicks")]
    max_clicks: Option<u32>,

    /// Wait for the API response after each click, in milliseconds.
    #[arg(long = "click_timeout_ms")]
    click_timeout_ms: Option<u64>,

    /// Wait after opening the page, in milliseconds.
    #[arg(long = "initial_wait_ms")]
    initial_wait_ms: Option<u64>,

    /// Run the browser headless.
    #[arg(long, value_name = "true|false")]
    headless: Option<bool>,

    #[arg(long = "window_width")]
    window_width: Option<u32>,

    #[arg(long = "window_height")]
    window_height: Option<u32>,

    #[arg(long = "scroll_min")]
    scroll_min: Option<u32>,

    #[arg(long = "scroll_max")]
    scroll_max: Option<u32>,

    /// Seconds.
    #[arg(long = "scroll_sleep_min")]
    scroll_sleep_min: Option<f64>,

    /// Seconds.
    #[arg(long = "scroll_sleep_max")]
    scroll_sleep_max: Option<f64>,

    /// How a repeated continuation token is treated (recover, strict).
    #[arg(long = "token_collision")]
    token_collision: Option<TokenCollisionPolicy>,

    /// Do not add a timestamp to output file names.
    #[arg(long = "no-timestamp")]
    no_timestamp: bool,

    /// Capture only; skip the spreadsheet.
    #[arg(long = "no-parse", conflicts_with = "parse_only")]
    no_parse: bool,

    /// Flatten an existing capture sink; no browser is started.
    #[arg(long = "parse-only")]
    parse_only: bool,

    /// Input sink for parse-only mode.
    #[arg(long = "input_json")]
    input_json: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log_level", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            url: self.url.clone(),
            output_json: self.output_json.clone(),
            output_table: self.output_table.clone(),
            input_json: self.input_json.clone(),
            max_clicks: self.max_clicks,
            click_timeout_ms: self.click_timeout_ms,
            initial_wait_ms: self.initial_wait_ms,
            headless: self.headless,
            window_width: self.window_width,
            window_height: self.window_height,
            scroll_min: self.scroll_min,
            scroll_max: self.scroll_max,
            scroll_sleep_min: self.scroll_sleep_min,
            scroll_sleep_max: self.scroll_sleep_max,
            token_collision: self.token_collision,
            no_timestamp: self.no_timestamp,
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::load_config(&cli.config)?;
    cli.overrides().apply(&mut config);

    let paths = config::output_paths(&config, chrono::Local::now());
    config::log_effective(&config, &paths);

    if cli.parse_only {
        let input = config::parse_input(&config);
        return parse_cmd::run(&input, &paths.table);
    }

    capture_cmd::run(config, &paths, !cli.no_parse).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Exit codes: 0=success, 1=error
    let result = run(cli).await;
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }
    result
}
