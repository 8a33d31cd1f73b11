//! Capture mode: run a browsing session, then optionally flatten the result.

use anyhow::{bail, Context, Result};

use comment_harvest::{Browser, HarvestConfig, HarvestSession, SessionReport, Termination};

use crate::config::OutputPaths;
use crate::export::export_sink;
use crate::renderer::{BrowserOptions, ChromiumBrowser};

/// Run the capture command.
pub async fn run(config: HarvestConfig, paths: &OutputPaths, parse: bool) -> Result<()> {
    config.validate().context("invalid configuration")?;

    let browser = ChromiumBrowser::launch(BrowserOptions::from(&config)).await?;
    let report = capture(&browser, config, paths).await?;

    if parse {
        export_sink(&paths.json, &paths.table)?;
    } else {
        tracing::info!("--no-parse given, skipping the spreadsheet");
    }

    if let Termination::Aborted { error } = &report.termination {
        bail!(
            "capture aborted after {} attempts ({error}); {} pages saved to {}",
            report.attempts,
            report.pages,
            report.output.display()
        );
    }
    Ok(())
}

/// Run one session against any browser backend and log its summary.
pub async fn capture(
    browser: &dyn Browser,
    config: HarvestConfig,
    paths: &OutputPaths,
) -> Result<SessionReport> {
    let report = HarvestSession::new(config)
        .run(browser, &paths.json)
        .await
        .context("capture session failed")?;

    tracing::info!(
        "captured {} pages in {} attempts ({} correlated), saved to {}",
        report.pages,
        report.attempts,
        report.correlated,
        report.output.display()
    );
    tracing::debug!("observer: {:?}", report.observer);
    Ok(report)
}
