//! Session driver: one browsing session from page open to persisted sink.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::admission::AdmissionDesk;
use crate::browser::{Browser, BrowserPage};
use crate::config::HarvestConfig;
use crate::controller::{ControllerReport, ControllerSettings, PaginationController, Termination};
use crate::observer::{ApiFilter, ObserverStats, ResponseObserver};
use crate::pacing::{HumanPacing, InteractionPacing};
use crate::sink::write_pages;
use crate::types::{BrowserError, HarvestResult, NetworkResponse};

/// How long to wait for the observer to drain after the page is closed.
const OBSERVER_DRAIN: Duration = Duration::from_secs(5);

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub termination: Termination,
    pub attempts: u32,
    pub correlated: u32,
    pub pages: usize,
    pub output: PathBuf,
    pub observer: ObserverStats,
}

impl SessionReport {
    pub fn is_aborted(&self) -> bool {
        self.termination.is_aborted()
    }
}

pub struct HarvestSession {
    config: HarvestConfig,
    pacing: Arc<dyn InteractionPacing>,
}

impl HarvestSession {
    pub fn new(config: HarvestConfig) -> Self {
        let pacing: Arc<dyn InteractionPacing> = Arc::new(HumanPacing::from_config(&config));
        Self { config, pacing }
    }

    /// Replace the interaction pacing strategy.
    pub fn with_pacing(mut self, pacing: Arc<dyn InteractionPacing>) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Run the session to a terminal state and persist the collection.
    ///
    /// The sink is written whether pagination ended exhausted or aborted;
    /// callers inspect [`SessionReport::termination`] to tell the two apart.
    /// Errors are returned only for invalid configuration, a browser that
    /// cannot open a page, or a sink that cannot be written.
    pub async fn run(&self, browser: &dyn Browser, output: &Path) -> HarvestResult<SessionReport> {
        self.config.validate()?;
        let url = self.config.target_url()?.to_string();

        let desk = AdmissionDesk::spawn(self.config.token_collision);
        let mut page = match browser.open_page().await {
            Ok(page) => page,
            Err(e) => {
                shutdown(browser).await;
                return Err(e.into());
            }
        };

        // Subscribe before navigation so the first load is seen by both.
        let observer = ResponseObserver::new(ApiFilter::new(self.config.api_path.clone()), desk.handle());
        let observer_task = tokio::spawn(observer.run(page.responses()));
        let probe_rx = page.responses();

        let report = match self.drive(&mut *page, &url, probe_rx, &desk).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("navigation to {url} failed: {e}");
                ControllerReport {
                    termination: Termination::Aborted {
                        error: e.to_string(),
                    },
                    attempts: 0,
                    correlated: 0,
                }
            }
        };

        if let Err(e) = page.close().await {
            tracing::warn!("page did not close cleanly: {e}");
        }
        shutdown(browser).await;

        let observer_stats = drain_observer(observer_task).await;
        let pages = desk.finish().await?;
        write_pages(output, &pages)?;

        match &report.termination {
            Termination::Exhausted { reason } => tracing::info!(
                "session finished ({reason:?}): {} pages after {} attempts",
                pages.len(),
                report.attempts
            ),
            Termination::Aborted { error } => tracing::error!(
                "session aborted ({error}); persisted {} pages collected so far",
                pages.len()
            ),
        }

        Ok(SessionReport {
            termination: report.termination,
            attempts: report.attempts,
            correlated: report.correlated,
            pages: pages.len(),
            output: output.to_path_buf(),
            observer: observer_stats,
        })
    }

    async fn drive(
        &self,
        page: &mut dyn BrowserPage,
        url: &str,
        probe_rx: broadcast::Receiver<NetworkResponse>,
        desk: &AdmissionDesk,
    ) -> Result<ControllerReport, BrowserError> {
        tracing::info!("opening {url}");
        page.navigate(url).await?;

        let mut controller = PaginationController::new(
            ControllerSettings::from(&self.config),
            Arc::clone(&self.pacing),
            desk.handle(),
        );
        Ok(controller.run(page, probe_rx).await)
    }
}

async fn shutdown(browser: &dyn Browser) {
    if let Err(e) = browser.shutdown().await {
        tracing::warn!("browser did not shut down cleanly: {e}");
    }
}

/// Wait for the observer to see the closed stream. A stuck observer is
/// aborted so the collection can still be persisted.
async fn drain_observer(task: JoinHandle<ObserverStats>) -> ObserverStats {
    let abort = task.abort_handle();
    match tokio::time::timeout(OBSERVER_DRAIN, task).await {
        Ok(Ok(stats)) => stats,
        Ok(Err(e)) => {
            tracing::warn!("observer task failed: {e}");
            ObserverStats::default()
        }
        Err(_) => {
            tracing::warn!("observer did not drain within {}s, stopping it", OBSERVER_DRAIN.as_secs());
            abort.abort();
            ObserverStats::default()
        }
    }
}
