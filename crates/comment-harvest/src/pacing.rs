//! Human-like interaction pacing.
//!
//! The pagination loop asks a [`InteractionPacing`] strategy how to scroll
//! and how long to hover before clicking. [`HumanPacing`] randomizes within
//! configured bounds; [`FixedPacing`] is deterministic and is what tests use.

use std::time::Duration;

use rand::Rng;

use crate::config::HarvestConfig;

/// Pause before clicking once the pointer is on the control, in seconds.
const HOVER_PAUSE_SECS: (f64, f64) = (0.15, 0.5);

/// Upper bound for any configured scroll pause, in seconds.
pub const MAX_SCROLL_SLEEP_SECS: f64 = 60.0;

/// Fraction of the viewport covered by one jitter burst.
const SCROLL_COVERAGE: f64 = 0.5;

/// One scroll increment followed by a pause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollStep {
    pub delta_y: f64,
    pub pause: Duration,
}

/// Strategy for randomized movement and delays.
pub trait InteractionPacing: Send + Sync {
    /// Scroll increments to perform before the click.
    fn scroll_plan(&self, viewport_height: f64) -> Vec<ScrollStep>;
    /// Pause after moving the pointer onto the control.
    fn hover_pause(&self) -> Duration;
}

/// Randomized pacing within configured bounds.
#[derive(Debug, Clone)]
pub struct HumanPacing {
    scroll_min: u32,
    scroll_max: u32,
    sleep_min: f64,
    sleep_max: f64,
}

impl HumanPacing {
    pub fn new(scroll_min: u32, scroll_max: u32, sleep_min: f64, sleep_max: f64) -> Self {
        let (scroll_min, scroll_max) = ordered(scroll_min.max(1), scroll_max.max(1));
        let (sleep_min, sleep_max) = ordered(clamp_sleep(sleep_min), clamp_sleep(sleep_max));
        Self {
            scroll_min,
            scroll_max,
            sleep_min,
            sleep_max,
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(
            config.scroll_min,
            config.scroll_max,
            config.scroll_sleep_min,
            config.scroll_sleep_max,
        )
    }
}

impl InteractionPacing for HumanPacing {
    fn scroll_plan(&self, viewport_height: f64) -> Vec<ScrollStep> {
        let mut rng = rand::thread_rng();
        let target = viewport_height.max(0.0) * SCROLL_COVERAGE;
        let mut covered = 0.0;
        let mut steps = Vec::new();
        while covered < target {
            let delta = rng.gen_range(self.scroll_min..=self.scroll_max) as f64;
            covered += delta;
            steps.push(ScrollStep {
                delta_y: delta,
                pause: Duration::from_secs_f64(rng.gen_range(self.sleep_min..=self.sleep_max)),
            });
        }
        steps
    }

    fn hover_pause(&self) -> Duration {
        let (lo, hi) = HOVER_PAUSE_SECS;
        Duration::from_secs_f64(rand::thread_rng().gen_range(lo..=hi))
    }
}

/// Deterministic pacing: no scrolling jitter, constant hover pause.
#[derive(Debug, Clone, Default)]
pub struct FixedPacing {
    pub hover: Duration,
}

impl InteractionPacing for FixedPacing {
    fn scroll_plan(&self, _viewport_height: f64) -> Vec<ScrollStep> {
        Vec::new()
    }

    fn hover_pause(&self) -> Duration {
        self.hover
    }
}

/// NaN counts as zero; everything else lands in `0..=MAX_SCROLL_SLEEP_SECS`.
fn clamp_sleep(secs: f64) -> f64 {
    if secs.is_nan() {
        0.0
    } else {
        secs.clamp(0.0, MAX_SCROLL_SLEEP_SECS)
    }
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
