//! Comment Harvest: capture-and-deduplication engine for paginated,
//! API-backed comment threads.
//!
//! A session opens the target page, passively observes every API response
//! it produces, and repeatedly triggers the thread's "load more" control
//! until no further page is announced. Pages reach the collection through
//! a single admission point that deduplicates by continuation token and
//! content fingerprint, so the passive and the interactive capture paths
//! never produce duplicates.

pub mod acceptor;
pub mod admission;
pub mod browser;
pub mod config;
pub mod controller;
pub mod dedup;
pub mod fingerprint;
pub mod flatten;
pub mod observer;
pub mod pacing;
pub mod payload;
pub mod session;
pub mod sink;
pub mod types;

pub use acceptor::{PageAcceptor, TokenCollisionPolicy};
pub use admission::{AdmissionDesk, AdmissionHandle};
pub use browser::{Bounds, Browser, BrowserPage, ContinueControl, ControlState, TriggerMethod};
pub use config::HarvestConfig;
pub use controller::{
    ControllerReport, ControllerSettings, ControllerState, PaginationController, StopReason,
    Termination,
};
pub use dedup::DedupStore;
pub use fingerprint::fingerprint;
pub use flatten::{flatten_pages, CommentRow};
pub use observer::{ApiFilter, Observation, ObserverStats, ResponseObserver};
pub use pacing::{FixedPacing, HumanPacing, InteractionPacing, ScrollStep};
pub use payload::{extract_commentable, read_continuation, PayloadError};
pub use session::{HarvestSession, SessionReport};
pub use sink::{read_pages, write_pages};
pub use types::*;
