mod error;

pub use error::PipelineError;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::catalog::{Catalog, CatalogSet};
use crate::detector::ChangeDetector;
use crate::feed::ReservationFeed;
use crate::model::{OccupancyGrid, Selection};
use crate::notify::{Frame, FrameHub};
use crate::observability::rejection_counter;
use crate::presenter::{DEFAULT_PAGE_SIZE, DEFAULT_SCROLL_THRESHOLD, Presenter, ScrollMetrics};
use crate::store::SelectionStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub poll_interval: Duration,
    pub page_size: usize,
    pub scroll_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
            scroll_threshold: DEFAULT_SCROLL_THRESHOLD,
        }
    }
}

/// Result of one fetch + aggregate run.
#[derive(Debug)]
pub struct CycleOutcome {
    pub token: u64,
    pub selection: Selection,
    pub result: Result<OccupancyGrid, PipelineError>,
}

/// What `commit` did with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// New grid installed.
    Applied,
    /// Cycle failed; previous grid kept, failure indicator set.
    Failed,
    /// A newer cycle has started; result dropped.
    Stale,
}

/// Fetch and aggregate one selection against its facility's catalog.
pub async fn run_cycle<F: ReservationFeed + ?Sized>(
    token: u64,
    selection: Selection,
    catalog: &Catalog,
    feed: &F,
) -> CycleOutcome {
    let result = feed
        .fetch(&selection, catalog)
        .await
        .map(|records| aggregate(&records, catalog));
    CycleOutcome {
        token,
        selection,
        result,
    }
}

/// Change detector → feed → aggregator → presenter.
///
/// All state lives here and is touched only from the task driving the pipeline.
/// Cycles run as spawned tasks and report back over a channel; each carries the
/// token it was started with, and only the most recently started token may commit.
pub struct Pipeline<S: SelectionStore, F: ReservationFeed> {
    store: Arc<S>,
    feed: Arc<F>,
    catalogs: Arc<CatalogSet>,
    detector: ChangeDetector,
    presenter: Presenter,
    poll_interval: Duration,
    /// Token of the most recently started cycle.
    latest: u64,
    /// Token of the cycle whose grid is installed.
    committed: u64,
    /// Selection behind the installed grid.
    shown: Option<Selection>,
    outcome_tx: mpsc::UnboundedSender<CycleOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<CycleOutcome>,
    frames: Arc<FrameHub>,
}

impl<S: SelectionStore, F: ReservationFeed> Pipeline<S, F> {
    pub fn new(
        store: Arc<S>,
        feed: Arc<F>,
        catalogs: Arc<CatalogSet>,
        config: PipelineConfig,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            store,
            feed,
            catalogs,
            detector: ChangeDetector::new(),
            presenter: Presenter::new(config.page_size, config.scroll_threshold),
            poll_interval: config.poll_interval,
            latest: 0,
            committed: 0,
            shown: None,
            outcome_tx,
            outcome_rx,
            frames: Arc::new(FrameHub::new()),
        }
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    pub fn latest_token(&self) -> u64 {
        self.latest
    }

    pub fn committed_token(&self) -> u64 {
        self.committed
    }

    pub fn shown(&self) -> Option<&Selection> {
        self.shown.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.frames.subscribe()
    }

    /// Sample the store once; start a cycle if the selection changed.
    /// Returns the new cycle's token.
    pub async fn poll(&mut self) -> Option<u64> {
        let selection = self.detector.sample(self.store.as_ref()).await?;
        let catalog = match self.catalogs.get(selection.facility) {
            Ok(catalog) => catalog.clone(),
            Err(e) => {
                warn!("ignoring stored selection: {e}");
                metrics::counter!(rejection_counter(&e)).increment(1);
                return None;
            }
        };
        Some(self.start_cycle(selection, catalog))
    }

    fn start_cycle(&mut self, selection: Selection, catalog: Arc<Catalog>) -> u64 {
        self.latest += 1;
        let token = self.latest;
        info!(
            "cycle {token}: {} on {} for {}",
            selection.facility, selection.date, selection.user_id
        );
        metrics::counter!(crate::observability::CYCLES_STARTED_TOTAL).increment(1);
        self.presenter.begin_refresh();

        let feed = self.feed.clone();
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let outcome = run_cycle(token, selection, &catalog, feed.as_ref()).await;
            // Receiver gone means the pipeline shut down.
            let _ = tx.send(outcome);
        });
        token
    }

    /// Wait for the next finished cycle.
    pub async fn next_outcome(&mut self) -> Option<CycleOutcome> {
        self.outcome_rx.recv().await
    }

    /// Apply a finished cycle unless a newer one has started since.
    pub fn commit(&mut self, outcome: CycleOutcome) -> Commit {
        let token = outcome.token;
        if token != self.latest {
            debug!("cycle {token}: dropped, cycle {} is newer", self.latest);
            metrics::counter!(crate::observability::CYCLES_STALE_TOTAL).increment(1);
            return Commit::Stale;
        }
        match outcome.result {
            Ok(grid) => {
                info!(
                    "cycle {token}: {} resources for {} on {}",
                    grid.len(),
                    outcome.selection.facility,
                    outcome.selection.date
                );
                self.presenter.install(Arc::new(grid));
                self.committed = token;
                self.shown = Some(outcome.selection);
                metrics::counter!(crate::observability::CYCLES_COMMITTED_TOTAL).increment(1);
                Commit::Applied
            }
            Err(e) => {
                warn!("cycle {token}: {e}; keeping previous grid");
                self.presenter.fail(&e);
                Commit::Failed
            }
        }
    }

    pub fn scroll(&mut self, event: ScrollMetrics) -> bool {
        self.presenter.on_scroll(event)
    }

    fn publish(&self) {
        self.frames.publish(Frame {
            token: self.committed,
            facility: self.shown.as_ref().map(|s| s.facility),
            date: self.shown.as_ref().map(|s| s.date),
            view: self.presenter.view(),
        });
    }

    /// Drive the pipeline until `shutdown` resolves: poll on a fixed interval,
    /// commit finished cycles and apply scroll events, publishing a frame after
    /// every visible change.
    pub async fn run(
        mut self,
        mut scroll_rx: mpsc::Receiver<ScrollMetrics>,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.poll().await.is_some() {
                        self.publish();
                    }
                }
                Some(outcome) = self.outcome_rx.recv() => {
                    if self.commit(outcome) != Commit::Stale {
                        self.publish();
                    }
                }
                Some(event) = scroll_rx.recv() => {
                    if self.scroll(event) {
                        self.publish();
                    }
                }
                _ = &mut shutdown => {
                    info!("pipeline stopping at cycle {}", self.latest);
                    break;
                }
            }
        }
    }
}
