use std::sync::Arc;

use crate::model::{HourRow, OccupancyGrid, ResourceId};

pub const DEFAULT_PAGE_SIZE: usize = 10;
/// Remaining scroll distance, in layout units, below which another page is revealed.
pub const DEFAULT_SCROLL_THRESHOLD: f64 = 300.0;

/// Viewport geometry from a scroll event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub offset: f64,
    pub content_height: f64,
    pub viewport_height: f64,
}

impl ScrollMetrics {
    /// Scroll distance left before the end of the revealed content.
    pub fn remaining(&self) -> f64 {
        self.content_height - (self.offset + self.viewport_height)
    }

    /// Scrolled all the way down.
    pub fn at_bottom(content_height: f64, viewport_height: f64) -> Self {
        Self {
            offset: (content_height - viewport_height).max(0.0),
            content_height,
            viewport_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub resource_id: ResourceId,
    pub statuses: HourRow,
}

/// What a renderer should draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// No grid yet: show a spinner.
    Loading { last_error: Option<String> },
    Rows {
        rows: Vec<Row>,
        total: usize,
        /// A newer selection is being fetched.
        refreshing: bool,
        /// The last cycle failed; `rows` are from the last good grid.
        last_error: Option<String>,
    },
}

/// Reveals a grid page by page as the viewer scrolls.
#[derive(Debug)]
pub struct Presenter {
    grid: Option<Arc<OccupancyGrid>>,
    revealed: usize,
    page_size: usize,
    scroll_threshold: f64,
    refreshing: bool,
    last_error: Option<String>,
}

impl Presenter {
    pub fn new(page_size: usize, scroll_threshold: f64) -> Self {
        Self {
            grid: None,
            revealed: 0,
            page_size: page_size.max(1),
            scroll_threshold,
            refreshing: false,
            last_error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.grid.is_none()
    }

    pub fn grid(&self) -> Option<&Arc<OccupancyGrid>> {
        self.grid.as_ref()
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }

    /// Replace the grid wholesale and start over at one page.
    pub fn install(&mut self, grid: Arc<OccupancyGrid>) {
        self.revealed = self.page_size.min(grid.len());
        self.grid = Some(grid);
        self.refreshing = false;
        self.last_error = None;
    }

    pub fn begin_refresh(&mut self) {
        self.refreshing = true;
    }

    /// A cycle failed. Whatever is shown stays.
    pub fn fail(&mut self, error: impl ToString) {
        self.refreshing = false;
        self.last_error = Some(error.to_string());
    }

    /// Reveal one more page if the viewport is close to the end. Returns true when
    /// rows were added.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics) -> bool {
        if metrics.remaining() >= self.scroll_threshold {
            return false;
        }
        self.reveal_next_page()
    }

    pub fn reveal_next_page(&mut self) -> bool {
        let Some(grid) = &self.grid else {
            return false;
        };
        let next = self.revealed.saturating_add(self.page_size).min(grid.len());
        if next == self.revealed {
            return false;
        }
        self.revealed = next;
        true
    }

    /// `None` while loading; otherwise the first `revealed` rows in resource order.
    pub fn visible_rows(&self) -> Option<Vec<Row>> {
        let grid = self.grid.as_ref()?;
        Some(
            grid.rows(self.revealed)
                .map(|(id, statuses)| Row {
                    resource_id: id.clone(),
                    statuses: *statuses,
                })
                .collect(),
        )
    }

    pub fn view(&self) -> View {
        match (&self.grid, self.visible_rows()) {
            (Some(grid), Some(rows)) => View::Rows {
                rows,
                total: grid.len(),
                refreshing: self.refreshing,
                last_error: self.last_error.clone(),
            },
            _ => View::Loading {
                last_error: self.last_error.clone(),
            },
        }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, DEFAULT_SCROLL_THRESHOLD)
    }
}
