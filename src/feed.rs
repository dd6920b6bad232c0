use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::model::{RawRecord, Selection};
use crate::pipeline::PipelineError;

/// Timestamp format the reservation service expects: local wall-clock, no offset.
pub const FEED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Default reservation service endpoint.
pub const DEFAULT_FEED_URL: &str =
    "https://wsrt.ghum.kuleuven.be/service1.asmx/GetReservationsJSON";

/// `[local midnight of date, local midnight of the next day)` in the feed's format.
pub fn query_window(date: NaiveDate) -> (String, String) {
    let start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let end = date
        .checked_add_days(Days::new(1))
        .and_then(|next| next.and_hms_opt(0, 0, 0))
        .unwrap_or(start);
    (
        start.format(FEED_TIME_FORMAT).to_string(),
        end.format(FEED_TIME_FORMAT).to_string(),
    )
}

/// Source of raw reservation records for one selection.
#[async_trait]
pub trait ReservationFeed: Send + Sync + 'static {
    /// Records for every resource in `catalog` on the selected day, unsorted and unfiltered.
    async fn fetch(
        &self,
        selection: &Selection,
        catalog: &Catalog,
    ) -> Result<Vec<RawRecord>, PipelineError>;
}

/// Reservation feed over HTTP GET.
pub struct HttpFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFeed {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Fetch(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn request(
        &self,
        selection: &Selection,
        catalog: &Catalog,
    ) -> Result<Vec<RawRecord>, PipelineError> {
        let (start, end) = query_window(selection.date);
        let ids = catalog.resource_id_list();
        let params = [
            ("uid", selection.user_id.as_str()),
            ("ResourceIDList", ids.as_str()),
            ("startdtstring", start.as_str()),
            ("enddtstring", end.as_str()),
        ];
        debug!(
            "GET {} facility={} window=[{start}, {end}) resources={}",
            self.base_url,
            catalog.facility(),
            catalog.len()
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| PipelineError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Fetch(format!("feed responded {status}")));
        }

        response
            .json::<Vec<RawRecord>>()
            .await
            .map_err(|e| PipelineError::Fetch(format!("unexpected response body: {e}")))
    }
}

#[async_trait]
impl ReservationFeed for HttpFeed {
    async fn fetch(
        &self,
        selection: &Selection,
        catalog: &Catalog,
    ) -> Result<Vec<RawRecord>, PipelineError> {
        let started = Instant::now();
        let result = self.request(selection, catalog).await;
        metrics::histogram!(crate::observability::FETCH_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            warn!("{e}");
            metrics::counter!(crate::observability::FETCH_FAILURES_TOTAL).increment(1);
        }
        result
    }
}
