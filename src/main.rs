use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use seatgrid::catalog::CatalogSet;
use seatgrid::feed::{DEFAULT_FEED_URL, HttpFeed};
use seatgrid::model::row_symbols;
use seatgrid::notify::Frame;
use seatgrid::pipeline::{Pipeline, PipelineConfig};
use seatgrid::presenter::{ScrollMetrics, View};
use seatgrid::store::FileStore;

/// Lines a terminal "viewport" shows. Pressing Enter scrolls to its bottom.
const VIEWPORT_LINES: f64 = 24.0;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let metrics_port: Option<u16> = std::env::var("SEATGRID_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    seatgrid::observability::init(metrics_port);

    let store_dir = std::env::var("SEATGRID_STORE_DIR").unwrap_or_else(|_| "./data".into());
    let catalog_dir = std::env::var("SEATGRID_CATALOG_DIR").unwrap_or_else(|_| "./catalogs".into());
    let feed_url = std::env::var("SEATGRID_FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.into());
    let poll_ms: u64 = env_or("SEATGRID_POLL_MS", 100);
    let page_size: usize = env_or("SEATGRID_PAGE_SIZE", 10);
    let scroll_threshold: f64 = env_or("SEATGRID_SCROLL_THRESHOLD", 300.0);
    let fetch_timeout: u64 = env_or("SEATGRID_FETCH_TIMEOUT_SECS", 20);

    let catalogs = Arc::new(CatalogSet::load_dir(&catalog_dir)?);
    let store = Arc::new(FileStore::new(&store_dir));
    let feed = Arc::new(HttpFeed::new(&feed_url, Duration::from_secs(fetch_timeout))?);
    let config = PipelineConfig {
        poll_interval: Duration::from_millis(poll_ms),
        page_size,
        scroll_threshold,
    };
    let pipeline = Pipeline::new(store, feed, catalogs.clone(), config);

    info!("seatgrid watching {store_dir}");
    info!("  catalogs: {} facilities from {catalog_dir}", catalogs.len());
    info!("  feed: {feed_url}");
    info!("  poll: {poll_ms}ms, page size: {page_size}");
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    tokio::spawn(render(pipeline.subscribe()));

    let (scroll_tx, scroll_rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            let bottom = ScrollMetrics::at_bottom(VIEWPORT_LINES, VIEWPORT_LINES);
            if scroll_tx.send(bottom).await.is_err() {
                break;
            }
        }
    });

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("no SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };

    pipeline.run(scroll_rx, shutdown).await;
    info!("seatgrid stopped");
    Ok(())
}

/// Print every frame to stdout.
async fn render(mut frames: broadcast::Receiver<Frame>) {
    loop {
        let frame = match frames.recv().await {
            Ok(frame) => frame,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!("renderer skipped {n} frames");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match frame.view {
            View::Loading { last_error } => {
                println!("loading...");
                if let Some(e) = last_error {
                    println!("  ! {e}");
                }
            }
            View::Rows {
                rows,
                total,
                refreshing,
                last_error,
            } => {
                let heading = match (frame.facility, frame.date) {
                    (Some(facility), Some(date)) => format!("{} on {date}", facility.label()),
                    _ => String::new(),
                };
                println!("── cycle {} ── {heading} {}/{total} resources{}", frame.token, rows.len(), if refreshing { " (refreshing)" } else { "" });
                if let Some(e) = last_error {
                    println!("  ! {e}");
                }
                println!("{:>10}  {}", "hour", "012345678901234567890123");
                for row in rows {
                    println!("{:>10}  {}", row.resource_id, row_symbols(&row.statuses));
                }
            }
        }
    }
}
