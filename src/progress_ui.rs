//! Progress bar for `rescache` runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use resource_cache::tracker::ResourceTracker;
use url::Url;

/// Spawns the progress bar when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_bar` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    use_bar: bool,
    tracker: Arc<ResourceTracker>,
    locations: Vec<Url>,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_bar {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_bar_inner(tracker, locations, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_bar_inner(
    tracker: Arc<ResourceTracker>,
    locations: Vec<Url>,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            let percentage = tracker.percentage(&locations).unwrap_or(0);
            let done = locations
                .iter()
                .filter(|location| tracker.is_complete(location).unwrap_or(false))
                .count();
            bar.set_position(u64::from(percentage));
            bar.set_message(format!("[{done}/{}] resources", locations.len()));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        bar.finish_and_clear();
    })
}
