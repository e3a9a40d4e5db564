// ABOUTME: Real-time trace replay against the running control loop
//
// Records are posted through a ControllerHandle at their wall-clock offsets,
// so the tick interval, periodic summaries and the config watcher all run as
// they would in a live proxy.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use super::{
    replay_factory, NumberedRecord, ReplayError, ReplayReport, TraceDriver, VirtualClock,
};
use crate::config::{ConfigWatcher, ProxyConfig};
use crate::splitter::controller::Controller;
use crate::splitter::counters::Counters;
use crate::splitter::simple::SimpleSplitter;

/// How often the mapper clock catches up with wall time between records
const CLOCK_RESOLUTION: Duration = Duration::from_millis(50);

/// Replay `records` in real time.
///
/// With a `watcher`, edits to the config file are applied while the trace
/// runs; `config` records in the trace still build on the config the replay
/// started with.
pub async fn replay_live(
    config: ProxyConfig,
    records: Vec<NumberedRecord>,
    watcher: Option<ConfigWatcher>,
) -> Result<ReplayReport, ReplayError> {
    let clock = VirtualClock::new();
    let released = Arc::new(AtomicU64::new(0));
    let counters = Arc::new(Counters::new());

    let splitter = SimpleSplitter::new(config.clone(), replay_factory(&clock, &released));
    let (controller, handle) = Controller::new(splitter, Arc::clone(&counters));

    let start = Instant::now();
    let clock_task = tokio::spawn({
        let clock = clock.clone();
        async move {
            let mut ticker = tokio::time::interval(CLOCK_RESOLUTION);
            loop {
                ticker.tick().await;
                clock.advance_to(start.elapsed());
            }
        }
    });
    let watch_task = watcher.map(|watcher| {
        info!("Watching {} for changes", watcher.path().display());
        watcher.spawn(config.watch_interval, handle.clone())
    });
    let control_task = tokio::spawn(controller.run());

    let applied = records.len();
    let mut driver = TraceDriver::new(config);

    let result = async {
        for NumberedRecord { line, record } in records {
            tokio::time::sleep_until(start + record.at()).await;
            clock.advance_to(record.at());

            if let Some(message) = driver.message(line, record.action)? {
                handle.send(message)?;
            }
        }
        handle.shutdown()?;
        Ok::<_, ReplayError>(())
    }
    .await;

    if let Some(task) = watch_task {
        task.abort();
    }
    clock_task.abort();

    if let Err(e) = result {
        // Stop the loop even when the trace was bad
        let _ = handle.shutdown();
        let _ = control_task.await;
        return Err(e);
    }

    let stopped = control_task.await?;
    debug!("Live replay finished after {:?}", start.elapsed());

    Ok(ReplayReport::new(
        applied,
        &stopped.splitter,
        &counters,
        stopped.ticks,
        stopped.evicted,
        &released,
    ))
}
