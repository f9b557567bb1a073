//! Demo run - a counter published to subscribers consuming at different paces

use std::sync::Arc;

use eyre::{Result, bail};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcast;
use crate::config::DemoConfig;
use crate::sink::{Listener, sink};

/// What one subscriber observed during a run
#[derive(Debug, Clone, Default)]
pub struct ConsumerReport {
    pub name: String,
    pub delay_ms: u64,
    /// Values received
    pub received: u64,
    /// Values coalesced away between two receives
    pub skipped: u64,
    /// Values that were not newer than the previous one
    pub regressions: u64,
    pub last: Option<u64>,
    /// Whether the final published value arrived
    pub got_final: bool,
}

/// Run the demo and collect one report per subscriber
///
/// All consumers share one settle deadline after publishing ends. A consumer
/// still short of the final value by then is cut off by unsubscribing, and its
/// report covers what it received until that point.
pub async fn run(config: &DemoConfig) -> Result<Vec<ConsumerReport>> {
    if config.subscribers == 0 {
        bail!("Demo needs at least one subscriber");
    }
    if config.updates == 0 {
        bail!("Demo needs at least one update");
    }

    info!(
        subscribers = config.subscribers,
        updates = config.updates,
        interval_ms = config.interval_ms,
        "demo::run: starting"
    );

    let broadcast = Arc::new(Broadcast::new());
    let final_value = config.updates;

    let mut consumers: Vec<JoinHandle<ConsumerReport>> = (0..config.subscribers)
        .map(|index| {
            let (tx, rx) = sink();
            broadcast.subscribe(tx);
            let report = ConsumerReport {
                name: format!("sub-{}", index + 1),
                delay_ms: config.delay_ms_for(index),
                ..Default::default()
            };
            tokio::spawn(consume(rx, report, final_value))
        })
        .collect();

    for value in 1..=final_value {
        broadcast.update(value);
        tokio::time::sleep(config.interval()).await;
    }
    debug!("demo::run: publishing done");

    let deadline = Instant::now() + config.settle_timeout();
    let mut settled = Vec::with_capacity(consumers.len());
    for (index, consumer) in consumers.iter_mut().enumerate() {
        match tokio::time::timeout_at(deadline, consumer).await {
            Ok(report) => settled.push(Some(report?)),
            Err(_) => {
                warn!(index, "demo::run: consumer did not see the final update in time");
                settled.push(None);
            }
        }
    }

    // Disconnects every listener, so late consumers return what they have
    broadcast.unsubscribe_all().await;

    let mut reports = Vec::with_capacity(settled.len());
    for (report, consumer) in settled.into_iter().zip(consumers) {
        match report {
            Some(report) => reports.push(report),
            None => reports.push(consumer.await?),
        }
    }

    info!("demo::run: finished");
    Ok(reports)
}

/// Receive until the final value shows up or the sink disconnects
async fn consume(rx: Listener<u64>, mut report: ConsumerReport, final_value: u64) -> ConsumerReport {
    let delay = std::time::Duration::from_millis(report.delay_ms);

    while let Ok(value) = rx.recv().await {
        report.received += 1;
        match report.last {
            Some(last) if value <= last => report.regressions += 1,
            Some(last) => report.skipped += value - last - 1,
            None => report.skipped += value - 1,
        }
        report.last = Some(value);

        if value == final_value {
            report.got_final = true;
            break;
        }
        tokio::time::sleep(delay).await;
    }

    debug!(name = %report.name, received = report.received, skipped = report.skipped, "demo::consume: done");
    report
}
