use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use immowatch::cycle::{run_availability_sweep, run_crawl_cycle, CycleContext};
use immowatch::error::{Error, ImmowatchErrorTrait};
use immowatch::metrics;

/// Watch command parameters
pub struct WatchParams {
    pub crawl_interval_secs: u64,
    pub sweep_interval_secs: u64,
    pub metrics_out: Option<PathBuf>,
}

/// Run crawl and sweep loops until `cancel` fires
///
/// The two loops are independent. A recoverable failure is logged and the
/// loop waits for its next tick; an unrecoverable one stops both loops and
/// is returned.
pub async fn watch(
    ctx: CycleContext,
    params: WatchParams,
    cancel: CancellationToken,
) -> Result<()> {
    if params.crawl_interval_secs == 0 || params.sweep_interval_secs == 0 {
        anyhow::bail!("intervals must be greater than 0");
    }

    println!("Watching {} source(s)", ctx.config().sources.len());
    println!("  Crawl every {}s", params.crawl_interval_secs);
    println!("  Sweep every {}s", params.sweep_interval_secs);
    println!("Press Ctrl-C to stop");

    let crawl_every = Duration::from_secs(params.crawl_interval_secs);
    let sweep_every = Duration::from_secs(params.sweep_interval_secs);
    let ctx = Arc::new(ctx);
    let metrics_out = params.metrics_out.map(Arc::new);

    let crawl_loop = {
        let ctx = Arc::clone(&ctx);
        let cancel = cancel.clone();
        let metrics_out = metrics_out.clone();
        async move {
            let mut ticker = interval(crawl_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let outcome = run_crawl_cycle(&ctx, cancel.clone()).await.map(|_| ());
                write_metrics(metrics_out.as_deref());
                if let Err(e) = outcome {
                    if !keep_watching("crawl", &e) {
                        cancel.cancel();
                        return fatal(e);
                    }
                }
            }
            Ok(())
        }
    };

    let sweep_loop = {
        let ctx = Arc::clone(&ctx);
        let cancel = cancel.clone();
        async move {
            let mut ticker = interval(sweep_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately; let the first crawl go first
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let outcome = run_availability_sweep(&ctx, cancel.clone()).await.map(|_| ());
                write_metrics(metrics_out.as_deref());
                if let Err(e) = outcome {
                    if !keep_watching("sweep", &e) {
                        cancel.cancel();
                        return fatal(e);
                    }
                }
            }
            Ok(())
        }
    };

    let (crawled, swept) = tokio::join!(crawl_loop, sweep_loop);

    println!("Stopped");
    crawled.and(swept)
}

/// Whether the loop that ran `cycle` carries on after `err`
fn keep_watching(cycle: &str, err: &Error) -> bool {
    match err {
        Error::Cancelled => false,
        e if e.is_recoverable() => {
            tracing::warn!(cycle, category = %e.category(), error = %e, "Cycle failed, retrying next tick");
            true
        }
        e => {
            tracing::error!(cycle, category = %e.category(), error = %e, "Cycle failed, stopping");
            false
        }
    }
}

/// Cancellation ends a loop cleanly, anything else is reported
fn fatal(err: Error) -> Result<()> {
    match err {
        Error::Cancelled => Ok(()),
        e => Err(e).context("Watch stopped"),
    }
}


fn write_metrics(path: Option<&PathBuf>) {
    let Some(path) = path else {
        return;
    };

    let written = metrics::gather_text()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .and_then(|text| {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))
        });
    if let Err(e) = written {
        tracing::warn!(error = %e, "Could not export metrics");
    }
}
