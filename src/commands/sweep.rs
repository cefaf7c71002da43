use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use immowatch::cycle::{run_availability_sweep, CycleContext};
use immowatch::sweeper::SweepReport;

pub async fn sweep(ctx: &CycleContext, cancel: CancellationToken) -> Result<()> {
    println!("Starting availability sweep");
    println!("===========================");
    println!("Stored listings: {}", ctx.store().count()?);

    let report = run_availability_sweep(ctx, cancel)
        .await
        .context("Availability sweep failed")?;

    print_summary(&report);
    Ok(())
}

pub fn print_summary(report: &SweepReport) {
    println!("\nSweep Summary");
    println!("=============");
    println!("Checked: {}", report.checked);
    println!("Live: {}", report.live);
    println!("Removed: {}", report.removed);
    println!("Unsupported (kept): {}", report.unsupported);
    println!("Unverified (kept): {}", report.unverified);
}
