use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use immowatch::cycle::{run_crawl_cycle, CrawlCycleReport, CycleContext};

pub async fn crawl(ctx: &CycleContext, cancel: CancellationToken) -> Result<()> {
    println!("Starting crawl");
    println!("==============");
    for source in &ctx.config().sources {
        println!("  {}: {} start URL(s)", source.kind, source.start_urls.len());
    }

    let report = run_crawl_cycle(ctx, cancel)
        .await
        .context("Crawl cycle failed")?;

    print_summary(&report);
    println!("Stored listings: {}", ctx.store().count()?);
    Ok(())
}

pub fn print_summary(report: &CrawlCycleReport) {
    println!("\nCrawl Summary");
    println!("=============");
    println!("Pages fetched: {}", report.crawl.pages_fetched);
    println!("Pages failed: {}", report.crawl.pages_failed);
    println!("Candidates: {}", report.crawl.candidates);
    println!("New listings: {}", report.ingest.inserted);
    println!("Already known: {}", report.ingest.already_exists);
    println!("Rejected: {}", report.ingest.rejected);
    println!(
        "Notifications: {} sent, {} failed",
        report.notifications.sent, report.notifications.failed
    );
}
