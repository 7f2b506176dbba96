//! `fdl get` – download one URL.

use anyhow::Result;
use fdl_core::config::FdlConfig;
use fdl_core::{Download, ProgressStats};
use std::time::{Duration, Instant};

use crate::cli::GetArgs;

const PROGRESS_INTERVAL_MS: u64 = 500;

/// Config values first, then command-line flags on top.
pub(crate) fn build_download(cfg: &FdlConfig, args: GetArgs) -> Download {
    let mut download = Download::new(args.url)
        .concurrency(args.concurrency.unwrap_or(cfg.concurrency))
        .chunk_size(args.chunk_size.or(cfg.chunk_size).unwrap_or(0))
        .timeout(Duration::from_secs(args.timeout.unwrap_or(cfg.timeout_secs)))
        .retry_policy(cfg.retry_policy())
        .overwrite(args.overwrite);
    for (name, value) in &cfg.headers {
        download = download.header(name, value);
    }
    for (name, value) in &args.headers {
        download = download.header(name, value);
    }
    if let Some(output) = args.output {
        download = download.output(output);
    }
    download
}

pub async fn run_get(cfg: &FdlConfig, args: GetArgs) -> Result<()> {
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<ProgressStats>(16);
    let download = build_download(cfg, args).progress(progress_tx);

    let progress_handle = tokio::spawn(async move {
        let mut last_print = Instant::now();
        while let Some(stats) = progress_rx.recv().await {
            let now = Instant::now();
            let finished = stats.fragments_done >= stats.fragment_count;
            if now.duration_since(last_print).as_millis() as u64 >= PROGRESS_INTERVAL_MS || finished {
                let done_mib = stats.bytes_done as f64 / 1_048_576.0;
                let total = stats
                    .total_bytes
                    .map(|t| format!("{:.1}", t as f64 / 1_048_576.0))
                    .unwrap_or_else(|| "?".to_string());
                let rate_mib = stats.bytes_per_sec() / 1_048_576.0;
                let eta = stats
                    .eta_secs()
                    .map(|s| format!("{:.0}s", s))
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "\r  {:.1} / {} MiB ({:.1}%)  {}/{} fragments  {:.2} MiB/s  ETA {}  ",
                    done_mib,
                    total,
                    stats.fraction() * 100.0,
                    stats.fragments_done,
                    stats.fragment_count,
                    rate_mib,
                    eta
                );
                last_print = now;
            }
        }
    });

    // The engine owns blocking threads; keep it off the async workers.
    let result = tokio::task::spawn_blocking(move || download.run()).await?;
    let _ = progress_handle.await;
    let report = result?;

    println!("saved {}", report.output.display());
    println!("Cost: {:.3}s", report.elapsed.as_secs_f64());
    println!("Speed: {:.2} KiB/s", report.bytes_per_sec() / 1024.0);
    if report.throttle_events + report.error_events > 0 {
        println!(
            "retries: {} throttled, {} other errors",
            report.throttle_events, report.error_events
        );
    }
    if !report.missing_fragments.is_empty() {
        anyhow::bail!(
            "{} fragment(s) missing from {}: {:?}",
            report.missing_fragments.len(),
            report.output.display(),
            report.missing_fragments
        );
    }
    Ok(())
}
