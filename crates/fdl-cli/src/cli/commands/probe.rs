//! `fdl probe` – HEAD the URL and print what the planner would see.

use anyhow::Result;
use fdl_core::config::FdlConfig;
use fdl_core::downloader::{effective_timeout, plan_for};
use fdl_core::fetch_head;
use fdl_core::request::RequestTemplate;
use fdl_core::transport::CurlTransport;

pub async fn run_probe(cfg: &FdlConfig, url: &str) -> Result<()> {
    let template = cfg
        .headers
        .iter()
        .fold(RequestTemplate::get(url)?, |t, (k, v)| t.with_header(k, v));
    let timeout = effective_timeout(cfg.timeout());
    let head = tokio::task::spawn_blocking(move || {
        fetch_head::probe(&CurlTransport::default(), &template, timeout)
    })
    .await??;

    let plan = plan_for(&head, cfg.concurrency, cfg.chunk_size.unwrap_or(0));
    match head.content_length {
        Some(n) => println!("size:           {} bytes", n),
        None => println!("size:           unknown"),
    }
    println!("accept-ranges:  {}", if head.accept_ranges { "bytes" } else { "none" });
    if let Some(etag) = &head.etag {
        println!("etag:           {}", etag);
    }
    if let Some(lm) = &head.last_modified {
        println!("last-modified:  {}", lm);
    }
    if let Some(cd) = &head.content_disposition {
        println!("disposition:    {}", cd);
    }
    if plan.is_ranged() {
        println!(
            "plan:           {} fragment(s) of {} bytes, {} worker(s)",
            plan.fragment_count(),
            plan.chunk_size(),
            plan.concurrency()
        );
    } else {
        println!("plan:           single unranged fetch");
    }
    Ok(())
}
