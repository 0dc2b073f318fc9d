// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Context};
use std::env;
use tracing_subscriber::EnvFilter;
use xtal_monitor::config::MonitorParams;
use xtal_monitor::engine::Monitor;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn run(config_path: &str) -> anyhow::Result<()> {
    let params = MonitorParams::load(config_path)
        .with_context(|| format!("cannot load configuration from '{}'", config_path))?;
    let monitor = Monitor::from_params(&params).context("invalid configuration")?;

    let shutdown = monitor.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown("interrupted");
        }
    });

    let report = monitor.run().await?;
    for (rank, error) in &report.failed_workers {
        tracing::warn!(rank, "worker stopped early: {}", error);
    }
    println!(
        "{} events received, {} hits, {} results lost, {:.2} seconds",
        report.total(),
        report.hits(),
        report.lost(),
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let outcome = match args.as_slice() {
        [_, config_path] => run(config_path).await,
        _ => Err(usage(args.first().map(String::as_str).unwrap_or("xtal-monitor"))),
    };

    if let Err(error) = outcome {
        eprintln!("❌ {:#}", error);
        std::process::exit(1);
    }
}

fn usage(program: &str) -> anyhow::Error {
    anyhow!("usage: {} <config.yaml|config.toml>", program)
}
