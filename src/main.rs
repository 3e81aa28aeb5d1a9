// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use rsfmri_denoise::config::consts::COMPARISON_FILE_NAME;
use rsfmri_denoise::config::{load_and_validate_config, RuntimeBuilder};
use rsfmri_denoise::engine::NodeState;
use rsfmri_denoise::stages::{comparison, names};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <run-config.yaml|run-config.toml>", args[0]);
        eprintln!("Example: {} runs/rest-denoise.yaml", args[0]);
        std::process::exit(1);
    }
    let run_file = &args[1];

    let plan = load_and_validate_config(run_file)
        .with_context(|| format!("Failed to load run configuration {}", run_file))?;
    let (graph, executor) = RuntimeBuilder::from_plan(&plan)?;

    println!("🧠 Resting-state denoising");
    println!("═══════════════════════════");
    println!("Run file:    {}", run_file);
    println!("Pipelines:   {}", plan.pipelines.len());
    println!("Strategy:    {:?}", executor.strategy());
    println!("Concurrency: {}", executor.max_concurrency());
    println!();

    let start = Instant::now();
    let report = executor.execute(&graph).await?;
    let elapsed = start.elapsed();

    for failure in report.failures() {
        eprintln!("❌ {}", failure);
    }

    let Some(outputs) = report.outputs(names::PIPELINE_COMPARISON, None, None) else {
        let cause = report
            .get(names::PIPELINE_COMPARISON, None, None)
            .and_then(|record| record.failure.as_ref())
            .map(|failure| failure.to_string())
            .unwrap_or_else(|| "no result recorded".to_string());
        bail!("Pipeline comparison did not complete: {}", cause);
    };
    let comparison = outputs.json(comparison::COMPARISON_PORT)?;

    let output_dir = &plan.config.output_dir;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let path = output_dir.join(COMPARISON_FILE_NAME);
    fs::write(&path, serde_json::to_string_pretty(&comparison)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("📊 Results");
    println!("──────────");
    if let Some(rows) = comparison["rows"].as_array() {
        for row in rows {
            match row["failure"].as_str() {
                Some(failure) => println!("  {:<32} failed: {}", row["pipeline"].as_str().unwrap_or("?"), failure),
                None => println!(
                    "  {:<32} included {:>3}  excluded {:>3}  failed {:>3}",
                    row["pipeline"].as_str().unwrap_or("?"),
                    row["n_included"],
                    row["n_excluded"],
                    row["n_failed"]
                ),
            }
        }
    }
    println!();
    println!(
        "✅ {} instances ({} cached, {} failed) in {:.2?}",
        report.len(),
        report.count(NodeState::Cached),
        report.count(NodeState::Failed),
        elapsed
    );
    println!("Comparison written to {}", path.display());

    Ok(())
}
