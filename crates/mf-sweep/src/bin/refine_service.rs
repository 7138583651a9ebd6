use anyhow::Context;
use mf_data::MemoryStore;
use mf_sweep::{FactoryConfig, RefinementOrchestrator};
use mf_types::SimulationResult;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::var("MF_CONFIG") {
        Ok(path) => FactoryConfig::from_json_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        Err(_) => FactoryConfig::default(),
    }
    .apply_env()?;

    let observations_path =
        std::env::var("MF_OBSERVATIONS").context("MF_OBSERVATIONS must point to a JSON results file")?;
    let raw = std::fs::read_to_string(&observations_path)
        .with_context(|| format!("reading {observations_path}"))?;
    let results: Vec<SimulationResult> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {observations_path}"))?;

    let store = MemoryStore::with_results(results);
    info!(results = store.result_count(), "loaded simulation results");

    let orchestrator = RefinementOrchestrator::new(config)?;
    let report = orchestrator.run_pass_report(&store, &store).await;

    let stats = store.dataset_stats();
    info!(queued = stats.pending_jobs, "job queue after pass");
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.success {
        anyhow::bail!(report.error.unwrap_or_else(|| "refinement pass failed".to_string()));
    }
    Ok(())
}
