//! Directory fixtures for running without the administration database

use anyhow::Context;
use safeline_core::DirectorySeed;
use std::path::Path;

/// Read a directory fixture from a JSON file
pub fn load_seed(path: impl AsRef<Path>) -> anyhow::Result<DirectorySeed> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading directory seed {}", path.display()))?;
    let seed: DirectorySeed = serde_json::from_str(&raw)
        .with_context(|| format!("parsing directory seed {}", path.display()))?;

    let sites: usize = seed.companies.iter().map(|c| c.sites.len()).sum();
    let employees: usize = seed.companies.iter().map(|c| c.employees.len()).sum();
    tracing::info!(
        companies = seed.companies.len(),
        sites,
        employees,
        "Loaded directory seed"
    );
    Ok(seed)
}
