//! CLI command implementations

use crate::script::Script;
use std::path::PathBuf;
use strata_core::VersionId;

pub fn replay(path: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Replaying script: {}", path.display());

    let replay = Script::load(&path)?.run()?;
    for outcome in &replay.outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }

    let stats = replay.graph.stats();
    tracing::info!(
        "Final version {}: {} node objects, {} log records, {} redirects",
        replay.graph.current_version(),
        stats.nodes,
        stats.log_records,
        stats.redirects
    );
    Ok(())
}

pub fn render(path: PathBuf, at: Option<u64>) -> anyhow::Result<()> {
    let replay = Script::load(&path)?.run()?;
    let version = at.map(VersionId).unwrap_or_else(|| replay.graph.current_version());

    print!("{}", strata_core::render(&replay.graph, version)?);
    Ok(())
}
