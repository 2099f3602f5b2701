//! Query command - select candidate subjects by tag membership

use anyhow::Result;
use std::path::PathBuf;
use taggable_domain::{MatchMode, TagInput};

use super::Workspace;
use crate::args::QueryArgs;

pub async fn execute(args: QueryArgs, config_path: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref()).await?;
    let engine = workspace.engine();
    let mode = args.mode.mode();

    if mode != MatchMode::WithoutAny && args.refs.is_none() {
        anyhow::bail!("Tag references are required unless --without-any is given");
    }

    let input = args.refs.map(TagInput::from).unwrap_or_else(TagInput::none);
    let predicate = engine.scope(input, mode, &args.resolve.options()).await?;
    tracing::debug!(predicate = ?predicate, "Built query predicate");

    let matches = engine
        .find_subjects(&args.subject_type, &args.candidates, &predicate)
        .await?;

    if args.json {
        let output = serde_json::json!({
            "mode": mode,
            "predicate": predicate,
            "matches": matches,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for id in &matches {
            println!("{}", id);
        }
    }

    Ok(())
}
