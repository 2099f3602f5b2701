//! Subject command - tag, retag, untag and inspect one subject

use anyhow::Result;
use std::path::PathBuf;
use taggable_domain::{SyncOutcome, TagInput};

use super::Workspace;
use super::tags::summary_line;
use crate::args::{SubjectArgs, SubjectCommands};

pub async fn execute(args: SubjectArgs, config_path: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref()).await?;
    let engine = workspace.engine();

    match args.command {
        SubjectCommands::Tag {
            target,
            refs,
            resolve,
        } => {
            let subject = engine.subject(&target.subject_type, target.subject_id)?;
            let outcome = engine.tag(&subject, refs, &resolve.options()).await?;
            report(&outcome);
        }
        SubjectCommands::Retag {
            target,
            refs,
            resolve,
        } => {
            let subject = engine.subject(&target.subject_type, target.subject_id)?;
            let outcome = engine.retag(&subject, refs, &resolve.options()).await?;
            report(&outcome);
        }
        SubjectCommands::Untag {
            target,
            refs,
            resolve,
        } => {
            let subject = engine.subject(&target.subject_type, target.subject_id)?;
            let outcome = engine
                .untag(&subject, refs.map(TagInput::from), &resolve.options())
                .await?;
            report(&outcome);
        }
        SubjectCommands::Show {
            target,
            locale,
            json,
        } => {
            let subject = engine.subject(&target.subject_type, target.subject_id)?;
            let tags = engine.tags_of(&subject).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tags)?);
            } else {
                let locale = locale.unwrap_or_else(|| engine.config().default_locale.clone());
                println!("{} ({} tags)", subject, tags.len());
                for tag in &tags {
                    println!("{}", summary_line(tag, &locale));
                }
            }
        }
    }

    Ok(())
}

fn report(outcome: &SyncOutcome) {
    if outcome.is_noop() {
        println!("No changes");
        return;
    }
    let ids = |ids: &[taggable_domain::TagId]| {
        ids.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    };
    println!(
        "Attached {} [{}], detached {} [{}]",
        outcome.attached.len(),
        ids(&outcome.attached),
        outcome.detached.len(),
        ids(&outcome.detached)
    );
}
