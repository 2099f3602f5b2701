//! Tags command - explicit tag management

use anyhow::Result;
use std::path::PathBuf;
use taggable_domain::{Localized, NewTag, Tag, TagId, TagPatch};

use super::Workspace;
use crate::args::{TagsArgs, TagsCommands};

pub async fn execute(args: TagsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref()).await?;
    let service = workspace.service();
    let default_locale = workspace.config.tagging.default_locale.clone();

    match args.command {
        TagsCommands::Create {
            name,
            group,
            locale,
            slug,
            description,
            sort_order,
            json,
        } => {
            let locale = locale.unwrap_or_else(|| default_locale.clone());
            let new_tag = NewTag {
                slug,
                name: localized(&locale, name),
                description: description.map(|d| localized(&locale, d)),
                group,
                sort_order,
            };
            let tag = service.create_tag(new_tag).await?;
            print_tag(&tag, &default_locale, json)
        }
        TagsCommands::List { group, json } => {
            let tags = service.list_tags(group.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tags)?);
            } else {
                println!("Tags ({} found)", tags.len());
                for tag in &tags {
                    println!("{}", summary_line(tag, &default_locale));
                }
            }
            Ok(())
        }
        TagsCommands::Show { id, json } => {
            let tag = service.get_tag(TagId(id)).await?;
            print_tag(&tag, &default_locale, json)
        }
        TagsCommands::Rename { id, name, locale } => {
            let locale = locale.unwrap_or_else(|| default_locale.clone());
            let patch = TagPatch {
                name: Some(localized(&locale, name)),
                ..Default::default()
            };
            let tag = service.update_tag(TagId(id), patch).await?;
            println!("Renamed: {}", summary_line(&tag, &locale));
            Ok(())
        }
        TagsCommands::Reorder { ids } => {
            let ids: Vec<TagId> = ids.into_iter().map(TagId).collect();
            let tags = service.reorder(&ids).await?;
            println!("Reordered {} tags", tags.len());
            for tag in &tags {
                println!("{}\t{}", tag.sort_order, summary_line(tag, &default_locale));
            }
            Ok(())
        }
        TagsCommands::Entries {
            id,
            subject_type,
            json,
        } => {
            let entries = service.entries(TagId(id), &subject_type).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!("{}", entry);
                }
            }
            Ok(())
        }
        TagsCommands::Delete { id } => {
            let tag = service.delete_tag(TagId(id)).await?;
            println!("Deleted: {}", summary_line(&tag, &default_locale));
            Ok(())
        }
        TagsCommands::Restore { id } => {
            let tag = service.restore_tag(TagId(id)).await?;
            println!("Restored: {}", summary_line(&tag, &default_locale));
            Ok(())
        }
    }
}

fn localized(locale: &str, text: String) -> Localized {
    let mut map = Localized::new();
    map.insert(locale.to_string(), text);
    map
}

pub(crate) fn summary_line(tag: &Tag, locale: &str) -> String {
    let mut line = format!("{}\t{}\t{}", tag.id, tag.slug, tag.display_name(locale));
    if let Some(group) = &tag.group {
        line.push_str(&format!("\t[{}]", group));
    }
    line
}

fn print_tag(tag: &Tag, locale: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tag)?);
        return Ok(());
    }

    println!("ID: {}", tag.id);
    println!("  Slug: {}", tag.slug);
    for (name_locale, name) in &tag.name {
        println!("  Name ({}): {}", name_locale, name);
    }
    if let Some(description) = tag.description.as_ref().and_then(|d| d.get(locale)) {
        println!("  Description: {}", description);
    }
    if let Some(group) = &tag.group {
        println!("  Group: {}", group);
    }
    println!("  Sort order: {}", tag.sort_order);
    Ok(())
}
