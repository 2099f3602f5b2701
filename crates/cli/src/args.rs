//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use taggable_domain::{MatchMode, ResolveOptions};

/// taggable: attach a shared, localized tag vocabulary to any kind of record
#[derive(Parser, Debug)]
#[command(name = "taggable")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, list and maintain tags
    Tags(TagsArgs),

    /// Tag, untag and inspect a subject
    Subject(SubjectArgs),

    /// Select subjects by tag membership
    Query(QueryArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

/// Lookup narrowing shared by every command that resolves references
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveFlags {
    /// Restrict name lookup (and creation) to this group
    #[arg(long)]
    pub group: Option<String>,

    /// Locale of the given names (defaults to the configured locale)
    #[arg(long)]
    pub locale: Option<String>,
}

impl ResolveFlags {
    pub fn options(&self) -> ResolveOptions {
        ResolveOptions {
            group: self.group.clone(),
            locale: self.locale.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct TagsArgs {
    #[command(subcommand)]
    pub command: TagsCommands,
}

#[derive(Subcommand, Debug)]
pub enum TagsCommands {
    /// Create a tag explicitly
    Create {
        /// Display name
        name: String,

        #[arg(long)]
        group: Option<String>,

        /// Locale of the name and description
        #[arg(long)]
        locale: Option<String>,

        /// Explicit slug (derived from the name otherwise)
        #[arg(long)]
        slug: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        sort_order: Option<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List live tags by sort order
    List {
        #[arg(long)]
        group: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one tag
    Show {
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set the name of a tag in one locale; the slug is kept
    Rename {
        id: i64,

        name: String,

        #[arg(long)]
        locale: Option<String>,
    },

    /// Set sort orders 1..n following the given id order
    Reorder {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// List the subjects of one type that carry a tag
    Entries {
        id: i64,

        /// Registered subject type name
        subject_type: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Soft-delete a tag and drop its associations
    Delete { id: i64 },

    /// Restore a soft-deleted tag
    Restore { id: i64 },
}

#[derive(Args, Debug)]
pub struct SubjectArgs {
    #[command(subcommand)]
    pub command: SubjectCommands,
}

#[derive(Subcommand, Debug)]
pub enum SubjectCommands {
    /// Attach tags, keeping existing ones
    Tag {
        #[command(flatten)]
        target: SubjectTarget,

        /// Delimited names and/or numeric ids
        refs: String,

        #[command(flatten)]
        resolve: ResolveFlags,
    },

    /// Replace the subject's tags with exactly these
    Retag {
        #[command(flatten)]
        target: SubjectTarget,

        /// Delimited names and/or numeric ids; empty clears every tag
        refs: String,

        #[command(flatten)]
        resolve: ResolveFlags,
    },

    /// Detach the given tags, or all tags when none are given
    Untag {
        #[command(flatten)]
        target: SubjectTarget,

        refs: Option<String>,

        #[command(flatten)]
        resolve: ResolveFlags,
    },

    /// List the subject's tags
    Show {
        #[command(flatten)]
        target: SubjectTarget,

        /// Locale used to display names
        #[arg(long)]
        locale: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct SubjectTarget {
    /// Registered subject type (see [subjects] in the config)
    pub subject_type: String,

    pub subject_id: String,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub mode: MatchFlags,

    /// Registered subject type
    pub subject_type: String,

    /// Comma-separated subject ids to filter
    #[arg(long, value_delimiter = ',', required = true)]
    pub candidates: Vec<String>,

    /// Delimited names and/or numeric ids (ignored with --without-any)
    pub refs: Option<String>,

    #[command(flatten)]
    pub resolve: ResolveFlags,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct MatchFlags {
    /// Subjects carrying every referenced tag
    #[arg(long)]
    pub all: bool,

    /// Subjects carrying at least one referenced tag
    #[arg(long)]
    pub any: bool,

    /// Subjects carrying none of the referenced tags
    #[arg(long)]
    pub none: bool,

    /// Subjects carrying no tags at all
    #[arg(long)]
    pub without_any: bool,
}

impl MatchFlags {
    pub fn mode(&self) -> MatchMode {
        if self.all {
            MatchMode::All
        } else if self.any {
            MatchMode::Any
        } else if self.none {
            MatchMode::None
        } else {
            MatchMode::WithoutAny
        }
    }
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./taggable.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration as TOML
    Show,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_query_mode_flags() {
        let cli = Cli::try_parse_from([
            "taggable",
            "query",
            "--none",
            "post",
            "--candidates",
            "1,2",
            "a",
        ])
        .unwrap();
        let Commands::Query(args) = cli.command else {
            panic!("expected query");
        };
        assert_eq!(args.mode.mode(), MatchMode::None);
        assert_eq!(args.candidates, vec!["1", "2"]);

        let both = Cli::try_parse_from([
            "taggable",
            "query",
            "--all",
            "--any",
            "post",
            "--candidates",
            "1",
        ]);
        assert!(both.is_err());
    }
}
